//! Level files describing the initial tile map.

use std::{fs, path::Path};

use serde::Deserialize;
use thiserror::Error;
use tower_path_core::{CellCoord, Command, Event, PlacementError, Structure};

use crate::{apply, TileMap, MAX_GRID_SIDE};

/// Level layout as written in a TOML level file.
///
/// ```toml
/// columns = 8
/// rows = 5
/// entrance = [0, 2]
/// exit = [7, 2]
/// voids = [[3, 0]]
///
/// [[structures]]
/// cell = [4, 2]
/// kind = "tower"
/// ```
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct LevelConfig {
    /// Number of columns in the grid.
    pub columns: u32,
    /// Number of rows in the grid.
    pub rows: u32,
    /// Entrance marker as `[x, y]`.
    pub entrance: [i32; 2],
    /// Exit marker as `[x, y]`.
    pub exit: [i32; 2],
    /// Movement cost of plain ground.
    #[serde(default = "default_ground_cost")]
    pub ground_cost: f32,
    /// Cells without a ground tile.
    #[serde(default)]
    pub voids: Vec<[i32; 2]>,
    /// Structures present when the level starts.
    #[serde(default)]
    pub structures: Vec<StructureEntry>,
}

/// Structure placed by a level file.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct StructureEntry {
    /// Cell occupied by the structure as `[x, y]`.
    pub cell: [i32; 2],
    /// Kind of structure.
    pub kind: StructureKind,
    /// Movement cost; required for platforms and ignored otherwise.
    #[serde(default)]
    pub cost: Option<f32>,
}

/// Structure kinds accepted in level files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StructureKind {
    /// Blocking tower.
    Tower,
    /// Blocking wall.
    Wall,
    /// Walkable platform.
    Platform,
}

/// Errors raised while loading a level.
#[derive(Debug, Error)]
pub enum LevelError {
    /// The level file could not be read.
    #[error("failed to read level file: {0}")]
    Io(#[from] std::io::Error),
    /// The level file is not valid TOML for a level.
    #[error("failed to parse level: {0}")]
    Parse(#[from] toml::de::Error),
    /// The grid has no cells.
    #[error("level grid must have at least one column and one row")]
    EmptyGrid,
    /// The grid exceeds the supported size.
    #[error("level grid {columns}x{rows} exceeds {max} cells per side")]
    GridTooLarge {
        /// Requested columns.
        columns: u32,
        /// Requested rows.
        rows: u32,
        /// Largest accepted side length.
        max: u32,
    },
    /// A costed value is negative or not finite.
    #[error("{what} cost {cost} must be finite and non-negative")]
    InvalidCost {
        /// Element the cost belongs to.
        what: &'static str,
        /// Offending value.
        cost: f32,
    },
    /// A platform entry did not provide a cost.
    #[error("platform at {cell} is missing its cost")]
    MissingPlatformCost {
        /// Cell of the platform entry.
        cell: CellCoord,
    },
    /// A cell referenced by the level lies outside the grid.
    #[error("{what} {cell} lies outside the {columns}x{rows} grid")]
    CellOutOfBounds {
        /// Element referencing the cell.
        what: &'static str,
        /// Offending cell.
        cell: CellCoord,
        /// Grid columns.
        columns: u32,
        /// Grid rows.
        rows: u32,
    },
    /// The entrance or exit sits on a void cell.
    #[error("{marker} {cell} has no ground")]
    MarkerWithoutGround {
        /// Marker name.
        marker: &'static str,
        /// Marker cell.
        cell: CellCoord,
    },
    /// The same cell received two structures.
    #[error("duplicate structure at {cell}")]
    DuplicateStructure {
        /// Cell listed twice.
        cell: CellCoord,
    },
    /// The map refused a structure entry.
    #[error("structure at {cell} was rejected: {reason:?}")]
    StructureRejected {
        /// Cell of the rejected entry.
        cell: CellCoord,
        /// Reason reported by the map.
        reason: PlacementError,
    },
}

fn default_ground_cost() -> f32 {
    1.0
}

fn cell_of(pair: [i32; 2]) -> CellCoord {
    CellCoord::new(pair[0], pair[1])
}

fn check_cost(what: &'static str, cost: f32) -> Result<f32, LevelError> {
    if cost.is_finite() && cost >= 0.0 {
        Ok(cost)
    } else {
        Err(LevelError::InvalidCost { what, cost })
    }
}

impl LevelConfig {
    /// Parses a level from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, LevelError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads and parses a level file.
    pub fn load(path: &Path) -> Result<Self, LevelError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Entrance marker cell.
    #[must_use]
    pub fn entrance_cell(&self) -> CellCoord {
        cell_of(self.entrance)
    }

    /// Exit marker cell.
    #[must_use]
    pub fn exit_cell(&self) -> CellCoord {
        cell_of(self.exit)
    }

    /// Builds the tile map described by the level.
    pub fn build_map(&self) -> Result<TileMap, LevelError> {
        if self.columns == 0 || self.rows == 0 {
            return Err(LevelError::EmptyGrid);
        }
        if self.columns > MAX_GRID_SIDE || self.rows > MAX_GRID_SIDE {
            return Err(LevelError::GridTooLarge {
                columns: self.columns,
                rows: self.rows,
                max: MAX_GRID_SIDE,
            });
        }
        let ground_cost = check_cost("ground", self.ground_cost)?;

        let entrance = self.entrance_cell();
        let exit = self.exit_cell();
        let mut map = TileMap::new(self.columns, self.rows, entrance, exit)
            .with_ground_cost(ground_cost);

        for (marker, cell) in [("entrance", entrance), ("exit", exit)] {
            if !crate::query::contains(&map, cell) {
                return Err(self.out_of_bounds(marker, cell));
            }
        }

        for &pair in &self.voids {
            let cell = cell_of(pair);
            if !map.set_ground(cell, false) {
                return Err(self.out_of_bounds("void", cell));
            }
        }

        for (marker, cell) in [("entrance", entrance), ("exit", exit)] {
            if !crate::query::natural_ground_at(&map, cell) {
                return Err(LevelError::MarkerWithoutGround { marker, cell });
            }
        }

        let mut events = Vec::new();
        for entry in &self.structures {
            let cell = cell_of(entry.cell);
            let structure = entry.structure()?;
            events.clear();
            apply(&mut map, Command::Build { cell, structure }, &mut events);

            if let Some(Event::BuildRejected { reason, .. }) = events.first() {
                return Err(match reason {
                    PlacementError::OutOfBounds => self.out_of_bounds("structure", cell),
                    PlacementError::Occupied => LevelError::DuplicateStructure { cell },
                    other => LevelError::StructureRejected {
                        cell,
                        reason: *other,
                    },
                });
            }
        }

        tracing::debug!(
            columns = self.columns,
            rows = self.rows,
            structures = self.structures.len(),
            "level map built"
        );
        Ok(map)
    }

    fn out_of_bounds(&self, what: &'static str, cell: CellCoord) -> LevelError {
        LevelError::CellOutOfBounds {
            what,
            cell,
            columns: self.columns,
            rows: self.rows,
        }
    }
}

impl StructureEntry {
    /// Converts the entry into the structure it describes.
    pub fn structure(&self) -> Result<Structure, LevelError> {
        match self.kind {
            StructureKind::Tower => Ok(Structure::Tower),
            StructureKind::Wall => Ok(Structure::Wall),
            StructureKind::Platform => {
                let cost = self.cost.ok_or(LevelError::MissingPlatformCost {
                    cell: cell_of(self.cell),
                })?;
                Ok(Structure::Platform {
                    cost: check_cost("platform", cost)?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;
    use tower_path_core::GridOracle;

    const LEVEL: &str = r#"
columns = 6
rows = 4
entrance = [0, 1]
exit = [5, 1]
ground_cost = 1.5
voids = [[2, 3]]

[[structures]]
cell = [2, 1]
kind = "tower"

[[structures]]
cell = [2, 3]
kind = "platform"
cost = 4.0
"#;

    #[test]
    fn parses_and_builds_level() {
        let level = LevelConfig::from_toml_str(LEVEL).expect("level parses");
        let map = level.build_map().expect("map builds");

        assert_eq!(query::dimensions(&map), (6, 4));
        assert_eq!(query::entrance(&map), CellCoord::new(0, 1));
        assert_eq!(query::exit(&map), CellCoord::new(5, 1));
        assert!(map.has_blocking_structure(CellCoord::new(2, 1)));
        assert!(map.has_ground(CellCoord::new(2, 3)));
        assert_eq!(map.movement_cost(CellCoord::new(2, 3)), 4.0);
        assert_eq!(map.movement_cost(CellCoord::new(1, 1)), 1.5);
    }

    #[test]
    fn defaults_apply_to_optional_fields() {
        let level = LevelConfig::from_toml_str(
            "columns = 2\nrows = 1\nentrance = [0, 0]\nexit = [1, 0]\n",
        )
        .expect("level parses");

        assert_eq!(level.ground_cost, 1.0);
        assert!(level.voids.is_empty());
        assert!(level.structures.is_empty());
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocation() {
        let level = LevelConfig::from_toml_str(
            "columns = 4000000000\nrows = 4000000000\nentrance = [0, 0]\nexit = [1, 0]\n",
        )
        .expect("level parses");

        assert!(matches!(
            level.build_map(),
            Err(LevelError::GridTooLarge {
                max: MAX_GRID_SIDE,
                ..
            })
        ));
    }

    #[test]
    fn marker_outside_grid_is_rejected() {
        let level = LevelConfig::from_toml_str(
            "columns = 2\nrows = 1\nentrance = [0, 0]\nexit = [2, 0]\n",
        )
        .expect("level parses");

        assert!(matches!(
            level.build_map(),
            Err(LevelError::CellOutOfBounds { what: "exit", .. })
        ));
    }

    #[test]
    fn marker_on_void_is_rejected() {
        let level = LevelConfig::from_toml_str(
            "columns = 2\nrows = 1\nentrance = [0, 0]\nexit = [1, 0]\nvoids = [[0, 0]]\n",
        )
        .expect("level parses");

        assert!(matches!(
            level.build_map(),
            Err(LevelError::MarkerWithoutGround {
                marker: "entrance",
                ..
            })
        ));
    }

    #[test]
    fn duplicate_structures_are_rejected() {
        let level = LevelConfig::from_toml_str(
            r#"
columns = 3
rows = 1
entrance = [0, 0]
exit = [2, 0]

[[structures]]
cell = [1, 0]
kind = "wall"

[[structures]]
cell = [1, 0]
kind = "tower"
"#,
        )
        .expect("level parses");

        assert!(matches!(
            level.build_map(),
            Err(LevelError::DuplicateStructure { .. })
        ));
    }

    #[test]
    fn platform_without_cost_is_rejected() {
        let entry = StructureEntry {
            cell: [1, 1],
            kind: StructureKind::Platform,
            cost: None,
        };
        assert!(matches!(
            entry.structure(),
            Err(LevelError::MissingPlatformCost { .. })
        ));

        let negative = StructureEntry {
            cost: Some(-1.0),
            ..entry
        };
        assert!(matches!(
            negative.structure(),
            Err(LevelError::InvalidCost { .. })
        ));
    }

    #[test]
    fn malformed_toml_reports_parse_error() {
        assert!(matches!(
            LevelConfig::from_toml_str("columns = ["),
            Err(LevelError::Parse(_))
        ));
    }
}
