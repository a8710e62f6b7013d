#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative tile map for Tower Path.
//!
//! The map owns the ground layer, the structure layer and the entrance/exit
//! markers. It is mutated exclusively through [`apply`] and answers the
//! pathfinding system's questions through its [`GridOracle`] implementation.

mod level;

pub use level::{LevelConfig, LevelError, StructureEntry, StructureKind};

use tower_path_core::{
    CellCoord, Command, Event, GridOracle, PlacementError, RemovalError, Structure,
};

const DEFAULT_GROUND_COST: f32 = 1.0;

/// Largest number of columns or rows accepted from level files.
pub const MAX_GRID_SIDE: u32 = 1024;

/// Dense rectangular tile map anchored at cell `(0, 0)`.
#[derive(Clone, Debug)]
pub struct TileMap {
    columns: u32,
    rows: u32,
    ground_cost: f32,
    ground: Vec<bool>,
    structures: Vec<Option<Structure>>,
    entrance: CellCoord,
    exit: CellCoord,
}

impl TileMap {
    /// Creates a map of the provided size with ground on every cell.
    #[must_use]
    pub fn new(columns: u32, rows: u32, entrance: CellCoord, exit: CellCoord) -> Self {
        let capacity_u64 = u64::from(columns) * u64::from(rows);
        let capacity = usize::try_from(capacity_u64).unwrap_or(0);
        Self {
            columns,
            rows,
            ground_cost: DEFAULT_GROUND_COST,
            ground: vec![true; capacity],
            structures: vec![None; capacity],
            entrance,
            exit,
        }
    }

    /// Overrides the movement cost of plain ground.
    #[must_use]
    pub fn with_ground_cost(mut self, ground_cost: f32) -> Self {
        self.ground_cost = ground_cost;
        self
    }

    /// Adds or removes the ground tile under `cell`.
    ///
    /// Returns `false` when the cell lies outside the map.
    pub fn set_ground(&mut self, cell: CellCoord, present: bool) -> bool {
        match self.index(cell) {
            Some(index) => {
                self.ground[index] = present;
                true
            }
            None => false,
        }
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        let column = u32::try_from(cell.x()).ok()?;
        let row = u32::try_from(cell.y()).ok()?;
        if column >= self.columns || row >= self.rows {
            return None;
        }

        let column = usize::try_from(column).ok()?;
        let row = usize::try_from(row).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        row.checked_mul(width)?.checked_add(column)
    }

    fn structure(&self, cell: CellCoord) -> Option<Structure> {
        self.index(cell)
            .and_then(|index| self.structures.get(index).copied().flatten())
    }

    fn build(&mut self, cell: CellCoord, structure: Structure) -> Result<(), PlacementError> {
        let index = self.index(cell).ok_or(PlacementError::OutOfBounds)?;
        if cell == self.entrance || cell == self.exit {
            return Err(PlacementError::ReservedCell);
        }
        if self.structures[index].is_some() {
            return Err(PlacementError::Occupied);
        }
        if !self.ground[index] && !structure.provides_floor() {
            return Err(PlacementError::NoGround);
        }

        self.structures[index] = Some(structure);
        Ok(())
    }

    fn demolish(&mut self, cell: CellCoord) -> Result<Structure, RemovalError> {
        let index = self.index(cell).ok_or(RemovalError::OutOfBounds)?;
        self.structures[index]
            .take()
            .ok_or(RemovalError::NothingToDemolish)
    }
}

impl GridOracle for TileMap {
    fn has_ground(&self, cell: CellCoord) -> bool {
        let Some(index) = self.index(cell) else {
            return false;
        };
        self.ground[index]
            || self.structures[index].map_or(false, |structure| structure.provides_floor())
    }

    fn has_blocking_structure(&self, cell: CellCoord) -> bool {
        self.structure(cell)
            .map_or(false, |structure| structure.blocks_movement())
    }

    fn movement_cost(&self, cell: CellCoord) -> f32 {
        self.structure(cell)
            .and_then(|structure| structure.movement_cost())
            .unwrap_or(self.ground_cost)
    }

    fn ground_cost(&self) -> f32 {
        self.ground_cost
    }

    fn has_ground_beneath(&self, cell: CellCoord) -> bool {
        query::natural_ground_at(self, cell)
    }
}

/// Applies the provided command to the map, mutating state deterministically.
pub fn apply(map: &mut TileMap, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Build { cell, structure } => match map.build(cell, structure) {
            Ok(()) => {
                tracing::debug!(%cell, kind = structure.label(), "structure built");
                out_events.push(Event::StructureBuilt { cell, structure });
            }
            Err(reason) => {
                tracing::debug!(%cell, ?reason, "build rejected");
                out_events.push(Event::BuildRejected { cell, reason });
            }
        },
        Command::Demolish { cell } => match map.demolish(cell) {
            Ok(structure) => {
                tracing::debug!(%cell, kind = structure.label(), "structure demolished");
                out_events.push(Event::StructureDemolished { cell, structure });
            }
            Err(reason) => {
                tracing::debug!(%cell, ?reason, "demolish rejected");
                out_events.push(Event::DemolishRejected { cell, reason });
            }
        },
    }
}

/// Query functions that provide read-only access to the map state.
pub mod query {
    use super::TileMap;
    use tower_path_core::{CellCoord, Structure};

    /// Dimensions of the map as `(columns, rows)`.
    #[must_use]
    pub fn dimensions(map: &TileMap) -> (u32, u32) {
        (map.columns, map.rows)
    }

    /// Cell where units enter the map.
    #[must_use]
    pub fn entrance(map: &TileMap) -> CellCoord {
        map.entrance
    }

    /// Cell units try to reach.
    #[must_use]
    pub fn exit(map: &TileMap) -> CellCoord {
        map.exit
    }

    /// Structure occupying `cell`, if any.
    #[must_use]
    pub fn structure_at(map: &TileMap, cell: CellCoord) -> Option<Structure> {
        map.structure(cell)
    }

    /// Reports whether a natural ground tile lies under `cell`.
    ///
    /// Unlike the oracle answer this ignores floor provided by platforms.
    #[must_use]
    pub fn natural_ground_at(map: &TileMap, cell: CellCoord) -> bool {
        map.index(cell).map_or(false, |index| map.ground[index])
    }

    /// Reports whether `cell` lies inside the map.
    #[must_use]
    pub fn contains(map: &TileMap, cell: CellCoord) -> bool {
        map.index(cell).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_map() -> TileMap {
        TileMap::new(4, 3, CellCoord::new(0, 0), CellCoord::new(3, 0))
    }

    #[test]
    fn build_blocks_cell_and_emits_event() {
        let mut map = open_map();
        let mut events = Vec::new();
        let cell = CellCoord::new(1, 1);

        apply(
            &mut map,
            Command::Build {
                cell,
                structure: Structure::Tower,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::StructureBuilt {
                cell,
                structure: Structure::Tower,
            }]
        );
        assert!(map.has_blocking_structure(cell));
        assert!(map.has_ground(cell));
    }

    #[test]
    fn build_rejects_occupied_and_reserved_cells() {
        let mut map = open_map();
        let mut events = Vec::new();
        let cell = CellCoord::new(2, 2);

        for _ in 0..2 {
            apply(
                &mut map,
                Command::Build {
                    cell,
                    structure: Structure::Wall,
                },
                &mut events,
            );
        }
        apply(
            &mut map,
            Command::Build {
                cell: CellCoord::new(3, 0),
                structure: Structure::Wall,
            },
            &mut events,
        );

        assert_eq!(
            events[1],
            Event::BuildRejected {
                cell,
                reason: PlacementError::Occupied,
            }
        );
        assert_eq!(
            events[2],
            Event::BuildRejected {
                cell: CellCoord::new(3, 0),
                reason: PlacementError::ReservedCell,
            }
        );
    }

    #[test]
    fn build_outside_map_is_rejected() {
        let mut map = open_map();
        let mut events = Vec::new();

        apply(
            &mut map,
            Command::Build {
                cell: CellCoord::new(-1, 0),
                structure: Structure::Tower,
            },
            &mut events,
        );

        assert_eq!(
            events,
            vec![Event::BuildRejected {
                cell: CellCoord::new(-1, 0),
                reason: PlacementError::OutOfBounds,
            }]
        );
    }

    #[test]
    fn platform_provides_floor_over_void() {
        let mut map = open_map();
        let mut events = Vec::new();
        let cell = CellCoord::new(1, 0);
        assert!(map.set_ground(cell, false));
        assert!(!map.has_ground(cell));

        apply(
            &mut map,
            Command::Build {
                cell,
                structure: Structure::Wall,
            },
            &mut events,
        );
        apply(
            &mut map,
            Command::Build {
                cell,
                structure: Structure::Platform { cost: 3.0 },
            },
            &mut events,
        );

        assert_eq!(
            events[0],
            Event::BuildRejected {
                cell,
                reason: PlacementError::NoGround,
            }
        );
        assert!(map.has_ground(cell));
        assert!(!map.has_blocking_structure(cell));
        assert_eq!(map.movement_cost(cell), 3.0);
        assert!(!query::natural_ground_at(&map, cell));
        assert!(!map.has_ground_beneath(cell));
        assert!(map.has_ground_beneath(CellCoord::new(2, 0)));
    }

    #[test]
    fn demolish_restores_ground_cost() {
        let mut map = open_map().with_ground_cost(2.0);
        let mut events = Vec::new();
        let cell = CellCoord::new(1, 2);

        apply(
            &mut map,
            Command::Build {
                cell,
                structure: Structure::Platform { cost: 5.0 },
            },
            &mut events,
        );
        assert_eq!(map.movement_cost(cell), 5.0);

        apply(&mut map, Command::Demolish { cell }, &mut events);
        apply(&mut map, Command::Demolish { cell }, &mut events);

        assert_eq!(
            events[1],
            Event::StructureDemolished {
                cell,
                structure: Structure::Platform { cost: 5.0 },
            }
        );
        assert_eq!(
            events[2],
            Event::DemolishRejected {
                cell,
                reason: RemovalError::NothingToDemolish,
            }
        );
        assert_eq!(map.movement_cost(cell), 2.0);
        assert_eq!(map.ground_cost(), 2.0);
        assert_eq!(query::structure_at(&map, cell), None);
    }

    #[test]
    fn cells_outside_map_have_no_ground() {
        let map = open_map();
        assert!(!map.has_ground(CellCoord::new(4, 0)));
        assert!(!map.has_ground(CellCoord::new(0, -1)));
        assert!(map.has_ground(CellCoord::new(3, 2)));
        assert_eq!(query::dimensions(&map), (4, 3));
    }
}
