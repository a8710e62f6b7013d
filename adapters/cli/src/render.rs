//! Text and JSON presentation of path query results.

use std::fmt::Write as _;

use serde::Serialize;
use tower_path_core::{CellCoord, Path, Structure};
use tower_path_world::{query, TileMap};

/// Parses a cell argument written as `x,y`.
pub(crate) fn parse_cell(value: &str) -> Result<CellCoord, String> {
    let (x, y) = value
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{value}`"))?;
    let x = x
        .trim()
        .parse::<i32>()
        .map_err(|error| format!("invalid x coordinate `{}`: {error}", x.trim()))?;
    let y = y
        .trim()
        .parse::<i32>()
        .map_err(|error| format!("invalid y coordinate `{}`: {error}", y.trim()))?;
    Ok(CellCoord::new(x, y))
}

/// Outcome of a single CLI query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub(crate) struct Report {
    /// Name of the command that produced the report.
    pub(crate) command: &'static str,
    /// Cell the command was aimed at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cell: Option<CellCoord>,
    /// Whether the command found a path or route.
    pub(crate) reachable: bool,
    /// Cells of the resulting path or route.
    pub(crate) path: Vec<CellCoord>,
    /// Accumulated cost of `path`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) cost: Option<f32>,
    /// Cost of the committed main path, reported next to previews.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) main_path_cost: Option<f32>,
    /// Main-path index joined by a route.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) merge_index: Option<usize>,
    /// First index at which a rebuilt main path departs from the old one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) divergence_index: Option<usize>,
}

impl Report {
    pub(crate) fn unreachable(command: &'static str, cell: Option<CellCoord>) -> Self {
        Self {
            command,
            cell,
            reachable: false,
            path: Vec::new(),
            cost: None,
            main_path_cost: None,
            merge_index: None,
            divergence_index: None,
        }
    }

    pub(crate) fn found(
        command: &'static str,
        cell: Option<CellCoord>,
        path: &Path,
        cost: f32,
    ) -> Self {
        Self {
            reachable: true,
            path: path.cells().to_vec(),
            cost: Some(cost),
            ..Self::unreachable(command, cell)
        }
    }

    pub(crate) fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Headline followed by the map overlay.
    pub(crate) fn to_text(&self, map: &TileMap) -> String {
        let mut text = String::from(self.command);
        if let Some(cell) = self.cell {
            let _ = write!(text, " {cell}");
        }

        match self.cost {
            Some(cost) if self.reachable => {
                let _ = write!(text, ": {} cells, cost {cost}", self.path.len());
            }
            _ => text.push_str(": unreachable"),
        }
        if let Some(index) = self.merge_index {
            let _ = write!(text, ", merges at index {index}");
        }
        if let Some(index) = self.divergence_index {
            let _ = write!(text, ", diverges at index {index}");
        }
        if let Some(cost) = self.main_path_cost {
            let _ = write!(text, " (main path cost {cost})");
        }

        text.push('\n');
        text.push_str(&overlay(map, &self.path, self.cell));
        text
    }
}

/// Draws the map with `path` traced over it.
///
/// `E`/`X` mark the entrance and exit, `T`, `#` and `=` mark towers, walls and
/// platforms, `~` marks cells without ground and `@` marks the queried cell.
pub(crate) fn overlay(map: &TileMap, path: &[CellCoord], marked: Option<CellCoord>) -> String {
    let (columns, rows) = query::dimensions(map);
    let columns = i32::try_from(columns).unwrap_or(i32::MAX);
    let rows = i32::try_from(rows).unwrap_or(i32::MAX);
    let mut out = String::new();

    for y in 0..rows {
        for x in 0..columns {
            let cell = CellCoord::new(x, y);
            let glyph = if cell == query::entrance(map) {
                'E'
            } else if cell == query::exit(map) {
                'X'
            } else if Some(cell) == marked {
                '@'
            } else if path.contains(&cell) {
                '*'
            } else {
                match query::structure_at(map, cell) {
                    Some(Structure::Tower) => 'T',
                    Some(Structure::Wall) => '#',
                    Some(Structure::Platform { .. }) => '=',
                    None if query::natural_ground_at(map, cell) => '.',
                    None => '~',
                }
            };
            out.push(glyph);
        }
        out.push('\n');
    }
    out
}
