#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Tower Path engine.
//!
//! This crate defines the vocabulary that connects the authoritative tile map,
//! the pathfinding system and adapters. Adapters submit [`Command`] values
//! describing map edits, the world executes those commands via its `apply`
//! entry point and broadcasts [`Event`] values. The pathfinding system reads the
//! map exclusively through the [`GridOracle`] trait and announces every
//! committed main path with a [`PathRecalculated`] notification.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Location of a single grid cell expressed as signed `x`/`y` coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellCoord {
    x: i32,
    y: i32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Horizontal component of the coordinate.
    #[must_use]
    pub const fn x(&self) -> i32 {
        self.x
    }

    /// Vertical component of the coordinate.
    #[must_use]
    pub const fn y(&self) -> i32 {
        self.y
    }

    /// Computes the Manhattan distance between two cell coordinates.
    #[must_use]
    pub fn manhattan_distance(self, other: CellCoord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Cell adjacent to `self` in the provided direction.
    ///
    /// Returns `None` when the step would overflow the coordinate range.
    #[must_use]
    pub fn neighbor(self, direction: Direction) -> Option<CellCoord> {
        let (dx, dy) = direction.offset();
        Some(Self::new(self.x.checked_add(dx)?, self.y.checked_add(dy)?))
    }

    /// Orthogonal neighbours in [`Direction::ALL`] order.
    pub fn neighbors(self) -> impl Iterator<Item = CellCoord> {
        Direction::ALL
            .into_iter()
            .filter_map(move |direction| self.neighbor(direction))
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Cardinal movement directions. Diagonal movement is not supported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Movement toward decreasing `y`.
    North,
    /// Movement toward increasing `x`.
    East,
    /// Movement toward increasing `y`.
    South,
    /// Movement toward decreasing `x`.
    West,
}

impl Direction {
    /// Every direction in the fixed expansion order used by searches.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    /// Coordinate delta applied when stepping in this direction.
    #[must_use]
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }

    /// Direction of a single orthogonal step between two cells.
    #[must_use]
    pub fn between(from: CellCoord, to: CellCoord) -> Option<Direction> {
        Self::ALL
            .into_iter()
            .find(|direction| from.neighbor(*direction) == Some(to))
    }
}

/// Ordered sequence of cells, first to last inclusive.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Path {
    cells: Vec<CellCoord>,
}

impl Path {
    /// Wraps the provided cells into a path.
    #[must_use]
    pub fn from_cells(cells: Vec<CellCoord>) -> Self {
        Self { cells }
    }

    /// Cells composing the path in travel order.
    #[must_use]
    pub fn cells(&self) -> &[CellCoord] {
        &self.cells
    }

    /// Number of cells in the path, both ends included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Reports whether the path holds no cells.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of moves needed to walk the path.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.cells.len().saturating_sub(1)
    }

    /// First cell of the path.
    #[must_use]
    pub fn first(&self) -> Option<CellCoord> {
        self.cells.first().copied()
    }

    /// Last cell of the path.
    #[must_use]
    pub fn last(&self) -> Option<CellCoord> {
        self.cells.last().copied()
    }

    /// Reports whether the path visits `cell`.
    #[must_use]
    pub fn contains(&self, cell: CellCoord) -> bool {
        self.cells.contains(&cell)
    }

    /// Index of the first occurrence of `cell`.
    #[must_use]
    pub fn index_of(&self, cell: CellCoord) -> Option<usize> {
        self.cells.iter().position(|candidate| *candidate == cell)
    }

    /// First index at which the two paths differ.
    ///
    /// When one path is a prefix of the other the shorter length is returned,
    /// so an empty path always diverges at zero.
    #[must_use]
    pub fn divergence_index(&self, other: &Path) -> usize {
        self.cells
            .iter()
            .zip(other.cells.iter())
            .take_while(|(left, right)| left == right)
            .count()
    }

    /// Consumes the path, yielding its cells.
    #[must_use]
    pub fn into_cells(self) -> Vec<CellCoord> {
        self.cells
    }
}

impl FromIterator<CellCoord> for Path {
    fn from_iter<I: IntoIterator<Item = CellCoord>>(iter: I) -> Self {
        Self::from_cells(iter.into_iter().collect())
    }
}

/// Structures that can occupy a grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Structure {
    /// Defensive tower; blocks movement.
    Tower,
    /// Plain wall segment; blocks movement.
    Wall,
    /// Walkable floor that may be laid over void or ground.
    Platform {
        /// Movement cost charged for entering the platform.
        cost: f32,
    },
}

impl Structure {
    /// Reports whether units are prevented from entering the structure's cell.
    #[must_use]
    pub const fn blocks_movement(&self) -> bool {
        match self {
            Self::Tower | Self::Wall => true,
            Self::Platform { .. } => false,
        }
    }

    /// Reports whether the structure provides floor to walk on.
    #[must_use]
    pub const fn provides_floor(&self) -> bool {
        match self {
            Self::Tower | Self::Wall => false,
            Self::Platform { .. } => true,
        }
    }

    /// Movement cost imposed by the structure, if it overrides the ground cost.
    #[must_use]
    pub fn movement_cost(&self) -> Option<f32> {
        match self {
            Self::Tower | Self::Wall => None,
            Self::Platform { cost } => Some(*cost),
        }
    }

    /// Short lowercase label used by adapters.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Tower => "tower",
            Self::Wall => "wall",
            Self::Platform { .. } => "platform",
        }
    }
}

/// Read-only answers about the walkability and cost of grid cells.
///
/// Searches query the oracle synchronously; answers must stay consistent for
/// the duration of a single search step.
pub trait GridOracle {
    /// Reports whether the cell has a ground or floor tile.
    fn has_ground(&self, cell: CellCoord) -> bool;

    /// Reports whether a structure blocks movement through the cell.
    fn has_blocking_structure(&self, cell: CellCoord) -> bool;

    /// Movement cost charged for entering the cell.
    fn movement_cost(&self, cell: CellCoord) -> f32;

    /// Cost of plain ground, used when a cell is hypothetically cleared.
    fn ground_cost(&self) -> f32 {
        1.0
    }

    /// Reports whether ground would remain under the cell once its structure
    /// is removed.
    fn has_ground_beneath(&self, cell: CellCoord) -> bool {
        self.has_ground(cell)
    }
}

impl<T: GridOracle + ?Sized> GridOracle for &T {
    fn has_ground(&self, cell: CellCoord) -> bool {
        (**self).has_ground(cell)
    }

    fn has_blocking_structure(&self, cell: CellCoord) -> bool {
        (**self).has_blocking_structure(cell)
    }

    fn movement_cost(&self, cell: CellCoord) -> f32 {
        (**self).movement_cost(cell)
    }

    fn ground_cost(&self) -> f32 {
        (**self).ground_cost()
    }

    fn has_ground_beneath(&self, cell: CellCoord) -> bool {
        (**self).has_ground_beneath(cell)
    }
}

/// Commands that express all permissible map edits.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Requests construction of a structure on the provided cell.
    Build {
        /// Cell receiving the structure.
        cell: CellCoord,
        /// Structure to construct.
        structure: Structure,
    },
    /// Requests removal of whatever structure occupies the cell.
    Demolish {
        /// Cell to clear.
        cell: CellCoord,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Confirms that a structure was constructed.
    StructureBuilt {
        /// Cell that received the structure.
        cell: CellCoord,
        /// Structure that was constructed.
        structure: Structure,
    },
    /// Confirms that a structure was removed.
    StructureDemolished {
        /// Cell that was cleared.
        cell: CellCoord,
        /// Structure that previously occupied the cell.
        structure: Structure,
    },
    /// Reports that a build request was rejected.
    BuildRejected {
        /// Cell named in the request.
        cell: CellCoord,
        /// Specific reason the build failed.
        reason: PlacementError,
    },
    /// Reports that a demolish request was rejected.
    DemolishRejected {
        /// Cell named in the request.
        cell: CellCoord,
        /// Specific reason the removal failed.
        reason: RemovalError,
    },
}

impl Event {
    /// Reports whether the event changed the walkability or cost of the map.
    #[must_use]
    pub const fn is_structural_change(&self) -> bool {
        matches!(
            self,
            Self::StructureBuilt { .. } | Self::StructureDemolished { .. }
        )
    }
}

/// Reasons a build request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlacementError {
    /// The cell lies outside the configured map.
    OutOfBounds,
    /// The cell has no ground to build on.
    NoGround,
    /// Another structure already occupies the cell.
    Occupied,
    /// The entrance and exit markers must stay clear.
    ReservedCell,
}

/// Reasons a demolish request may be rejected by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RemovalError {
    /// The cell lies outside the configured map.
    OutOfBounds,
    /// No structure occupies the cell.
    NothingToDemolish,
}

/// Notification emitted whenever a new main path is committed.
#[derive(Clone, Debug, PartialEq)]
pub struct PathRecalculated {
    /// Newly committed main path.
    pub path: Path,
    /// Accumulated movement cost of the new path.
    pub cost: f32,
    /// First index at which the new path differs from the previous one.
    pub divergence_index: usize,
}

/// Failures reported by path queries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PathError {
    /// The search exhausted every reachable cell without reaching the goal.
    #[error("no walkable path from {from} to {to}")]
    NotFound {
        /// Cell the search started from.
        from: CellCoord,
        /// Cell the search tried to reach.
        to: CellCoord,
    },
    /// No walkable route leads from the cell back onto the main path.
    #[error("no walkable route from {from} back onto the main path")]
    NoRouteToMainPath {
        /// Cell the search started from.
        from: CellCoord,
    },
    /// A main-path query ran before any main path was calculated.
    #[error("main path queried before any successful calculation")]
    MainPathMissing,
}

impl PathError {
    /// Reports whether the error signals caller misuse rather than a blocked map.
    #[must_use]
    pub const fn is_precondition(&self) -> bool {
        matches!(self, Self::MainPathMissing)
    }
}
