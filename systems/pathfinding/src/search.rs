//! Resumable A* search over a [`GridOracle`].

use std::{
    cmp::Ordering,
    collections::{BinaryHeap, HashMap, HashSet},
};

use tower_path_core::{CellCoord, GridOracle, Path};

/// Hypothetical edit applied to exactly one cell for the duration of a search.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CellOverride {
    /// Every cell is answered by the oracle.
    None,
    /// The cell is treated as blocked.
    Blocked(CellCoord),
    /// The cell is treated as cleared of its structure, leaving plain ground
    /// when there is any.
    Walkable(CellCoord),
    /// The cell is treated as floor with the provided cost unless a blocking
    /// structure occupies it.
    Cost(CellCoord, f32),
}

impl CellOverride {
    fn walkable<G: GridOracle>(&self, oracle: &G, cell: CellCoord) -> bool {
        match *self {
            Self::Blocked(target) if target == cell => false,
            Self::Walkable(target) if target == cell => oracle.has_ground_beneath(cell),
            Self::Cost(target, _) if target == cell => !oracle.has_blocking_structure(cell),
            _ => oracle.has_ground(cell) && !oracle.has_blocking_structure(cell),
        }
    }

    fn cost<G: GridOracle>(&self, oracle: &G, cell: CellCoord) -> f32 {
        match *self {
            Self::Walkable(target) if target == cell => oracle.ground_cost(),
            Self::Cost(target, cost) if target == cell => cost,
            _ => oracle.movement_cost(cell),
        }
    }
}

/// Node visited during a search.
///
/// The total estimate is always derived from the stored components, so an
/// improved route only ever rewrites `g_cost` and `parent`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct PathNode {
    coordinate: CellCoord,
    g_cost: f32,
    h_cost: f32,
    parent: Option<usize>,
}

impl PathNode {
    fn f_cost(&self) -> f32 {
        self.g_cost + self.h_cost
    }
}

#[derive(Clone, Copy, Debug)]
struct OpenEntry {
    f_cost: f32,
    h_cost: f32,
    g_cost: f32,
    sequence: u64,
    node: usize,
}

// Reversed so the max-heap yields the lowest estimate, then the lowest
// heuristic, then the oldest entry.
impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f_cost
            .total_cmp(&self.f_cost)
            .then_with(|| other.h_cost.total_cmp(&self.h_cost))
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

#[derive(Clone, Debug)]
enum SearchGoal {
    Cell(CellCoord),
    MainPath(HashMap<CellCoord, usize>),
}

impl SearchGoal {
    fn heuristic(&self, cell: CellCoord) -> f32 {
        match self {
            Self::Cell(goal) => cell.manhattan_distance(*goal) as f32,
            Self::MainPath(_) => 0.0,
        }
    }
}

/// Path found by a completed search.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchOutcome {
    /// Cells from the start to the goal, both included.
    pub path: Path,
    /// Accumulated cost of every entered cell.
    pub cost: f32,
    /// Index of the reached cell within the target path, for path goals.
    pub merge_index: Option<usize>,
    /// Number of nodes expanded before the goal was reached.
    pub expanded: usize,
}

/// Progress reported by [`Search::step`].
#[derive(Clone, Debug, PartialEq)]
pub enum SearchStatus {
    /// The budget ran out before the search finished.
    Pending,
    /// The goal was reached.
    Found(SearchOutcome),
    /// Every reachable cell was expanded without reaching the goal.
    Exhausted,
}

/// Suspendable A* search that owns its frontier between steps.
///
/// Neighbours are the four orthogonal cells. A cell is enterable when the
/// oracle reports ground and no blocking structure, and entering it costs the
/// oracle's movement cost, both subject to the search's [`CellOverride`].
/// Exactly one node exists per coordinate; a cheaper route to a queued
/// coordinate updates that node in place.
#[derive(Clone, Debug)]
pub struct Search {
    goal: SearchGoal,
    cell_override: CellOverride,
    nodes: Vec<PathNode>,
    node_index: HashMap<CellCoord, usize>,
    open: BinaryHeap<OpenEntry>,
    closed: HashSet<CellCoord>,
    sequence: u64,
    expanded: usize,
    finished: Option<SearchStatus>,
}

impl Search {
    /// Prepares a search from `start` to the fixed `goal` cell.
    ///
    /// The heuristic is the Manhattan distance to `goal`. It only stays
    /// admissible while every movement cost is at least one.
    #[must_use]
    pub fn to_cell(start: CellCoord, goal: CellCoord, cell_override: CellOverride) -> Self {
        Self::new(start, SearchGoal::Cell(goal), cell_override)
    }

    /// Prepares a uniform-cost search from `start` to the nearest cell of `path`.
    #[must_use]
    pub fn to_path(start: CellCoord, path: &Path) -> Self {
        let mut indices = HashMap::with_capacity(path.len());
        for (index, cell) in path.cells().iter().enumerate() {
            let _ = indices.entry(*cell).or_insert(index);
        }
        Self::new(start, SearchGoal::MainPath(indices), CellOverride::None)
    }

    fn new(start: CellCoord, goal: SearchGoal, cell_override: CellOverride) -> Self {
        let mut search = Self {
            goal,
            cell_override,
            nodes: Vec::new(),
            node_index: HashMap::new(),
            open: BinaryHeap::new(),
            closed: HashSet::new(),
            sequence: 0,
            expanded: 0,
            finished: None,
        };
        let h_cost = search.goal.heuristic(start);
        search.insert_node(PathNode {
            coordinate: start,
            g_cost: 0.0,
            h_cost,
            parent: None,
        });
        search
    }

    /// Number of nodes expanded so far.
    #[must_use]
    pub fn expanded(&self) -> usize {
        self.expanded
    }

    /// Reports whether the search has already produced its final status.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Expands at most `budget` nodes, then suspends.
    ///
    /// A zero budget is treated as one. Once finished, the final status is
    /// reported again by every further call.
    pub fn step<G: GridOracle>(&mut self, oracle: &G, budget: usize) -> SearchStatus {
        if let Some(status) = &self.finished {
            return status.clone();
        }

        for _ in 0..budget.max(1) {
            let Some(entry) = self.open.pop() else {
                return self.finish(SearchStatus::Exhausted);
            };

            let node = self.nodes[entry.node];
            if self.closed.contains(&node.coordinate) || entry.g_cost > node.g_cost {
                continue;
            }

            let merge_index = match &self.goal {
                SearchGoal::Cell(goal) => (node.coordinate == *goal).then_some(None),
                SearchGoal::MainPath(indices) => indices.get(&node.coordinate).copied().map(Some),
            };
            if let Some(merge_index) = merge_index {
                let outcome = self.outcome(entry.node, merge_index);
                return self.finish(SearchStatus::Found(outcome));
            }

            let _ = self.closed.insert(node.coordinate);
            self.expanded += 1;
            self.expand(oracle, entry.node);
        }

        SearchStatus::Pending
    }

    /// Runs the search without suspending.
    pub fn run_to_completion<G: GridOracle>(&mut self, oracle: &G) -> Option<SearchOutcome> {
        loop {
            match self.step(oracle, usize::MAX) {
                SearchStatus::Pending => continue,
                SearchStatus::Found(outcome) => return Some(outcome),
                SearchStatus::Exhausted => return None,
            }
        }
    }

    fn expand<G: GridOracle>(&mut self, oracle: &G, current: usize) {
        let parent = self.nodes[current];

        for neighbor in parent.coordinate.neighbors() {
            if self.closed.contains(&neighbor) {
                continue;
            }
            if !self.cell_override.walkable(oracle, neighbor) {
                continue;
            }

            let step_cost = self.cell_override.cost(oracle, neighbor);
            if !step_cost.is_finite() || step_cost < 0.0 {
                tracing::warn!(cell = %neighbor, step_cost, "ignoring cell with invalid movement cost");
                continue;
            }

            let g_cost = parent.g_cost + step_cost;
            match self.node_index.get(&neighbor).copied() {
                Some(existing) => {
                    let node = &mut self.nodes[existing];
                    if g_cost >= node.g_cost {
                        continue;
                    }
                    node.g_cost = g_cost;
                    node.parent = Some(current);
                    self.push_open(existing);
                }
                None => {
                    let h_cost = self.goal.heuristic(neighbor);
                    self.insert_node(PathNode {
                        coordinate: neighbor,
                        g_cost,
                        h_cost,
                        parent: Some(current),
                    });
                }
            }
        }
    }

    fn insert_node(&mut self, node: PathNode) {
        let index = self.nodes.len();
        self.nodes.push(node);
        let _ = self.node_index.insert(node.coordinate, index);
        self.push_open(index);
    }

    fn push_open(&mut self, index: usize) {
        let node = &self.nodes[index];
        self.open.push(OpenEntry {
            f_cost: node.f_cost(),
            h_cost: node.h_cost,
            g_cost: node.g_cost,
            sequence: self.sequence,
            node: index,
        });
        self.sequence += 1;
    }

    fn outcome(&self, goal: usize, merge_index: Option<usize>) -> SearchOutcome {
        let mut cells = Vec::new();
        let mut cursor = Some(goal);
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            cells.push(node.coordinate);
            cursor = node.parent;
        }
        cells.reverse();

        SearchOutcome {
            path: Path::from_cells(cells),
            cost: self.nodes[goal].g_cost,
            merge_index,
            expanded: self.expanded,
        }
    }

    fn finish(&mut self, status: SearchStatus) -> SearchStatus {
        // The frontier is no longer needed once the result is known.
        self.open.clear();
        self.closed.clear();
        tracing::debug!(
            expanded = self.expanded,
            found = matches!(status, SearchStatus::Found(_)),
            "search finished"
        );
        self.finished = Some(status.clone());
        status
    }
}
