#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pathfinding system that maintains the main path between the entrance and
//! the exit and answers the route and preview queries built on top of it.
//!
//! Every query funnels into one A* routine ([`Search`]) parameterised by a
//! goal and a single-cell [`CellOverride`]. Main-path recalculations can run
//! synchronously or as a cooperative task advanced by [`PathEngine::tick`];
//! committed results are announced to subscribers as [`PathRecalculated`].

mod observers;
mod search;

pub use observers::SubscriptionId;
pub use search::{CellOverride, Search, SearchOutcome, SearchStatus};

use serde::Deserialize;
use tower_path_core::{CellCoord, Event, GridOracle, Path, PathError, PathRecalculated};

use crate::observers::PathObservers;

const DEFAULT_EXPANSION_BUDGET: usize = 256;

/// Tunables for the pathfinding system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Node expansions performed per cooperative tick before suspending.
    pub expansion_budget: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            expansion_budget: DEFAULT_EXPANSION_BUDGET,
        }
    }
}

/// Path together with its accumulated movement cost.
#[derive(Clone, Debug, PartialEq)]
pub struct PlannedPath {
    path: Path,
    cost: f32,
}

impl PlannedPath {
    /// Cells of the path, both ends included.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sum of the movement costs of every entered cell.
    #[must_use]
    pub fn cost(&self) -> f32 {
        self.cost
    }

    /// Consumes the plan, yielding the path.
    #[must_use]
    pub fn into_path(self) -> Path {
        self.path
    }
}

impl From<SearchOutcome> for PlannedPath {
    fn from(outcome: SearchOutcome) -> Self {
        Self {
            path: outcome.path,
            cost: outcome.cost,
        }
    }
}

/// Detour leading a displaced unit back onto the main path.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteToMainPath {
    /// Cells to walk, excluding the starting cell and ending on the main path.
    pub route: Path,
    /// Index of the main-path cell where the route joins.
    pub merge_index: usize,
    /// Accumulated movement cost of the route.
    pub cost: f32,
}

/// Progress of the cooperative recalculation task.
#[derive(Clone, Debug, PartialEq)]
pub enum RecalculationStatus {
    /// No recalculation is in flight.
    Idle,
    /// The in-flight search suspended after exhausting its budget.
    Pending,
    /// A new main path was committed and announced.
    Completed {
        /// First index at which the new path differs from the previous one.
        divergence_index: usize,
    },
    /// The search ended without reaching the exit; the stored path is untouched.
    Failed(PathError),
}

/// Owner of the main path and entry point for every path query.
#[derive(Debug)]
pub struct PathEngine {
    entrance: CellCoord,
    exit: CellCoord,
    config: EngineConfig,
    current: Option<PlannedPath>,
    previous: Option<PlannedPath>,
    observers: PathObservers,
    in_flight: Option<Search>,
}

impl PathEngine {
    /// Creates an engine for the provided entrance and exit markers.
    #[must_use]
    pub fn new(entrance: CellCoord, exit: CellCoord) -> Self {
        Self::with_config(entrance, exit, EngineConfig::default())
    }

    /// Creates an engine using explicit tunables.
    #[must_use]
    pub fn with_config(entrance: CellCoord, exit: CellCoord, config: EngineConfig) -> Self {
        Self {
            entrance,
            exit,
            config,
            current: None,
            previous: None,
            observers: PathObservers::default(),
            in_flight: None,
        }
    }

    /// Cell where units enter the map.
    #[must_use]
    pub fn entrance(&self) -> CellCoord {
        self.entrance
    }

    /// Cell units try to reach.
    #[must_use]
    pub fn exit(&self) -> CellCoord {
        self.exit
    }

    /// Tunables in effect.
    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Most recently committed main path.
    #[must_use]
    pub fn main_path(&self) -> Option<&Path> {
        self.current.as_ref().map(PlannedPath::path)
    }

    /// Cost of the most recently committed main path.
    #[must_use]
    pub fn main_path_cost(&self) -> Option<f32> {
        self.current.as_ref().map(PlannedPath::cost)
    }

    /// Most recently committed main path together with its cost.
    #[must_use]
    pub fn planned_main_path(&self) -> Option<&PlannedPath> {
        self.current.as_ref()
    }

    /// Main path that was superseded by the latest commit.
    #[must_use]
    pub fn previous_path(&self) -> Option<&Path> {
        self.previous.as_ref().map(PlannedPath::path)
    }

    /// Registers a callback invoked after every committed recalculation.
    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&PathRecalculated) + 'static,
    {
        self.observers.subscribe(Box::new(observer))
    }

    /// Removes a callback. Returns `false` when the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    /// Recomputes the main path to completion, cancelling any in-flight task.
    ///
    /// On success the previous main path is retained for divergence reporting,
    /// the new path is stored and subscribers are notified. When the exit is
    /// unreachable nothing is stored or announced.
    pub fn recalculate_main_path<G: GridOracle>(
        &mut self,
        oracle: &G,
    ) -> Result<&PlannedPath, PathError> {
        if self.in_flight.take().is_some() {
            tracing::debug!("in-flight recalculation superseded by synchronous run");
        }

        let outcome = self.main_search(CellOverride::None).run_to_completion(oracle);
        let _ = self.settle(outcome)?;
        self.current.as_ref().ok_or(PathError::MainPathMissing)
    }

    /// Reacts to world events, scheduling a recalculation after structural edits.
    ///
    /// Returns `true` when a recalculation was scheduled.
    pub fn handle(&mut self, events: &[Event]) -> bool {
        if !events.iter().any(Event::is_structural_change) {
            return false;
        }

        self.request_recalculation();
        true
    }

    /// Starts a fresh cooperative recalculation, discarding any in-flight one.
    pub fn request_recalculation(&mut self) {
        let search = self.main_search(CellOverride::None);
        if let Some(superseded) = self.in_flight.replace(search) {
            tracing::debug!(
                expanded = superseded.expanded(),
                "in-flight recalculation superseded"
            );
        }
    }

    /// Reports whether a cooperative recalculation is in flight.
    #[must_use]
    pub fn is_recalculating(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Advances the in-flight recalculation by one budgeted step.
    ///
    /// Results are committed within the call that finishes the search, so
    /// observers never see a partially updated path.
    pub fn tick<G: GridOracle>(&mut self, oracle: &G) -> RecalculationStatus {
        let Some(search) = self.in_flight.as_mut() else {
            return RecalculationStatus::Idle;
        };

        let outcome = match search.step(oracle, self.config.expansion_budget) {
            SearchStatus::Pending => return RecalculationStatus::Pending,
            SearchStatus::Found(outcome) => Some(outcome),
            SearchStatus::Exhausted => None,
        };
        self.in_flight = None;

        match self.settle(outcome) {
            Ok(divergence_index) => RecalculationStatus::Completed { divergence_index },
            Err(error) => RecalculationStatus::Failed(error),
        }
    }

    /// Ticks the in-flight recalculation until it completes or fails.
    pub fn finish_recalculation<G: GridOracle>(&mut self, oracle: &G) -> RecalculationStatus {
        loop {
            match self.tick(oracle) {
                RecalculationStatus::Pending => continue,
                status => return status,
            }
        }
    }

    /// Finds a detour from `from` to the nearest cell of the main path.
    ///
    /// The search is uniform-cost, so the returned route is valid but the
    /// merge point is only as good as the first main-path cell reached.
    pub fn route_to_main_path<G: GridOracle>(
        &self,
        from: CellCoord,
        oracle: &G,
    ) -> Result<RouteToMainPath, PathError> {
        let main = self.require_main_path()?;
        let outcome = Search::to_path(from, main.path())
            .run_to_completion(oracle)
            .ok_or(PathError::NoRouteToMainPath { from })?;
        let merge_index = outcome
            .merge_index
            .ok_or(PathError::NoRouteToMainPath { from })?;

        Ok(RouteToMainPath {
            route: outcome.path.into_cells().into_iter().skip(1).collect(),
            merge_index,
            cost: outcome.cost,
        })
    }

    /// Index of the first main-path cell equal to `cell`.
    pub fn path_index_at(&self, cell: CellCoord) -> Result<Option<usize>, PathError> {
        Ok(self.require_main_path()?.path().index_of(cell))
    }

    /// Reports whether `cell` lies on the main path.
    pub fn is_on_main_path(&self, cell: CellCoord) -> Result<bool, PathError> {
        Ok(self.require_main_path()?.path().contains(cell))
    }

    /// Main path that would result from building a blocking structure on `cell`.
    ///
    /// Blocking the entrance or the exit leaves no path.
    pub fn preview_build_at<G: GridOracle>(
        &self,
        cell: CellCoord,
        oracle: &G,
    ) -> Result<PlannedPath, PathError> {
        if cell == self.entrance || cell == self.exit {
            return Err(self.not_found());
        }
        self.preview(oracle, CellOverride::Blocked(cell))
    }

    /// Main path that would result from removing the structure on `cell`.
    ///
    /// A platform laid over a void leaves the cell impassable once removed.
    pub fn preview_demolish_at<G: GridOracle>(
        &self,
        cell: CellCoord,
        oracle: &G,
    ) -> Result<PlannedPath, PathError> {
        self.preview(oracle, CellOverride::Walkable(cell))
    }

    /// Main path that would result from laying a platform with `cost` on `cell`.
    pub fn preview_platform_at<G: GridOracle>(
        &self,
        cell: CellCoord,
        cost: f32,
        oracle: &G,
    ) -> Result<PlannedPath, PathError> {
        self.preview(oracle, CellOverride::Cost(cell, cost))
    }

    fn preview<G: GridOracle>(
        &self,
        oracle: &G,
        cell_override: CellOverride,
    ) -> Result<PlannedPath, PathError> {
        self.main_search(cell_override)
            .run_to_completion(oracle)
            .map(PlannedPath::from)
            .ok_or_else(|| self.not_found())
    }

    fn main_search(&self, cell_override: CellOverride) -> Search {
        Search::to_cell(self.entrance, self.exit, cell_override)
    }

    fn not_found(&self) -> PathError {
        PathError::NotFound {
            from: self.entrance,
            to: self.exit,
        }
    }

    fn require_main_path(&self) -> Result<&PlannedPath, PathError> {
        match self.current.as_ref() {
            Some(main) if !main.path().is_empty() => Ok(main),
            _ => {
                tracing::error!("main path queried before any successful calculation");
                Err(PathError::MainPathMissing)
            }
        }
    }

    fn settle(&mut self, outcome: Option<SearchOutcome>) -> Result<usize, PathError> {
        match outcome {
            Some(outcome) => Ok(self.commit(outcome)),
            None => {
                tracing::warn!(
                    entrance = %self.entrance,
                    exit = %self.exit,
                    "no path between entrance and exit"
                );
                Err(self.not_found())
            }
        }
    }

    fn commit(&mut self, outcome: SearchOutcome) -> usize {
        let expanded = outcome.expanded;
        let next = PlannedPath::from(outcome);
        let divergence_index = self
            .current
            .as_ref()
            .map_or(0, |current| current.path().divergence_index(next.path()));
        let event = PathRecalculated {
            path: next.path().clone(),
            cost: next.cost(),
            divergence_index,
        };

        self.previous = self.current.replace(next);
        tracing::info!(
            cells = event.path.len(),
            cost = event.cost,
            divergence_index,
            expanded,
            "main path recalculated"
        );
        self.observers.notify(&event);
        divergence_index
    }
}
