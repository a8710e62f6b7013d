use std::{cell::RefCell, rc::Rc};

use tower_path_core::{CellCoord, Command, Event, PathError, PathRecalculated, Structure};
use tower_path_system_pathfinding::{EngineConfig, PathEngine, RecalculationStatus};
use tower_path_world::{self as world, TileMap};

const ENTRANCE: CellCoord = CellCoord::new(0, 0);
const EXIT: CellCoord = CellCoord::new(9, 9);

fn engine_with_budget(expansion_budget: usize) -> PathEngine {
    PathEngine::with_config(ENTRANCE, EXIT, EngineConfig { expansion_budget })
}

fn record(engine: &mut PathEngine) -> Rc<RefCell<Vec<PathRecalculated>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let _ = engine.subscribe(move |event| sink.borrow_mut().push(event.clone()));
    log
}

fn apply(map: &mut TileMap, command: Command) -> Vec<Event> {
    let mut events = Vec::new();
    world::apply(map, command, &mut events);
    events
}

#[test]
fn tick_without_request_is_idle() {
    let map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(4);

    assert_eq!(engine.tick(&map), RecalculationStatus::Idle);
    assert!(engine.main_path().is_none());
}

#[test]
fn budgeted_search_commits_only_on_completion() {
    let map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(2);
    let notifications = record(&mut engine);

    engine.request_recalculation();
    let mut pending_ticks = 0;
    let status = loop {
        match engine.tick(&map) {
            RecalculationStatus::Pending => {
                pending_ticks += 1;
                assert!(engine.main_path().is_none());
                assert!(notifications.borrow().is_empty());
            }
            status => break status,
        }
    };

    assert!(pending_ticks > 0, "a budget of two should suspend at least once");
    assert_eq!(
        status,
        RecalculationStatus::Completed {
            divergence_index: 0
        }
    );
    assert_eq!(engine.main_path_cost(), Some(18.0));
    assert_eq!(notifications.borrow().len(), 1);
    assert!(!engine.is_recalculating());
    assert_eq!(engine.tick(&map), RecalculationStatus::Idle);
}

#[test]
fn cooperative_and_synchronous_runs_agree() {
    let mut map = TileMap::new(10, 10, ENTRANCE, EXIT);
    for y in 0..9 {
        let _ = apply(
            &mut map,
            Command::Build {
                cell: CellCoord::new(4, y),
                structure: Structure::Wall,
            },
        );
    }
    let mut cooperative = engine_with_budget(3);
    let mut synchronous = engine_with_budget(3);

    cooperative.request_recalculation();
    let _ = cooperative.finish_recalculation(&map);
    let _ = synchronous
        .recalculate_main_path(&map)
        .expect("gap at the bottom row");

    assert_eq!(cooperative.planned_main_path(), synchronous.planned_main_path());
}

#[test]
fn new_request_supersedes_in_flight_search() {
    let mut map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(1);
    let notifications = record(&mut engine);

    engine.request_recalculation();
    assert_eq!(engine.tick(&map), RecalculationStatus::Pending);

    let events = apply(
        &mut map,
        Command::Build {
            cell: CellCoord::new(1, 0),
            structure: Structure::Tower,
        },
    );
    assert!(engine.handle(&events));
    let status = engine.finish_recalculation(&map);

    assert_eq!(
        status,
        RecalculationStatus::Completed {
            divergence_index: 0
        }
    );
    let log = notifications.borrow();
    assert_eq!(log.len(), 1, "superseded search must not notify");
    assert!(!log[0].path.contains(CellCoord::new(1, 0)));
}

#[test]
fn synchronous_recalculation_cancels_in_flight_search() {
    let map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(1);
    let notifications = record(&mut engine);

    engine.request_recalculation();
    assert_eq!(engine.tick(&map), RecalculationStatus::Pending);
    let _ = engine.recalculate_main_path(&map).expect("open grid");

    assert!(!engine.is_recalculating());
    assert_eq!(engine.tick(&map), RecalculationStatus::Idle);
    assert_eq!(notifications.borrow().len(), 1);
}

#[test]
fn failed_cooperative_search_leaves_state_untouched() {
    let mut map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(16);
    let notifications = record(&mut engine);
    let _ = engine.recalculate_main_path(&map).expect("open grid");
    let committed = engine.planned_main_path().cloned();

    let mut events = apply(
        &mut map,
        Command::Build {
            cell: CellCoord::new(8, 9),
            structure: Structure::Wall,
        },
    );
    events.extend(apply(
        &mut map,
        Command::Build {
            cell: CellCoord::new(9, 8),
            structure: Structure::Wall,
        },
    ));
    assert!(engine.handle(&events));

    assert_eq!(
        engine.finish_recalculation(&map),
        RecalculationStatus::Failed(PathError::NotFound {
            from: ENTRANCE,
            to: EXIT
        })
    );
    assert_eq!(engine.planned_main_path().cloned(), committed);
    assert!(engine.previous_path().is_none());
    assert_eq!(notifications.borrow().len(), 1);
}

#[test]
fn rejected_edits_do_not_trigger_recalculation() {
    let mut map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(8);

    let events = apply(&mut map, Command::Demolish { cell: CellCoord::new(3, 3) });

    assert!(!engine.handle(&events));
    assert!(!engine.is_recalculating());
}

#[test]
fn demolish_event_triggers_recalculation() {
    let mut map = TileMap::new(10, 10, ENTRANCE, EXIT);
    for y in 0..9 {
        let _ = apply(
            &mut map,
            Command::Build {
                cell: CellCoord::new(4, y),
                structure: Structure::Wall,
            },
        );
    }
    let mut engine = engine_with_budget(8);
    let detour_cost = engine
        .recalculate_main_path(&map)
        .expect("gap at the bottom row")
        .cost();

    let events = apply(&mut map, Command::Demolish { cell: CellCoord::new(4, 0) });
    assert!(engine.handle(&events));
    let status = engine.finish_recalculation(&map);

    assert!(matches!(status, RecalculationStatus::Completed { .. }));
    assert_eq!(detour_cost, 18.0);
    assert_eq!(engine.main_path_cost(), Some(18.0));
    assert!(engine.previous_path().is_some());
}

#[test]
fn unsubscribed_observer_is_not_notified() {
    let map = TileMap::new(10, 10, ENTRANCE, EXIT);
    let mut engine = engine_with_budget(8);
    let kept = record(&mut engine);
    let dropped = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&dropped);
    let id = engine.subscribe(move |_| *counter.borrow_mut() += 1);

    assert_eq!(engine.subscriber_count(), 2);
    assert!(engine.unsubscribe(id));
    let _ = engine.recalculate_main_path(&map).expect("open grid");

    assert_eq!(kept.borrow().len(), 1);
    assert_eq!(*dropped.borrow(), 0);
    assert_eq!(engine.subscriber_count(), 1);
}
