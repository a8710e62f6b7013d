#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that loads a level and answers path queries against it.

mod render;

use std::{fs, path::PathBuf};

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Deserialize;
use tower_path_core::{CellCoord, Command, Event, PathError, Structure};
use tower_path_system_pathfinding::{EngineConfig, PathEngine, PlannedPath, RecalculationStatus};
use tower_path_world::{self as world, LevelConfig, TileMap};
use tracing_subscriber::EnvFilter;

use crate::render::{parse_cell, Report};

#[derive(Debug, Parser)]
#[command(name = "tower-path")]
#[command(about = "Main-path queries for tower defence levels")]
struct Cli {
    /// Level file in TOML format.
    #[arg(long)]
    level: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,

    /// Log filter directive, overriding `RUST_LOG`.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Computes the main path from the entrance to the exit.
    Path,
    /// Main path if a tower were built on the cell.
    PreviewBuild {
        /// Target cell as `x,y`.
        #[arg(long, value_parser = parse_cell)]
        cell: CellCoord,
    },
    /// Main path if the cell were cleared to plain ground.
    PreviewDemolish {
        /// Target cell as `x,y`.
        #[arg(long, value_parser = parse_cell)]
        cell: CellCoord,
    },
    /// Main path if a platform with the given cost were laid on the cell.
    PreviewPlatform {
        /// Target cell as `x,y`.
        #[arg(long, value_parser = parse_cell)]
        cell: CellCoord,
        /// Movement cost of the platform.
        #[arg(long)]
        cost: f32,
    },
    /// Detour from a cell back onto the main path.
    Route {
        /// Starting cell as `x,y`.
        #[arg(long, value_parser = parse_cell)]
        from: CellCoord,
    },
    /// Builds a structure and reports the recalculated main path.
    Build {
        /// Target cell as `x,y`.
        #[arg(long, value_parser = parse_cell)]
        cell: CellCoord,
        /// Structure to build.
        #[arg(long, value_enum, default_value_t = BuildKind::Tower)]
        kind: BuildKind,
        /// Movement cost, required for platforms.
        #[arg(long)]
        cost: Option<f32>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BuildKind {
    Tower,
    Wall,
    Platform,
}

impl BuildKind {
    fn structure(self, cost: Option<f32>) -> Result<Structure> {
        match self {
            Self::Tower => Ok(Structure::Tower),
            Self::Wall => Ok(Structure::Wall),
            Self::Platform => {
                let cost = cost.context("platforms need --cost")?;
                ensure!(
                    cost.is_finite() && cost >= 0.0,
                    "platform cost {cost} must be finite and non-negative"
                );
                Ok(Structure::Platform { cost })
            }
        }
    }
}

/// Engine tunables read from the optional `[engine]` table of a level file.
#[derive(Debug, Default, Deserialize)]
struct EngineSection {
    #[serde(default)]
    engine: EngineConfig,
}

/// Entry point for the Tower Path command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let (mut map, config) = load_level(&cli.level)?;
    let mut engine =
        PathEngine::with_config(world::query::entrance(&map), world::query::exit(&map), config);
    let report = execute(&cli.command, &mut map, &mut engine)?;

    let output = match cli.format {
        Format::Text => report.to_text(&map),
        Format::Json => report.to_json().context("failed to encode report")?,
    };
    println!("{output}");
    Ok(())
}

fn init_tracing(directive: Option<&str>) -> Result<()> {
    let filter = match directive {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("invalid log filter `{directive}`"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn load_level(path: &std::path::Path) -> Result<(TileMap, EngineConfig)> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read level {}", path.display()))?;
    let level = LevelConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid level {}", path.display()))?;
    let section: EngineSection = toml::from_str(&contents)
        .with_context(|| format!("invalid [engine] table in {}", path.display()))?;
    let map = level
        .build_map()
        .with_context(|| format!("failed to build map from {}", path.display()))?;

    tracing::debug!(
        level = %path.display(),
        expansion_budget = section.engine.expansion_budget,
        "level loaded"
    );
    Ok((map, section.engine))
}

fn execute(command: &CliCommand, map: &mut TileMap, engine: &mut PathEngine) -> Result<Report> {
    let main_path_cost = engine.recalculate_main_path(map).ok().map(PlannedPath::cost);

    match *command {
        CliCommand::Path => Ok(match engine.planned_main_path() {
            Some(planned) => Report::found("path", None, planned.path(), planned.cost()),
            None => Report::unreachable("path", None),
        }),
        CliCommand::PreviewBuild { cell } => preview_report(
            "preview-build",
            cell,
            engine.preview_build_at(cell, map),
            main_path_cost,
        ),
        CliCommand::PreviewDemolish { cell } => preview_report(
            "preview-demolish",
            cell,
            engine.preview_demolish_at(cell, map),
            main_path_cost,
        ),
        CliCommand::PreviewPlatform { cell, cost } => preview_report(
            "preview-platform",
            cell,
            engine.preview_platform_at(cell, cost, map),
            main_path_cost,
        ),
        CliCommand::Route { from } => {
            ensure!(
                main_path_cost.is_some(),
                "routes need a main path, but the exit is unreachable"
            );
            match engine.route_to_main_path(from, map) {
                Ok(route) => {
                    let mut report = Report::found("route", Some(from), &route.route, route.cost);
                    report.merge_index = Some(route.merge_index);
                    Ok(report)
                }
                Err(PathError::NoRouteToMainPath { .. }) => {
                    Ok(Report::unreachable("route", Some(from)))
                }
                Err(error) => Err(error).context("route query failed"),
            }
        }
        CliCommand::Build { cell, kind, cost } => {
            let structure = kind.structure(cost)?;
            let mut events = Vec::new();
            world::apply(map, Command::Build { cell, structure }, &mut events);
            if let Some(Event::BuildRejected { reason, .. }) = events.first() {
                bail!("cannot build {} at {cell}: {reason:?}", structure.label());
            }
            let _ = engine.handle(&events);

            match engine.finish_recalculation(map) {
                RecalculationStatus::Completed { divergence_index } => {
                    let planned = engine
                        .planned_main_path()
                        .context("completed recalculation left no main path")?;
                    let mut report =
                        Report::found("build", Some(cell), planned.path(), planned.cost());
                    report.main_path_cost = main_path_cost;
                    report.divergence_index = Some(divergence_index);
                    Ok(report)
                }
                RecalculationStatus::Failed(_) => {
                    let mut report = Report::unreachable("build", Some(cell));
                    report.main_path_cost = main_path_cost;
                    Ok(report)
                }
                status => bail!("recalculation ended in unexpected state {status:?}"),
            }
        }
    }
}

fn preview_report(
    command: &'static str,
    cell: CellCoord,
    preview: Result<PlannedPath, PathError>,
    main_path_cost: Option<f32>,
) -> Result<Report> {
    let mut report = match preview {
        Ok(planned) => Report::found(command, Some(cell), planned.path(), planned.cost()),
        Err(PathError::NotFound { .. }) => Report::unreachable(command, Some(cell)),
        Err(error) => return Err(error).context("preview failed"),
    };
    report.main_path_cost = main_path_cost;
    Ok(report)
}
