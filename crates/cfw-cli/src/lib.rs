//! The `cfw` binary's library half: argument parsing (`cli`), the
//! environment (`env`), the boundary-GeoJSON loader shared by a few
//! subcommands, and one dispatch module per subcommand.

pub mod boundary;
pub mod cli;
pub mod commands;
pub mod env;

use cfw_core::CfwResult;

use cli::{Cli, Commands};
use commands::all::{self, AllArgs};
use commands::benchmarks::{self, BenchmarksArgs};
use commands::cfw_processing::{self, CfwProcessingArgs};
use commands::composites::{self, CompositesArgs};
use commands::training::{self, TrainingArgs};
use commands::tuning::{self, TuningArgs};
use env::CfwEnv;

/// Dispatches a parsed [`Cli`] to its subcommand, returning a
/// human-readable summary line for stdout and the process exit code
/// (spec §6) to use on the way out.
pub fn dispatch(cli: Cli, env: &CfwEnv) -> (CfwResult<String>, u8) {
    match run_dispatch(cli, env) {
        Ok(summary) => (Ok(summary), 0),
        Err(err) => {
            let code = err.exit_code();
            (Err(err), code)
        }
    }
}

fn run_dispatch(cli: Cli, env: &CfwEnv) -> CfwResult<String> {
    match cli.command {
        Commands::Training { common, start_month, end_month, features, db_host, training_features, mosaic_catalog } => {
            let summary = training::run(
                TrainingArgs { common, start_month, end_month, features, db_host, training_features, mosaic_catalog },
                env,
            )?;
            Ok(summarize_batch(&[summary]))
        }
        Commands::Tuning { common, tune_month, tune_preset, tune_trials, features, training_features, mosaic_catalog, db_host } => {
            let results = tuning::run(
                TuningArgs { common, tune_month, tune_preset, tune_trials, features, training_features, mosaic_catalog, db_host },
                env,
            )?;
            Ok(format!("tuning complete: {} trials recorded", results.len()))
        }
        Commands::Composites { common, forest_algorithm, prediction_rasters, object_store_url, stac_url } => {
            let outcome = composites::run(
                CompositesArgs { common, forest_algorithm, prediction_rasters, object_store_url, stac_url },
                env,
            )?;
            Ok(format!("composite written to {}", outcome.raster_path.display()))
        }
        Commands::CfwProcessing { common, boundary_geojson, mosaic_catalog, object_store_url, stac_url } => {
            let summary = cfw_processing::run(
                CfwProcessingArgs { common, boundary_geojson, mosaic_catalog, object_store_url, stac_url },
                env,
            )?;
            Ok(summarize_batch(&[summary]))
        }
        Commands::Benchmarks { common, references, prediction_raster, boundary_geojson } => {
            let reports = benchmarks::run(
                BenchmarksArgs { common, references, prediction_raster, boundary_geojson },
                env,
            )?;
            Ok(format!("benchmarked against {} reference raster(s)", reports.len()))
        }
        Commands::All {
            common,
            start_month,
            end_month,
            features,
            db_host,
            training_features,
            mosaic_catalog,
            forest_algorithm,
            object_store_url,
            stac_url,
            boundary_geojson,
            references,
        } => {
            let summaries = all::run(
                AllArgs {
                    common,
                    start_month,
                    end_month,
                    features,
                    db_host,
                    training_features,
                    mosaic_catalog,
                    forest_algorithm,
                    object_store_url,
                    stac_url,
                    boundary_geojson,
                    references,
                },
                env,
            )?;
            Ok(summarize_batch(&summaries))
        }
    }
}

fn summarize_batch(summaries: &[cfw_batch::BatchSummary]) -> String {
    summaries
        .iter()
        .map(|s| format!("{}: {} ok, {} failed", s.stage, s.success, s.failure))
        .collect::<Vec<_>>()
        .join("; ")
}
