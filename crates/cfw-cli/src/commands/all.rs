//! `cfw all`: runs training, composites, cfw-processing, and benchmarks
//! in the order named by spec §6, via [`cfw_batch::orchestrator`]'s
//! `StageSelector::All.sequence()`.
//!
//! Composites is declared ahead of cfw-processing in that sequence even
//! though it consumes cfw-processing's output; on a first-ever run it
//! therefore has nothing to composite yet. That is reported as a single
//! failed unit (`StageDependencyError`, not fatal) rather than aborting
//! the run, so training, cfw-processing, and benchmarks still complete;
//! a second `composites` invocation (or a second `all`) picks up the
//! Prediction Rasters cfw-processing just wrote.

use std::path::PathBuf;

use cfw_batch::{run_units, BatchSummary, UnitSpec};
use cfw_core::classes::ClassRegistry;
use cfw_core::model::MonthTag;
use cfw_core::{CfwResult, RunContext};

use super::benchmarks::{self, BenchmarksArgs};
use super::cfw_processing::{self, CfwProcessingArgs};
use super::composites::{self, CompositesArgs};
use super::training::{self, TrainingArgs};
use crate::cli::{CommonArgs, DbHost};
use crate::env::CfwEnv;

pub struct AllArgs {
    pub common: CommonArgs,
    pub start_month: u32,
    pub end_month: u32,
    pub features: Vec<String>,
    pub db_host: DbHost,
    pub training_features: PathBuf,
    pub mosaic_catalog: PathBuf,
    pub forest_algorithm: String,
    pub object_store_url: String,
    pub stac_url: String,
    pub boundary_geojson: Option<PathBuf>,
    pub references: Option<PathBuf>,
}

pub fn run(args: AllArgs, env: &CfwEnv) -> CfwResult<Vec<BatchSummary>> {
    let mut summaries = Vec::new();

    summaries.push(training::run(
        TrainingArgs {
            common: args.common.clone(),
            start_month: args.start_month,
            end_month: args.end_month,
            features: args.features.clone(),
            db_host: args.db_host,
            training_features: args.training_features.clone(),
            mosaic_catalog: args.mosaic_catalog.clone(),
        },
        env,
    )?);

    summaries.push(run_composites_unit(&args, env)?);

    summaries.push(cfw_processing::run(
        CfwProcessingArgs {
            common: args.common.clone(),
            boundary_geojson: args.boundary_geojson.clone(),
            mosaic_catalog: args.mosaic_catalog.clone(),
            object_store_url: args.object_store_url.clone(),
            stac_url: args.stac_url.clone(),
        },
        env,
    )?);

    if let Some(references) = &args.references {
        summaries.push(run_benchmarks_unit(&args, references, env)?);
    }

    Ok(summaries)
}

/// Wraps the single-shot `composites::run` as one `run_units` unit so
/// its `StageDependencyError` (no Prediction Rasters yet) is recorded
/// in the manifest as a failed unit instead of propagating and
/// aborting the rest of `all`.
fn run_composites_unit(args: &AllArgs, env: &CfwEnv) -> CfwResult<BatchSummary> {
    let registry = ClassRegistry::new(&args.common.class_order)?;
    let context = RunContext::new(
        args.common.run_id.clone(),
        args.common.project_id.clone(),
        args.common.year,
        args.common.runs_root.clone(),
        registry,
        args.common.random_state,
    )
    .with_worker_threads(args.common.threads);

    let prediction_rasters = discover_prediction_rasters(&context, args.common.year);
    let output = context.run_dir.composites_dir().join(format!("{}_{}.tif", args.common.year, args.forest_algorithm));

    let common = args.common.clone();
    let forest_algorithm = args.forest_algorithm.clone();
    let object_store_url = args.object_store_url.clone();
    let stac_url = args.stac_url.clone();
    let env = env.clone();
    let work = move || -> CfwResult<()> {
        composites::run(
            CompositesArgs { common, forest_algorithm, prediction_rasters, object_store_url, stac_url },
            &env,
        )?;
        Ok(())
    };

    run_units(&context, "composites", vec![UnitSpec { unit_id: args.common.year.to_string(), output, work: Box::new(work) }])
}

fn run_benchmarks_unit(args: &AllArgs, references: &PathBuf, env: &CfwEnv) -> CfwResult<BatchSummary> {
    let registry = ClassRegistry::new(&args.common.class_order)?;
    let context = RunContext::new(
        args.common.run_id.clone(),
        args.common.project_id.clone(),
        args.common.year,
        args.common.runs_root.clone(),
        registry,
        args.common.random_state,
    )
    .with_worker_threads(args.common.threads);

    let prediction_raster = context
        .run_dir
        .composites_dir()
        .join(format!("{}_{}.tif", args.common.year, args.forest_algorithm));
    let output = context.run_dir.benchmark_results_dir();

    let common = args.common.clone();
    let references = references.clone();
    let boundary_geojson = args.boundary_geojson.clone();
    let env = env.clone();
    let work = move || -> CfwResult<()> {
        benchmarks::run(BenchmarksArgs { common, references, prediction_raster, boundary_geojson }, &env)?;
        Ok(())
    };

    run_units(&context, "benchmarks", vec![UnitSpec { unit_id: args.common.year.to_string(), output, work: Box::new(work) }])
}

/// Prediction Rasters the cfw-processing stage has already written for
/// `year`, ascending by month; empty on a run where cfw-processing has
/// not yet produced anything.
fn discover_prediction_rasters(context: &RunContext, year: i32) -> Vec<PathBuf> {
    (1..=12u32)
        .filter_map(|m| MonthTag::parse(&format!("{year:04}-{m:02}")))
        .map(|month| context.run_dir.prediction_cogs_dir(month).join(format!("{}.tif", month.dir_name())))
        .filter(|path| path.exists())
        .collect()
}
