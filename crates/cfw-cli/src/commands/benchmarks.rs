//! `cfw benchmarks`: compares one prediction or composite raster
//! against one or more reference rasters (C7).

use std::fs;
use std::path::{Path, PathBuf};

use cfw_core::classes::ClassRegistry;
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_benchmark::{run_benchmark, BenchmarkReport, ReferenceInput};

use crate::boundary::load_boundary;
use crate::cli::CommonArgs;
use crate::env::CfwEnv;

pub struct BenchmarksArgs {
    pub common: CommonArgs,
    pub references: PathBuf,
    pub prediction_raster: PathBuf,
    pub boundary_geojson: Option<PathBuf>,
}

fn load_references(path: &Path) -> CfwResult<Vec<ReferenceInput>> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn run(args: BenchmarksArgs, _env: &CfwEnv) -> CfwResult<Vec<BenchmarkReport>> {
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
    context.run_dir.ensure_created(&[]).map_err(CfwError::Io)?;

    let references = load_references(&args.references)?;
    if references.is_empty() {
        return Err(CfwError::Config("benchmarks requires at least one reference raster".to_string()));
    }
    let boundary = load_boundary(args.boundary_geojson.as_deref())?;

    run_benchmark(&context, &args.prediction_raster, &references, boundary.as_ref())
}
