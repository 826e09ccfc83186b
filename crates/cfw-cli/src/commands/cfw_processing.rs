//! `cfw cfw-processing`: runs the Predictor (C5) for every month of
//! the run's year that has a trained model, writing, uploading, and
//! registering one Prediction Raster per month.

use std::fs;
use std::path::{Path, PathBuf};

use cfw_core::classes::ClassRegistry;
use cfw_core::model::MonthTag;
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_io::extractor::MosaicRef;
use cfw_io::object_store::HttpObjectStore;
use cfw_io::stac::HttpStacCatalog;
use cfw_raster::predict_month;

use crate::boundary::load_boundary;
use crate::cli::CommonArgs;
use crate::env::CfwEnv;

pub struct CfwProcessingArgs {
    pub common: CommonArgs,
    pub boundary_geojson: Option<PathBuf>,
    pub mosaic_catalog: PathBuf,
    pub object_store_url: String,
    pub stac_url: String,
}

fn load_mosaic_catalog(path: &Path) -> CfwResult<Vec<MosaicRef>> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn run(args: CfwProcessingArgs, env: &CfwEnv) -> CfwResult<cfw_batch::BatchSummary> {
    let registry = ClassRegistry::new(&args.common.class_order)?;
    let context = RunContext::new(
        args.common.run_id.clone(),
        args.common.project_id.clone(),
        args.common.year,
        args.common.runs_root.clone(),
        registry.clone(),
        args.common.random_state,
    )
    .with_worker_threads(args.common.threads);

    let boundary = load_boundary(args.boundary_geojson.as_deref())?;
    let mosaics = load_mosaic_catalog(&args.mosaic_catalog)?;

    let months: Vec<MonthTag> = (1..=12u32)
        .filter_map(|m| MonthTag::parse(&format!("{:04}-{:02}", args.common.year, m)))
        .filter(|month| context.run_dir.saved_models_dir(*month).join("model_meta.json").exists())
        .collect();
    if months.is_empty() {
        return Err(CfwError::StageDependency(format!(
            "no trained models found under run '{}' for {}",
            args.common.run_id, args.common.year
        )));
    }

    let mut units = Vec::with_capacity(months.len());
    for month in months {
        let mosaic = mosaics
            .iter()
            .find(|m| m.month == month)
            .cloned()
            .ok_or_else(|| CfwError::StageDependency(format!("no mosaic catalog entry for {month}")))?;
        let model_dir = context.run_dir.saved_models_dir(month);
        let boundary = boundary.clone();
        let context_inner = context.clone();
        let output = context.run_dir.prediction_cogs_dir(month).join(format!("{}.tif", month.dir_name()));

        // The object store and STAC client are cheap, connection-less
        // HTTP clients (no pooled state beyond the `ureq::Agent`), so
        // each unit builds its own rather than sharing one across the
        // worker pool.
        let object_store_url = args.object_store_url.clone();
        let object_store_token = env.object_store_token.clone();
        let stac_url = args.stac_url.clone();
        let stac_connection = env.stac_connection_string.clone();

        let work = move || -> CfwResult<()> {
            let object_store = HttpObjectStore::new(object_store_url).with_auth_token(object_store_token);
            let stac_catalog = HttpStacCatalog::new(stac_url).with_connection_string(stac_connection);
            predict_month(&context_inner, &mosaic, &model_dir, boundary.as_ref(), &object_store, &stac_catalog)?;
            Ok(())
        };
        units.push(cfw_batch::UnitSpec { unit_id: month.as_string(), output, work: Box::new(work) });
    }

    cfw_batch::run_units(&context, "cfw-processing", units)
}
