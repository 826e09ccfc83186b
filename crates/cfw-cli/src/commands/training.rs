//! `cfw training`: extracts pixels, engineers features, and fits one
//! classifier per month in `[start_month, end_month]` (C1 -> C2 -> C3).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cfw_core::classes::ClassRegistry;
use cfw_core::model::{MonthTag, TrainingFeature};
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_features::{ExtractorRegistry, FeatureEngineer};
use cfw_io::cache::write_pixel_cache;
use cfw_io::cog::DirectCogSource;
use cfw_io::extractor::{MosaicRef, PixelExtractor, PixelSource};
use cfw_io::tile_service::TileServiceSource;
use cfw_ml::config::{ClassWeighting, ModelHyperparameters, SplitMethod, TrainerConfig};

use crate::cli::{CommonArgs, DbHost};
use crate::env::CfwEnv;

pub struct TrainingArgs {
    pub common: CommonArgs,
    pub start_month: u32,
    pub end_month: u32,
    pub features: Vec<String>,
    pub db_host: DbHost,
    pub training_features: PathBuf,
    pub mosaic_catalog: PathBuf,
}

fn pixel_source(db_host: DbHost, env: &CfwEnv) -> CfwResult<Arc<dyn PixelSource>> {
    match db_host {
        DbHost::Local => Ok(Arc::new(TileServiceSource::new(env.require_titiler_url()?, Duration::from_secs(60)))),
        DbHost::Remote => Ok(Arc::new(DirectCogSource::new())),
    }
}

fn load_training_features(path: &Path) -> CfwResult<Vec<TrainingFeature>> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

fn load_mosaic_catalog(path: &Path) -> CfwResult<Vec<MosaicRef>> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn run(args: TrainingArgs, env: &CfwEnv) -> CfwResult<cfw_batch::BatchSummary> {
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

    let all_features = load_training_features(&args.training_features)?;
    let mosaics = load_mosaic_catalog(&args.mosaic_catalog)?;
    let source = pixel_source(args.db_host, env)?;
    let extractor_registry = ExtractorRegistry::with_defaults();
    let engine = FeatureEngineer::from_names(&extractor_registry, &args.features)?;

    let months: Vec<MonthTag> =
        (args.start_month..=args.end_month).filter_map(|m| MonthTag::parse(&format!("{:04}-{:02}", args.common.year, m))).collect();
    context.run_dir.ensure_created(&months).map_err(CfwError::Io)?;

    let mut units = Vec::with_capacity(months.len());
    for month in months {
        let mosaic = mosaics.iter().find(|m| m.month == month).cloned();
        let features: Vec<TrainingFeature> = all_features.iter().filter(|f| f.month == month).cloned().collect();
        let config = TrainerConfig {
            split_method: SplitMethod::Feature,
            test_fraction: 0.2,
            val_fraction: 0.2,
            random_state: args.common.random_state,
            early_stopping_rounds: 10,
            class_weighting: ClassWeighting::None,
            cv_folds: 5,
            class_order: args.common.class_order.clone(),
            feature_extractors: args.features.clone(),
            hyperparameters: ModelHyperparameters::default(),
        };
        config.validate()?;

        let context = context.clone();
        let registry = registry.clone();
        let engine = engine.clone();
        let extractor_names = args.features.clone();
        let source = Arc::clone(&source);
        let output = context.run_dir.saved_models_dir(month);

        let work = move || -> CfwResult<()> {
            let mosaic = mosaic.ok_or_else(|| CfwError::StageDependency(format!("no mosaic catalog entry for {month}")))?;
            if features.is_empty() {
                return Err(CfwError::StageDependency(format!("no training features for {month}")));
            }
            let pixel_extractor = PixelExtractor::new(source.as_ref(), &registry);
            let rows = pixel_extractor.extract(&mosaic, &features)?;
            write_pixel_cache(&context.run_dir.data_cache_dir(month).join("pixels.npz"), &rows, &extractor_names)?;
            cfw_ml::trainer::prepare(&context, month, &rows, &engine)?;
            cfw_ml::trainer::fit(&context, month, &config, &registry, extractor_names.clone())?;
            Ok(())
        };
        units.push(cfw_batch::UnitSpec { unit_id: month.as_string(), output, work: Box::new(work) });
    }

    cfw_batch::run_units(&context, "training", units)
}
