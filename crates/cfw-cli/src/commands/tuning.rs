//! `cfw tuning`: extracts pixels and prepares features for one month
//! exactly like `training`, then hands off to the Hyperparameter Tuner (C4).

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
use cfw_ml::tuning::ExperimentResult;

use crate::cli::{CommonArgs, DbHost};
use crate::env::CfwEnv;

pub struct TuningArgs {
    pub common: CommonArgs,
    pub tune_month: u32,
    pub tune_preset: String,
    pub tune_trials: u32,
    pub features: Vec<String>,
    pub training_features: PathBuf,
    pub mosaic_catalog: PathBuf,
    pub db_host: DbHost,
}

fn pixel_source(db_host: DbHost, env: &CfwEnv) -> CfwResult<Arc<dyn PixelSource>> {
    match db_host {
        DbHost::Local => Ok(Arc::new(TileServiceSource::new(env.require_titiler_url()?, Duration::from_secs(60)))),
        DbHost::Remote => Ok(Arc::new(DirectCogSource::new())),
    }
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> CfwResult<T> {
    let text = fs::read_to_string(path).map_err(CfwError::Io)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn run(args: TuningArgs, env: &CfwEnv) -> CfwResult<Vec<ExperimentResult>> {
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

    let month = MonthTag::parse(&format!("{:04}-{:02}", args.common.year, args.tune_month))
        .ok_or_else(|| CfwError::Config(format!("invalid month {}", args.tune_month)))?;
    context.run_dir.ensure_created(&[month]).map_err(CfwError::Io)?;

    let all_features: Vec<TrainingFeature> = load_json(&args.training_features)?;
    let features: Vec<TrainingFeature> = all_features.into_iter().filter(|f| f.month == month).collect();
    if features.is_empty() {
        return Err(CfwError::StageDependency(format!("no training features for {month}")));
    }
    let mosaics: Vec<MosaicRef> = load_json(&args.mosaic_catalog)?;
    let mosaic = mosaics
        .into_iter()
        .find(|m| m.month == month)
        .ok_or_else(|| CfwError::StageDependency(format!("no mosaic catalog entry for {month}")))?;

    let source = pixel_source(args.db_host, env)?;
    let extractor_registry = ExtractorRegistry::with_defaults();
    let engine = FeatureEngineer::from_names(&extractor_registry, &args.features)?;

    let pixel_extractor = PixelExtractor::new(source.as_ref(), &registry);
    let rows = pixel_extractor.extract(&mosaic, &features)?;
    write_pixel_cache(&context.run_dir.data_cache_dir(month).join("pixels.npz"), &rows, &args.features)?;
    cfw_ml::trainer::prepare(&context, month, &rows, &engine)?;

    let base_config = TrainerConfig {
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
    base_config.validate()?;

    cfw_ml::tuning::run_tuning(&context, month, &base_config, &registry, &args.tune_preset, args.tune_trials)
}
