//! The `cfw` command line: one entrypoint with the six subcommands of
//! spec §6, mirroring the `Cli`/`Commands` derive shape elsewhere in
//! this codebase's batch CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "cfw", author, version, about, long_about = None)]
pub struct Cli {
    /// Set the logging level.
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments every subcommand shares: which run this is, and how big
/// its worker pool is.
#[derive(clap::Args, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long)]
    pub year: i32,
    #[arg(long = "project-id")]
    pub project_id: String,
    #[arg(long = "run-id")]
    pub run_id: String,
    /// Root directory under which `runs/<run_id>/...` is created.
    #[arg(long = "runs-root", default_value = "runs")]
    pub runs_root: PathBuf,
    #[arg(long = "random-state", default_value_t = 42)]
    pub random_state: u64,
    /// Worker pool size; 0 auto-detects CPU count.
    #[arg(long, default_value_t = 0)]
    pub threads: usize,
    /// Target class names, in order, Forest and NonForest first.
    #[arg(long = "class-order", num_args = 1.., default_values_t = ["Forest".to_string(), "NonForest".to_string()])]
    pub class_order: Vec<String>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbHost {
    Local,
    Remote,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract pixels, engineer features, and fit one classifier per month.
    Training {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "start-month")]
        start_month: u32,
        #[arg(long = "end-month")]
        end_month: u32,
        #[arg(long, num_args = 1.., default_values_t = default_features())]
        features: Vec<String>,
        #[arg(long = "db-host", value_enum, default_value_t = DbHost::Local)]
        db_host: DbHost,
        /// JSON array of `TrainingFeature` records.
        #[arg(long = "training-features")]
        training_features: PathBuf,
        /// JSON array of `MosaicRef` records, one per month.
        #[arg(long = "mosaic-catalog")]
        mosaic_catalog: PathBuf,
    },
    /// Wraps the Trainer with randomized hyperparameter search over a named preset.
    Tuning {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "tune-month")]
        tune_month: u32,
        #[arg(long = "tune-preset", default_value = "balanced")]
        tune_preset: String,
        #[arg(long = "tune-trials", default_value_t = 10)]
        tune_trials: u32,
        #[arg(long, num_args = 1.., default_values_t = default_features())]
        features: Vec<String>,
        #[arg(long = "training-features")]
        training_features: PathBuf,
        #[arg(long = "mosaic-catalog")]
        mosaic_catalog: PathBuf,
        #[arg(long = "db-host", value_enum, default_value_t = DbHost::Local)]
        db_host: DbHost,
    },
    /// Fuses twelve monthly Prediction Rasters into one annual Composite Raster.
    Composites {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "forest-algorithm", default_value = "majority_vote")]
        forest_algorithm: String,
        /// Paths to this year's Prediction Rasters, ascending by month.
        #[arg(long = "prediction-rasters", num_args = 1..)]
        prediction_rasters: Vec<PathBuf>,
        #[arg(long = "object-store-url")]
        object_store_url: String,
        #[arg(long = "stac-url")]
        stac_url: String,
    },
    /// Tiles the AOI, scores each window, and writes one Prediction Raster per month.
    CfwProcessing {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "boundary-geojson")]
        boundary_geojson: Option<PathBuf>,
        #[arg(long = "mosaic-catalog")]
        mosaic_catalog: PathBuf,
        #[arg(long = "object-store-url")]
        object_store_url: String,
        #[arg(long = "stac-url")]
        stac_url: String,
    },
    /// Compares a prediction or composite raster against one or more reference rasters.
    Benchmarks {
        #[command(flatten)]
        common: CommonArgs,
        /// JSON array of `ReferenceSpec` records.
        #[arg(long)]
        references: PathBuf,
        #[arg(long = "prediction-raster")]
        prediction_raster: PathBuf,
        #[arg(long = "boundary-geojson")]
        boundary_geojson: Option<PathBuf>,
    },
    /// Runs training, composites, cfw-processing, and benchmarks in order.
    All {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "start-month")]
        start_month: u32,
        #[arg(long = "end-month")]
        end_month: u32,
        #[arg(long, num_args = 1.., default_values_t = default_features())]
        features: Vec<String>,
        #[arg(long = "db-host", value_enum, default_value_t = DbHost::Local)]
        db_host: DbHost,
        #[arg(long = "training-features")]
        training_features: PathBuf,
        #[arg(long = "mosaic-catalog")]
        mosaic_catalog: PathBuf,
        #[arg(long = "forest-algorithm", default_value = "majority_vote")]
        forest_algorithm: String,
        #[arg(long = "object-store-url")]
        object_store_url: String,
        #[arg(long = "stac-url")]
        stac_url: String,
        #[arg(long = "boundary-geojson")]
        boundary_geojson: Option<PathBuf>,
        #[arg(long)]
        references: Option<PathBuf>,
    },
}

fn default_features() -> Vec<String> {
    vec![
        "ndvi".to_string(),
        "evi".to_string(),
        "savi".to_string(),
        "ndwi".to_string(),
        "water_detection".to_string(),
        "brightness".to_string(),
        "shadow".to_string(),
        "temporal".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
