//! `cfw composites`: fuses this year's monthly Prediction Rasters into
//! one annual Composite Raster with a selected temporal algorithm (C6),
//! then uploads it and registers its STAC item.

use std::path::PathBuf;

use cfw_core::classes::ClassRegistry;
use cfw_core::model::{MonthTag, StacItem, StacTemporalExtent};
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_io::object_store::HttpObjectStore;
use cfw_io::stac::{register_with_conflict_check, HttpStacCatalog};
use cfw_raster::{build_composite, read_bbox, AlgorithmRegistry, CompositeInput};

use crate::cli::CommonArgs;
use crate::env::CfwEnv;

pub struct CompositesArgs {
    pub common: CommonArgs,
    pub forest_algorithm: String,
    pub prediction_rasters: Vec<PathBuf>,
    pub object_store_url: String,
    pub stac_url: String,
}

pub struct CompositesOutcome {
    pub raster_path: PathBuf,
    pub checksum_sha256: String,
}

pub fn run(args: CompositesArgs, env: &CfwEnv) -> CfwResult<CompositesOutcome> {
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
    context.run_dir.ensure_created(&[]).map_err(CfwError::Io)?;

    let algorithms = AlgorithmRegistry::with_defaults();
    let algorithm = algorithms.get(&args.forest_algorithm)?;

    let inputs: Vec<CompositeInput> = args
        .prediction_rasters
        .iter()
        .map(|path| Ok(CompositeInput { month: month_from_path(path)?, path: path.clone() }))
        .collect::<CfwResult<_>>()?;

    if inputs.len() > 12 {
        return Err(CfwError::InputData(format!(
            "composite for {} was given {} Prediction Rasters, at most 12 are expected",
            args.common.year,
            inputs.len()
        )));
    }

    let object_store = HttpObjectStore::new(args.object_store_url.clone()).with_auth_token(env.object_store_token.clone());
    let outcome = build_composite(&context, args.common.year, &inputs, algorithm, &registry, &object_store)?;

    {
        let stac = HttpStacCatalog::new(args.stac_url.clone()).with_connection_string(env.stac_connection_string.clone());
        let bbox = read_bbox(&outcome.raster_path)?;
        let item = StacItem {
            id: StacItem::item_id(&context.run_id, args.common.year, None),
            collection: "composites".to_string(),
            asset_url: outcome.object_key.clone(),
            asset_checksum_sha256: outcome.checksum_sha256.clone(),
            bbox,
            temporal_extent: StacTemporalExtent::Year { year: args.common.year },
        };
        register_with_conflict_check(&stac, &item)?;
    }

    Ok(CompositesOutcome { raster_path: outcome.raster_path, checksum_sha256: outcome.checksum_sha256 })
}

/// Prediction Rasters are written as `<YYYY>_<MM>.tif` under each
/// month's `prediction_cogs/` directory (see
/// `cfw_core::run_dir::RunDirectory::prediction_cogs_dir`); the month
/// tag is recovered from the file stem rather than re-opened, so a
/// caller can point at rasters from outside this run directory too.
fn month_from_path(path: &PathBuf) -> CfwResult<MonthTag> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CfwError::Config(format!("cannot read a month tag from {}", path.display())))?;
    MonthTag::parse(&stem.replacen('_', "-", 1))
        .ok_or_else(|| CfwError::Config(format!("{} is not named <YYYY>_<MM>.tif", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_from_path_reads_the_file_stem() {
        let month = month_from_path(&PathBuf::from("runs/r1/2024_07/prediction_cogs/2024_07.tif")).unwrap();
        assert_eq!(month, MonthTag::parse("2024-07").unwrap());
    }

    #[test]
    fn month_from_path_rejects_unrecognized_names() {
        assert!(month_from_path(&PathBuf::from("raster.tif")).is_err());
    }
}
