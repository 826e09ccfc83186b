//! Window-wise reduction over up to twelve aligned Prediction Rasters
//! into one annual Composite Raster (spec §4.6). Reuses the
//! Predictor's 512x512 tiling and worker-pool machinery; inputs are
//! required to be pre-aligned (same CRS, grid, extent) and misalignment
//! is fatal.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use gdal::raster::ResampleAlg;
use gdal::Dataset;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::info;

use cfw_core::classes::{ClassIdx, ClassRegistry};
use cfw_core::model::MonthTag;
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_io::object_store::{sha256_hex, ObjectStore};

use super::algorithms::{TemporalAlgorithm, MISSING};
use crate::cog_writer::{write_cog, CogWrite, NODATA, TILE_SIZE};
use crate::predictor::write_window_into_mosaic;
use crate::tiling::window_grid;

const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct CompositeInput {
    pub month: MonthTag,
    pub path: PathBuf,
}

pub struct CompositeOutcome {
    pub raster_path: PathBuf,
    pub object_key: String,
    pub checksum_sha256: String,
}

pub fn build_composite(
    context: &RunContext,
    year: i32,
    inputs: &[CompositeInput],
    algorithm: Arc<dyn TemporalAlgorithm>,
    registry: &ClassRegistry,
    object_store: &dyn ObjectStore,
) -> CfwResult<CompositeOutcome> {
    if inputs.is_empty() {
        return Err(CfwError::StageDependency(format!(
            "no Prediction Rasters available to composite for {year}"
        )));
    }
    if context.cancel.is_cancelled() {
        return Err(CfwError::Cancelled);
    }

    let mut ordered: Vec<&CompositeInput> = inputs.iter().collect();
    ordered.sort_by_key(|i| i.month);

    let datasets: Vec<Dataset> = ordered
        .iter()
        .map(|input| {
            Dataset::open(&input.path).map_err(|e| {
                CfwError::InputData(format!("failed to open composite input {}: {e}", input.path.display()))
            })
        })
        .collect::<CfwResult<_>>()?;

    let (width, height) = datasets[0].raster_size();
    let transform = datasets[0]
        .geo_transform()
        .map_err(|e| CfwError::Integrity(format!("composite input has no geotransform: {e}")))?;
    let projection = datasets[0].projection();

    for (dataset, input) in datasets.iter().zip(ordered.iter()).skip(1) {
        if dataset.raster_size() != (width, height) {
            return Err(CfwError::Integrity(format!(
                "composite input {} has a grid size {:?} that does not match the first input's {:?}",
                input.path.display(),
                dataset.raster_size(),
                (width, height)
            )));
        }
        let other_transform = dataset
            .geo_transform()
            .map_err(|e| CfwError::Integrity(format!("composite input has no geotransform: {e}")))?;
        if !transforms_match(&transform, &other_transform) {
            return Err(CfwError::Integrity(format!(
                "composite input {} is not aligned with the first input (mismatched geotransform)",
                input.path.display()
            )));
        }
        if dataset.projection() != projection {
            return Err(CfwError::Integrity(format!(
                "composite input {} has a projection that does not match the first input's",
                input.path.display()
            )));
        }
    }

    let windows = window_grid(width, height, TILE_SIZE);
    let output = Mutex::new(vec![NODATA; width * height]);

    let pool = ThreadPoolBuilder::new()
        .num_threads(context.worker_threads)
        .build()
        .map_err(|e| CfwError::Model(format!("failed to build composite thread pool: {e}")))?;

    pool.install(|| -> CfwResult<()> {
        windows.par_iter().try_for_each(|window| -> CfwResult<()> {
            if context.cancel.is_cancelled() {
                return Err(CfwError::Cancelled);
            }
            let mut band_values: Vec<Vec<u8>> = Vec::with_capacity(datasets.len());
            for dataset in &datasets {
                let band = dataset
                    .rasterband(1)
                    .map_err(|e| CfwError::Integrity(format!("composite input missing band 1: {e}")))?;
                let buffer = band
                    .read_as::<u8>(
                        (window.xoff as isize, window.yoff as isize),
                        (window.xsize, window.ysize),
                        (window.xsize, window.ysize),
                        Some(ResampleAlg::NearestNeighbour),
                    )
                    .map_err(|e| CfwError::InputData(format!("composite window read failed: {e}")))?;
                band_values.push(buffer.data);
            }

            let npix = window.xsize * window.ysize;
            let mut reduced = vec![NODATA; npix];
            for pixel in 0..npix {
                let v: Vec<u8> = band_values
                    .iter()
                    .map(|band| map_ancillary_to_missing(band[pixel], registry))
                    .collect();
                let valid: Vec<u8> = v.into_iter().filter(|&x| x != MISSING).collect();
                if valid.len() >= algorithm.min_valid() {
                    reduced[pixel] = algorithm.reduce(&valid);
                }
            }
            write_window_into_mosaic(&mut output.lock().unwrap(), width, window, &reduced);
            Ok(())
        })
    })?;

    if context.cancel.is_cancelled() {
        return Err(CfwError::Cancelled);
    }

    let pixels = output.into_inner().map_err(|_| CfwError::Model("composite buffer lock poisoned".into()))?;
    let months: Vec<MonthTag> = ordered.iter().map(|i| i.month).collect();
    let tags = composite_tags(context, algorithm.name(), year, &months);
    let output_path = context.run_dir.composites_dir().join(format!("{year}_{}.tif", algorithm.name()));

    write_cog(&CogWrite {
        path: &output_path,
        width,
        height,
        geo_transform: transform,
        projection_wkt: &projection,
        pixels: &pixels,
        tags: &tags,
    })?;

    let bytes = std::fs::read(&output_path).map_err(CfwError::Io)?;
    let checksum_sha256 = sha256_hex(&bytes);
    let object_key = format!("composites/{}/{checksum_sha256}.tif", context.run_id);
    object_store.put(&object_key, &bytes)?;

    info!(year, algorithm = algorithm.name(), months = months.len(), "composite complete");
    Ok(CompositeOutcome { raster_path: output_path, object_key, checksum_sha256 })
}

fn map_ancillary_to_missing(raw: u8, registry: &ClassRegistry) -> u8 {
    if raw == MISSING {
        return MISSING;
    }
    if registry.is_ancillary(ClassIdx(raw)) {
        MISSING
    } else {
        raw
    }
}

fn transforms_match(a: &[f64; 6], b: &[f64; 6]) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-6)
}

fn composite_tags(context: &RunContext, algorithm: &str, year: i32, months: &[MonthTag]) -> HashMap<String, String> {
    let months_json = serde_json::to_string(months).unwrap_or_else(|_| "[]".to_string());
    HashMap::from([
        ("SOFTWARE_VERSION".to_string(), SOFTWARE_VERSION.to_string()),
        ("RUN_ID".to_string(), context.run_id.clone()),
        ("ALGORITHM".to_string(), algorithm.to_string()),
        ("YEAR".to_string(), year.to_string()),
        ("MONTHS_INCLUDED".to_string(), months_json),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transforms_match_tolerates_float_noise() {
        let a = [500000.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        let b = [500000.0000001, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        assert!(transforms_match(&a, &b));
    }

    #[test]
    fn transforms_match_rejects_real_offset() {
        let a = [500000.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        let b = [500010.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        assert!(!transforms_match(&a, &b));
    }

    #[test]
    fn ancillary_classes_map_to_missing() {
        let registry = ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap();
        let cloud_idx = registry.index_of("Cloud").unwrap().0;
        assert_eq!(map_ancillary_to_missing(cloud_idx, &registry), MISSING);
        assert_eq!(map_ancillary_to_missing(0, &registry), 0);
    }
}
