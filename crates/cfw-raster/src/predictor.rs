//! The Predictor (C5): tiles the AOI mosaic into fixed windows, applies
//! a Monthly Model's recorded Feature Engineer and classifier per
//! window, assembles an in-memory mosaic, writes a Prediction Raster
//! COG, uploads it, and registers its STAC item.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gdal::raster::ResampleAlg;
use gdal::Dataset;
use geo::algorithm::intersects::Intersects;
use geo_types::{Coord, LineString, Polygon};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{error, info, warn};

use cfw_core::model::{BandStack, MonthTag, MonthlyModelMeta, StacItem, StacTemporalExtent};
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_features::{ExtractorRegistry, FeatureEngineer};
use cfw_io::cache::feature_set_hash;
use cfw_io::extractor::MosaicRef;
use cfw_io::object_store::{sha256_hex, ObjectStore};
use cfw_io::stac::{register_with_conflict_check, StacCatalog};
use cfw_ml::{to_dense_matrix, GradientTreeClassifier, MonthlyModelBundle};

use crate::cog_writer::{write_cog, CogWrite, NODATA, TILE_SIZE};
use crate::tiling::{window_grid, Window};

/// Set on the `SOFTWARE_VERSION` COG tag; the pipeline's own crate version.
const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub struct PredictionOutcome {
    pub raster_path: PathBuf,
    pub object_key: String,
    pub checksum_sha256: String,
    pub failed_windows: usize,
}

/// Runs the Predictor for one month against a single trained model.
/// `boundary` is an optional clip polygon in EPSG:4326 (the
/// `--boundary-geojson` CLI option).
pub fn predict_month(
    context: &RunContext,
    mosaic: &MosaicRef,
    model_dir: &Path,
    boundary: Option<&Polygon<f64>>,
    object_store: &dyn ObjectStore,
    stac_catalog: &dyn StacCatalog,
) -> CfwResult<PredictionOutcome> {
    if context.cancel.is_cancelled() {
        return Err(CfwError::Cancelled);
    }

    let bundle = MonthlyModelBundle::load(model_dir)?;
    let engine = build_engine(&bundle.meta)?;

    let vsi_path = format!("/vsicurl/{}", mosaic.cog_url);
    let dataset = Dataset::open(&vsi_path)
        .map_err(|e| CfwError::Transport(format!("failed to open source mosaic {}: {e}", mosaic.cog_url)))?;
    let (width, height) = dataset.raster_size();
    let transform = dataset
        .geo_transform()
        .map_err(|e| CfwError::InputData(format!("source mosaic has no geotransform: {e}")))?;
    let projection = dataset.projection();
    drop(dataset);

    let boundary_in_raster_crs = boundary
        .map(|poly| crate::crs::reproject_polygon_to_raster(poly, &projection))
        .transpose()?;

    let windows = window_grid(width, height, TILE_SIZE);
    let mosaic_buf = Mutex::new(vec![NODATA; width * height]);
    let failed_windows = Mutex::new(0usize);

    let pool = ThreadPoolBuilder::new()
        .num_threads(context.worker_threads)
        .build()
        .map_err(|e| CfwError::Model(format!("failed to build predictor thread pool: {e}")))?;

    pool.install(|| {
        windows.par_iter().for_each(|window| {
            if context.cancel.is_cancelled() {
                return;
            }
            if let Some(boundary) = &boundary_in_raster_crs {
                if !window_intersects_boundary(window, &transform, boundary) {
                    return;
                }
            }

            let attempt = || predict_window(&vsi_path, window, mosaic.month, &engine, &bundle.classifier);
            match attempt() {
                Ok(Some(values)) => {
                    write_window_into_mosaic(&mut mosaic_buf.lock().unwrap(), width, window, &values);
                }
                Ok(None) => {}
                Err(first_err) => {
                    warn!(
                        xoff = window.xoff,
                        yoff = window.yoff,
                        error = %first_err,
                        "prediction window failed, retrying"
                    );
                    match attempt() {
                        Ok(Some(values)) => {
                            write_window_into_mosaic(&mut mosaic_buf.lock().unwrap(), width, window, &values);
                        }
                        Ok(None) => {}
                        Err(second_err) => {
                            error!(
                                xoff = window.xoff,
                                yoff = window.yoff,
                                error = %second_err,
                                "prediction window failed twice, writing nodata"
                            );
                            *failed_windows.lock().unwrap() += 1;
                        }
                    }
                }
            }
        });
    });

    if context.cancel.is_cancelled() {
        return Err(CfwError::Cancelled);
    }

    let pixels = mosaic_buf.into_inner().map_err(|_| CfwError::Model("mosaic buffer lock poisoned".into()))?;
    let failed_windows = failed_windows.into_inner().map_err(|_| CfwError::Model("failure counter lock poisoned".into()))?;

    let tags = prediction_tags(context, &bundle.meta, &mosaic.mosaic_id);
    let output_dir = context.run_dir.prediction_cogs_dir(mosaic.month);
    let output_path = output_dir.join(format!("{}.tif", mosaic.month.dir_name()));

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
    let object_key = format!("predictions/{}/{checksum_sha256}.tif", context.run_id);
    object_store.put(&object_key, &bytes)?;

    let item = StacItem {
        id: StacItem::item_id(&context.run_id, mosaic.month.year, Some(mosaic.month.month)),
        collection: "predictions".to_string(),
        asset_url: object_key.clone(),
        asset_checksum_sha256: checksum_sha256.clone(),
        bbox: bbox_from_transform(&transform, width, height),
        temporal_extent: StacTemporalExtent::Month { year: mosaic.month.year, month: mosaic.month.month },
    };
    register_with_conflict_check(stac_catalog, &item)?;

    info!(month = %mosaic.month, failed_windows, "prediction complete");

    Ok(PredictionOutcome { raster_path: output_path, object_key, checksum_sha256, failed_windows })
}

/// Checks P1: the feature-set hash recorded in the model bundle must
/// match a freshly computed hash of its own extractor list before the
/// engine is built, guarding against a bundle mutated out-of-band.
fn build_engine(meta: &MonthlyModelMeta) -> CfwResult<FeatureEngineer> {
    let recomputed = feature_set_hash(&meta.feature_extractors);
    if recomputed != meta.feature_set_hash {
        return Err(CfwError::Integrity(format!(
            "model for {} has a feature-set hash mismatch: recorded {}, recomputed {}",
            meta.month, meta.feature_set_hash, recomputed
        )));
    }
    let registry = ExtractorRegistry::with_defaults();
    FeatureEngineer::from_names(&registry, &meta.feature_extractors)
}

/// Reads one window's band stack, applies the engine and classifier,
/// and returns a window-local, row-major byte buffer of class indices
/// (or `None` if every pixel in the window is nodata).
fn predict_window(
    vsi_path: &str,
    window: &Window,
    month: MonthTag,
    engine: &FeatureEngineer,
    classifier: &GradientTreeClassifier,
) -> CfwResult<Option<Vec<u8>>> {
    const BAND_COUNT: usize = 4;
    let dataset = Dataset::open(vsi_path)
        .map_err(|e| CfwError::Transport(format!("failed to reopen source mosaic for window read: {e}")))?;

    let mut bands = Vec::with_capacity(BAND_COUNT);
    let mut nodata_values = Vec::with_capacity(BAND_COUNT);
    for band_idx in 1..=BAND_COUNT {
        let band = dataset
            .rasterband(band_idx)
            .map_err(|e| CfwError::InputData(format!("source mosaic missing band {band_idx}: {e}")))?;
        nodata_values.push(band.no_data_value());
        let buffer = band
            .read_as::<f64>(
                (window.xoff as isize, window.yoff as isize),
                (window.xsize, window.ysize),
                (window.xsize, window.ysize),
                Some(ResampleAlg::NearestNeighbour),
            )
            .map_err(|e| CfwError::Transport(format!("window range read failed: {e}")))?;
        bands.push(buffer.data);
    }

    let npix = window.xsize * window.ysize;
    let mut rows: Vec<Option<BandStack>> = Vec::with_capacity(npix);
    for i in 0..npix {
        let value_of = |b: usize| -> Option<f64> {
            let v = bands[b][i];
            match nodata_values[b] {
                Some(nd) if (v - nd).abs() < f64::EPSILON => None,
                _ => Some(v),
            }
        };
        rows.push(match (value_of(0), value_of(1), value_of(2), value_of(3)) {
            (Some(blue), Some(green), Some(red), Some(nir)) => Some(BandStack { blue, green, red, nir }),
            _ => None,
        });
    }

    let valid_indices: Vec<usize> = rows.iter().enumerate().filter_map(|(i, r)| r.map(|_| i)).collect();
    if valid_indices.is_empty() {
        return Ok(None);
    }

    let feature_rows: Vec<Vec<f64>> = valid_indices
        .iter()
        .map(|&i| engine.transform(rows[i].unwrap(), month))
        .collect::<CfwResult<_>>()?;
    let matrix = to_dense_matrix(&feature_rows)?;
    let predictions = classifier.predict(&matrix)?;

    let mut output = vec![NODATA; npix];
    for (&idx, &pred) in valid_indices.iter().zip(predictions.iter()) {
        output[idx] = pred as u8;
    }
    Ok(Some(output))
}

pub(crate) fn write_window_into_mosaic(buf: &mut [u8], raster_width: usize, window: &Window, values: &[u8]) {
    for row in 0..window.ysize {
        let src_start = row * window.xsize;
        let dst_start = (window.yoff + row) * raster_width + window.xoff;
        buf[dst_start..dst_start + window.xsize].copy_from_slice(&values[src_start..src_start + window.xsize]);
    }
}

fn window_intersects_boundary(window: &Window, transform: &[f64; 6], boundary: &Polygon<f64>) -> bool {
    window_world_bbox(window, transform).intersects(boundary)
}

fn window_world_bbox(window: &Window, transform: &[f64; 6]) -> Polygon<f64> {
    let (x0, y0) = pixel_to_world(transform, window.xoff as f64, window.yoff as f64);
    let (x1, y1) = pixel_to_world(transform, (window.xoff + window.xsize) as f64, (window.yoff + window.ysize) as f64);
    let (minx, maxx) = (x0.min(x1), x0.max(x1));
    let (miny, maxy) = (y0.min(y1), y0.max(y1));
    Polygon::new(
        LineString::new(vec![
            Coord { x: minx, y: miny },
            Coord { x: maxx, y: miny },
            Coord { x: maxx, y: maxy },
            Coord { x: minx, y: maxy },
            Coord { x: minx, y: miny },
        ]),
        vec![],
    )
}

fn pixel_to_world(t: &[f64; 6], px: f64, py: f64) -> (f64, f64) {
    (t[0] + px * t[1] + py * t[2], t[3] + px * t[4] + py * t[5])
}

fn bbox_from_transform(t: &[f64; 6], width: usize, height: usize) -> (f64, f64, f64, f64) {
    let (x0, y0) = pixel_to_world(t, 0.0, 0.0);
    let (x1, y1) = pixel_to_world(t, width as f64, height as f64);
    (x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1))
}

fn prediction_tags(context: &RunContext, meta: &MonthlyModelMeta, source_mosaic_id: &str) -> HashMap<String, String> {
    let class_map_json = serde_json::to_string(&meta.class_map).unwrap_or_else(|_| "[]".to_string());
    HashMap::from([
        ("SOFTWARE_VERSION".to_string(), SOFTWARE_VERSION.to_string()),
        ("RUN_ID".to_string(), context.run_id.clone()),
        ("MODEL_ID".to_string(), format!("{}-{}", context.run_id, meta.month)),
        ("FEATURE_SET_HASH".to_string(), meta.feature_set_hash.clone()),
        ("SOURCE_MOSAIC_ID".to_string(), source_mosaic_id.to_string()),
        ("CLASS_MAP".to_string(), class_map_json),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_into_mosaic_preserves_offset() {
        let mut buf = vec![NODATA; 4 * 4];
        let window = Window { xoff: 2, yoff: 1, xsize: 2, ysize: 2 };
        write_window_into_mosaic(&mut buf, 4, &window, &[1, 2, 3, 4]);
        assert_eq!(buf[1 * 4 + 2], 1);
        assert_eq!(buf[1 * 4 + 3], 2);
        assert_eq!(buf[2 * 4 + 2], 3);
        assert_eq!(buf[2 * 4 + 3], 4);
    }

    #[test]
    fn bbox_from_transform_normalizes_inverted_y() {
        let transform = [500000.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        let (minx, miny, maxx, maxy) = bbox_from_transform(&transform, 100, 100);
        assert!(minx < maxx);
        assert!(miny < maxy);
        assert_eq!(minx, 500000.0);
        assert_eq!(maxy, 4649000.0);
    }
}
