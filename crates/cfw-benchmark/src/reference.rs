//! Reference-raster alignment: reprojects the reference geometry-wise
//! when its CRS differs from the prediction's, then resamples it onto
//! the prediction's exact pixel grid by nearest-neighbor regardless of
//! whether the reference is coarser or finer — the resampling rule the
//! source left ambiguous is fixed here to nearest-neighbor-always so
//! that two runs against the same reference raster are bytewise
//! identical (P5).

use gdal::spatial_ref::{CoordTransform, SpatialRef};
use gdal::Dataset;
use geo_types::{Coord, LineString, Polygon};
use serde::{Deserialize, Serialize};

use cfw_core::{CfwError, CfwResult};

use crate::confusion::MISSING;

/// Maps a reference raster's own pixel codings onto the pipeline's
/// `{0=Forest, 1=NonForest}` convention; any value in neither set
/// becomes missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceCoding {
    pub forest_values: Vec<u8>,
    pub non_forest_values: Vec<u8>,
}

impl ReferenceCoding {
    pub fn normalize(&self, raw: u8) -> u8 {
        if self.forest_values.contains(&raw) {
            0
        } else if self.non_forest_values.contains(&raw) {
            1
        } else {
            MISSING
        }
    }
}

fn invert_geo_transform(t: &[f64; 6]) -> CfwResult<[f64; 6]> {
    let det = t[1] * t[5] - t[2] * t[4];
    if det.abs() < f64::EPSILON {
        return Err(CfwError::Integrity("reference raster has a singular geotransform".to_string()));
    }
    let inv_det = 1.0 / det;
    Ok([
        (t[2] * t[3] - t[0] * t[5]) * inv_det,
        t[5] * inv_det,
        -t[2] * inv_det,
        (t[0] * t[4] - t[1] * t[3]) * inv_det,
        -t[4] * inv_det,
        t[1] * inv_det,
    ])
}

fn pixel_to_world(t: &[f64; 6], px: f64, py: f64) -> (f64, f64) {
    (t[0] + px * t[1] + py * t[2], t[3] + px * t[4] + py * t[5])
}

fn world_to_pixel(inv: &[f64; 6], x: f64, y: f64) -> (f64, f64) {
    (inv[0] + x * inv[1] + y * inv[2], inv[3] + x * inv[4] + y * inv[5])
}

/// Resamples `reference` onto a `pred_width` x `pred_height` grid with
/// `pred_transform`/`pred_projection_wkt`, raw reference pixel values
/// (not yet normalized by a `ReferenceCoding`). Out-of-bounds pixels
/// become `255`.
pub fn resample_reference_to_prediction_grid(
    reference: &Dataset,
    pred_width: usize,
    pred_height: usize,
    pred_transform: &[f64; 6],
    pred_projection_wkt: &str,
) -> CfwResult<Vec<u8>> {
    let ref_transform =
        reference.geo_transform().map_err(|e| CfwError::InputData(format!("reference raster has no geotransform: {e}")))?;
    let ref_projection = reference.projection();
    let (ref_width, ref_height) = reference.raster_size();
    let inv_ref_transform = invert_geo_transform(&ref_transform)?;

    let pred_ref = SpatialRef::from_wkt(pred_projection_wkt)
        .map_err(|e| CfwError::InputData(format!("prediction raster has invalid projection WKT: {e}")))?;
    let reference_ref = SpatialRef::from_wkt(&ref_projection)
        .map_err(|e| CfwError::InputData(format!("reference raster has invalid projection WKT: {e}")))?;
    let needs_reprojection = pred_ref.auth_code().ok() != reference_ref.auth_code().ok();
    let transform = if needs_reprojection {
        Some(CoordTransform::new(&pred_ref, &reference_ref).map_err(|e| {
            CfwError::InputData(format!("cannot reproject prediction grid into reference CRS: {e}"))
        })?)
    } else {
        None
    };

    let band = reference.rasterband(1).map_err(|e| CfwError::InputData(format!("reference raster missing band 1: {e}")))?;
    let buffer = band
        .read_as::<u8>((0, 0), (ref_width, ref_height), (ref_width, ref_height), None)
        .map_err(|e| CfwError::InputData(format!("failed to read reference raster: {e}")))?;
    let reference_pixels = buffer.data;

    let mut resampled = vec![MISSING; pred_width * pred_height];
    for row in 0..pred_height {
        for col in 0..pred_width {
            let (mut x, mut y) = pixel_to_world(pred_transform, col as f64 + 0.5, row as f64 + 0.5);
            if let Some(transform) = &transform {
                let mut xs = [x];
                let mut ys = [y];
                let mut zs = [0.0];
                transform.transform_coords(&mut xs, &mut ys, &mut zs).map_err(|e| {
                    CfwError::InputData(format!("failed to reproject prediction pixel into reference CRS: {e}"))
                })?;
                x = xs[0];
                y = ys[0];
            }
            let (ref_col, ref_row) = world_to_pixel(&inv_ref_transform, x, y);
            let (ref_col, ref_row) = (ref_col.floor() as i64, ref_row.floor() as i64);
            if ref_col >= 0 && ref_row >= 0 && (ref_col as usize) < ref_width && (ref_row as usize) < ref_height {
                resampled[row * pred_width + col] = reference_pixels[ref_row as usize * ref_width + ref_col as usize];
            }
        }
    }
    Ok(resampled)
}

/// Masks every pixel whose center falls outside `boundary` (given in
/// the prediction raster's own CRS) to `255`, leaving the rest
/// untouched.
pub fn restrict_to_boundary(values: &mut [u8], width: usize, height: usize, transform: &[f64; 6], boundary: &Polygon<f64>) {
    use geo::algorithm::contains::Contains;
    for row in 0..height {
        for col in 0..width {
            let (x, y) = pixel_to_world(transform, col as f64 + 0.5, row as f64 + 0.5);
            if !boundary.contains(&geo_types::Point::new(x, y)) {
                values[row * width + col] = MISSING;
            }
        }
    }
}

pub fn unit_square_for_tests() -> Polygon<f64> {
    Polygon::new(
        LineString::new(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 10.0, y: 0.0 },
            Coord { x: 10.0, y: 10.0 },
            Coord { x: 0.0, y: 10.0 },
            Coord { x: 0.0, y: 0.0 },
        ]),
        vec![],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_coding_normalizes_arbitrary_values() {
        let coding = ReferenceCoding { forest_values: vec![1, 2], non_forest_values: vec![3] };
        assert_eq!(coding.normalize(1), 0);
        assert_eq!(coding.normalize(3), 1);
        assert_eq!(coding.normalize(9), MISSING);
    }

    #[test]
    fn invert_geo_transform_round_trips_a_point() {
        let transform = [500000.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        let inv = invert_geo_transform(&transform).unwrap();
        let (x, y) = pixel_to_world(&transform, 5.0, 5.0);
        let (px, py) = world_to_pixel(&inv, x, y);
        assert!((px - 5.0).abs() < 1e-6);
        assert!((py - 5.0).abs() < 1e-6);
    }

    #[test]
    fn boundary_restriction_masks_outside_pixels() {
        let transform = [0.0, 1.0, 0.0, 20.0, 0.0, -1.0];
        let mut values = vec![0u8; 20 * 20];
        let boundary = unit_square_for_tests();
        restrict_to_boundary(&mut values, 20, 20, &transform, &boundary);
        assert_eq!(values[0 * 20 + 0], MISSING);
        let (x, y) = pixel_to_world(&transform, 15.5, 15.5);
        assert!(x > 10.0 && y < 10.0);
    }
}
