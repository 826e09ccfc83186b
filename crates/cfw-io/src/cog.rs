//! `PixelSource` (t2): direct windowed range reads against a
//! Cloud-Optimized GeoTIFF via GDAL's `/vsicurl/` virtual filesystem,
//! bypassing the tile/stat service entirely. Used when `TITILER_URL`
//! is unset or the operator asks for the direct-read transport.

use gdal::raster::ResampleAlg;
use gdal::Dataset;
use geo::algorithm::Contains;
use geo_types::{Coord, Geometry, Point, Polygon};

use cfw_core::model::TrainingFeature;
use cfw_core::{CfwError, CfwResult};

use crate::extractor::{MosaicRef, PixelSource, RawPixel};
use crate::retry::with_backoff;

/// Fixed band order a source mosaic COG is expected to carry: blue,
/// green, red, nir as bands 1-4. Mosaics with a different band order
/// are a configuration error, not handled here.
const BAND_COUNT: usize = 4;

pub struct DirectCogSource;

impl DirectCogSource {
    pub fn new() -> Self {
        Self
    }

    fn fetch_once(&self, mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>> {
        let vsi_path = format!("/vsicurl/{}", mosaic.cog_url);
        let dataset = Dataset::open(&vsi_path)
            .map_err(|e| CfwError::Transport(format!("failed to open COG {}: {e}", mosaic.cog_url)))?;

        let transform = dataset
            .geo_transform()
            .map_err(|e| CfwError::InputData(format!("COG has no geotransform: {e}")))?;
        let inverse = invert_geo_transform(&transform)
            .ok_or_else(|| CfwError::InputData("COG geotransform is not invertible".to_string()))?;

        let polygon = parse_polygon(&feature.geometry)?;
        let (min_x, min_y, max_x, max_y) = polygon_bbox(&polygon);

        let (raster_w, raster_h) = dataset.raster_size();
        let (px0, py0) = world_to_pixel(&inverse, min_x, max_y);
        let (px1, py1) = world_to_pixel(&inverse, max_x, min_y);

        let xoff = px0.floor().max(0.0) as isize;
        let yoff = py0.floor().max(0.0) as isize;
        let xend = (px1.ceil() as isize).min(raster_w as isize);
        let yend = (py1.ceil() as isize).min(raster_h as isize);
        if xend <= xoff || yend <= yoff {
            return Ok(Vec::new());
        }
        let xsize = (xend - xoff) as usize;
        let ysize = (yend - yoff) as usize;

        let mut bands: Vec<Vec<f64>> = Vec::with_capacity(BAND_COUNT);
        let mut nodata_values: Vec<Option<f64>> = Vec::with_capacity(BAND_COUNT);
        for band_idx in 1..=BAND_COUNT {
            let band = dataset
                .rasterband(band_idx)
                .map_err(|e| CfwError::InputData(format!("COG missing band {band_idx}: {e}")))?;
            nodata_values.push(band.no_data_value());
            let buffer = band
                .read_as::<f64>(
                    (xoff, yoff),
                    (xsize, ysize),
                    (xsize, ysize),
                    Some(ResampleAlg::NearestNeighbour),
                )
                .map_err(|e| CfwError::Transport(format!("COG range read failed: {e}")))?;
            bands.push(buffer.data);
        }

        let mut samples = Vec::new();
        for row in 0..ysize {
            for col in 0..xsize {
                let px = (xoff + col as isize) as f64 + 0.5;
                let py = (yoff + row as isize) as f64 + 0.5;
                let (wx, wy) = pixel_to_world(&transform, px, py);
                if !polygon.contains(&Point::new(wx, wy)) {
                    continue;
                }
                let linear = row * xsize + col;
                let value_of = |band: usize| -> Option<f64> {
                    let v = bands[band][linear];
                    match nodata_values[band] {
                        Some(nodata) if (v - nodata).abs() < f64::EPSILON => None,
                        _ => Some(v),
                    }
                };
                samples.push(RawPixel {
                    x: xoff as i64 + col as i64,
                    y: yoff as i64 + row as i64,
                    blue: value_of(0),
                    green: value_of(1),
                    red: value_of(2),
                    nir: value_of(3),
                });
            }
        }
        Ok(samples)
    }
}

impl Default for DirectCogSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PixelSource for DirectCogSource {
    fn fetch_pixels(&self, mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>> {
        with_backoff(&format!("direct_cog:{}", feature.feature_id), || {
            self.fetch_once(mosaic, feature)
        })
    }
}

fn parse_polygon(geometry: &serde_json::Value) -> CfwResult<Polygon<f64>> {
    let geojson_geom: geojson::Geometry = serde_json::from_value(geometry.clone())
        .map_err(|e| CfwError::InputData(format!("invalid training feature geometry: {e}")))?;
    let geo_geom: Geometry<f64> = geojson_geom
        .try_into()
        .map_err(|e| CfwError::InputData(format!("geometry is not a supported type: {e}")))?;
    match geo_geom {
        Geometry::Polygon(p) => Ok(p),
        Geometry::MultiPolygon(mp) => mp
            .into_iter()
            .next()
            .ok_or_else(|| CfwError::InputData("empty multipolygon".to_string())),
        other => Err(CfwError::InputData(format!(
            "expected a polygon geometry, got {other:?}"
        ))),
    }
}

fn polygon_bbox(polygon: &Polygon<f64>) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for Coord { x, y } in polygon.exterior().coords() {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }
    (min_x, min_y, max_x, max_y)
}

/// `[a, b, c, d, e, f]` GDAL affine geotransform: world = a + b*px + c*py
/// (x), d + e*px + f*py (y). GDAL's native layout is
/// `[origin_x, pixel_w, 0, origin_y, 0, pixel_h]`; we keep the general
/// 6-parameter form to also support rotated rasters.
fn pixel_to_world(t: &[f64; 6], px: f64, py: f64) -> (f64, f64) {
    let x = t[0] + px * t[1] + py * t[2];
    let y = t[3] + px * t[4] + py * t[5];
    (x, y)
}

fn world_to_pixel(inv: &[f64; 6], wx: f64, wy: f64) -> (f64, f64) {
    let px = inv[0] + wx * inv[1] + wy * inv[2];
    let py = inv[3] + wx * inv[4] + wy * inv[5];
    (px, py)
}

/// Inverts a GDAL-style affine geotransform so world coordinates can be
/// mapped back to fractional pixel coordinates.
fn invert_geo_transform(t: &[f64; 6]) -> Option<[f64; 6]> {
    let det = t[1] * t[5] - t[2] * t[4];
    if det.abs() < f64::EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;
    let b = t[5] * inv_det;
    let c = -t[2] * inv_det;
    let e = -t[4] * inv_det;
    let f = t[1] * inv_det;
    let a = -(t[0] * b + t[3] * c);
    let d = -(t[0] * e + t[3] * f);
    Some([a, b, c, d, e, f])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn geo_transform_inversion_round_trips() {
        let transform = [500000.0, 10.0, 0.0, 4649000.0, 0.0, -10.0];
        let inverse = invert_geo_transform(&transform).unwrap();
        let (px, py) = world_to_pixel(&inverse, 500100.0, 4648900.0);
        assert!((px - 10.0).abs() < 1e-6);
        assert!((py - 10.0).abs() < 1e-6);
        let (wx, wy) = pixel_to_world(&transform, px, py);
        assert!((wx - 500100.0).abs() < 1e-6);
        assert!((wy - 4648900.0).abs() < 1e-6);
    }
}
