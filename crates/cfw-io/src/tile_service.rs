//! `PixelSource` (t1): fetches band statistics for training polygons from
//! a tile/stat HTTP service (a titiler-style `/statistics` endpoint),
//! the default, lower-setup transport for the Pixel Extractor.

use std::time::Duration;

use cfw_core::model::TrainingFeature;
use cfw_core::{CfwError, CfwResult};
use serde::Deserialize;

use crate::extractor::{MosaicRef, PixelSource, RawPixel};
use crate::retry::with_backoff;

/// A single band's reported statistics for one polygon, as returned by
/// the tile service's `/statistics` endpoint.
#[derive(Debug, Deserialize)]
struct BandStatistics {
    #[serde(rename = "mean")]
    _mean: f64,
}

/// Raw per-pixel sample payload the tile service returns when asked for
/// pixel-level (not just aggregate) statistics.
#[derive(Debug, Deserialize)]
struct PixelSamplePayload {
    x: i64,
    y: i64,
    /// `null` marks a nodata pixel.
    blue: Option<f64>,
    green: Option<f64>,
    red: Option<f64>,
    nir: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct TileServiceResponse {
    pixels: Vec<PixelSamplePayload>,
}

/// HTTP client against the tile/stat service named by `TITILER_URL`.
pub struct TileServiceSource {
    base_url: String,
    agent: ureq::Agent,
}

impl TileServiceSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout(timeout)
            .build();
        Self {
            base_url: base_url.into(),
            agent,
        }
    }

    fn fetch_once(&self, mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>> {
        let url = format!("{}/statistics", self.base_url);
        let geometry = serde_json::to_string(&feature.geometry)?;
        let response = self
            .agent
            .get(&url)
            .query("url", &mosaic.cog_url)
            .query("geojson", &geometry)
            .call();

        let response = match response {
            Ok(r) => r,
            Err(ureq::Error::Status(code, _)) if (400..500).contains(&code) => {
                return Err(CfwError::InputData(format!(
                    "tile service rejected polygon for feature {}: HTTP {code}",
                    feature.feature_id
                )));
            }
            Err(err) => {
                return Err(CfwError::Transport(format!("tile service request failed: {err}")));
            }
        };

        let body: TileServiceResponse = response
            .into_json()
            .map_err(|e| CfwError::Transport(format!("tile service returned invalid JSON: {e}")))?;

        Ok(body
            .pixels
            .into_iter()
            .map(|p| RawPixel {
                x: p.x,
                y: p.y,
                blue: p.blue,
                green: p.green,
                red: p.red,
                nir: p.nir,
            })
            .collect())
    }
}

impl PixelSource for TileServiceSource {
    fn fetch_pixels(&self, mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>> {
        with_backoff(&format!("tile_service:{}", feature.feature_id), || {
            self.fetch_once(mosaic, feature)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_statistics_struct_deserializes() {
        let raw = r#"{"mean": 1234.5}"#;
        let stats: BandStatistics = serde_json::from_str(raw).unwrap();
        assert!((stats._mean - 1234.5).abs() < f64::EPSILON);
    }
}
