//! Pixel Extractor (C1): drives one or more `PixelSource` transports over
//! a set of training polygons and produces the ordered `PixelRecord` rows
//! that feed the Pixel Cache.

use serde::{Deserialize, Serialize};

use cfw_core::classes::ClassRegistry;
use cfw_core::model::{BandStack, MonthTag, PixelRecord, TrainingFeature};
use cfw_core::{CfwError, CfwResult};

/// Identifies the source mosaic a set of training features is extracted
/// against: the COG (or mosaic) URL and the month it represents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MosaicRef {
    pub mosaic_id: String,
    pub cog_url: String,
    pub month: MonthTag,
}

/// One sampled pixel as reported by a transport, before nodata filtering.
/// A `None` band means the source mosaic has no value there (nodata or
/// outside the mosaic's footprint).
#[derive(Debug, Clone)]
pub struct RawPixel {
    pub x: i64,
    pub y: i64,
    pub blue: Option<f64>,
    pub green: Option<f64>,
    pub red: Option<f64>,
    pub nir: Option<f64>,
}

impl RawPixel {
    /// `Some` only when every band has a value; otherwise the pixel is
    /// nodata/out-of-mosaic and must be skipped, never imputed.
    pub fn into_bands(self) -> Option<BandStack> {
        Some(BandStack {
            blue: self.blue?,
            green: self.green?,
            red: self.red?,
            nir: self.nir?,
        })
    }
}

/// A transport that can fetch raw pixel samples for one training polygon.
pub trait PixelSource: Send + Sync {
    fn fetch_pixels(&self, mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>>;
}

/// Drives a `PixelSource` over a set of training features for one month,
/// enforcing the fixed processing order and the unknown-class-label
/// fatal check.
pub struct PixelExtractor<'a> {
    source: &'a dyn PixelSource,
    registry: &'a ClassRegistry,
}

impl<'a> PixelExtractor<'a> {
    pub fn new(source: &'a dyn PixelSource, registry: &'a ClassRegistry) -> Self {
        Self { source, registry }
    }

    /// Extracts pixel rows for every feature, in ascending `feature_id`
    /// order, with pixels within each feature in raster-scan order
    /// (ascending `y` then ascending `x`). Nodata/out-of-mosaic pixels
    /// are skipped silently; an unlisted class name aborts the whole
    /// extraction, since it indicates a misconfigured project rather
    /// than a per-pixel data problem.
    pub fn extract(&self, mosaic: &MosaicRef, features: &[TrainingFeature]) -> CfwResult<Vec<PixelRecord>> {
        let mut ordered: Vec<&TrainingFeature> = features.iter().collect();
        ordered.sort_by_key(|f| f.feature_id);

        let mut rows = Vec::new();
        for feature in ordered {
            let class_idx = self.registry.index_of(&feature.class_name).ok_or_else(|| {
                CfwError::InputData(format!(
                    "feature {} references unknown class label '{}'",
                    feature.feature_id, feature.class_name
                ))
            })?;

            let mut pixels = self.source.fetch_pixels(mosaic, feature)?;
            pixels.sort_by_key(|p| (p.y, p.x));

            for pixel in pixels {
                let x = pixel.x;
                let y = pixel.y;
                let Some(bands) = pixel.into_bands() else {
                    continue;
                };
                rows.push(PixelRecord {
                    x,
                    y,
                    month: mosaic.month,
                    class_idx,
                    bands,
                    feature_id: feature.feature_id,
                });
            }
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn registry() -> ClassRegistry {
        ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap()
    }

    fn feature(id: u64, class: &str) -> TrainingFeature {
        TrainingFeature {
            feature_id: id,
            project_id: "p1".into(),
            class_name: class.into(),
            month: MonthTag::parse("2024-01").unwrap(),
            geometry: serde_json::json!({"type": "Polygon", "coordinates": []}),
        }
    }

    struct FakeSource(Mutex<Vec<(u64, Vec<RawPixel>)>>);

    impl PixelSource for FakeSource {
        fn fetch_pixels(&self, _mosaic: &MosaicRef, feature: &TrainingFeature) -> CfwResult<Vec<RawPixel>> {
            let mut data = self.0.lock().unwrap();
            let idx = data.iter().position(|(id, _)| *id == feature.feature_id).unwrap();
            Ok(data.remove(idx).1)
        }
    }

    fn mosaic() -> MosaicRef {
        MosaicRef {
            mosaic_id: "m1".into(),
            cog_url: "https://example/m1.tif".into(),
            month: MonthTag::parse("2024-01").unwrap(),
        }
    }

    #[test]
    fn nodata_pixels_are_skipped() {
        let source = FakeSource(Mutex::new(vec![(
            1,
            vec![
                RawPixel { x: 0, y: 0, blue: Some(1.0), green: Some(1.0), red: Some(1.0), nir: Some(1.0) },
                RawPixel { x: 1, y: 0, blue: None, green: Some(1.0), red: Some(1.0), nir: Some(1.0) },
            ],
        )]));
        let reg = registry();
        let extractor = PixelExtractor::new(&source, &reg);
        let rows = extractor.extract(&mosaic(), &[feature(1, "Forest")]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].x, 0);
    }

    #[test]
    fn unknown_class_label_is_fatal() {
        let source = FakeSource(Mutex::new(vec![(1, vec![])]));
        let reg = registry();
        let extractor = PixelExtractor::new(&source, &reg);
        let result = extractor.extract(&mosaic(), &[feature(1, "Wetland")]);
        assert!(matches!(result, Err(CfwError::InputData(_))));
    }

    #[test]
    fn pixels_are_emitted_in_raster_scan_order() {
        let source = FakeSource(Mutex::new(vec![(
            1,
            vec![
                RawPixel { x: 1, y: 0, blue: Some(1.0), green: Some(1.0), red: Some(1.0), nir: Some(1.0) },
                RawPixel { x: 0, y: 0, blue: Some(2.0), green: Some(2.0), red: Some(2.0), nir: Some(2.0) },
                RawPixel { x: 0, y: 1, blue: Some(3.0), green: Some(3.0), red: Some(3.0), nir: Some(3.0) },
            ],
        )]));
        let reg = registry();
        let extractor = PixelExtractor::new(&source, &reg);
        let rows = extractor.extract(&mosaic(), &[feature(1, "Forest")]).unwrap();
        let coords: Vec<(i64, i64)> = rows.iter().map(|r| (r.x, r.y)).collect();
        assert_eq!(coords, vec![(0, 0), (1, 0), (0, 1)]);
    }
}
