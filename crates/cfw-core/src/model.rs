//! Plain data types shared by every stage: AOI, training features, pixel
//! records, model/raster metadata, and STAC item records. One struct per
//! concept, serde-friendly, matching `spec.md` §3 field-for-field.

use crate::classes::ClassIdx;
use serde::{Deserialize, Serialize};

/// Area of interest, immutable for the lifetime of a run. Both the raw
/// geometry and its projected-meter extent are carried so downstream
/// stages never need to re-derive the projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aoi {
    /// GeoJSON polygon (or multipolygon) in a geographic reference (EPSG:4326).
    pub geometry: serde_json::Value,
    /// EPSG code of `geometry`.
    pub epsg: u32,
    /// Precomputed extent in the AOI's projected-meter CRS: (minx, miny, maxx, maxy).
    pub projected_extent_m: (f64, f64, f64, f64),
    /// EPSG code of the projected-meter CRS used for `projected_extent_m`.
    pub projected_epsg: u32,
}

/// A month tag in `YYYY-MM` form, validated at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthTag {
    pub year: i32,
    pub month: u32,
}

impl MonthTag {
    pub fn parse(s: &str) -> Option<Self> {
        let (y, m) = s.split_once('-')?;
        let year: i32 = y.parse().ok()?;
        let month: u32 = m.parse().ok()?;
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self { year, month })
    }

    pub fn as_string(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    /// Directory component under `runs/<run_id>/` for this month, e.g. `2024_03`.
    pub fn dir_name(&self) -> String {
        format!("{:04}_{:02}", self.year, self.month)
    }
}

impl std::fmt::Display for MonthTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

/// A labeled polygon contributing supervised pixels (spec §3 "Training Feature").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingFeature {
    /// Stable identity, used as the grouping key in train/val/test splitting.
    pub feature_id: u64,
    pub project_id: String,
    pub class_name: String,
    pub month: MonthTag,
    pub geometry: serde_json::Value,
}

/// The four base sensor channels, in the fixed order the spec requires.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandStack {
    pub blue: f64,
    pub green: f64,
    pub red: f64,
    pub nir: f64,
}

impl BandStack {
    pub fn as_array(&self) -> [f64; 4] {
        [self.blue, self.green, self.red, self.nir]
    }
}

/// `(x, y, month, class_idx, band_values, feature_id)` per spec §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelRecord {
    pub x: i64,
    pub y: i64,
    pub month: MonthTag,
    pub class_idx: ClassIdx,
    pub bands: BandStack,
    pub feature_id: u64,
}

/// Schema-versioned, serializable bundle for a trained classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthlyModelMeta {
    pub schema_version: u32,
    pub run_id: String,
    pub month: MonthTag,
    /// Ordered extractor names; must byte-equal the list used at prediction time (P1).
    pub feature_extractors: Vec<String>,
    /// class_name -> class_idx, snapshotted at training time.
    pub class_map: Vec<(String, ClassIdx)>,
    pub hyperparameters: serde_json::Value,
    pub feature_set_hash: String,
}

/// Tags embedded in a Prediction Raster's COG metadata (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRasterTags {
    pub software_version: String,
    pub run_id: String,
    pub model_id: String,
    pub feature_set_hash: String,
    pub source_mosaic_id: String,
    /// class_name -> class_idx, as embedded JSON.
    pub class_map: Vec<(String, ClassIdx)>,
}

/// Tags embedded in a Composite Raster's COG metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeRasterTags {
    pub software_version: String,
    pub run_id: String,
    pub algorithm: String,
    pub year: i32,
    pub months_included: Vec<MonthTag>,
}

/// A minimal STAC item record: enough metadata to register a raster asset
/// without depending on the catalog's own schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacItem {
    pub id: String,
    pub collection: String,
    pub asset_url: String,
    pub asset_checksum_sha256: String,
    pub bbox: (f64, f64, f64, f64),
    pub temporal_extent: StacTemporalExtent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StacTemporalExtent {
    Month { year: i32, month: u32 },
    Year { year: i32 },
}

impl StacItem {
    /// `cfw-<run_id>-<year>[-<month>]` per spec §6.
    pub fn item_id(run_id: &str, year: i32, month: Option<u32>) -> String {
        match month {
            Some(m) => format!("cfw-{run_id}-{year}-{m:02}"),
            None => format!("cfw-{run_id}-{year}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_tag_parses_and_round_trips() {
        let m = MonthTag::parse("2024-03").unwrap();
        assert_eq!(m.year, 2024);
        assert_eq!(m.month, 3);
        assert_eq!(m.as_string(), "2024-03");
        assert_eq!(m.dir_name(), "2024_03");
    }

    #[test]
    fn month_tag_rejects_out_of_range_month() {
        assert!(MonthTag::parse("2024-13").is_none());
        assert!(MonthTag::parse("2024-00").is_none());
    }

    #[test]
    fn stac_item_id_format() {
        assert_eq!(StacItem::item_id("r1", 2024, Some(3)), "cfw-r1-2024-03");
        assert_eq!(StacItem::item_id("r1", 2024, None), "cfw-r1-2024");
    }
}
