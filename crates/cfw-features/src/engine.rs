//! `FeatureEngineer`: the ordered extractor list that turns a pixel's
//! base bands into the fixed-width feature row a classifier trains and
//! predicts on.

use std::sync::Arc;

use cfw_core::model::BandStack;
use cfw_core::CfwResult;

use crate::extractor::{Extractor, PixelContext};
use crate::registry::ExtractorRegistry;

/// Holds the ordered extractor list that must byte-equal the list
/// recorded in a Monthly Model bundle (P1). Constructed once per stage
/// invocation from a name list resolved against the registry.
#[derive(Clone)]
pub struct FeatureEngineer {
    extractors: Vec<Arc<dyn Extractor>>,
}

impl FeatureEngineer {
    pub fn new(extractors: Vec<Arc<dyn Extractor>>) -> Self {
        Self { extractors }
    }

    pub fn from_names(registry: &ExtractorRegistry, names: &[String]) -> CfwResult<Self> {
        Ok(Self::new(registry.resolve(names)?))
    }

    /// The ordered name list this engine was built with, for recording
    /// into a Monthly Model bundle and for the P1 equality check at
    /// prediction time.
    pub fn extractor_names(&self) -> Vec<String> {
        self.extractors.iter().map(|e| e.name().to_string()).collect()
    }

    /// All output column names, base bands first, then each extractor's
    /// columns in order.
    pub fn column_names(&self) -> Vec<&'static str> {
        let mut names = vec!["blue", "green", "red", "nir"];
        for extractor in &self.extractors {
            names.extend(extractor.output_names());
        }
        names
    }

    /// Concatenates base bands and every extractor's derived columns
    /// into one fixed-width row.
    pub fn transform(&self, bands: BandStack, month: cfw_core::model::MonthTag) -> CfwResult<Vec<f64>> {
        let ctx = PixelContext { bands, month };
        let mut row = bands.as_array().to_vec();
        for extractor in &self.extractors {
            row.extend(extractor.apply(&ctx)?);
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::model::MonthTag;

    #[test]
    fn transform_concatenates_base_bands_and_extractors() {
        let registry = ExtractorRegistry::with_defaults();
        let engine = FeatureEngineer::from_names(&registry, &["ndvi".to_string()]).unwrap();
        let bands = BandStack { blue: 100.0, green: 200.0, red: 1000.0, nir: 3000.0 };
        let row = engine.transform(bands, MonthTag::parse("2024-06").unwrap()).unwrap();
        assert_eq!(row.len(), 5);
        assert!((row[4] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn column_names_match_row_width() {
        let registry = ExtractorRegistry::with_defaults();
        let engine = FeatureEngineer::from_names(
            &registry,
            &["ndvi".to_string(), "brightness".to_string()],
        )
        .unwrap();
        let bands = BandStack { blue: 1.0, green: 1.0, red: 1.0, nir: 1.0 };
        let row = engine.transform(bands, MonthTag::parse("2024-01").unwrap()).unwrap();
        assert_eq!(row.len(), engine.column_names().len());
    }
}
