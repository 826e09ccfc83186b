//! The spectral-index extractors: `ndvi`, `evi`, `savi`, `ndwi`. Formulas
//! are the standard remote-sensing ones, each with `EPSILON` added to its
//! denominator.

use cfw_core::CfwResult;

use crate::extractor::{Extractor, PixelContext, EPSILON};

/// SAVI's soil-adjustment factor.
pub const SAVI_L: f64 = 0.5;

pub struct Ndvi;

impl Extractor for Ndvi {
    fn name(&self) -> &'static str {
        "ndvi"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["ndvi"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        Ok(vec![(b.nir - b.red) / (b.nir + b.red + EPSILON)])
    }
}

pub struct Evi;

impl Extractor for Evi {
    fn name(&self) -> &'static str {
        "evi"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["evi"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        let denom = b.nir + 6.0 * b.red - 7.5 * b.blue + 1.0 + EPSILON;
        Ok(vec![2.5 * (b.nir - b.red) / denom])
    }
}

pub struct Savi;

impl Extractor for Savi {
    fn name(&self) -> &'static str {
        "savi"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["savi"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        let denom = b.nir + b.red + SAVI_L + EPSILON;
        Ok(vec![(b.nir - b.red) * (1.0 + SAVI_L) / denom])
    }
}

pub struct Ndwi;

impl Extractor for Ndwi {
    fn name(&self) -> &'static str {
        "ndwi"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["ndwi"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        Ok(vec![(b.green - b.nir) / (b.green + b.nir + EPSILON)])
    }
}

/// Shared so `water_detection` can reuse it without duplicating the formula.
pub fn ndwi_value(blue: f64, green: f64, red: f64, nir: f64) -> f64 {
    let _ = (blue, red);
    (green - nir) / (green + nir + EPSILON)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::model::{BandStack, MonthTag};

    fn ctx(blue: f64, green: f64, red: f64, nir: f64) -> PixelContext {
        PixelContext {
            bands: BandStack { blue, green, red, nir },
            month: MonthTag::parse("2024-06").unwrap(),
        }
    }

    #[test]
    fn ndvi_matches_literal_scenario() {
        let out = Ndvi.apply(&ctx(0.0, 0.0, 1000.0, 3000.0)).unwrap();
        assert!((out[0] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn savi_reduces_to_scaled_ndvi_shape() {
        let out = Savi.apply(&ctx(0.0, 0.0, 1000.0, 3000.0)).unwrap();
        assert!(out[0] > 0.0 && out[0] < 1.5);
    }

    #[test]
    fn all_index_formulas_stay_finite_for_zero_bands() {
        let zero = ctx(0.0, 0.0, 0.0, 0.0);
        assert!(Ndvi.apply(&zero).unwrap()[0].is_finite());
        assert!(Evi.apply(&zero).unwrap()[0].is_finite());
        assert!(Savi.apply(&zero).unwrap()[0].is_finite());
        assert!(Ndwi.apply(&zero).unwrap()[0].is_finite());
    }
}
