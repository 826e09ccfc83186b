//! The multi-column extractors: `brightness`, `shadow`, `water_detection`.

use cfw_core::CfwResult;

use crate::extractor::{Extractor, PixelContext, EPSILON};
use crate::indices::ndwi_value;

pub struct Brightness;

impl Extractor for Brightness {
    fn name(&self) -> &'static str {
        "brightness"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["brightness_mean", "brightness_nir_intensity", "brightness_cross_band_std"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let values = ctx.bands.as_array();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
        Ok(vec![mean, ctx.bands.nir, variance.sqrt()])
    }
}

pub struct Shadow;

impl Extractor for Shadow {
    fn name(&self) -> &'static str {
        "shadow"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["shadow_inverse_total_brightness", "shadow_blue_dominance"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        let total = b.blue + b.green + b.red + b.nir;
        let inverse_total_brightness = 1.0 / (total + EPSILON);
        let blue_dominance = b.blue / (b.green + b.red + b.nir + EPSILON);
        Ok(vec![inverse_total_brightness, blue_dominance])
    }
}

pub struct WaterDetection;

/// NDWI values above this are classified as the provisional water mask.
/// Not spec-mandated; documented as an implementer choice so the
/// threshold is a named constant rather than a buried literal.
pub const WATER_NDWI_THRESHOLD: f64 = 0.0;

impl Extractor for WaterDetection {
    fn name(&self) -> &'static str {
        "water_detection"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["water_blue_nir_log_ratio", "water_ndwi", "water_threshold_mask"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let b = &ctx.bands;
        let blue_nir_log_ratio = ((b.blue + EPSILON) / (b.nir + EPSILON)).ln();
        let ndwi = ndwi_value(b.blue, b.green, b.red, b.nir);
        let mask = if ndwi > WATER_NDWI_THRESHOLD { 1.0 } else { 0.0 };
        Ok(vec![blue_nir_log_ratio, ndwi, mask])
    }
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
    fn brightness_mean_matches_hand_computation() {
        let out = Brightness.apply(&ctx(100.0, 200.0, 300.0, 400.0)).unwrap();
        assert!((out[0] - 250.0).abs() < 1e-9);
        assert_eq!(out[1], 400.0);
    }

    #[test]
    fn water_threshold_mask_is_binary() {
        let out = WaterDetection.apply(&ctx(100.0, 500.0, 100.0, 100.0)).unwrap();
        assert!(out[2] == 0.0 || out[2] == 1.0);
    }

    #[test]
    fn shadow_outputs_stay_finite_for_zero_bands() {
        let out = Shadow.apply(&ctx(0.0, 0.0, 0.0, 0.0)).unwrap();
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
