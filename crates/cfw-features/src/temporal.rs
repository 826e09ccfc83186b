//! The `temporal` extractor: calendar features independent of band
//! values, so a model can learn seasonal effects.

use chrono::NaiveDate;
use cfw_core::CfwResult;
use std::f64::consts::PI;

use crate::extractor::{Extractor, PixelContext};

/// Reference span used to normalize year into roughly `[0, 1]` over a
/// multi-decade monitoring program; chosen to match the remote-sensing
/// archive era (earliest usable Landsat/Sentinel mosaics).
const YEAR_NORMALIZATION_START: i32 = 2000;
const YEAR_NORMALIZATION_SPAN: f64 = 50.0;

pub struct Temporal;

impl Extractor for Temporal {
    fn name(&self) -> &'static str {
        "temporal"
    }
    fn output_names(&self) -> &'static [&'static str] {
        &["temporal_month_sin", "temporal_month_cos", "temporal_year_norm", "temporal_doy_sin"]
    }
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>> {
        let month = ctx.month;
        let phase = (month.month as f64 - 1.0) / 12.0 * 2.0 * PI;
        let month_sin = phase.sin();
        let month_cos = phase.cos();
        let year_norm = (month.year - YEAR_NORMALIZATION_START) as f64 / YEAR_NORMALIZATION_SPAN;

        let day_of_year = NaiveDate::from_ymd_opt(month.year, month.month, 15)
            .map(|d| d.ordinal())
            .unwrap_or(15 * month.month);
        let doy_phase = day_of_year as f64 / 365.25 * 2.0 * PI;
        let doy_sin = doy_phase.sin();

        Ok(vec![month_sin, month_cos, year_norm, doy_sin])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::model::{BandStack, MonthTag};
    use chrono::Datelike;

    fn ctx(month: MonthTag) -> PixelContext {
        PixelContext {
            bands: BandStack { blue: 0.0, green: 0.0, red: 0.0, nir: 0.0 },
            month,
        }
    }

    #[test]
    fn january_and_july_are_out_of_phase() {
        let jan = Temporal.apply(&ctx(MonthTag::parse("2024-01").unwrap())).unwrap();
        let jul = Temporal.apply(&ctx(MonthTag::parse("2024-07").unwrap())).unwrap();
        assert!((jan[0] - jul[0]).abs() > 1.0);
    }

    #[test]
    fn year_normalization_is_monotonic() {
        let y1 = Temporal.apply(&ctx(MonthTag::parse("2020-01").unwrap())).unwrap();
        let y2 = Temporal.apply(&ctx(MonthTag::parse("2024-01").unwrap())).unwrap();
        assert!(y2[2] > y1[2]);
    }

    #[test]
    fn day_of_year_uses_mid_month_reference() {
        let ref_date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(ref_date.ordinal(), 75);
    }
}
