//! The `Extractor` trait: a pure, named `band_stack → derived_columns`
//! function with a declared output arity and column names.

use cfw_core::model::{BandStack, MonthTag};
use cfw_core::CfwResult;

/// The fixed epsilon added to every denominator so a spectral index
/// stays finite for any nonnegative band input.
pub const EPSILON: f64 = 1e-6;

/// Everything an extractor needs about one pixel besides its bands.
/// Only the `temporal` extractor reads `month`; the rest ignore it.
#[derive(Debug, Clone, Copy)]
pub struct PixelContext {
    pub bands: BandStack,
    pub month: MonthTag,
}

/// A pure band-to-feature transform, registered under a fixed name.
pub trait Extractor: Send + Sync {
    /// One of the closed set of extractor names.
    fn name(&self) -> &'static str;
    /// Column names, in the order `apply` returns values.
    fn output_names(&self) -> &'static [&'static str];
    fn apply(&self, ctx: &PixelContext) -> CfwResult<Vec<f64>>;
}
