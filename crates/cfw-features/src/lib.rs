//! # cfw-features
//!
//! The Feature Engineer (C2): a registry of named, pure band-to-feature
//! extractors and the ordered `FeatureEngineer` that concatenates base
//! bands with their derived columns into the fixed-width row a
//! classifier trains and predicts on.

pub mod engine;
pub mod extractor;
pub mod indices;
pub mod registry;
pub mod temporal;
pub mod texture;

pub use engine::FeatureEngineer;
pub use extractor::{Extractor, PixelContext, EPSILON};
pub use registry::ExtractorRegistry;
