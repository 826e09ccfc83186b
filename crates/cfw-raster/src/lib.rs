//! Raster-facing stages of the ChocoForestWatch pipeline: the Predictor
//! (C5), which scores a trained model window-by-window over a monthly
//! mosaic, and the Composite Builder (C6), which fuses twelve monthly
//! Prediction Rasters into one annual label per pixel.

pub mod cog_writer;
pub mod composite;
pub mod crs;
pub mod predictor;
pub mod tiling;

pub use cog_writer::{read_bbox, write_cog, CogWrite, NODATA, TILE_SIZE};
pub use composite::algorithms::{
    ChangePoint, LatestValid, MajorityVote, TemporalAlgorithm, TemporalTrend, WeightedTemporal, MISSING,
};
pub use composite::reducer::{build_composite, CompositeInput, CompositeOutcome};
pub use composite::registry::AlgorithmRegistry;
pub use crs::reproject_polygon_to_raster;
pub use predictor::{predict_month, PredictionOutcome};
pub use tiling::{window_grid, Window};
