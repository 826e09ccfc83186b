//! The Hyperparameter Tuner (C4): preset domains plus the trial loop.

pub mod presets;
pub mod tuner;

pub use presets::{Domain, ParamSpace, PresetRegistry};
pub use tuner::{run_tuning, ExperimentResult};
