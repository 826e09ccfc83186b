//! Run-directory lifecycle orchestration shared across all five
//! stages: a JSON manifest per stage invocation, a bounded worker-pool
//! runner for each stage's units, and the `training | tuning |
//! composites | cfw-processing | benchmarks | all` stage selector.

pub mod manifest;
pub mod orchestrator;
pub mod runner;

pub use manifest::{read_manifest, write_manifest, RunManifest, UnitRecord};
pub use orchestrator::{run_selected, StageSelector};
pub use runner::{run_units, BatchSummary, UnitSpec};
