//! Bounded worker-pool execution of a stage's data-parallel units
//! (months in C3/C5, trials in C4, windows in C5/C6 are handled inside
//! their own crates; this runner is for the *outer* per-month/per-trial
//! fan-out). Mirrors the "run, catch, convert to a status record" shape
//! used for scenario batch fan-out elsewhere in this codebase.

use std::path::PathBuf;

use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{error, info};

use cfw_core::{CfwError, CfwResult, RunContext};

use crate::manifest::{write_manifest, RunManifest, UnitRecord};

/// One data-parallel unit of a stage: an identifier for error reporting
/// and retry hints, an expected output path, and the closure that does
/// the work.
pub struct UnitSpec {
    pub unit_id: String,
    pub output: PathBuf,
    pub work: Box<dyn FnOnce() -> CfwResult<()> + Send>,
}

pub struct BatchSummary {
    pub stage: String,
    pub success: usize,
    pub failure: usize,
    pub manifest_path: PathBuf,
    pub units: Vec<UnitRecord>,
}

impl BatchSummary {
    pub fn failed_unit_ids(&self) -> Vec<&str> {
        self.units.iter().filter(|u| u.status == "error").map(|u| u.unit_id.as_str()).collect()
    }
}

/// Runs `units` for `stage` on a thread pool sized to
/// `context.worker_threads`, writes a `RunManifest` under the run
/// directory's root, and returns the aggregate summary. A unit's
/// failure never aborts the others; only `Cancelled` short-circuits
/// (checked before each unit starts).
pub fn run_units(context: &RunContext, stage: &str, units: Vec<UnitSpec>) -> CfwResult<BatchSummary> {
    let pool = ThreadPoolBuilder::new()
        .num_threads(context.worker_threads)
        .build()
        .map_err(|e| CfwError::Model(format!("failed to build {stage} thread pool: {e}")))?;

    let cancel = &context.cancel;
    let records: Vec<UnitRecord> = pool.install(|| {
        units
            .into_par_iter()
            .map(|unit| {
                if cancel.is_cancelled() {
                    return UnitRecord {
                        unit_id: unit.unit_id,
                        status: "cancelled".to_string(),
                        error: None,
                        output: unit.output.display().to_string(),
                    };
                }
                run_unit(unit)
            })
            .collect()
    });

    let success = records.iter().filter(|r| r.status == "ok").count();
    let failure = records.len() - success;

    let manifest = RunManifest {
        created_at: Utc::now(),
        run_id: context.run_id.clone(),
        stage: stage.to_string(),
        num_units: records.len(),
        success,
        failure,
        units: records.clone(),
    };
    let manifest_path = context.run_dir.root().join(format!("{stage}_manifest.json"));
    write_manifest(&manifest_path, &manifest)?;

    info!(stage, success, failure, "stage complete");
    Ok(BatchSummary { stage: stage.to_string(), success, failure, manifest_path, units: records })
}

/// Executes a single unit's closure and converts its result into a
/// status record, logging on failure rather than propagating — unit
/// failures are aggregated by the caller, never abort the stage.
fn run_unit(unit: UnitSpec) -> UnitRecord {
    let UnitSpec { unit_id, output, work } = unit;
    match work() {
        Ok(()) => UnitRecord { unit_id, status: "ok".to_string(), error: None, output: output.display().to_string() },
        Err(err) => {
            error!(unit_id = %unit_id, error = %err, "unit failed");
            UnitRecord {
                unit_id,
                status: "error".to_string(),
                error: Some(err.to_string()),
                output: output.display().to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::classes::ClassRegistry;

    fn context(tmp: &tempfile::TempDir) -> RunContext {
        let registry = ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap();
        RunContext::new("r1".into(), "p1".into(), 2024, tmp.path(), registry, 7)
    }

    #[test]
    fn mixed_success_and_failure_units_are_both_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let context = context(&tmp);
        let units = vec![
            UnitSpec {
                unit_id: "2024-01".into(),
                output: PathBuf::from("a"),
                work: Box::new(|| Ok(())),
            },
            UnitSpec {
                unit_id: "2024-02".into(),
                output: PathBuf::from("b"),
                work: Box::new(|| Err(CfwError::Model("no val rows".into()))),
            },
        ];
        let summary = run_units(&context, "training", units).unwrap();
        assert_eq!(summary.success, 1);
        assert_eq!(summary.failure, 1);
        assert_eq!(summary.failed_unit_ids(), vec!["2024-02"]);
        assert!(summary.manifest_path.exists());
    }
}
