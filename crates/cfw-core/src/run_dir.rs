//! Run directory layout, per spec §3: `runs/<run_id>/{<YYYY>_<MM>/{...}, composites/,
//! hyperparameter_tuning/, benchmark_results/}`.

use std::path::{Path, PathBuf};

use crate::model::MonthTag;

/// Resolves the on-disk paths for one run. Created lazily by whichever
/// stage writes to it first; never deleted on crash (survives for resume).
#[derive(Debug, Clone)]
pub struct RunDirectory {
    root: PathBuf,
}

impl RunDirectory {
    pub fn new(runs_root: impl Into<PathBuf>, run_id: &str) -> Self {
        Self {
            root: runs_root.into().join(run_id),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn month_dir(&self, month: MonthTag) -> PathBuf {
        self.root.join(month.dir_name())
    }

    pub fn saved_models_dir(&self, month: MonthTag) -> PathBuf {
        self.month_dir(month).join("saved_models")
    }

    pub fn data_cache_dir(&self, month: MonthTag) -> PathBuf {
        self.month_dir(month).join("data_cache")
    }

    pub fn model_diagnostics_dir(&self, month: MonthTag) -> PathBuf {
        self.month_dir(month).join("model_diagnostics")
    }

    pub fn prediction_cogs_dir(&self, month: MonthTag) -> PathBuf {
        self.month_dir(month).join("prediction_cogs")
    }

    pub fn composites_dir(&self) -> PathBuf {
        self.root.join("composites")
    }

    pub fn hyperparameter_tuning_dir(&self) -> PathBuf {
        self.root.join("hyperparameter_tuning")
    }

    pub fn benchmark_results_dir(&self) -> PathBuf {
        self.root.join("benchmark_results")
    }

    /// Creates every directory a full `all` run will eventually need.
    /// Idempotent: re-running on an existing run directory is a no-op.
    pub fn ensure_created(&self, months: &[MonthTag]) -> std::io::Result<()> {
        for month in months {
            std::fs::create_dir_all(self.saved_models_dir(*month))?;
            std::fs::create_dir_all(self.data_cache_dir(*month))?;
            std::fs::create_dir_all(self.model_diagnostics_dir(*month))?;
            std::fs::create_dir_all(self.prediction_cogs_dir(*month))?;
        }
        std::fs::create_dir_all(self.composites_dir())?;
        std::fs::create_dir_all(self.hyperparameter_tuning_dir())?;
        std::fs::create_dir_all(self.benchmark_results_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_dir_matches_spec_naming() {
        let rd = RunDirectory::new("/tmp/runs", "abc123");
        let m = MonthTag::parse("2024-07").unwrap();
        assert_eq!(
            rd.saved_models_dir(m),
            PathBuf::from("/tmp/runs/abc123/2024_07/saved_models")
        );
    }

    #[test]
    fn ensure_created_builds_full_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let rd = RunDirectory::new(tmp.path(), "run1");
        let months = vec![MonthTag::parse("2024-01").unwrap()];
        rd.ensure_created(&months).unwrap();
        assert!(rd.saved_models_dir(months[0]).is_dir());
        assert!(rd.composites_dir().is_dir());
        assert!(rd.hyperparameter_tuning_dir().is_dir());
        assert!(rd.benchmark_results_dir().is_dir());
    }
}
