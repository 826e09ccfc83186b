//! `RunContext`: the explicit, injected state every stage needs instead of
//! reaching for globals (spec §9's re-architecture guidance). Generalizes
//! the teacher's single-stage `BatchRunnerConfig` into a value shared
//! across the whole pipeline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::classes::ClassRegistry;
use crate::run_dir::RunDirectory;

/// Cooperative cancellation flag shared across a run's worker pool.
/// Checked at CV-fold/trial boundaries (C3/C4) and window boundaries (C5/C6).
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Shared, read-only state passed to every component invocation.
#[derive(Clone)]
pub struct RunContext {
    pub run_id: String,
    pub project_id: String,
    pub year: i32,
    pub run_dir: RunDirectory,
    pub class_registry: ClassRegistry,
    pub random_state: u64,
    pub worker_threads: usize,
    pub remote_call_timeout: Duration,
    pub unit_timeout: Duration,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(
        run_id: String,
        project_id: String,
        year: i32,
        runs_root: impl Into<PathBuf>,
        class_registry: ClassRegistry,
        random_state: u64,
    ) -> Self {
        Self {
            run_dir: RunDirectory::new(runs_root, &run_id),
            run_id,
            project_id,
            year,
            class_registry,
            random_state,
            worker_threads: num_cpus_fallback(),
            remote_call_timeout: Duration::from_secs(60),
            unit_timeout: Duration::from_secs(30 * 60),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = if threads == 0 {
            num_cpus_fallback()
        } else {
            threads
        };
        self
    }
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classes::ClassRegistry;

    fn registry() -> ClassRegistry {
        ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap()
    }

    #[test]
    fn cancel_token_observes_cancellation() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn worker_threads_zero_falls_back_to_available_parallelism() {
        let ctx = RunContext::new(
            "r1".into(),
            "p1".into(),
            2024,
            "/tmp/runs",
            registry(),
            42,
        )
        .with_worker_threads(0);
        assert!(ctx.worker_threads >= 1);
    }
}
