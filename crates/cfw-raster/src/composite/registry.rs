//! `AlgorithmRegistry`: named temporal algorithms, the same registry
//! shape as `cfw-features::ExtractorRegistry` and
//! `cfw-ml::tuning::PresetRegistry`.

use std::collections::HashMap;
use std::sync::Arc;

use cfw_core::{CfwError, CfwResult};

use super::algorithms::{ChangePoint, LatestValid, MajorityVote, TemporalAlgorithm, TemporalTrend, WeightedTemporal};

#[derive(Default)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<String, Arc<dyn TemporalAlgorithm>>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(MajorityVote));
        registry.register(Arc::new(LatestValid));
        registry.register(Arc::new(WeightedTemporal));
        registry.register(Arc::new(TemporalTrend));
        registry.register(Arc::new(ChangePoint::default()));
        registry
    }

    pub fn register(&mut self, algorithm: Arc<dyn TemporalAlgorithm>) {
        self.algorithms.insert(algorithm.name().to_string(), algorithm);
    }

    pub fn get(&self, name: &str) -> CfwResult<Arc<dyn TemporalAlgorithm>> {
        self.algorithms.get(name).cloned().ok_or_else(|| {
            CfwError::Config(format!(
                "unknown composite algorithm '{name}'; registered: {:?}",
                self.algorithms.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub fn list(&self) -> Vec<&str> {
        self.algorithms.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_five_algorithms() {
        let registry = AlgorithmRegistry::with_defaults();
        assert_eq!(registry.list().len(), 5);
        for name in ["majority_vote", "latest_valid", "weighted_temporal", "temporal_trend", "change_point"] {
            assert!(registry.get(name).is_ok(), "missing algorithm {name}");
        }
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let registry = AlgorithmRegistry::with_defaults();
        assert!(matches!(registry.get("bogus"), Err(CfwError::Config(_))));
    }
}
