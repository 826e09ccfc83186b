//! `PresetRegistry`: the five closed-set hyperparameter search presets,
//! each an explicit mapping from parameter name to a sampling domain.
//! Same registry shape as `cfw-features::ExtractorRegistry`.

use std::collections::HashMap;

use cfw_core::{CfwError, CfwResult};
use rand::Rng;

/// A sampling domain for one hyperparameter.
#[derive(Debug, Clone)]
pub enum Domain {
    Uniform { low: f64, high: f64 },
    LogUniform { low: f64, high: f64 },
    DiscreteInt(Vec<i64>),
}

impl Domain {
    pub fn sample(&self, rng: &mut impl Rng) -> f64 {
        match self {
            Domain::Uniform { low, high } => rng.gen_range(*low..*high),
            Domain::LogUniform { low, high } => {
                let log_low = low.ln();
                let log_high = high.ln();
                rng.gen_range(log_low..log_high).exp()
            }
            Domain::DiscreteInt(choices) => {
                let idx = rng.gen_range(0..choices.len());
                choices[idx] as f64
            }
        }
    }
}

pub type ParamSpace = HashMap<String, Domain>;

#[derive(Default)]
pub struct PresetRegistry {
    presets: HashMap<String, ParamSpace>,
}

impl PresetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("fast", fast_preset());
        registry.register("balanced", balanced_preset());
        registry.register("thorough", thorough_preset());
        registry.register("regularization_focus", regularization_focus_preset());
        registry.register("depth_learning_focus", depth_learning_focus_preset());
        registry
    }

    pub fn register(&mut self, name: &str, space: ParamSpace) {
        self.presets.insert(name.to_string(), space);
    }

    pub fn get(&self, name: &str) -> CfwResult<&ParamSpace> {
        self.presets.get(name).ok_or_else(|| {
            CfwError::Config(format!(
                "unknown tuning preset '{name}'; registered: {:?}",
                self.presets.keys().collect::<Vec<_>>()
            ))
        })
    }

    pub fn list(&self) -> Vec<&str> {
        self.presets.keys().map(String::as_str).collect()
    }
}

fn fast_preset() -> ParamSpace {
    HashMap::from([
        ("n_estimators".to_string(), Domain::DiscreteInt(vec![50, 100])),
        ("max_depth".to_string(), Domain::DiscreteInt(vec![3, 4, 5])),
        ("learning_rate".to_string(), Domain::LogUniform { low: 0.05, high: 0.3 }),
        ("subsample".to_string(), Domain::Uniform { low: 0.7, high: 1.0 }),
    ])
}

fn balanced_preset() -> ParamSpace {
    HashMap::from([
        ("n_estimators".to_string(), Domain::DiscreteInt(vec![100, 200, 300])),
        ("max_depth".to_string(), Domain::DiscreteInt(vec![4, 6, 8])),
        ("learning_rate".to_string(), Domain::LogUniform { low: 0.01, high: 0.2 }),
        ("subsample".to_string(), Domain::Uniform { low: 0.6, high: 1.0 }),
        ("colsample".to_string(), Domain::Uniform { low: 0.6, high: 1.0 }),
        ("reg_lambda".to_string(), Domain::LogUniform { low: 0.1, high: 10.0 }),
    ])
}

fn thorough_preset() -> ParamSpace {
    HashMap::from([
        ("n_estimators".to_string(), Domain::DiscreteInt(vec![200, 400, 600, 800])),
        ("max_depth".to_string(), Domain::DiscreteInt(vec![3, 4, 5, 6, 7, 8, 9, 10])),
        ("learning_rate".to_string(), Domain::LogUniform { low: 0.005, high: 0.3 }),
        ("subsample".to_string(), Domain::Uniform { low: 0.5, high: 1.0 }),
        ("colsample".to_string(), Domain::Uniform { low: 0.5, high: 1.0 }),
        ("reg_alpha".to_string(), Domain::LogUniform { low: 0.001, high: 10.0 }),
        ("reg_lambda".to_string(), Domain::LogUniform { low: 0.001, high: 10.0 }),
        ("gamma".to_string(), Domain::Uniform { low: 0.0, high: 5.0 }),
        ("min_child_weight".to_string(), Domain::LogUniform { low: 0.5, high: 10.0 }),
    ])
}

fn regularization_focus_preset() -> ParamSpace {
    HashMap::from([
        ("n_estimators".to_string(), Domain::DiscreteInt(vec![150, 250])),
        ("max_depth".to_string(), Domain::DiscreteInt(vec![3, 4, 5])),
        ("reg_alpha".to_string(), Domain::LogUniform { low: 0.01, high: 50.0 }),
        ("reg_lambda".to_string(), Domain::LogUniform { low: 0.01, high: 50.0 }),
        ("gamma".to_string(), Domain::Uniform { low: 0.0, high: 10.0 }),
        ("min_child_weight".to_string(), Domain::LogUniform { low: 1.0, high: 20.0 }),
    ])
}

fn depth_learning_focus_preset() -> ParamSpace {
    HashMap::from([
        ("n_estimators".to_string(), Domain::DiscreteInt(vec![100, 200, 400])),
        ("max_depth".to_string(), Domain::DiscreteInt(vec![6, 8, 10, 12, 14])),
        ("learning_rate".to_string(), Domain::LogUniform { low: 0.001, high: 0.1 }),
        ("subsample".to_string(), Domain::Uniform { low: 0.7, high: 1.0 }),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn default_registry_has_five_presets() {
        let registry = PresetRegistry::with_defaults();
        assert_eq!(registry.list().len(), 5);
    }

    #[test]
    fn unknown_preset_is_a_config_error() {
        let registry = PresetRegistry::with_defaults();
        assert!(matches!(registry.get("bogus"), Err(CfwError::Config(_))));
    }

    #[test]
    fn sampling_stays_within_declared_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let domain = Domain::Uniform { low: 0.5, high: 1.0 };
        for _ in 0..50 {
            let v = domain.sample(&mut rng);
            assert!((0.5..1.0).contains(&v));
        }
    }
}
