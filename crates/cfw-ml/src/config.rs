//! `TrainerConfig`: every option enumerated in the Trainer's contract,
//! loadable from a TOML or JSON scenario file the way a run's training
//! parameters are pinned for reproducibility.

use std::path::Path;

use serde::{Deserialize, Serialize};

use cfw_core::{CfwError, CfwResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitMethod {
    Feature,
    Pixel,
}

impl Default for SplitMethod {
    fn default() -> Self {
        SplitMethod::Feature
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    None,
    Balanced,
}

impl Default for ClassWeighting {
    fn default() -> Self {
        ClassWeighting::None
    }
}

/// The gradient-tree hyperparameters a preset or a trial configures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelHyperparameters {
    pub n_estimators: u16,
    pub max_depth: u16,
    pub learning_rate: f64,
    pub subsample: f64,
    pub colsample: f64,
    pub reg_alpha: f64,
    pub reg_lambda: f64,
    pub gamma: f64,
    pub min_child_weight: f64,
}

impl Default for ModelHyperparameters {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 6,
            learning_rate: 0.1,
            subsample: 0.8,
            colsample: 0.8,
            reg_alpha: 0.0,
            reg_lambda: 1.0,
            gamma: 0.0,
            min_child_weight: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default)]
    pub split_method: SplitMethod,
    pub test_fraction: f64,
    pub val_fraction: f64,
    pub random_state: u64,
    pub early_stopping_rounds: u16,
    #[serde(default)]
    pub class_weighting: ClassWeighting,
    pub cv_folds: u32,
    pub class_order: Vec<String>,
    pub feature_extractors: Vec<String>,
    #[serde(default)]
    pub hyperparameters: ModelHyperparameters,
}

impl TrainerConfig {
    pub fn validate(&self) -> CfwResult<()> {
        if !(0.05..=0.5).contains(&self.test_fraction) {
            return Err(CfwError::Config(format!(
                "test_fraction must be in [0.05, 0.5], got {}",
                self.test_fraction
            )));
        }
        if !(0.05..=0.5).contains(&self.val_fraction) {
            return Err(CfwError::Config(format!(
                "val_fraction must be in [0.05, 0.5], got {}",
                self.val_fraction
            )));
        }
        if self.cv_folds < 2 {
            return Err(CfwError::Config(format!(
                "cv_folds must be >= 2, got {}",
                self.cv_folds
            )));
        }
        if self.class_order.len() < 2 {
            return Err(CfwError::Config("class_order must declare at least 2 classes".into()));
        }
        Ok(())
    }

    /// Loads a config from a `.toml` or `.json` file, sniffed by
    /// extension, matching the scenario-spec loading convention used
    /// elsewhere in this workspace.
    pub fn load_from_path(path: &Path) -> CfwResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(CfwError::Io)?;
        let config: TrainerConfig = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents)
                .map_err(|e| CfwError::Config(format!("invalid TOML trainer config: {e}")))?,
            Some("json") => serde_json::from_str(&contents)?,
            other => {
                return Err(CfwError::Config(format!(
                    "unsupported trainer config extension: {other:?}"
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> TrainerConfig {
        TrainerConfig {
            split_method: SplitMethod::Feature,
            test_fraction: 0.2,
            val_fraction: 0.2,
            random_state: 42,
            early_stopping_rounds: 10,
            class_weighting: ClassWeighting::None,
            cv_folds: 5,
            class_order: vec!["Forest".into(), "NonForest".into()],
            feature_extractors: vec!["ndvi".into()],
            hyperparameters: ModelHyperparameters::default(),
        }
    }

    #[test]
    fn rejects_out_of_range_fractions() {
        let mut config = base_config();
        config.test_fraction = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_too_few_cv_folds() {
        let mut config = base_config();
        config.cv_folds = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_config_is_valid() {
        assert!(base_config().validate().is_ok());
    }
}
