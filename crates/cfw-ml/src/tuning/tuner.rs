//! The Hyperparameter Tuner (C4): draws `n_trials` hyperparameter
//! configurations from a named preset's joint domain, invokes the
//! Trainer's fit phase for each, and records ranked `ExperimentResult`s.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use cfw_core::classes::ClassRegistry;
use cfw_core::model::MonthTag;
use cfw_core::{CfwError, CfwResult, RunContext};

use crate::config::{ModelHyperparameters, TrainerConfig};
use crate::trainer::fit;
use crate::tuning::presets::{Domain, ParamSpace, PresetRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub id: String,
    pub params: serde_json::Value,
    pub cv_accuracy_mean: f64,
    pub cv_accuracy_std: f64,
    pub test_accuracy: f64,
    pub f1_macro: f64,
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub train_seconds: f64,
    pub model_path: String,
    pub diagnostics_path: String,
    pub timestamp: String,
}

/// Samples one `ModelHyperparameters` draw from `space`. Unspecified
/// fields keep the base config's current value, so a preset only needs
/// to declare the parameters it wants to search.
fn sample_hyperparameters(
    space: &ParamSpace,
    base: &ModelHyperparameters,
    rng: &mut impl rand::Rng,
) -> ModelHyperparameters {
    let mut hp = base.clone();
    if let Some(domain) = space.get("n_estimators") {
        hp.n_estimators = domain.sample(rng) as u16;
    }
    if let Some(domain) = space.get("max_depth") {
        hp.max_depth = domain.sample(rng) as u16;
    }
    if let Some(domain) = space.get("learning_rate") {
        hp.learning_rate = domain.sample(rng);
    }
    if let Some(domain) = space.get("subsample") {
        hp.subsample = domain.sample(rng);
    }
    if let Some(domain) = space.get("colsample") {
        hp.colsample = domain.sample(rng);
    }
    if let Some(domain) = space.get("reg_alpha") {
        hp.reg_alpha = domain.sample(rng);
    }
    if let Some(domain) = space.get("reg_lambda") {
        hp.reg_lambda = domain.sample(rng);
    }
    if let Some(domain) = space.get("gamma") {
        hp.gamma = domain.sample(rng);
    }
    if let Some(domain) = space.get("min_child_weight") {
        hp.min_child_weight = domain.sample(rng);
    }
    hp
}

/// Runs `n_trials` trials of the named preset against one month, writes
/// per-trial JSON plus the ranked CSV/top-5 JSON/preset snapshot under
/// `hyperparameter_tuning/`, and returns the ranked results (best first).
pub fn run_tuning(
    context: &RunContext,
    month: MonthTag,
    base_config: &TrainerConfig,
    registry: &ClassRegistry,
    preset_name: &str,
    n_trials: u32,
) -> CfwResult<Vec<ExperimentResult>> {
    let presets = PresetRegistry::with_defaults();
    let space = presets.get(preset_name)?;

    let tuning_dir = context.run_dir.hyperparameter_tuning_dir();
    std::fs::create_dir_all(&tuning_dir).map_err(CfwError::Io)?;
    std::fs::write(
        tuning_dir.join(format!("{preset_name}_preset.json")),
        serde_json::to_vec_pretty(&space_to_json(space))?,
    )
    .map_err(CfwError::Io)?;

    let mut rng = ChaCha8Rng::seed_from_u64(context.random_state);
    let mut results = Vec::with_capacity(n_trials as usize);

    for trial in 0..n_trials {
        if context.cancel.is_cancelled() {
            return Err(CfwError::Cancelled);
        }
        let hyperparameters = sample_hyperparameters(space, &base_config.hyperparameters, &mut rng);
        let mut trial_config = base_config.clone();
        trial_config.hyperparameters = hyperparameters.clone();

        let start = Instant::now();
        let outcome = fit(context, month, &trial_config, registry, base_config.feature_extractors.clone())?;
        let train_seconds = start.elapsed().as_secs_f64();

        let precision_macro = mean_field(&outcome.diagnostics.per_class_metrics, |m| m.precision);
        let recall_macro = mean_field(&outcome.diagnostics.per_class_metrics, |m| m.recall);
        let f1_macro = mean_field(&outcome.diagnostics.per_class_metrics, |m| m.f1);

        let id = format!("{preset_name}-trial-{trial:04}");
        let model_path = context
            .run_dir
            .saved_models_dir(month)
            .to_string_lossy()
            .to_string();
        let diagnostics_path = tuning_dir.join(format!("{id}.json")).to_string_lossy().to_string();

        let result = ExperimentResult {
            id: id.clone(),
            params: serde_json::to_value(&hyperparameters)?,
            cv_accuracy_mean: outcome.diagnostics.cv_accuracy_mean,
            cv_accuracy_std: outcome.diagnostics.cv_accuracy_std,
            test_accuracy: outcome.diagnostics.accuracy,
            f1_macro,
            precision_macro,
            recall_macro,
            train_seconds,
            model_path,
            diagnostics_path: diagnostics_path.clone(),
            timestamp: Utc::now().to_rfc3339(),
        };
        std::fs::write(&diagnostics_path, serde_json::to_vec_pretty(&result)?).map_err(CfwError::Io)?;
        results.push(result);
    }

    rank_results(&mut results);
    write_ranked_csv(&tuning_dir.join(format!("{preset_name}_ranked.csv")), &results)?;
    let top5: Vec<&ExperimentResult> = results.iter().take(5).collect();
    std::fs::write(
        tuning_dir.join(format!("{preset_name}_top5.json")),
        serde_json::to_vec_pretty(&top5)?,
    )
    .map_err(CfwError::Io)?;

    Ok(results)
}

/// Best by `cv_accuracy_mean` descending, ties broken by lower
/// `cv_accuracy_std`, then lower `train_seconds`.
fn rank_results(results: &mut [ExperimentResult]) {
    results.sort_by(|a, b| {
        b.cv_accuracy_mean
            .partial_cmp(&a.cv_accuracy_mean)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.cv_accuracy_std.partial_cmp(&b.cv_accuracy_std).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.train_seconds.partial_cmp(&b.train_seconds).unwrap_or(std::cmp::Ordering::Equal))
    });
}

fn mean_field(metrics: &[crate::diagnostics::ClassMetrics], f: impl Fn(&crate::diagnostics::ClassMetrics) -> f64) -> f64 {
    if metrics.is_empty() {
        return 0.0;
    }
    metrics.iter().map(f).sum::<f64>() / metrics.len() as f64
}

fn space_to_json(space: &ParamSpace) -> serde_json::Value {
    let map: serde_json::Map<String, serde_json::Value> = space
        .iter()
        .map(|(name, domain)| (name.clone(), domain_to_json(domain)))
        .collect();
    serde_json::Value::Object(map)
}

fn domain_to_json(domain: &Domain) -> serde_json::Value {
    match domain {
        Domain::Uniform { low, high } => serde_json::json!({"kind": "uniform", "low": low, "high": high}),
        Domain::LogUniform { low, high } => serde_json::json!({"kind": "log_uniform", "low": low, "high": high}),
        Domain::DiscreteInt(choices) => serde_json::json!({"kind": "discrete", "choices": choices}),
    }
}

fn write_ranked_csv(path: &Path, results: &[ExperimentResult]) -> CfwResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| CfwError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    writer
        .write_record(["id", "cv_accuracy_mean", "cv_accuracy_std", "test_accuracy", "f1_macro", "train_seconds"])
        .map_err(|e| CfwError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    for result in results {
        writer
            .write_record([
                result.id.clone(),
                result.cv_accuracy_mean.to_string(),
                result.cv_accuracy_std.to_string(),
                result.test_accuracy.to_string(),
                result.f1_macro.to_string(),
                result.train_seconds.to_string(),
            ])
            .map_err(|e| CfwError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
    }
    writer.flush().map_err(CfwError::Io)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(mean: f64, std: f64, seconds: f64) -> ExperimentResult {
        ExperimentResult {
            id: "x".into(),
            params: serde_json::json!({}),
            cv_accuracy_mean: mean,
            cv_accuracy_std: std,
            test_accuracy: 0.0,
            f1_macro: 0.0,
            precision_macro: 0.0,
            recall_macro: 0.0,
            train_seconds: seconds,
            model_path: String::new(),
            diagnostics_path: String::new(),
            timestamp: String::new(),
        }
    }

    #[test]
    fn ranking_prefers_higher_mean_then_lower_std_then_lower_time() {
        let mut results = vec![result(0.8, 0.05, 10.0), result(0.9, 0.1, 20.0), result(0.9, 0.05, 5.0)];
        rank_results(&mut results);
        assert_eq!(results[0].train_seconds, 5.0);
        assert_eq!(results[1].train_seconds, 20.0);
        assert_eq!(results[2].cv_accuracy_mean, 0.8);
    }
}
