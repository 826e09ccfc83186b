//! The Trainer (C3): the two-phase Prepare/Fit workflow. Prepare reads
//! cached pixels, applies the Feature Engineer, and writes the combined
//! feature cache; Fit reads it back, splits, fits with an emulated
//! early-stopping schedule, cross-validates, evaluates, and serializes
//! the Monthly Model bundle.

use tracing::warn;

use cfw_core::classes::ClassRegistry;
use cfw_core::model::{MonthTag, MonthlyModelMeta, PixelRecord};
use cfw_core::{CfwError, CfwResult, RunContext};
use cfw_features::FeatureEngineer;

use crate::classifier::{to_dense_matrix, GradientTreeClassifier};
use crate::config::TrainerConfig;
use crate::diagnostics::{
    calibration_table, confusion_matrix, operating_points, overall_accuracy, per_class_metrics,
    permutation_importance, DiagnosticsBundle, LearningCurvePoint,
};
use crate::feature_cache::{read_feature_cache, write_feature_cache};
use crate::model_bundle::MonthlyModelBundle;
use crate::split::{group_aware_k_folds, split_rows};

/// Feature-cache filename under `data_cache/` for a given month.
fn feature_cache_path(context: &RunContext, month: MonthTag) -> std::path::PathBuf {
    context.run_dir.data_cache_dir(month).join("features.npz")
}

/// **Prepare**: applies the Feature Engineer to the raw pixel rows and
/// writes the combined feature cache consumed by `fit`.
pub fn prepare(context: &RunContext, month: MonthTag, rows: &[PixelRecord], engine: &FeatureEngineer) -> CfwResult<()> {
    let mut feature_rows = Vec::with_capacity(rows.len());
    let mut labels = Vec::with_capacity(rows.len());
    let mut group_ids = Vec::with_capacity(rows.len());
    for row in rows {
        feature_rows.push(engine.transform(row.bands, row.month)?);
        labels.push(row.class_idx.0);
        group_ids.push(row.feature_id);
    }
    write_feature_cache(&feature_cache_path(context, month), &feature_rows, &labels, &group_ids)
}

pub struct FitOutcome {
    pub bundle: MonthlyModelBundle,
    pub diagnostics: DiagnosticsBundle,
}

/// **Fit**: reads the feature cache, splits, fits with early stopping,
/// cross-validates, evaluates on the held-out test partition, and
/// returns the serializable bundle plus its diagnostics.
pub fn fit(
    context: &RunContext,
    month: MonthTag,
    config: &TrainerConfig,
    registry: &ClassRegistry,
    feature_extractors: Vec<String>,
) -> CfwResult<FitOutcome> {
    let cache_path = feature_cache_path(context, month);
    if !cache_path.exists() {
        return Err(CfwError::StageDependency(format!(
            "no feature cache for {month}; run the prepare phase first"
        )));
    }
    let (rows, labels, group_ids) = read_feature_cache(&cache_path)?;

    let observed_classes: Vec<_> = {
        let mut set: Vec<u8> = labels.clone();
        set.sort_unstable();
        set.dedup();
        set
    };
    if observed_classes.len() < 2 {
        return Err(CfwError::Model(format!(
            "month {month} has only one observed class ({observed_classes:?}); cannot train a classifier"
        )));
    }
    let effective_registry = if observed_classes.len() < registry.len() {
        warn!(%month, "reducing class_order to observed labels for this month");
        registry.reduced_to(&observed_classes.iter().map(|&c| cfw_core::classes::ClassIdx(c)).collect::<Vec<_>>())?
    } else {
        registry.clone()
    };

    let split = split_rows(
        config.split_method,
        &group_ids,
        &labels,
        config.test_fraction,
        config.val_fraction,
        config.random_state,
    )?;

    let select = |idxs: &[usize]| -> (Vec<Vec<f64>>, Vec<i32>) {
        (
            idxs.iter().map(|&i| rows[i].clone()).collect(),
            idxs.iter().map(|&i| labels[i] as i32).collect(),
        )
    };
    let (train_rows, train_labels) = select(&split.train);
    let (val_rows, val_labels) = select(&split.val);
    let (test_rows, test_labels) = select(&split.test);

    let train_x = to_dense_matrix(&train_rows)?;
    let val_x = to_dense_matrix(&val_rows)?;

    let (classifier, learning_curve) = fit_with_early_stopping(
        &train_x,
        &train_labels,
        &val_x,
        &val_labels,
        config,
    )?;

    let train_group_ids: Vec<u64> = split.train.iter().chain(split.val.iter()).map(|&i| group_ids[i]).collect();
    let train_cv_labels: Vec<u8> = split.train.iter().chain(split.val.iter()).map(|&i| labels[i]).collect();
    let folds = group_aware_k_folds(&train_group_ids, &train_cv_labels, config.cv_folds, config.random_state)?;
    let cv_accuracies = cross_validate(&rows, &labels, &folds, config)?;
    let cv_accuracy_mean = mean(&cv_accuracies);
    let cv_accuracy_std = std_dev(&cv_accuracies, cv_accuracy_mean);

    let test_x = to_dense_matrix(&test_rows)?;
    let test_preds = classifier.predict(&test_x)?;
    let classes: Vec<u8> = effective_registry
        .all_classes()
        .iter()
        .filter_map(|name| effective_registry.index_of(name))
        .map(|idx| idx.0)
        .collect();
    let cm = confusion_matrix(&test_labels, &test_preds, &classes);
    let extractor_registry = cfw_features::ExtractorRegistry::with_defaults();
    let engine = FeatureEngineer::from_names(&extractor_registry, &feature_extractors)?;
    let column_names = engine.column_names();
    let diagnostics = DiagnosticsBundle {
        per_class_metrics: per_class_metrics(&cm),
        accuracy: overall_accuracy(&cm),
        operating_points: operating_points(&cm),
        calibration: calibration_table(&test_labels, &test_preds, &classes),
        feature_importance: permutation_importance(
            &classifier,
            &test_rows,
            &test_labels,
            &column_names,
            config.random_state,
        )?,
        learning_curve,
        cv_accuracy_mean,
        cv_accuracy_std,
        confusion_matrix: cm,
    };

    let feature_set_hash = cfw_io::cache::feature_set_hash(&feature_extractors);
    let meta = MonthlyModelMeta {
        schema_version: 1,
        run_id: context.run_id.clone(),
        month,
        feature_extractors,
        class_map: effective_registry
            .all_classes()
            .iter()
            .filter_map(|name| effective_registry.index_of(name).map(|idx| (name.clone(), idx)))
            .collect(),
        hyperparameters: serde_json::to_value(&config.hyperparameters)?,
        feature_set_hash,
    };

    let bundle = MonthlyModelBundle { meta, classifier };
    bundle.save(&context.run_dir.saved_models_dir(month))?;

    Ok(FitOutcome { bundle, diagnostics })
}

/// Fits an increasing-estimator-count schedule, evaluating validation
/// accuracy at each step and stopping once it has not improved for
/// `config.early_stopping_rounds` consecutive steps. Emulates gradient-
/// boosting early stopping since `smartcore`'s forest classifier has no
/// native incremental fit.
fn fit_with_early_stopping(
    train_x: &smartcore::linalg::basic::matrix::DenseMatrix<f64>,
    train_labels: &[i32],
    val_x: &smartcore::linalg::basic::matrix::DenseMatrix<f64>,
    val_labels: &[i32],
    config: &TrainerConfig,
) -> CfwResult<(GradientTreeClassifier, Vec<LearningCurvePoint>)> {
    const STEP: u16 = 25;
    let max_estimators = config.hyperparameters.n_estimators.max(STEP);

    let mut best_model = None;
    let mut best_accuracy = f64::NEG_INFINITY;
    let mut rounds_without_improvement = 0u16;
    let mut curve = Vec::new();

    let mut n_estimators = STEP;
    loop {
        let model = GradientTreeClassifier::fit(train_x, train_labels, &config.hyperparameters, n_estimators)?;
        let preds = model.predict(val_x)?;
        let correct = preds.iter().zip(val_labels.iter()).filter(|(a, b)| a == b).count();
        let accuracy = if val_labels.is_empty() { 0.0 } else { correct as f64 / val_labels.len() as f64 };
        curve.push(LearningCurvePoint { n_estimators, val_accuracy: accuracy });

        if accuracy > best_accuracy {
            best_accuracy = accuracy;
            best_model = Some(model);
            rounds_without_improvement = 0;
        } else {
            rounds_without_improvement += 1;
        }

        if rounds_without_improvement >= config.early_stopping_rounds || n_estimators >= max_estimators {
            break;
        }
        n_estimators = (n_estimators + STEP).min(max_estimators);
    }

    let model = best_model.ok_or_else(|| CfwError::Model("early-stopping schedule produced no model".into()))?;
    Ok((model, curve))
}

fn cross_validate(
    rows: &[Vec<f64>],
    labels: &[u8],
    folds: &[Vec<usize>],
    config: &TrainerConfig,
) -> CfwResult<Vec<f64>> {
    let mut accuracies = Vec::with_capacity(folds.len());
    for (held_out_idx, held_out) in folds.iter().enumerate() {
        let train_idx: Vec<usize> = folds
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != held_out_idx)
            .flat_map(|(_, f)| f.clone())
            .collect();
        if train_idx.is_empty() || held_out.is_empty() {
            continue;
        }
        let train_rows: Vec<Vec<f64>> = train_idx.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<i32> = train_idx.iter().map(|&i| labels[i] as i32).collect();
        let held_rows: Vec<Vec<f64>> = held_out.iter().map(|&i| rows[i].clone()).collect();
        let held_labels: Vec<i32> = held_out.iter().map(|&i| labels[i] as i32).collect();

        let x = to_dense_matrix(&train_rows)?;
        let model = GradientTreeClassifier::fit(&x, &train_labels, &config.hyperparameters, config.hyperparameters.n_estimators)?;
        let held_x = to_dense_matrix(&held_rows)?;
        let preds = model.predict(&held_x)?;
        let correct = preds.iter().zip(held_labels.iter()).filter(|(a, b)| a == b).count();
        accuracies.push(correct as f64 / held_labels.len() as f64);
    }
    Ok(accuracies)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfw_core::classes::ClassRegistry;
    use cfw_core::model::BandStack;

    fn context() -> (tempfile::TempDir, RunContext) {
        let tmp = tempfile::tempdir().unwrap();
        let registry = ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap();
        let ctx = RunContext::new("r1".into(), "p1".into(), 2024, tmp.path(), registry, 7);
        (tmp, ctx)
    }

    fn sample_config() -> TrainerConfig {
        TrainerConfig {
            split_method: crate::config::SplitMethod::Feature,
            test_fraction: 0.2,
            val_fraction: 0.2,
            random_state: 7,
            early_stopping_rounds: 2,
            class_weighting: crate::config::ClassWeighting::None,
            cv_folds: 2,
            class_order: vec!["Forest".into(), "NonForest".into()],
            feature_extractors: vec!["ndvi".into()],
            hyperparameters: crate::config::ModelHyperparameters { n_estimators: 50, ..Default::default() },
        }
    }

    fn sample_rows(month: MonthTag) -> Vec<PixelRecord> {
        let mut rows = Vec::new();
        for feature_id in 0..20u64 {
            let class = if feature_id % 2 == 0 { 0 } else { 1 };
            let nir = if class == 0 { 3000.0 } else { 500.0 };
            rows.push(PixelRecord {
                x: feature_id as i64,
                y: 0,
                month,
                class_idx: cfw_core::classes::ClassIdx(class),
                bands: BandStack { blue: 100.0, green: 200.0, red: 1000.0, nir },
                feature_id,
            });
        }
        rows
    }

    #[test]
    fn prepare_then_fit_round_trip_on_synthetic_data() {
        let (_tmp, ctx) = context();
        let month = MonthTag::parse("2024-03").unwrap();
        let registry = cfw_features::ExtractorRegistry::with_defaults();
        let engine = FeatureEngineer::from_names(&registry, &["ndvi".to_string()]).unwrap();
        let rows = sample_rows(month);

        prepare(&ctx, month, &rows, &engine).unwrap();

        let config = sample_config();
        let class_registry = ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap();
        let outcome = fit(&ctx, month, &config, &class_registry, vec!["ndvi".to_string()]).unwrap();
        assert!(outcome.diagnostics.accuracy >= 0.0);
    }

    #[test]
    fn fit_without_prepare_is_a_stage_dependency_error() {
        let (_tmp, ctx) = context();
        let month = MonthTag::parse("2024-04").unwrap();
        let config = sample_config();
        let class_registry = ClassRegistry::new(&["Forest".into(), "NonForest".into()]).unwrap();
        let result = fit(&ctx, month, &config, &class_registry, vec!["ndvi".to_string()]);
        assert!(matches!(result, Err(CfwError::StageDependency(_))));
    }
}
