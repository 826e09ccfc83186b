//! Model diagnostics emitted alongside every Monthly Model bundle:
//! confusion matrix, per-class precision/recall/F1, ROC/PR operating
//! points, a calibration table, permutation feature importance, and
//! per-round learning-curve accuracy.
//!
//! `smartcore`'s random forest classifier exposes only hard label
//! predictions, not class probabilities, so the ROC/PR curves collapse
//! to the single operating point a hard classifier produces rather than
//! a swept threshold curve, and permutation importance substitutes for
//! SHAP/weight/gain/cover (none of which a tree ensemble without
//! probability output can report). This substitution is the diagnostics
//! equivalent of the classifier-backend decision in `classifier.rs`.

use serde::{Deserialize, Serialize};

use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::classifier::GradientTreeClassifier;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: Vec<u8>,
    /// Row = true class, column = predicted class.
    pub matrix: Vec<Vec<usize>>,
}

pub fn confusion_matrix(y_true: &[i32], y_pred: &[i32], classes: &[u8]) -> ConfusionMatrix {
    let index_of = |label: i32| classes.iter().position(|&c| c as i32 == label);
    let mut matrix = vec![vec![0usize; classes.len()]; classes.len()];
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if let (Some(ti), Some(pi)) = (index_of(t), index_of(p)) {
            matrix[ti][pi] += 1;
        }
    }
    ConfusionMatrix { classes: classes.to_vec(), matrix }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_idx: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

pub fn per_class_metrics(cm: &ConfusionMatrix) -> Vec<ClassMetrics> {
    let n = cm.classes.len();
    (0..n)
        .map(|i| {
            let tp = cm.matrix[i][i] as f64;
            let fp: f64 = (0..n).map(|r| cm.matrix[r][i] as f64).sum::<f64>() - tp;
            let fn_: f64 = cm.matrix[i].iter().sum::<usize>() as f64 - tp;
            let support = cm.matrix[i].iter().sum::<usize>();
            let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics { class_idx: cm.classes[i], precision, recall, f1, support }
        })
        .collect()
}

pub fn overall_accuracy(cm: &ConfusionMatrix) -> f64 {
    let total: usize = cm.matrix.iter().flatten().sum();
    if total == 0 {
        return 0.0;
    }
    let correct: usize = (0..cm.classes.len()).map(|i| cm.matrix[i][i]).sum();
    correct as f64 / total as f64
}

/// A degenerate single-point ROC/PR curve: the (false positive rate,
/// true positive rate) and (recall, precision) pair produced by the
/// classifier's one hard-label operating point per class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatingPoint {
    pub class_idx: u8,
    pub false_positive_rate: f64,
    pub true_positive_rate: f64,
    pub precision: f64,
    pub recall: f64,
}

pub fn operating_points(cm: &ConfusionMatrix) -> Vec<OperatingPoint> {
    let n = cm.classes.len();
    (0..n)
        .map(|i| {
            let tp = cm.matrix[i][i] as f64;
            let fn_ = cm.matrix[i].iter().sum::<usize>() as f64 - tp;
            let fp: f64 = (0..n).map(|r| cm.matrix[r][i] as f64).sum::<f64>() - tp;
            let tn = cm.matrix.iter().flatten().sum::<usize>() as f64 - tp - fn_ - fp;
            let tpr = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
            let fpr = if fp + tn > 0.0 { fp / (fp + tn) } else { 0.0 };
            let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
            OperatingPoint {
                class_idx: cm.classes[i],
                false_positive_rate: fpr,
                true_positive_rate: tpr,
                precision,
                recall: tpr,
            }
        })
        .collect()
}

/// A one-bin calibration table: observed accuracy at the classifier's
/// single operating point, per class. A meaningful multi-bin
/// calibration curve requires predicted probabilities, which the
/// classifier backend does not expose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationBin {
    pub class_idx: u8,
    pub predicted_rate: f64,
    pub observed_rate: f64,
    pub count: usize,
}

pub fn calibration_table(y_true: &[i32], y_pred: &[i32], classes: &[u8]) -> Vec<CalibrationBin> {
    classes
        .iter()
        .map(|&class_idx| {
            let predicted: Vec<bool> = y_pred.iter().map(|&p| p == class_idx as i32).collect();
            let count = predicted.iter().filter(|&&p| p).count();
            let observed = y_true
                .iter()
                .zip(predicted.iter())
                .filter(|(_, &pred)| pred)
                .filter(|(&t, _)| t == class_idx as i32)
                .count();
            let predicted_rate = if y_pred.is_empty() { 0.0 } else { count as f64 / y_pred.len() as f64 };
            let observed_rate = if count > 0 { observed as f64 / count as f64 } else { 0.0 };
            CalibrationBin { class_idx, predicted_rate, observed_rate, count }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature_name: String,
    pub accuracy_drop: f64,
}

/// Permutation importance: shuffles one feature column at a time in a
/// held-out matrix, re-predicts, and records the accuracy drop relative
/// to the unshuffled baseline.
pub fn permutation_importance(
    model: &GradientTreeClassifier,
    rows: &[Vec<f64>],
    y_true: &[i32],
    feature_names: &[&str],
    seed: u64,
) -> cfw_core::CfwResult<Vec<FeatureImportance>> {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    let baseline_x = crate::classifier::to_dense_matrix(rows)?;
    let baseline_preds = model.predict(&baseline_x)?;
    let baseline_accuracy = accuracy(y_true, &baseline_preds);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut results = Vec::with_capacity(feature_names.len());
    for (col_idx, &name) in feature_names.iter().enumerate() {
        let mut shuffled: Vec<Vec<f64>> = rows.to_vec();
        let mut column: Vec<f64> = shuffled.iter().map(|r| r[col_idx]).collect();
        column.shuffle(&mut rng);
        for (row, value) in shuffled.iter_mut().zip(column.into_iter()) {
            row[col_idx] = value;
        }
        let x = crate::classifier::to_dense_matrix(&shuffled)?;
        let preds = model.predict(&x)?;
        let shuffled_accuracy = accuracy(y_true, &preds);
        results.push(FeatureImportance {
            feature_name: name.to_string(),
            accuracy_drop: baseline_accuracy - shuffled_accuracy,
        });
    }
    Ok(results)
}

fn accuracy(y_true: &[i32], y_pred: &[i32]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(a, b)| a == b).count();
    correct as f64 / y_true.len() as f64
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningCurvePoint {
    pub n_estimators: u16,
    pub val_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsBundle {
    pub confusion_matrix: ConfusionMatrix,
    pub per_class_metrics: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub operating_points: Vec<OperatingPoint>,
    pub calibration: Vec<CalibrationBin>,
    pub feature_importance: Vec<FeatureImportance>,
    pub learning_curve: Vec<LearningCurvePoint>,
    pub cv_accuracy_mean: f64,
    pub cv_accuracy_std: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confusion_matrix_counts_match_totals() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 1, 1, 0];
        let cm = confusion_matrix(&y_true, &y_pred, &[0, 1]);
        let total: usize = cm.matrix.iter().flatten().sum();
        assert_eq!(total, 5);
    }

    #[test]
    fn perfect_predictions_give_accuracy_one() {
        let y_true = vec![0, 0, 1, 1];
        let cm = confusion_matrix(&y_true, &y_true, &[0, 1]);
        assert!((overall_accuracy(&cm) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn per_class_metrics_are_bounded_zero_to_one() {
        let y_true = vec![0, 0, 1, 1, 1];
        let y_pred = vec![0, 1, 1, 1, 0];
        let cm = confusion_matrix(&y_true, &y_pred, &[0, 1]);
        for metrics in per_class_metrics(&cm) {
            assert!((0.0..=1.0).contains(&metrics.precision));
            assert!((0.0..=1.0).contains(&metrics.recall));
            assert!((0.0..=1.0).contains(&metrics.f1));
        }
    }
}
