//! Binary confusion matrix and per-class precision/recall/F1 over
//! `{Forest, NonForest}`. Hand-rolled rather than pulled from a metrics
//! crate: the matrix is a plain 2x2 count table, the same shape as a
//! `calculate_confusion_matrix` helper works elsewhere in this codebase
//! for a binary win/loss classifier.

use serde::Serialize;

pub const MISSING: u8 = 255;

#[derive(Debug, Clone, Serialize)]
pub struct ConfusionMatrix {
    /// `matrix[true_class][predicted_class]`, true/predicted in `{0=Forest, 1=NonForest}`.
    pub matrix: [[usize; 2]; 2],
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub class_idx: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Builds the matrix from two equal-length, pixel-aligned class
/// buffers already normalized to `{0, 1, 255}`. Pixels where either
/// side is `255` or outside `{0, 1}` (an ancillary class slipping
/// through) are excluded rather than counted as disagreement.
pub fn confusion_matrix(prediction: &[u8], reference: &[u8]) -> ConfusionMatrix {
    let mut matrix = [[0usize; 2]; 2];
    for (&p, &r) in prediction.iter().zip(reference.iter()) {
        if p > 1 || r > 1 {
            continue;
        }
        matrix[r as usize][p as usize] += 1;
    }
    ConfusionMatrix { matrix }
}

pub fn overall_accuracy(cm: &ConfusionMatrix) -> f64 {
    let total: usize = cm.matrix.iter().flatten().sum();
    if total == 0 {
        return 0.0;
    }
    let correct = cm.matrix[0][0] + cm.matrix[1][1];
    correct as f64 / total as f64
}

pub fn per_class_metrics(cm: &ConfusionMatrix) -> Vec<ClassMetrics> {
    (0..2u8)
        .map(|class| {
            let c = class as usize;
            let tp = cm.matrix[c][c];
            let fp: usize = (0..2).filter(|&t| t != c).map(|t| cm.matrix[t][c]).sum();
            let fn_: usize = (0..2).filter(|&p| p != c).map(|p| cm.matrix[c][p]).sum();
            let support = cm.matrix[c].iter().sum();
            let precision = if tp + fp == 0 { 0.0 } else { tp as f64 / (tp + fp) as f64 };
            let recall = if tp + fn_ == 0 { 0.0 } else { tp as f64 / (tp + fn_) as f64 };
            let f1 = if precision + recall == 0.0 { 0.0 } else { 2.0 * precision * recall / (precision + recall) };
            ClassMetrics { class_idx: class, precision, recall, f1, support }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_agreement_has_unit_accuracy() {
        let prediction = [0, 0, 1, 1];
        let reference = [0, 0, 1, 1];
        let cm = confusion_matrix(&prediction, &reference);
        assert_eq!(overall_accuracy(&cm), 1.0);
    }

    #[test]
    fn missing_and_ancillary_pixels_are_excluded() {
        let prediction = [0, 255, 3, 1];
        let reference = [0, 1, 1, 1];
        let cm = confusion_matrix(&prediction, &reference);
        let total: usize = cm.matrix.iter().flatten().sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn per_class_metrics_reflect_false_positives() {
        let prediction = [1, 1, 0, 0];
        let reference = [0, 1, 0, 1];
        let cm = confusion_matrix(&prediction, &reference);
        let metrics = per_class_metrics(&cm);
        let forest = metrics.iter().find(|m| m.class_idx == 0).unwrap();
        assert!((forest.precision - 1.0).abs() < 1e-9);
        assert!((forest.recall - 0.5).abs() < 1e-9);
    }
}
