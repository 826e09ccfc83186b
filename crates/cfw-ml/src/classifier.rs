//! `GradientTreeClassifier`: a thin wrapper over
//! `smartcore::ensemble::random_forest_classifier`, the one real,
//! already-demonstrated tree-ensemble classifier crate available for
//! this task (no Rust XGBoost binding exists in the retrieved
//! ecosystem). Hyperparameters map from `ModelHyperparameters`;
//! `max_depth`/`min_child_weight` approximate XGBoost's tree-shape
//! knobs through smartcore's own tree-depth and leaf-size controls.

use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_classifier::{RandomForestClassifier, RandomForestClassifierParameters};
use smartcore::linalg::basic::matrix::DenseMatrix;

use cfw_core::{CfwError, CfwResult};

use crate::config::ModelHyperparameters;

type Model = RandomForestClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

#[derive(Serialize, Deserialize)]
pub struct GradientTreeClassifier {
    model: Model,
}

fn build_params(hyperparameters: &ModelHyperparameters, n_estimators: u16) -> RandomForestClassifierParameters {
    RandomForestClassifierParameters::default()
        .with_n_trees(n_estimators as u16)
        .with_max_depth(hyperparameters.max_depth as u16)
        .with_min_samples_leaf(hyperparameters.min_child_weight.max(1.0) as usize)
        .with_min_samples_split(2)
        .with_keep_samples(false)
}

impl GradientTreeClassifier {
    /// Fits a forest of `n_estimators` trees. Called repeatedly with an
    /// increasing `n_estimators` by the Trainer's early-stopping
    /// schedule, since smartcore does not support incremental fitting.
    pub fn fit(
        x: &DenseMatrix<f64>,
        y: &[i32],
        hyperparameters: &ModelHyperparameters,
        n_estimators: u16,
    ) -> CfwResult<Self> {
        let params = build_params(hyperparameters, n_estimators);
        let model = RandomForestClassifier::fit(x, &y.to_vec(), params)
            .map_err(|e| CfwError::Model(format!("random forest fit failed: {e}")))?;
        Ok(Self { model })
    }

    pub fn predict(&self, x: &DenseMatrix<f64>) -> CfwResult<Vec<i32>> {
        self.model
            .predict(x)
            .map_err(|e| CfwError::Model(format!("random forest predict failed: {e}")))
    }
}

/// Builds a `DenseMatrix` from row-major feature rows, the layout
/// `cfw-features::FeatureEngineer::transform` produces.
pub fn to_dense_matrix(rows: &[Vec<f64>]) -> CfwResult<DenseMatrix<f64>> {
    if rows.is_empty() {
        return Err(CfwError::Model("cannot build a feature matrix from zero rows".into()));
    }
    let n_cols = rows[0].len();
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    DenseMatrix::new(rows.len(), n_cols, flat, false)
        .map_err(|e| CfwError::Model(format!("failed to build feature matrix: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_rows() -> Vec<Vec<f64>> {
        vec![
            vec![0.1, 0.1],
            vec![0.2, 0.1],
            vec![0.9, 0.9],
            vec![0.8, 0.8],
            vec![0.1, 0.2],
            vec![0.9, 0.8],
        ]
    }

    #[test]
    fn fits_and_predicts_a_separable_toy_dataset() {
        let rows = toy_rows();
        let labels = vec![0, 0, 1, 1, 0, 1];
        let x = to_dense_matrix(&rows).unwrap();
        let hp = ModelHyperparameters::default();
        let classifier = GradientTreeClassifier::fit(&x, &labels, &hp, 20).unwrap();
        let preds = classifier.predict(&x).unwrap();
        assert_eq!(preds.len(), labels.len());
    }

    #[test]
    fn rejects_empty_feature_matrix() {
        assert!(to_dense_matrix(&[]).is_err());
    }
}
