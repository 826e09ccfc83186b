//! The Monthly Model bundle: `MonthlyModelMeta` (schema-versioned,
//! human-readable JSON) plus the fitted classifier (opaque, bincode).
//! Round-trips exactly (P6): `serialize(M) → deserialize` predicts
//! identically to `M` on a held-out batch, since bincode encodes the
//! classifier's own state rather than re-deriving it from hyperparameters.

use std::path::Path;

use cfw_core::model::MonthlyModelMeta;
use cfw_core::{CfwError, CfwResult};

use crate::classifier::GradientTreeClassifier;

const META_FILE: &str = "model_meta.json";
const CLASSIFIER_FILE: &str = "model.bin";

pub struct MonthlyModelBundle {
    pub meta: MonthlyModelMeta,
    pub classifier: GradientTreeClassifier,
}

impl MonthlyModelBundle {
    /// Writes `model_meta.json` and `model.bin` under `dir` (the run's
    /// `saved_models/` directory for this month).
    pub fn save(&self, dir: &Path) -> CfwResult<()> {
        std::fs::create_dir_all(dir).map_err(CfwError::Io)?;
        let meta_json = serde_json::to_vec_pretty(&self.meta)?;
        std::fs::write(dir.join(META_FILE), meta_json).map_err(CfwError::Io)?;

        let encoded = bincode::serialize(&self.classifier)
            .map_err(|e| CfwError::Integrity(format!("failed to encode model bundle: {e}")))?;
        std::fs::write(dir.join(CLASSIFIER_FILE), encoded).map_err(CfwError::Io)?;
        Ok(())
    }

    pub fn load(dir: &Path) -> CfwResult<Self> {
        let meta_json = std::fs::read(dir.join(META_FILE)).map_err(CfwError::Io)?;
        let meta: MonthlyModelMeta = serde_json::from_slice(&meta_json)?;

        let encoded = std::fs::read(dir.join(CLASSIFIER_FILE)).map_err(CfwError::Io)?;
        let classifier: GradientTreeClassifier = bincode::deserialize(&encoded)
            .map_err(|e| CfwError::Integrity(format!("failed to decode model bundle: {e}")))?;

        Ok(Self { meta, classifier })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::to_dense_matrix;
    use crate::config::ModelHyperparameters;
    use cfw_core::classes::ClassIdx;

    fn sample_meta() -> MonthlyModelMeta {
        MonthlyModelMeta {
            schema_version: 1,
            run_id: "r1".into(),
            month: cfw_core::model::MonthTag::parse("2024-03").unwrap(),
            feature_extractors: vec!["ndvi".into()],
            class_map: vec![("Forest".into(), ClassIdx(0)), ("NonForest".into(), ClassIdx(1))],
            hyperparameters: serde_json::json!({}),
            feature_set_hash: "abc123".into(),
        }
    }

    #[test]
    fn bundle_round_trips_and_predicts_identically() {
        let tmp = tempfile::tempdir().unwrap();
        let rows = vec![
            vec![0.1, 0.1],
            vec![0.9, 0.9],
            vec![0.2, 0.1],
            vec![0.8, 0.9],
        ];
        let labels = vec![0, 1, 0, 1];
        let x = to_dense_matrix(&rows).unwrap();
        let classifier = GradientTreeClassifier::fit(&x, &labels, &ModelHyperparameters::default(), 10).unwrap();
        let before = classifier.predict(&x).unwrap();

        let bundle = MonthlyModelBundle { meta: sample_meta(), classifier };
        bundle.save(tmp.path()).unwrap();

        let loaded = MonthlyModelBundle::load(tmp.path()).unwrap();
        let after = loaded.classifier.predict(&x).unwrap();
        assert_eq!(before, after);
        assert_eq!(loaded.meta.run_id, "r1");
    }
}
