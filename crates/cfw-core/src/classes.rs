//! Project-wide class ordering.
//!
//! Class indices must stay stable across runs (spec §3): target classes
//! come first in project-declared order, ancillary classes occupy fixed
//! trailing slots regardless of whether a given project uses them.

use crate::error::{CfwError, CfwResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A stable class index. `255` is reserved for "missing" and is never
/// assigned to a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ClassIdx(pub u8);

impl ClassIdx {
    pub const MISSING: ClassIdx = ClassIdx(255);

    pub fn is_missing(self) -> bool {
        self.0 == 255
    }
}

/// Reserved ancillary classes, in the fixed order they occupy trailing
/// slots after the project's target classes.
pub const ANCILLARY_CLASSES: &[&str] = &["Cloud", "Shadow", "Water", "Haze", "SensorError"];

/// The project-wide, order-stable mapping from class name to class index.
///
/// `Forest` and `NonForest` always occupy indices 0 and 1 so the
/// Composite Builder's algorithms (spec §4.6) can reason about them
/// without a name lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassRegistry {
    order: Vec<String>,
    by_name: HashMap<String, ClassIdx>,
}

impl ClassRegistry {
    /// Build a registry from the project's target class order. `Forest`
    /// and `NonForest` are required; at least one other target class may
    /// be present. Ancillary classes are appended automatically.
    pub fn new(target_classes: &[String]) -> CfwResult<Self> {
        if target_classes.len() < 2 {
            return Err(CfwError::Config(format!(
                "class_order must declare at least 2 target classes, got {}",
                target_classes.len()
            )));
        }
        if target_classes[0] != "Forest" || target_classes[1] != "NonForest" {
            return Err(CfwError::Config(
                "class_order must begin with [\"Forest\", \"NonForest\"]".to_string(),
            ));
        }
        let mut order: Vec<String> = target_classes.to_vec();
        let mut seen: std::collections::HashSet<&str> =
            order.iter().map(String::as_str).collect();
        if seen.len() != order.len() {
            return Err(CfwError::Config("class_order contains duplicates".into()));
        }
        for ancillary in ANCILLARY_CLASSES {
            if !seen.insert(ancillary) {
                return Err(CfwError::Config(format!(
                    "class_order must not redeclare reserved class '{ancillary}'"
                )));
            }
            order.push((*ancillary).to_string());
        }
        if order.len() > 255 {
            return Err(CfwError::Config("too many classes for a u8 index".into()));
        }
        let by_name = order
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), ClassIdx(idx as u8)))
            .collect();
        Ok(Self { order, by_name })
    }

    pub fn index_of(&self, name: &str) -> Option<ClassIdx> {
        self.by_name.get(name).copied()
    }

    pub fn name_of(&self, idx: ClassIdx) -> Option<&str> {
        self.order.get(idx.0 as usize).map(String::as_str)
    }

    /// `true` for the reserved ancillary classes (Cloud/Shadow/Water/Haze/SensorError).
    pub fn is_ancillary(&self, idx: ClassIdx) -> bool {
        self.name_of(idx)
            .map(|name| ANCILLARY_CLASSES.contains(&name))
            .unwrap_or(false)
    }

    pub fn target_classes(&self) -> &[String] {
        &self.order[..self.order.len() - ANCILLARY_CLASSES.len()]
    }

    pub fn all_classes(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Reduce to only the classes actually observed, preserving relative
    /// order. Used by the Trainer when a partition has zero rows of some
    /// label (spec §4.3 failure case a).
    pub fn reduced_to(&self, observed: &[ClassIdx]) -> CfwResult<Self> {
        let observed_names: Vec<String> = self
            .order
            .iter()
            .enumerate()
            .filter(|(idx, _)| observed.contains(&ClassIdx(*idx as u8)))
            .map(|(_, name)| name.clone())
            .collect();
        let targets: Vec<String> = observed_names
            .iter()
            .filter(|n| !ANCILLARY_CLASSES.contains(&n.as_str()))
            .cloned()
            .collect();
        ClassRegistry::new(&targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ClassRegistry {
        ClassRegistry::new(&["Forest".into(), "NonForest".into(), "Wetland".into()]).unwrap()
    }

    #[test]
    fn forest_and_non_forest_are_stable_indices() {
        let reg = sample();
        assert_eq!(reg.index_of("Forest"), Some(ClassIdx(0)));
        assert_eq!(reg.index_of("NonForest"), Some(ClassIdx(1)));
    }

    #[test]
    fn ancillary_classes_occupy_trailing_slots() {
        let reg = sample();
        for name in ANCILLARY_CLASSES {
            assert!(reg.index_of(name).is_some());
            assert!(reg.is_ancillary(reg.index_of(name).unwrap()));
        }
        assert!(!reg.is_ancillary(ClassIdx(0)));
    }

    #[test]
    fn rejects_fewer_than_two_target_classes() {
        assert!(ClassRegistry::new(&["Forest".into()]).is_err());
    }

    #[test]
    fn rejects_reserved_name_collision() {
        let err = ClassRegistry::new(&["Forest".into(), "NonForest".into(), "Cloud".into()]);
        assert!(err.is_err());
    }

    #[test]
    fn missing_index_is_255() {
        assert!(ClassIdx::MISSING.is_missing());
        assert!(!ClassIdx(0).is_missing());
    }
}
