//! Callable assertions for the data-model invariants of spec §3 (I1-I4).
//! Stages call these at their write boundary instead of re-deriving the
//! checks ad hoc; a violation is always `CfwError::Integrity`.

use std::collections::HashMap;

use crate::classes::ClassIdx;
use crate::error::{CfwError, CfwResult};

/// I1/P2: every Pixel Cache row's group id (feature id) must map to
/// exactly one class index across the whole cache.
pub fn check_group_to_single_class(rows: &[(u64, ClassIdx)]) -> CfwResult<()> {
    let mut seen: HashMap<u64, ClassIdx> = HashMap::new();
    for &(group_id, class_idx) in rows {
        match seen.get(&group_id) {
            Some(existing) if *existing != class_idx => {
                return Err(CfwError::Integrity(format!(
                    "feature id {group_id} maps to multiple classes ({existing:?} and {class_idx:?})"
                )));
            }
            _ => {
                seen.insert(group_id, class_idx);
            }
        }
    }
    Ok(())
}

/// P1: the feature-extractor list recorded in a Monthly Model must
/// byte-equal the list used at prediction time.
pub fn check_extractor_lists_match(trained: &[String], predicting: &[String]) -> CfwResult<()> {
    if trained != predicting {
        return Err(CfwError::Integrity(format!(
            "feature extractor list mismatch: trained with {trained:?}, predicting with {predicting:?}"
        )));
    }
    Ok(())
}

/// I3: a Composite built from month set `M` requires exactly `|M|`
/// Prediction Rasters to exist at composite time.
pub fn check_composite_input_count(expected: usize, found: usize) -> CfwResult<()> {
    if expected != found {
        return Err(CfwError::Integrity(format!(
            "composite requires {expected} prediction rasters, found {found}"
        )));
    }
    Ok(())
}

/// I4: a registered STAC item's raster checksum must match the asset at
/// the object-store URL.
pub fn check_checksum_matches(registered: &str, actual: &str) -> CfwResult<()> {
    if registered != actual {
        return Err(CfwError::Integrity(format!(
            "STAC item checksum {registered} does not match asset checksum {actual}"
        )));
    }
    Ok(())
}

/// P3: every pixel in a Prediction Raster is either a declared class index
/// or the `255` missing sentinel.
pub fn check_raster_values_in_palette(values: &[u8], num_classes: usize) -> CfwResult<()> {
    for &v in values {
        if v != 255 && v as usize >= num_classes {
            return Err(CfwError::Integrity(format!(
                "pixel value {v} is outside the declared palette of {num_classes} classes"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_to_single_class_passes_when_consistent() {
        let rows = vec![(1, ClassIdx(0)), (1, ClassIdx(0)), (2, ClassIdx(1))];
        assert!(check_group_to_single_class(&rows).is_ok());
    }

    #[test]
    fn group_to_single_class_fails_on_conflict() {
        let rows = vec![(1, ClassIdx(0)), (1, ClassIdx(1))];
        assert!(check_group_to_single_class(&rows).is_err());
    }

    #[test]
    fn extractor_list_mismatch_is_fatal() {
        let trained = vec!["ndvi".to_string(), "evi".to_string()];
        let predicting = vec!["ndvi".to_string()];
        assert!(check_extractor_lists_match(&trained, &predicting).is_err());
        assert!(check_extractor_lists_match(&trained, &trained).is_ok());
    }

    #[test]
    fn composite_input_count_must_match_exactly() {
        assert!(check_composite_input_count(12, 12).is_ok());
        assert!(check_composite_input_count(12, 11).is_err());
    }

    #[test]
    fn raster_values_must_stay_in_palette() {
        assert!(check_raster_values_in_palette(&[0, 1, 255], 2).is_ok());
        assert!(check_raster_values_in_palette(&[0, 7, 255], 2).is_err());
    }
}
