//! The Split contract (spec §4.3): group-aware stratified splitting when
//! `split_method = feature` (no feature id spans more than one
//! partition, per-class proportions preserved to within one polygon per
//! class per partition), plain stratified-random splitting over rows
//! when `split_method = pixel`.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use cfw_core::{CfwError, CfwResult};

use crate::config::SplitMethod;

#[derive(Debug, Clone)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub val: Vec<usize>,
    pub test: Vec<usize>,
}

/// Splits `n` rows, each carrying a `group_id` (the feature id) and a
/// `label` (the class index), into train/val/test partitions.
pub fn split_rows(
    method: SplitMethod,
    group_ids: &[u64],
    labels: &[u8],
    test_fraction: f64,
    val_fraction: f64,
    random_state: u64,
) -> CfwResult<SplitIndices> {
    match method {
        SplitMethod::Feature => group_aware_stratified_split(group_ids, labels, test_fraction, val_fraction, random_state),
        SplitMethod::Pixel => stratified_random_split(labels, test_fraction, val_fraction, random_state),
    }
}

/// Groups rows by `group_id`, assigns each group the label shared by all
/// its rows (I1: a group id never spans more than one class), then
/// allocates whole groups to train/val/test stratified by that label.
fn group_aware_stratified_split(
    group_ids: &[u64],
    labels: &[u8],
    test_fraction: f64,
    val_fraction: f64,
    random_state: u64,
) -> CfwResult<SplitIndices> {
    let mut group_rows: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut group_label: HashMap<u64, u8> = HashMap::new();
    for (idx, (&group_id, &label)) in group_ids.iter().zip(labels.iter()).enumerate() {
        group_rows.entry(group_id).or_default().push(idx);
        match group_label.get(&group_id) {
            Some(existing) if *existing != label => {
                return Err(CfwError::Integrity(format!(
                    "feature id {group_id} maps to multiple classes in split input"
                )));
            }
            _ => {
                group_label.insert(group_id, label);
            }
        }
    }

    let mut by_label: HashMap<u8, Vec<u64>> = HashMap::new();
    for (&group_id, &label) in &group_label {
        by_label.entry(label).or_default().push(group_id);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    let mut train_groups = Vec::new();
    let mut val_groups = Vec::new();
    let mut test_groups = Vec::new();

    for (_, mut groups) in by_label {
        groups.sort_unstable();
        groups.shuffle(&mut rng);
        let n = groups.len();
        let n_test = ((n as f64) * test_fraction).round() as usize;
        let n_val = ((n as f64) * val_fraction).round() as usize;
        let n_test = n_test.min(n.saturating_sub(1));
        let n_val = n_val.min(n.saturating_sub(n_test).saturating_sub(1));

        test_groups.extend(groups[..n_test].iter().copied());
        val_groups.extend(groups[n_test..n_test + n_val].iter().copied());
        train_groups.extend(groups[n_test + n_val..].iter().copied());
    }

    let collect = |groups: &[u64]| -> Vec<usize> {
        let mut idxs: Vec<usize> = groups.iter().flat_map(|g| group_rows[g].clone()).collect();
        idxs.sort_unstable();
        idxs
    };

    Ok(SplitIndices {
        train: collect(&train_groups),
        val: collect(&val_groups),
        test: collect(&test_groups),
    })
}

/// Stratified random split directly over row indices, ignoring grouping.
fn stratified_random_split(
    labels: &[u8],
    test_fraction: f64,
    val_fraction: f64,
    random_state: u64,
) -> CfwResult<SplitIndices> {
    let mut by_label: HashMap<u8, Vec<usize>> = HashMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_label.entry(label).or_default().push(idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    let mut train = Vec::new();
    let mut val = Vec::new();
    let mut test = Vec::new();

    for (_, mut idxs) in by_label {
        idxs.shuffle(&mut rng);
        let n = idxs.len();
        let n_test = ((n as f64) * test_fraction).round() as usize;
        let n_val = ((n as f64) * val_fraction).round() as usize;
        let n_test = n_test.min(n.saturating_sub(1));
        let n_val = n_val.min(n.saturating_sub(n_test).saturating_sub(1));

        test.extend(idxs[..n_test].iter().copied());
        val.extend(idxs[n_test..n_test + n_val].iter().copied());
        train.extend(idxs[n_test + n_val..].iter().copied());
    }
    train.sort_unstable();
    val.sort_unstable();
    test.sort_unstable();
    Ok(SplitIndices { train, val, test })
}

/// Group-aware K-fold: distinct group ids are partitioned into `k`
/// folds, stratified by the group's label, then each fold's row indices
/// are derived by membership. Used for `split_method = feature`; the
/// same stratification logic (without grouping) covers `pixel`.
pub fn group_aware_k_folds(
    group_ids: &[u64],
    labels: &[u8],
    k: u32,
    random_state: u64,
) -> CfwResult<Vec<Vec<usize>>> {
    if k < 2 {
        return Err(CfwError::Config(format!("cv_folds must be >= 2, got {k}")));
    }
    let mut group_rows: HashMap<u64, Vec<usize>> = HashMap::new();
    let mut group_label: HashMap<u64, u8> = HashMap::new();
    for (idx, (&group_id, &label)) in group_ids.iter().zip(labels.iter()).enumerate() {
        group_rows.entry(group_id).or_default().push(idx);
        group_label.insert(group_id, label);
    }

    let mut by_label: HashMap<u8, Vec<u64>> = HashMap::new();
    for (&group_id, &label) in &group_label {
        by_label.entry(label).or_default().push(group_id);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(random_state);
    let mut fold_groups: Vec<Vec<u64>> = vec![Vec::new(); k as usize];
    for (_, mut groups) in by_label {
        groups.sort_unstable();
        groups.shuffle(&mut rng);
        for (i, group_id) in groups.into_iter().enumerate() {
            fold_groups[i % k as usize].push(group_id);
        }
    }

    Ok(fold_groups
        .into_iter()
        .map(|groups| {
            let mut idxs: Vec<usize> = groups.iter().flat_map(|g| group_rows[g].clone()).collect();
            idxs.sort_unstable();
            idxs
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_aware_split_never_spans_a_group_across_partitions() {
        let group_ids = vec![1, 1, 1, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 6];
        let labels = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 1, 1];
        let split = split_rows(SplitMethod::Feature, &group_ids, &labels, 0.2, 0.2, 7).unwrap();

        let group_of = |idx: usize| group_ids[idx];
        let train_groups: std::collections::HashSet<u64> = split.train.iter().map(|&i| group_of(i)).collect();
        let val_groups: std::collections::HashSet<u64> = split.val.iter().map(|&i| group_of(i)).collect();
        let test_groups: std::collections::HashSet<u64> = split.test.iter().map(|&i| group_of(i)).collect();

        assert!(train_groups.is_disjoint(&val_groups));
        assert!(train_groups.is_disjoint(&test_groups));
        assert!(val_groups.is_disjoint(&test_groups));
    }

    #[test]
    fn group_split_is_deterministic_for_fixed_seed() {
        let group_ids = vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6];
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 1, 1];
        let a = split_rows(SplitMethod::Feature, &group_ids, &labels, 0.2, 0.2, 99).unwrap();
        let b = split_rows(SplitMethod::Feature, &group_ids, &labels, 0.2, 0.2, 99).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.val, b.val);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn k_folds_partition_every_group_exactly_once() {
        let group_ids = vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6];
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1, 0, 0, 1, 1];
        let folds = group_aware_k_folds(&group_ids, &labels, 3, 11).unwrap();
        assert_eq!(folds.len(), 3);
        let total: usize = folds.iter().map(|f| f.len()).sum();
        assert_eq!(total, group_ids.len());
    }

    #[test]
    fn rejects_fewer_than_two_folds() {
        assert!(group_aware_k_folds(&[1, 2], &[0, 1], 1, 0).is_err());
    }
}
