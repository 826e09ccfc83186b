//! The five named temporal reduction algorithms for the Composite
//! Builder (spec §4.6), each operating on `valid(v)` — the subsequence
//! of a pixel's ordered monthly class indices with ancillary classes
//! already mapped to missing and `255` entries dropped.

use std::collections::HashMap;

/// Missing/nodata sentinel, shared with the Prediction Raster convention.
pub const MISSING: u8 = 255;

/// `NonForest` always occupies index 1 in a `ClassRegistry` (spec §3),
/// so every tie-break can reference it directly without a name lookup.
const NON_FOREST: u8 = 1;

pub trait TemporalAlgorithm: Send + Sync {
    fn name(&self) -> &'static str;
    /// Minimum number of valid entries required to emit a non-missing label.
    fn min_valid(&self) -> usize;
    /// Reduces one pixel's `valid(v)` to a single annual label. Only
    /// called when `valid.len() >= min_valid()`.
    fn reduce(&self, valid: &[u8]) -> u8;
}

/// Mode of `values`, ties broken toward `NonForest` when it is among
/// the tied candidates, otherwise toward the lowest class index.
fn mode_tie_break_non_forest(values: &[u8]) -> u8 {
    let mut counts: HashMap<u8, usize> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let max_count = *counts.values().max().expect("values is non-empty");
    let mut candidates: Vec<u8> = counts.iter().filter(|&(_, &c)| c == max_count).map(|(&k, _)| k).collect();
    candidates.sort_unstable();
    if candidates.contains(&NON_FOREST) {
        NON_FOREST
    } else {
        candidates[0]
    }
}

fn trailing_run_length(valid: &[u8]) -> usize {
    match valid.last() {
        None => 0,
        Some(&last) => valid.iter().rev().take_while(|&&v| v == last).count(),
    }
}

fn purity(values: &[u8]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<u8, usize> = HashMap::new();
    for &v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    let max = *counts.values().max().expect("values is non-empty");
    max as f64 / values.len() as f64
}

pub struct MajorityVote;

impl TemporalAlgorithm for MajorityVote {
    fn name(&self) -> &'static str {
        "majority_vote"
    }
    fn min_valid(&self) -> usize {
        2
    }
    fn reduce(&self, valid: &[u8]) -> u8 {
        mode_tie_break_non_forest(valid)
    }
}

pub struct LatestValid;

impl TemporalAlgorithm for LatestValid {
    fn name(&self) -> &'static str {
        "latest_valid"
    }
    fn min_valid(&self) -> usize {
        1
    }
    fn reduce(&self, valid: &[u8]) -> u8 {
        *valid.last().expect("valid is non-empty")
    }
}

pub struct WeightedTemporal;

impl TemporalAlgorithm for WeightedTemporal {
    fn name(&self) -> &'static str {
        "weighted_temporal"
    }
    fn min_valid(&self) -> usize {
        2
    }
    /// `w_i = i / |v|`, so later months (higher `i`, 1-indexed) carry
    /// more weight. Ties broken the same way as the plain mode.
    fn reduce(&self, valid: &[u8]) -> u8 {
        let n = valid.len();
        let mut weights: HashMap<u8, f64> = HashMap::new();
        for (i, &v) in valid.iter().enumerate() {
            let w = (i + 1) as f64 / n as f64;
            *weights.entry(v).or_insert(0.0) += w;
        }
        let max_weight = weights.values().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut candidates: Vec<u8> = weights
            .iter()
            .filter(|&(_, &w)| (w - max_weight).abs() < 1e-9)
            .map(|(&k, _)| k)
            .collect();
        candidates.sort_unstable();
        if candidates.contains(&NON_FOREST) {
            NON_FOREST
        } else {
            candidates[0]
        }
    }
}

pub struct TemporalTrend;

impl TemporalAlgorithm for TemporalTrend {
    fn name(&self) -> &'static str {
        "temporal_trend"
    }
    fn min_valid(&self) -> usize {
        3
    }
    fn reduce(&self, valid: &[u8]) -> u8 {
        if trailing_run_length(valid) >= 2 {
            *valid.last().expect("valid is non-empty")
        } else {
            mode_tie_break_non_forest(valid)
        }
    }
}

/// Minimum purity improvement a split must achieve for `change_point`
/// to trust the later segment's label over the overall majority.
const DEFAULT_PURITY_GAIN_THRESHOLD: f64 = 0.2;

pub struct ChangePoint {
    pub purity_gain_threshold: f64,
}

impl Default for ChangePoint {
    fn default() -> Self {
        Self { purity_gain_threshold: DEFAULT_PURITY_GAIN_THRESHOLD }
    }
}

impl TemporalAlgorithm for ChangePoint {
    fn name(&self) -> &'static str {
        "change_point"
    }
    fn min_valid(&self) -> usize {
        4
    }
    /// Finds the split index maximizing label purity on each side; if
    /// the purity gain over the unsplit vector exceeds the threshold,
    /// emits the later segment's majority label, else falls back to
    /// the overall majority.
    fn reduce(&self, valid: &[u8]) -> u8 {
        let n = valid.len();
        if n < 2 {
            return mode_tie_break_non_forest(valid);
        }
        let overall_purity = purity(valid);
        let mut best_gain = f64::NEG_INFINITY;
        let mut best_split = 0;
        for split in 1..n {
            let (left, right) = valid.split_at(split);
            let weighted_purity = (left.len() as f64 * purity(left) + right.len() as f64 * purity(right)) / n as f64;
            let gain = weighted_purity - overall_purity;
            if gain > best_gain {
                best_gain = gain;
                best_split = split;
            }
        }
        if best_gain > self.purity_gain_threshold {
            mode_tie_break_non_forest(&valid[best_split..])
        } else {
            mode_tie_break_non_forest(valid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn majority_vote_literal_scenario() {
        let v = [0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        assert_eq!(MajorityVote.reduce(&v), 1);
    }

    #[test]
    fn majority_vote_ties_go_to_non_forest() {
        let v = [0, 0, 1, 1];
        assert_eq!(MajorityVote.reduce(&v), 1);
    }

    #[test]
    fn temporal_trend_short_tail_falls_back_to_majority() {
        let valid = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert_eq!(TemporalTrend.reduce(&valid), 0);
    }

    #[test]
    fn temporal_trend_tail_run_of_two_wins() {
        let valid = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1];
        assert_eq!(TemporalTrend.reduce(&valid), 1);
    }

    #[test]
    fn latest_valid_literal_scenario() {
        let valid = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert_eq!(LatestValid.reduce(&valid), 0);
    }

    #[test]
    fn change_point_literal_scenario() {
        let v = [0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1];
        assert_eq!(ChangePoint::default().reduce(&v), 1);
    }

    #[test]
    fn change_point_below_threshold_falls_back_to_majority() {
        let v = [0, 0, 0, 1, 0, 0, 0, 0];
        let algo = ChangePoint::default();
        assert_eq!(algo.reduce(&v), 0);
    }

    #[test]
    fn min_valid_thresholds_match_each_algorithm() {
        assert_eq!(MajorityVote.min_valid(), 2);
        assert_eq!(LatestValid.min_valid(), 1);
        assert_eq!(WeightedTemporal.min_valid(), 2);
        assert_eq!(TemporalTrend.min_valid(), 3);
        assert_eq!(ChangePoint::default().min_valid(), 4);
    }
}
