//! The stage selector: `training | tuning | composites | cfw-processing
//! | benchmarks | all`. The orchestrator itself is single-threaded and
//! sequences stages by dependency; parallelism lives inside
//! [`crate::runner::run_units`] for each stage's own units.

use cfw_core::{CfwError, CfwResult};

use crate::runner::BatchSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSelector {
    Training,
    Tuning,
    Composites,
    CfwProcessing,
    Benchmarks,
    All,
}

impl StageSelector {
    pub fn parse(value: &str) -> CfwResult<Self> {
        match value {
            "training" => Ok(Self::Training),
            "tuning" => Ok(Self::Tuning),
            "composites" => Ok(Self::Composites),
            "cfw-processing" => Ok(Self::CfwProcessing),
            "benchmarks" => Ok(Self::Benchmarks),
            "all" => Ok(Self::All),
            other => Err(CfwError::Config(format!(
                "unknown stage '{other}'; expected one of training, tuning, composites, cfw-processing, benchmarks, all"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Tuning => "tuning",
            Self::Composites => "composites",
            Self::CfwProcessing => "cfw-processing",
            Self::Benchmarks => "benchmarks",
            Self::All => "all",
        }
    }

    /// The component stages `all` runs, in the fixed order the external
    /// interface declares: training, then composites, then
    /// cfw-processing, then benchmarks.
    pub fn sequence(&self) -> Vec<StageSelector> {
        match self {
            Self::All => vec![Self::Training, Self::Composites, Self::CfwProcessing, Self::Benchmarks],
            other => vec![*other],
        }
    }
}

/// Runs each stage in `selector.sequence()` by invoking `build_and_run`
/// with the stage's name; a stage that returns an `Err` (an
/// integrity/config abort, not a unit failure) stops the whole
/// sequence immediately, matching the propagation policy for
/// non-retriable errors.
pub fn run_selected(
    selector: StageSelector,
    mut build_and_run: impl FnMut(StageSelector) -> CfwResult<BatchSummary>,
) -> CfwResult<Vec<BatchSummary>> {
    let mut summaries = Vec::new();
    for stage in selector.sequence() {
        let summary = build_and_run(stage)?;
        summaries.push(summary);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_expands_to_the_declared_order() {
        let sequence = StageSelector::All.sequence();
        assert_eq!(
            sequence,
            vec![StageSelector::Training, StageSelector::Composites, StageSelector::CfwProcessing, StageSelector::Benchmarks]
        );
    }

    #[test]
    fn unknown_stage_name_is_a_config_error() {
        assert!(matches!(StageSelector::parse("bogus"), Err(CfwError::Config(_))));
    }

    #[test]
    fn tuning_is_not_part_of_all() {
        assert!(!StageSelector::All.sequence().contains(&StageSelector::Tuning));
    }
}
