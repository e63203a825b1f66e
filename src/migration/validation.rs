//! Consistency checks run between transformation and commit.

use crate::config::EmptyDiffPolicy;
use crate::filesystem::WorkTree;

/// Outcome of validating a transformed change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    Skip(String),
    Fail(String),
}

/// True if writing `transformed` over `baseline` would change nothing.
pub fn is_empty_diff(baseline: Option<&WorkTree>, transformed: &WorkTree) -> bool {
    match baseline {
        Some(baseline) => baseline == transformed,
        None => transformed.is_empty(),
    }
}

/// Apply the empty-diff policy.
pub fn check_empty_diff(
    policy: EmptyDiffPolicy,
    baseline: Option<&WorkTree>,
    transformed: &WorkTree,
) -> Verdict {
    if !is_empty_diff(baseline, transformed) {
        return Verdict::Proceed;
    }
    match policy {
        EmptyDiffPolicy::Allow => Verdict::Proceed,
        EmptyDiffPolicy::Skip => Verdict::Skip("Change does not modify the destination".to_string()),
        EmptyDiffPolicy::Fail => Verdict::Fail(
            "Change does not modify the destination (set empty_diff: skip or allow to accept this)"
                .to_string(),
        ),
    }
}
