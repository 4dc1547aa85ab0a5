// regression.rs — Regression detection.
//
// Two forms:
//
// - Baseline comparison: the current score against the stored baseline for
//   the same fingerprint. A drop beyond the tolerance, or any band/action
//   ordering decrease, is a regression. An action downgrade is the hard
//   threshold that demands acknowledgment.
//
// - Confidence sweep: a monotonically increasing list of synthetic
//   confidence inputs, each evaluated through policy + governor. The
//   decision sequence must be monotonic non-decreasing in permissiveness;
//   any adjacent violation suspends the fingerprint.

use serde::{Deserialize, Serialize};

use gov_confidence::{Band, ConfidenceScore, RecommendedAction};
use gov_governor::OverallOutcome;

use crate::baseline::BaselineRecord;

/// The comparable part of a confidence result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreSummary {
    pub score: u32,
    pub band: Band,
    pub action: RecommendedAction,
}

impl From<&ConfidenceScore> for ScoreSummary {
    fn from(score: &ConfidenceScore) -> Self {
        Self {
            score: score.score,
            band: score.band,
            action: score.action,
        }
    }
}

impl From<&BaselineRecord> for ScoreSummary {
    fn from(record: &BaselineRecord) -> Self {
        Self {
            score: record.score,
            band: record.band,
            action: record.action,
        }
    }
}

/// The verdict of a baseline comparison.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegressionResult {
    pub regressed: bool,
    /// True when the drop crossed the hard threshold (action downgrade) —
    /// the caller must not proceed without an explicit acknowledgment.
    pub requires_ack: bool,
    pub from: ScoreSummary,
    pub to: ScoreSummary,
    pub tolerance: u32,
}

/// Compare a current score against the previous baseline.
///
/// A score drop of exactly `tolerance` points is NOT a regression;
/// `tolerance + 1` is. Band or action ordering decreases are regressions
/// even when the numeric drop is within tolerance.
pub fn compare_confidence(
    previous: ScoreSummary,
    current: ScoreSummary,
    tolerance: u32,
) -> RegressionResult {
    let drop = previous.score.saturating_sub(current.score);
    let band_downgrade = current.band.rank() < previous.band.rank();
    let action_downgrade = current.action.rank() < previous.action.rank();

    RegressionResult {
        regressed: drop > tolerance || band_downgrade || action_downgrade,
        requires_ack: action_downgrade,
        from: previous,
        to: current,
        tolerance,
    }
}

/// One point of a confidence sweep: the synthetic confidence input and the
/// overall decision the pipeline produced for it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepPoint {
    pub confidence: u32,
    pub outcome: OverallOutcome,
}

/// An adjacent pair whose ordering went backwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SweepViolation {
    /// The confidence at which the decision became less permissive.
    pub at_confidence: u32,
    pub from: String,
    pub to: String,
}

/// Check a sweep (assumed sorted by ascending confidence) for ordering
/// violations. An empty result means the sweep is monotonic.
pub fn check_sweep(points: &[SweepPoint]) -> Vec<SweepViolation> {
    let mut violations = Vec::new();
    for pair in points.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.outcome.permissiveness() < prev.outcome.permissiveness() {
            violations.push(SweepViolation {
                at_confidence: next.confidence,
                from: prev.outcome.label().to_string(),
                to: next.outcome.label().to_string(),
            });
        }
    }
    violations
}
