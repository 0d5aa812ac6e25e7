//! Reserve amounts and the priority-tier policy.
//!
//! Tier selection is a pure function of the predicted reserve with strict
//! greater-than comparisons at both thresholds: a reserve of exactly $80,000
//! is HIGH, not CRITICAL, and exactly $60,000 is ROUTINE.

use serde::Serialize;

/// Reserves above this are CRITICAL.
pub const CRITICAL_ABOVE: f64 = 80_000.0;

/// Reserves above this (and at or below [`CRITICAL_ABOVE`]) are HIGH.
pub const HIGH_ABOVE: f64 = 60_000.0;

/// A predicted monetary reserve, in dollars.
///
/// Regression margins can in principle come out negative; a reserve cannot,
/// so construction clamps at zero and keeps the raw margin available for
/// attribution-fidelity checks.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ReserveEstimate {
    amount: f64,
    raw_margin: f64,
}

impl ReserveEstimate {
    pub fn from_margin(margin: f64) -> Self {
        Self {
            amount: margin.max(0.0),
            raw_margin: margin,
        }
    }

    /// Clamped, display-ready dollar amount. Never negative.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// The unclamped model output that attributions sum to.
    pub fn raw_margin(&self) -> f64 {
        self.raw_margin
    }

    pub fn tier(&self) -> PriorityTier {
        PriorityTier::from_reserve(self.amount)
    }
}

/// Coarse severity bucket derived from the predicted reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PriorityTier {
    Critical,
    High,
    Routine,
}

impl PriorityTier {
    /// Threshold policy: `> 80_000` CRITICAL, `> 60_000` HIGH, else ROUTINE.
    pub fn from_reserve(amount: f64) -> Self {
        if amount > CRITICAL_ABOVE {
            Self::Critical
        } else if amount > HIGH_ABOVE {
            Self::High
        } else {
            Self::Routine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "CRITICAL",
            Self::High => "HIGH",
            Self::Routine => "ROUTINE",
        }
    }

    /// Adjuster-facing assessment text for this tier.
    pub fn assessment(&self) -> &'static str {
        match self {
            Self::Critical => {
                "Catastrophic event detected (likely amputation or multi-system trauma)."
            }
            Self::High => "Serious injury involving prolonged hospitalization.",
            Self::Routine => "Standard severe injury within baseline OSHA parameters.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_use_strict_greater_than() {
        assert_eq!(PriorityTier::from_reserve(80_001.0), PriorityTier::Critical);
        assert_eq!(PriorityTier::from_reserve(80_000.0), PriorityTier::High);
        assert_eq!(PriorityTier::from_reserve(60_001.0), PriorityTier::High);
        assert_eq!(PriorityTier::from_reserve(60_000.0), PriorityTier::Routine);
    }

    #[test]
    fn extremes_classify() {
        assert_eq!(PriorityTier::from_reserve(0.0), PriorityTier::Routine);
        assert_eq!(
            PriorityTier::from_reserve(1_000_000.0),
            PriorityTier::Critical
        );
    }

    #[test]
    fn negative_margin_clamps_to_zero() {
        let est = ReserveEstimate::from_margin(-1523.7);
        assert_eq!(est.amount(), 0.0);
        assert_eq!(est.raw_margin(), -1523.7);
        assert_eq!(est.tier(), PriorityTier::Routine);
    }

    #[test]
    fn positive_margin_passes_through() {
        let est = ReserveEstimate::from_margin(72_500.25);
        assert_eq!(est.amount(), 72_500.25);
        assert_eq!(est.tier(), PriorityTier::High);
    }

    #[test]
    fn tier_labels_and_assessments() {
        assert_eq!(PriorityTier::Critical.as_str(), "CRITICAL");
        assert!(PriorityTier::High.assessment().contains("hospitalization"));
        assert!(PriorityTier::Routine.assessment().contains("OSHA"));
    }
}
