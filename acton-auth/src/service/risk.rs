//! Attempt risk scoring

use crate::domain::RiskLevel;
use crate::error::Result;

/// Scores an attempt from the recent failure count of its client
///
/// Successful attempts score 0. Failures scale linearly up to 100 when the
/// count reaches `threshold`.
#[derive(Debug, Clone, Copy)]
pub struct RiskAssessor {
    threshold: u32,
}

impl RiskAssessor {
    /// Create an assessor; a zero threshold is treated as 1
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
        }
    }

    /// Risk of an attempt given the client's failures in the current window
    pub fn assess(&self, success: bool, recent_failures: usize) -> Result<RiskLevel> {
        if success {
            return RiskLevel::low("Successful authentication");
        }
        let threshold = self.threshold as usize;
        let score = (recent_failures.saturating_mul(100) / threshold).min(100) as i32;
        RiskLevel::new(
            score,
            format!("{} recent failures from client", recent_failures),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RiskCategory;

    #[test]
    fn test_success_is_zero() {
        let risk = RiskAssessor::new(5).assess(true, 40).unwrap();
        assert_eq!(risk.score(), 0);
    }

    #[test]
    fn test_failures_scale_and_cap() {
        let assessor = RiskAssessor::new(5);
        assert_eq!(assessor.assess(false, 1).unwrap().score(), 20);
        assert_eq!(assessor.assess(false, 5).unwrap().score(), 100);
        assert_eq!(assessor.assess(false, 500).unwrap().score(), 100);
        assert_eq!(
            assessor.assess(false, 5).unwrap().category(),
            RiskCategory::from_score(100)
        );
    }
}
