//! Risk annotation attached to recorded attempts

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Coarse risk bucket derived from a 0–100 score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskCategory {
    /// 0–25
    Low,
    /// 26–50
    Medium,
    /// 51–75
    High,
    /// 76–100
    Critical,
}

impl RiskCategory {
    /// Category for a score already known to be within 0–100
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=25 => Self::Low,
            26..=50 => Self::Medium,
            51..=75 => Self::High,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Risk score, its derived category, and the reason it was assigned
///
/// Deserialization goes through [`RiskLevel::new`], so a stored level with an
/// out-of-range score, a blank reason, or a category that disagrees with its
/// score is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StoredRiskLevel")]
pub struct RiskLevel {
    score: u8,
    category: RiskCategory,
    reason: String,
}

#[derive(Deserialize)]
struct StoredRiskLevel {
    score: i32,
    #[serde(default)]
    category: Option<RiskCategory>,
    reason: String,
}

impl TryFrom<StoredRiskLevel> for RiskLevel {
    type Error = Error;

    fn try_from(stored: StoredRiskLevel) -> Result<Self, Self::Error> {
        let level = RiskLevel::new(stored.score, stored.reason)?;
        match stored.category {
            Some(category) if category != level.category => Err(Error::Validation(format!(
                "Risk category {} does not match score {}",
                category, level.score
            ))),
            _ => Ok(level),
        }
    }
}

impl RiskLevel {
    /// Highest accepted score
    pub const MAX_SCORE: i32 = 100;

    /// Validate and build a risk level
    ///
    /// The score must be within 0–100 and the reason must not be blank; the
    /// reason is stored trimmed.
    pub fn new(score: i32, reason: impl Into<String>) -> Result<Self, Error> {
        if !(0..=Self::MAX_SCORE).contains(&score) {
            return Err(Error::Validation(format!(
                "Risk score must be between 0 and {}, got {}",
                Self::MAX_SCORE,
                score
            )));
        }
        let reason = reason.into().trim().to_string();
        if reason.is_empty() {
            return Err(Error::Validation("Risk reason must not be blank".to_string()));
        }

        let score = score as u8;
        Ok(Self {
            score,
            category: RiskCategory::from_score(score),
            reason,
        })
    }

    /// Zero-score risk level
    pub fn low(reason: impl Into<String>) -> Result<Self, Error> {
        Self::new(0, reason)
    }

    /// The numeric score
    pub fn score(&self) -> u8 {
        self.score
    }

    /// The derived category
    pub fn category(&self) -> RiskCategory {
        self.category
    }

    /// Why this level was assigned
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_boundaries() {
        let cases = [
            (0, RiskCategory::Low),
            (25, RiskCategory::Low),
            (26, RiskCategory::Medium),
            (50, RiskCategory::Medium),
            (51, RiskCategory::High),
            (75, RiskCategory::High),
            (76, RiskCategory::Critical),
            (100, RiskCategory::Critical),
        ];
        for (score, expected) in cases {
            let level = RiskLevel::new(score, "boundary").unwrap();
            assert_eq!(level.category(), expected, "score {}", score);
        }
    }

    #[test]
    fn test_out_of_range_scores_rejected() {
        assert!(RiskLevel::new(-1, "negative").is_err());
        assert!(RiskLevel::new(101, "too high").is_err());
    }

    #[test]
    fn test_reason_trimmed_and_required() {
        let level = RiskLevel::new(10, "  repeated failures  ").unwrap();
        assert_eq!(level.reason(), "repeated failures");
        assert!(RiskLevel::new(10, "   ").is_err());
        assert!(RiskLevel::new(10, "").is_err());
    }

    #[test]
    fn test_deserialize_round_trip() {
        let level = RiskLevel::new(60, "burst of failures").unwrap();
        let json = serde_json::to_string(&level).unwrap();
        let back: RiskLevel = serde_json::from_str(&json).unwrap();
        assert_eq!(back, level);
        assert_eq!(back.category(), RiskCategory::High);
    }

    #[test]
    fn test_deserialize_rejects_invalid_levels() {
        let out_of_range = r#"{"score":200,"category":"LOW","reason":"bad"}"#;
        assert!(serde_json::from_str::<RiskLevel>(out_of_range).is_err());

        let blank_reason = r#"{"score":10,"category":"LOW","reason":"   "}"#;
        assert!(serde_json::from_str::<RiskLevel>(blank_reason).is_err());

        let wrong_category = r#"{"score":90,"category":"LOW","reason":"mismatch"}"#;
        assert!(serde_json::from_str::<RiskLevel>(wrong_category).is_err());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(RiskCategory::Critical.to_string(), "CRITICAL");
    }
}
