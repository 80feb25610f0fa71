//! Severity levels, escalation rules and rule-set validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::RuleError;

/// A severity level reported by the rate limiter.
///
/// Higher values are more severe. [`Level::NONE`] means no rule was met.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Level(pub u32);

impl Level {
    /// No rule threshold has been reached.
    pub const NONE: Level = Level(0);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Level {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An escalation rule: reaching `limit` events within `duration` reports `level`.
///
/// The limit is inclusive, so the event that brings the total up to `limit`
/// is the one that reports the level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// Look-back period the limit applies to
    pub duration: Duration,
    /// Number of events at which the rule is met
    pub limit: u64,
    /// Severity reported when the rule is met
    pub level: Level,
}

impl Rule {
    pub fn new(duration: Duration, limit: u64, level: impl Into<Level>) -> Self {
        Self {
            duration,
            limit,
            level: level.into(),
        }
    }

    /// Whether this rule's average rate is at least `other`'s.
    ///
    /// Compares `limit / duration` exactly by cross multiplication. Products
    /// that overflow `u128` (durations of many centuries) fall back to `f64`
    /// products.
    pub fn rate_at_least(&self, other: &Rule) -> bool {
        let own = u128::from(self.limit).checked_mul(other.duration.as_nanos());
        let theirs = u128::from(other.limit).checked_mul(self.duration.as_nanos());
        match (own, theirs) {
            (Some(own), Some(theirs)) => own >= theirs,
            _ => {
                self.limit as f64 * other.duration.as_nanos() as f64
                    >= other.limit as f64 * self.duration.as_nanos() as f64
            }
        }
    }
}

/// Sort rules ascending by level, keeping the relative order of equal levels.
pub fn sort_rules(rules: &mut [Rule]) {
    rules.sort_by_key(|rule| rule.level);
}

/// Check that a rule set escalates sensibly.
///
/// Rules may be given in any order; they are compared in ascending level
/// order. Checks run in this order, each over the whole set:
///
/// 1. levels are pairwise distinct
/// 2. durations strictly increase with level
/// 3. limits strictly increase with level
/// 4. the average rate strictly decreases with level, otherwise the higher
///    level could never be reached before the lower one
pub fn validate_rules(rules: &[Rule]) -> Result<(), RuleError> {
    if rules.is_empty() {
        return Err(RuleError::NoRules);
    }

    let mut sorted = rules.to_vec();
    sort_rules(&mut sorted);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].level == pair[1].level) {
        return Err(RuleError::DuplicateLevel {
            level: pair[0].level,
        });
    }

    if let Some(pair) = sorted
        .windows(2)
        .find(|pair| pair[0].duration >= pair[1].duration)
    {
        return Err(RuleError::DurationNotIncreasing {
            lower: pair[0].level,
            higher: pair[1].level,
        });
    }

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].limit >= pair[1].limit) {
        return Err(RuleError::LimitNotIncreasing {
            lower: pair[0].level,
            higher: pair[1].level,
        });
    }

    if let Some(pair) = sorted
        .windows(2)
        .find(|pair| pair[1].rate_at_least(&pair[0]))
    {
        return Err(RuleError::AverageRateNotDecreasing {
            lower: pair[0].level,
            higher: pair[1].level,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_level_ordering_and_display() {
        assert!(Level::NONE < Level::new(1));
        assert!(Level::NONE.is_none());
        assert!(!Level::from(3).is_none());
        assert_eq!(Level::new(7).to_string(), "7");
        assert_eq!(Level::default(), Level::NONE);
    }

    #[test]
    fn test_level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Level::new(2)).unwrap(), "2");
        assert_eq!(serde_json::from_str::<Level>("4").unwrap(), Level::new(4));
    }

    #[test]
    fn test_sort_rules_by_level() {
        let mut rules = vec![
            Rule::new(SECOND * 10, 50, 2u32),
            Rule::new(SECOND * 60, 100, 3u32),
            Rule::new(SECOND, 10, 1u32),
        ];
        sort_rules(&mut rules);

        let levels: Vec<u32> = rules.iter().map(|r| r.level.value()).collect();
        assert_eq!(levels, vec![1, 2, 3]);
    }

    #[test]
    fn test_validate_rejects_duplicate_level() {
        let rules = [Rule::new(SECOND, 0, 1u32), Rule::new(SECOND, 0, 1u32)];

        assert_eq!(
            validate_rules(&rules),
            Err(RuleError::DuplicateLevel { level: Level(1) })
        );
    }

    #[test]
    fn test_validate_rejects_non_increasing_duration() {
        let rules = [
            Rule::new(SECOND, 10, 1u32),
            Rule::new(SECOND, 10, 2u32),
            Rule::new(SECOND * 3, 10, 3u32),
        ];

        assert_eq!(
            validate_rules(&rules),
            Err(RuleError::DurationNotIncreasing {
                lower: Level(1),
                higher: Level(2),
            })
        );
    }

    #[test]
    fn test_validate_rejects_non_increasing_limit() {
        let rules = [
            Rule::new(SECOND, 10, 1u32),
            Rule::new(SECOND * 2, 20, 2u32),
            Rule::new(SECOND * 3, 10, 3u32),
        ];

        assert_eq!(
            validate_rules(&rules),
            Err(RuleError::LimitNotIncreasing {
                lower: Level(2),
                higher: Level(3),
            })
        );
    }

    #[test]
    fn test_validate_rejects_non_decreasing_average_rate() {
        let rules = [
            Rule::new(SECOND, 10, 1u32),
            Rule::new(SECOND * 2, 30, 2u32),
            Rule::new(SECOND * 3, 100, 3u32),
        ];

        assert_eq!(
            validate_rules(&rules),
            Err(RuleError::AverageRateNotDecreasing {
                lower: Level(1),
                higher: Level(2),
            })
        );
    }

    #[test]
    fn test_validate_rejects_equal_average_rate() {
        let rules = [Rule::new(SECOND, 10, 1u32), Rule::new(SECOND * 2, 20, 2u32)];

        assert!(matches!(
            validate_rules(&rules),
            Err(RuleError::AverageRateNotDecreasing { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_equal_rates_that_round_differently() {
        // 1/300ms and 3/900ms differ in their last bit as f64
        let rules = [
            Rule::new(Duration::from_millis(300), 1, 1u32),
            Rule::new(Duration::from_millis(900), 3, 2u32),
        ];
        assert_eq!(
            validate_rules(&rules),
            Err(RuleError::AverageRateNotDecreasing {
                lower: Level(1),
                higher: Level(2),
            })
        );

        let rules = [
            Rule::new(Duration::from_millis(7), 7, 1u32),
            Rule::new(Duration::from_millis(21), 21, 2u32),
        ];
        assert!(matches!(
            validate_rules(&rules),
            Err(RuleError::AverageRateNotDecreasing { .. })
        ));
    }

    #[test]
    fn test_rate_comparison_is_exact() {
        let lower = Rule::new(Duration::from_millis(300), 1, 1u32);
        let equal = Rule::new(Duration::from_millis(900), 3, 2u32);
        let slower = Rule::new(Duration::from_millis(901), 3, 2u32);

        assert!(equal.rate_at_least(&lower));
        assert!(lower.rate_at_least(&equal));
        assert!(!slower.rate_at_least(&lower));
        assert!(lower.rate_at_least(&slower));
    }

    #[test]
    fn test_rate_comparison_survives_overflow() {
        let lower = Rule::new(Duration::from_secs(1), u64::MAX, 1u32);
        let higher = Rule::new(Duration::MAX, u64::MAX, 2u32);

        assert!(!higher.rate_at_least(&lower));
        assert!(lower.rate_at_least(&higher));
    }

    #[test]
    fn test_validate_accepts_escalating_rules() {
        let rules = [
            Rule::new(SECOND, 10, 1u32),
            Rule::new(SECOND * 2, 15, 2u32),
            Rule::new(SECOND * 3, 20, 3u32),
        ];

        assert_eq!(validate_rules(&rules), Ok(()));
    }

    #[test]
    fn test_validate_sorts_before_checking() {
        let rules = [
            Rule::new(SECOND * 3, 20, 3u32),
            Rule::new(SECOND, 10, 1u32),
            Rule::new(SECOND * 2, 15, 2u32),
        ];

        assert_eq!(validate_rules(&rules), Ok(()));
    }

    #[test]
    fn test_validate_single_rule() {
        assert_eq!(validate_rules(&[Rule::new(SECOND, 5, 1u32)]), Ok(()));
        assert_eq!(validate_rules(&[]), Err(RuleError::NoRules));
    }
}
