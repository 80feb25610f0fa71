//! Error types for ratelevel.

use thiserror::Error;

use crate::ratelimit::Level;

/// A misconfigured rule set.
///
/// Each ordering constraint has its own variant so callers can tell exactly
/// which pair of rules is at fault. `lower` and `higher` are the severity
/// levels of the offending adjacent rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuleError {
    /// No rules were supplied
    #[error("at least one rule is required")]
    NoRules,

    /// Two rules share a severity level
    #[error("rule level {level} is defined more than once")]
    DuplicateLevel { level: Level },

    /// A higher level does not cover a strictly longer duration
    #[error("rule level {higher} must have a longer duration than level {lower}")]
    DurationNotIncreasing { lower: Level, higher: Level },

    /// A higher level does not have a strictly greater limit
    #[error("rule level {higher} must have a greater limit than level {lower}")]
    LimitNotIncreasing { lower: Level, higher: Level },

    /// A higher level does not have a strictly lower average rate
    #[error("rule level {higher} must have a lower average rate than level {lower}")]
    AverageRateNotDecreasing { lower: Level, higher: Level },
}

/// Main error type for ratelevel operations.
#[derive(Error, Debug)]
pub enum RateLevelError {
    /// Rule set validation errors
    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    /// Bucket precision must be non-zero
    #[error("bucket precision must be greater than zero")]
    InvalidPrecision,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for ratelevel operations.
pub type Result<T> = std::result::Result<T, RateLevelError>;
