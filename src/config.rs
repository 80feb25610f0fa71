//! Configuration management for ratelevel.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{RateLevelError, Result};
use crate::ratelimit::{LimiterOptions, RateLimiter, Rule, TraceSink};

/// Main configuration for a rate limiter.
///
/// ```yaml
/// precision_ms: 100
/// rules:
///   - duration_ms: 1000
///     limit: 10
///     level: 1
///   - duration_ms: 10000
///     limit: 50
///     level: 2
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLevelConfig {
    /// Width of one sliding window bucket in milliseconds
    #[serde(default = "default_precision_ms")]
    pub precision_ms: u64,

    /// Accept rule sets that fail the escalation checks
    #[serde(default)]
    pub ignore_rule_errors: bool,

    /// Escalation rules, in any order
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

impl Default for RateLevelConfig {
    fn default() -> Self {
        Self {
            precision_ms: default_precision_ms(),
            ignore_rule_errors: false,
            rules: Vec::new(),
        }
    }
}

fn default_precision_ms() -> u64 {
    100
}

/// A single escalation rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Look-back period in milliseconds
    pub duration_ms: u64,
    /// Number of events at which the rule is met
    pub limit: u64,
    /// Severity reported when the rule is met
    pub level: u32,
}

impl From<&RuleConfig> for Rule {
    fn from(rule: &RuleConfig) -> Self {
        Rule::new(Duration::from_millis(rule.duration_ms), rule.limit, rule.level)
    }
}

impl RateLevelConfig {
    /// Load configuration from a file path.
    ///
    /// The format follows the file extension (`.yaml`, `.toml`, `.json`, ...).
    /// Environment variables prefixed with `RATELEVEL_` override scalar
    /// settings, e.g. `RATELEVEL_PRECISION_MS=50`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate level configuration");

        let settings = Config::builder()
            .add_source(File::from(path))
            .add_source(
                Environment::with_prefix("RATELEVEL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RateLevelError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| RateLevelError::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RateLevelError::Config(format!("Failed to parse rate level config: {}", e)))
    }

    pub fn precision(&self) -> Duration {
        Duration::from_millis(self.precision_ms)
    }

    pub fn to_rules(&self) -> Vec<Rule> {
        self.rules.iter().map(Rule::from).collect()
    }

    pub fn limiter_options(&self) -> LimiterOptions {
        LimiterOptions::new().skip_rule_validation(self.ignore_rule_errors)
    }

    /// Build a rate limiter from this configuration.
    pub fn build_limiter(&self) -> Result<RateLimiter> {
        RateLimiter::with_options(self.to_rules(), self.precision(), self.limiter_options())
    }

    /// Build a rate limiter that reports every rule evaluation to `sink`.
    pub fn build_limiter_with_sink(&self, sink: Arc<dyn TraceSink>) -> Result<RateLimiter> {
        let options = self.limiter_options().with_trace_sink(sink);
        RateLimiter::with_options(self.to_rules(), self.precision(), options)
    }
}
