//! Multi-level rate limiter keyed by entity name.

use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::rules::{sort_rules, validate_rules, Level, Rule};
use super::sink::{format_rule_line, TraceSink};
use super::window::SlidingWindow;
use crate::error::{RateLevelError, Result, RuleError};

/// Construction options for [`RateLimiter`].
#[derive(Clone, Default)]
pub struct LimiterOptions {
    /// Accept rule sets that fail the escalation checks
    pub skip_rule_validation: bool,
    /// Receives a line per rule evaluation
    pub trace_sink: Option<Arc<dyn TraceSink>>,
}

impl LimiterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass rule ordering validation for rule sets known good by other means.
    pub fn skip_rule_validation(mut self, skip: bool) -> Self {
        self.skip_rule_validation = skip;
        self
    }

    pub fn with_trace_sink(mut self, sink: Arc<dyn TraceSink>) -> Self {
        self.trace_sink = Some(sink);
        self
    }
}

impl fmt::Debug for LimiterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LimiterOptions")
            .field("skip_rule_validation", &self.skip_rule_validation)
            .field("trace_sink", &self.trace_sink.is_some())
            .finish()
    }
}

/// Reports which escalation level currently applies to a key.
///
/// Each distinct key lazily gets its own [`SlidingWindow`], sized for the
/// longest rule. Windows are never evicted: memory grows with the number of
/// distinct keys seen times the bucket count per window, so keys should come
/// from a bounded population.
///
/// The key map is a sharded concurrent map whose shard lock is held only to
/// find or create a window. Window state has its own lock, and bucket
/// increments are atomic, so different keys never contend with each other.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Sliding windows indexed by key
    windows: DashMap<String, Arc<SlidingWindow>>,
    /// Rules sorted ascending by level
    rules: Vec<Rule>,
    precision: Duration,
    window_size: Duration,
    trace_sink: Option<Arc<dyn TraceSink>>,
    clock: C,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter with validated rules and the system clock.
    pub fn new(rules: Vec<Rule>, precision: Duration) -> Result<Self> {
        Self::with_options(rules, precision, LimiterOptions::default())
    }

    /// Create a rate limiter with explicit options and the system clock.
    pub fn with_options(
        rules: Vec<Rule>,
        precision: Duration,
        options: LimiterOptions,
    ) -> Result<Self> {
        Self::with_clock(rules, precision, options, SystemClock::new())
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter reading time from `clock`.
    ///
    /// Rules are sorted by level before use, so their input order does not
    /// matter. An empty rule set or a zero precision is always rejected;
    /// the escalation checks of [`validate_rules`] run unless
    /// `options.skip_rule_validation` is set.
    pub fn with_clock(
        mut rules: Vec<Rule>,
        precision: Duration,
        options: LimiterOptions,
        clock: C,
    ) -> Result<Self> {
        if rules.is_empty() {
            return Err(RuleError::NoRules.into());
        }
        if precision.is_zero() {
            return Err(RateLevelError::InvalidPrecision);
        }

        sort_rules(&mut rules);
        if !options.skip_rule_validation {
            validate_rules(&rules)?;
        }

        // equals the highest level's duration for any validated rule set
        let window_size = rules
            .iter()
            .map(|rule| rule.duration)
            .max()
            .unwrap_or_default();

        debug!(
            rules = rules.len(),
            precision = ?precision,
            window_size = ?window_size,
            validated = !options.skip_rule_validation,
            "Rate limiter created"
        );

        Ok(Self {
            windows: DashMap::new(),
            rules,
            precision,
            window_size,
            trace_sink: options.trace_sink,
            clock,
        })
    }

    /// Record one event for `key` and report the level that now applies.
    ///
    /// The event is counted before rules are evaluated, so the event that
    /// brings a total up to a rule's limit is the one that reports it. Every
    /// rule is evaluated on every call and the highest met level wins;
    /// [`Level::NONE`] means no rule was met.
    pub fn trigger(&self, key: &str) -> Level {
        let window = self.window_for(key);
        let now = self.clock.now();

        window.current_bucket(now).increment();

        let mut level = Level::NONE;
        for rule in &self.rules {
            let current = window.total_in_duration(rule.duration, now);

            trace!(
                key = %key,
                rule_level = %rule.level,
                limit = rule.limit,
                current = current,
                "Evaluated rule"
            );
            if let Some(sink) = &self.trace_sink {
                sink.write_line(&format_rule_line(rule.level, rule.limit, current));
            }

            if current >= rule.limit {
                level = level.max(rule.level);
            }
        }

        if !level.is_none() {
            debug!(key = %key, reached = %level, "Rate level reached");
        }

        level
    }

    /// Events recorded for `key` within `duration` of now.
    ///
    /// Unknown keys report zero and are not created.
    pub fn total_in_duration(&self, key: &str, duration: Duration) -> u64 {
        let window = match self.windows.get(key) {
            Some(entry) => Arc::clone(entry.value()),
            None => return 0,
        };
        window.total_in_duration(duration, self.clock.now())
    }

    /// Number of keys that currently own a window.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }

    /// Rules in ascending level order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn precision(&self) -> Duration {
        self.precision
    }

    /// Size of every per-key window.
    pub fn window_size(&self) -> Duration {
        self.window_size
    }

    fn window_for(&self, key: &str) -> Arc<SlidingWindow> {
        if let Some(entry) = self.windows.get(key) {
            return Arc::clone(entry.value());
        }

        let entry = self.windows.entry(key.to_owned()).or_insert_with(|| {
            let window = SlidingWindow::new(self.window_size, self.precision);
            debug!(
                key = %key,
                size = ?self.window_size,
                precision = ?self.precision,
                buckets = window.bucket_capacity(),
                "Creating new sliding window"
            );
            Arc::new(window)
        });
        Arc::clone(entry.value())
    }
}

impl<C: Clock + fmt::Debug> fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("rules", &self.rules)
            .field("precision", &self.precision)
            .field("window_size", &self.window_size)
            .field("tracked_keys", &self.windows.len())
            .field("clock", &self.clock)
            .finish()
    }
}
