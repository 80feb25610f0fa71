//! Diagnostic sinks for per-rule evaluation lines.

use tracing::debug;

use super::rules::Level;

/// Receives one line per rule per trigger, shaped `level=<L> limit=<N> current=<M>`.
///
/// Sinks are purely observational; nothing they do affects the reported level.
/// Any `Fn(&str)` closure that is `Send + Sync` is a sink.
pub trait TraceSink: Send + Sync {
    fn write_line(&self, line: &str);
}

impl<F> TraceSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn write_line(&self, line: &str) {
        self(line)
    }
}

/// Forwards rule lines to `tracing` at DEBUG under the `ratelevel::rules` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TraceSink for TracingSink {
    fn write_line(&self, line: &str) {
        debug!(target: "ratelevel::rules", "{}", line);
    }
}

pub(crate) fn format_rule_line(level: Level, limit: u64, current: u64) -> String {
    format!("level={} limit={} current={}", level, limit, current)
}
