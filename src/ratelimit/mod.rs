//! Sliding-window counting and multi-level rule evaluation.
//!
//! Layered leaves first: [`Ring`] is a fixed-capacity cyclic buffer,
//! [`SlidingWindow`] keeps time buckets in a ring, and [`RateLimiter`] keeps
//! one window per key and turns window totals into a [`Level`].

mod clock;
mod limiter;
mod ring;
mod rules;
mod sink;
mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use limiter::{LimiterOptions, RateLimiter};
pub use ring::{Iter, Ring};
pub use rules::{sort_rules, validate_rules, Level, Rule};
pub use sink::{TraceSink, TracingSink};
pub use window::{BucketHandle, SlidingWindow};
