//! Ratelevel - Multi-Level Sliding-Window Rate Limiting
//!
//! This crate counts recent events per named key and reports which of several
//! escalating severity levels currently applies, based on configurable
//! (duration, limit) rules. It is an in-process admission-control primitive:
//! callers trigger it once per event and act on the returned level.
//!
//! ```
//! use ratelevel::ratelimit::{Level, RateLimiter, Rule};
//! use std::time::Duration;
//!
//! let limiter = RateLimiter::new(
//!     vec![
//!         Rule::new(Duration::from_secs(1), 10, 1u32),
//!         Rule::new(Duration::from_secs(10), 50, 2u32),
//!     ],
//!     Duration::from_millis(100),
//! )?;
//!
//! assert_eq!(limiter.trigger("client-a"), Level::NONE);
//! # Ok::<(), ratelevel::error::RateLevelError>(())
//! ```

pub mod config;
pub mod error;
pub mod ratelimit;

pub use crate::config::RateLevelConfig;
pub use crate::error::{RateLevelError, Result, RuleError};
pub use crate::ratelimit::{Level, LimiterOptions, RateLimiter, Rule};
