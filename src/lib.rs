//! Ratewarden - per-key, multi-policy rate limiting
//!
//! This crate admits or rejects operations identified by a `(policy, key)`
//! pair. Each named policy configures an independent token bucket per caller
//! key, and a background reclaimer drops buckets for keys that went idle.

pub mod config;
pub mod error;
pub mod ratelimit;

pub use error::{RateWardenError, Result};
pub use ratelimit::{GcHandle, Policy, RateLimiter};
