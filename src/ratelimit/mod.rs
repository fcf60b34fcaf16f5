//! Rate limiting logic and state management.

mod bucket;
mod key;
mod limiter;
mod policy;
mod reclaim;

pub use bucket::TokenBucket;
pub use key::{EntryKey, KEY_SEPARATOR};
pub use limiter::RateLimiter;
pub use policy::{Policy, PolicyRegistry};
pub use reclaim::{GcHandle, MIN_GC_INTERVAL};
