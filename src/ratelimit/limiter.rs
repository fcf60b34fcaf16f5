//! Core rate limiter implementation.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use super::key::EntryKey;
use super::policy::{Policy, PolicyRegistry};
use crate::config::RateWardenConfig;
use crate::error::{RateWardenError, Result};

/// Deadline used when `now + idle_expiry` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// A live bucket and the instant after which it may be reclaimed.
#[derive(Debug)]
pub(crate) struct Entry {
    bucket: TokenBucket,
    /// Idle expiry of the policy this entry was created from
    idle_expiry: Duration,
    expires_at: Instant,
}

impl Entry {
    fn new(policy: &Policy, now: Instant) -> Self {
        Self {
            bucket: TokenBucket::new_at(policy.rate_per_second, policy.burst, now),
            idle_expiry: policy.idle_expiry,
            expires_at: deadline(now, policy.idle_expiry),
        }
    }

    /// Refresh the expiry and take a token from the bucket.
    fn allow(&mut self, now: Instant) -> bool {
        self.expires_at = deadline(now, self.idle_expiry);
        self.bucket.try_consume_at(now)
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

fn deadline(now: Instant, idle_expiry: Duration) -> Instant {
    now.checked_add(idle_expiry)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// The core rate limiter that manages policies and per-key buckets.
///
/// This struct is thread-safe and can be shared across threads and tasks.
/// Each instance owns its own policies and buckets.
#[derive(Debug)]
pub struct RateLimiter {
    /// Registered policies
    policies: PolicyRegistry,
    /// Live buckets indexed by entry key
    entries: DashMap<EntryKey, Entry>,
}

impl RateLimiter {
    /// Create an empty rate limiter with no policies and no entries.
    pub fn new() -> Self {
        Self {
            policies: PolicyRegistry::new(),
            entries: DashMap::new(),
        }
    }

    /// Create a rate limiter with every policy from a configuration.
    ///
    /// Fails on the first invalid policy.
    pub fn from_config(config: &RateWardenConfig) -> Result<Self> {
        let limiter = Self::new();
        for policy in &config.policies {
            limiter.register(policy.to_policy()?);
        }
        Ok(limiter)
    }

    /// Register a policy, replacing any previous policy with the same name.
    ///
    /// Buckets that already exist for the policy keep the parameters they
    /// were created with until they are reclaimed.
    pub fn register_context(
        &self,
        policy_name: &str,
        idle_expiry: Duration,
        rate_per_second: f64,
        burst: u32,
    ) -> Result<()> {
        let policy = Policy::new(policy_name, idle_expiry, rate_per_second, burst)?;
        self.register(policy);
        Ok(())
    }

    /// Register an already validated policy.
    pub fn register(&self, policy: Policy) {
        self.policies.register(policy);
    }

    /// Look up a registered policy.
    pub fn policy(&self, policy_name: &str) -> Option<Policy> {
        self.policies.lookup(policy_name)
    }

    /// Names of all registered policies, sorted.
    pub fn policy_names(&self) -> Vec<String> {
        self.policies.names()
    }

    /// Check whether one operation for `key` under `policy_name` may proceed.
    ///
    /// Unknown policies are rejected without creating any state.
    pub fn is_allowed(&self, policy_name: &str, key: &str) -> bool {
        match self.try_acquire(policy_name, key) {
            Ok(allowed) => allowed,
            Err(e) => {
                trace!(policy = %policy_name, error = %e, "Rejecting request");
                false
            }
        }
    }

    /// Like [`RateLimiter::is_allowed`], but reports unknown policies as an error.
    pub fn try_acquire(&self, policy_name: &str, key: &str) -> Result<bool> {
        if !self.policies.contains(policy_name) {
            return Err(RateWardenError::PolicyNotFound(policy_name.to_string()));
        }

        trace!(policy = %policy_name, key = %key, "Checking rate limit");

        let entry_key = EntryKey::new(policy_name, key);

        // Existing entries only need their shard lock
        let allowed = match self.entries.get_mut(&entry_key) {
            Some(mut entry) => entry.allow(Instant::now()),
            None => self.create_and_acquire(entry_key)?,
        };

        if !allowed {
            debug!(policy = %policy_name, key = %key, "Rate limit exceeded");
        }

        Ok(allowed)
    }

    /// Insert-if-absent and consume under one shard write lock.
    ///
    /// Another caller may have created the entry since the fast path missed;
    /// `or_insert_with` then keeps theirs.
    fn create_and_acquire(&self, entry_key: EntryKey) -> Result<bool> {
        let policy = self
            .policies
            .lookup(&entry_key.policy)
            .ok_or_else(|| RateWardenError::PolicyNotFound(entry_key.policy.clone()))?;

        let mut entry = self.entries.entry(entry_key).or_insert_with(|| {
            debug!(
                policy = %policy.name,
                rate_per_second = policy.rate_per_second,
                burst = policy.burst,
                "Creating new rate limit entry"
            );
            Entry::new(&policy, Instant::now())
        });

        Ok(entry.allow(Instant::now()))
    }

    /// Get the tokens currently available for a key.
    ///
    /// Returns `None` if no entry exists for the key.
    pub fn available_tokens(&self, policy_name: &str, key: &str) -> Option<f64> {
        self.entries
            .get(&EntryKey::new(policy_name, key))
            .map(|entry| entry.bucket.available_at(Instant::now()))
    }

    /// Remove every entry whose idle expiry has passed.
    ///
    /// Returns the number of removed entries.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0;

        self.entries.retain(|_, entry| {
            let expired = entry.is_expired(now);
            if expired {
                removed += 1;
            }
            !expired
        });

        removed
    }

    /// Clear all entries.
    ///
    /// Policies are kept.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Get the number of live entries.
    pub fn active_entries(&self) -> usize {
        self.entries.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
