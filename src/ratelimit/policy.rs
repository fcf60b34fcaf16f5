//! Named rate limit policies.
//!
//! A policy carries the token bucket parameters shared by every caller key
//! grouped under its name, plus how long an idle bucket is kept around.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::error::{RateWardenError, Result};

/// Configuration applied to every key under one policy name.
#[derive(Debug, Clone, PartialEq)]
pub struct Policy {
    /// The policy name
    pub name: String,
    /// Tokens added per second
    pub rate_per_second: f64,
    /// Maximum tokens a bucket can hold
    pub burst: u32,
    /// How long a bucket may sit unused before it can be reclaimed
    pub idle_expiry: Duration,
}

impl Policy {
    /// Create a validated policy.
    ///
    /// Rejects an empty name, a zero burst, a negative or non-finite rate and
    /// a zero idle expiry. A rate of zero is allowed and gives a bucket that
    /// never refills after its initial burst.
    pub fn new(
        name: &str,
        idle_expiry: Duration,
        rate_per_second: f64,
        burst: u32,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(RateWardenError::invalid_policy(name, "name must not be empty"));
        }
        if !rate_per_second.is_finite() || rate_per_second < 0.0 {
            return Err(RateWardenError::invalid_policy(
                name,
                format!("rate must be a finite, non-negative number, got {}", rate_per_second),
            ));
        }
        if burst == 0 {
            return Err(RateWardenError::invalid_policy(name, "burst must be at least 1"));
        }
        if idle_expiry.is_zero() {
            return Err(RateWardenError::invalid_policy(name, "idle expiry must be positive"));
        }

        Ok(Self {
            name: name.to_string(),
            rate_per_second,
            burst,
            idle_expiry,
        })
    }
}

/// Registry of policies indexed by name.
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: RwLock<HashMap<String, Policy>>,
}

impl PolicyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a policy, replacing any policy with the same name.
    pub fn register(&self, policy: Policy) {
        debug!(
            policy = %policy.name,
            rate_per_second = policy.rate_per_second,
            burst = policy.burst,
            idle_expiry_ms = policy.idle_expiry.as_millis() as u64,
            "Registering rate limit policy"
        );

        let mut policies = self.policies.write();
        policies.insert(policy.name.clone(), policy);
    }

    /// Look up a policy by name.
    pub fn lookup(&self, name: &str) -> Option<Policy> {
        self.policies.read().get(name).cloned()
    }

    /// Whether a policy is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.policies.read().contains_key(name)
    }

    /// Get the number of registered policies.
    pub fn len(&self) -> usize {
        self.policies.read().len()
    }

    /// Whether no policy has been registered yet.
    pub fn is_empty(&self) -> bool {
        self.policies.read().is_empty()
    }

    /// Names of all registered policies, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.policies.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(name: &str, rate: f64, burst: u32) -> Policy {
        Policy::new(name, Duration::from_secs(20), rate, burst).unwrap()
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = PolicyRegistry::new();
        assert!(registry.is_empty());

        registry.register(policy("foo", 10.0, 3));

        let found = registry.lookup("foo").unwrap();
        assert_eq!(found.rate_per_second, 10.0);
        assert_eq!(found.burst, 3);
        assert_eq!(found.idle_expiry, Duration::from_secs(20));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_lookup_missing() {
        let registry = PolicyRegistry::new();
        registry.register(policy("foo", 10.0, 3));

        assert!(registry.lookup("bar").is_none());
        assert!(registry.lookup("").is_none());
        assert!(registry.contains("foo"));
        assert!(!registry.contains("bar"));
    }

    #[test]
    fn test_register_overwrites() {
        let registry = PolicyRegistry::new();
        registry.register(policy("foo", 10.0, 3));
        registry.register(policy("foo", 20.0, 10));

        let found = registry.lookup("foo").unwrap();
        assert_eq!(found.rate_per_second, 20.0);
        assert_eq!(found.burst, 10);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_names_sorted() {
        let registry = PolicyRegistry::new();
        registry.register(policy("login", 1.0, 5));
        registry.register(policy("api", 100.0, 200));

        assert_eq!(registry.names(), vec!["api".to_string(), "login".to_string()]);
    }

    #[test]
    fn test_zero_rate_is_valid() {
        let policy = Policy::new("once", Duration::from_secs(1), 0.0, 1).unwrap();
        assert_eq!(policy.rate_per_second, 0.0);
    }

    #[test]
    fn test_invalid_policies() {
        let expiry = Duration::from_secs(1);

        let cases = [
            Policy::new("", expiry, 1.0, 1),
            Policy::new("neg", expiry, -1.0, 1),
            Policy::new("nan", expiry, f64::NAN, 1),
            Policy::new("inf", expiry, f64::INFINITY, 1),
            Policy::new("burst", expiry, 1.0, 0),
            Policy::new("expiry", Duration::ZERO, 1.0, 1),
        ];

        for result in cases {
            assert!(matches!(result, Err(RateWardenError::InvalidPolicy { .. })));
        }
    }

    #[test]
    fn test_invalid_policy_message() {
        let err = Policy::new("foo", Duration::from_secs(1), 1.0, 0).unwrap_err();
        assert_eq!(err.to_string(), "Invalid policy 'foo': burst must be at least 1");
    }
}
