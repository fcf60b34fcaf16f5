//! Configuration management for ratewarden.
//!
//! Policies are normally registered in code, but a limiter can also be built
//! from a YAML document:
//!
//! ```yaml
//! gc_interval_ms: 10000
//! policies:
//!   - name: login
//!     rate_per_second: 0.5
//!     burst: 5
//!     idle_expiry_secs: 600
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{RateWardenError, Result};
use crate::ratelimit::Policy;

/// Prefix for environment variable overrides, e.g. `RATEWARDEN__GC_INTERVAL_MS`.
pub const ENV_PREFIX: &str = "RATEWARDEN";

/// Main configuration for a rate limiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateWardenConfig {
    /// How often idle entries are reclaimed, in milliseconds
    #[serde(default = "default_gc_interval_ms")]
    pub gc_interval_ms: u64,

    /// Policies to register
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,
}

impl Default for RateWardenConfig {
    fn default() -> Self {
        Self {
            gc_interval_ms: default_gc_interval_ms(),
            policies: Vec::new(),
        }
    }
}

/// Configuration for one policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// The policy name
    pub name: String,
    /// Tokens added per second
    pub rate_per_second: f64,
    /// Maximum tokens a bucket can hold
    pub burst: u32,
    /// Seconds a bucket may sit unused before it is reclaimed
    #[serde(default = "default_idle_expiry_secs")]
    pub idle_expiry_secs: u64,
}

impl PolicyConfig {
    /// Validate and convert into a [`Policy`].
    pub fn to_policy(&self) -> Result<Policy> {
        Policy::new(
            &self.name,
            Duration::from_secs(self.idle_expiry_secs),
            self.rate_per_second,
            self.burst,
        )
    }
}

fn default_gc_interval_ms() -> u64 {
    10_000
}

fn default_idle_expiry_secs() -> u64 {
    300
}

impl RateWardenConfig {
    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| RateWardenError::Config(format!("Failed to parse rate limit config: {}", e)))
    }

    /// Load configuration from a YAML file, with environment overrides.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        if !path.is_file() {
            return Err(RateWardenError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Yaml))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| RateWardenError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| RateWardenError::Config(format!("Failed to parse rate limit config: {}", e)))
    }

    /// Get the reclamation interval.
    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}
