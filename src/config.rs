//! Courier configuration
//!
//! Retry bounds and wait intervals for session initialization. Defaults match
//! observed backend behavior (1s lock wait, exponential backoff base 1s,
//! three slot-limit recovery cycles). Tests shrink the intervals to
//! milliseconds; production embedders normally keep the defaults.

use crate::session::backend::Env;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Slot-limit recovery cycles before giving up.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Transient storage retries before giving up.
///
/// The transient path needs its own ceiling so a persistently broken local
/// storage layer cannot spin the initializer forever.
const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 5;

/// Lock contention / transient error wait interval.
const DEFAULT_LOCK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Base for exponential slot-limit backoff (base * 2^retry).
const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Session initializer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Backend environment sessions are created against
    #[serde(default)]
    pub env: Env,

    /// Maximum revoke-and-retry cycles on slot-limit exhaustion
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum full restarts on transient storage errors
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Wait between lock acquisition attempts and transient restarts
    #[serde(default = "default_lock_retry_interval")]
    pub lock_retry_interval: Duration,

    /// Backoff base for slot-limit recovery (doubles per cycle)
    #[serde(default = "default_backoff_base")]
    pub backoff_base: Duration,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_max_transient_retries() -> u32 {
    DEFAULT_MAX_TRANSIENT_RETRIES
}

fn default_lock_retry_interval() -> Duration {
    DEFAULT_LOCK_RETRY_INTERVAL
}

fn default_backoff_base() -> Duration {
    DEFAULT_BACKOFF_BASE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            env: Env::default(),
            max_retries: DEFAULT_MAX_RETRIES,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            lock_retry_interval: DEFAULT_LOCK_RETRY_INTERVAL,
            backoff_base: DEFAULT_BACKOFF_BASE,
        }
    }
}

impl SessionConfig {
    /// Configuration for a specific environment, defaults elsewhere
    pub fn for_env(env: Env) -> Self {
        Self {
            env,
            ..Self::default()
        }
    }

    /// Backoff duration for the given recovery cycle (base * 2^retry).
    pub fn backoff_for(&self, retry_count: u32) -> Duration {
        // Saturate rather than overflow on absurd retry counts.
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(retry_count))
    }
}

/// Per-call initialization options.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Override the configured environment for this call
    pub env: Option<Env>,

    /// Skip the cheap no-registration first attempt and go straight to
    /// full installation registration
    pub force_registration: bool,
}
