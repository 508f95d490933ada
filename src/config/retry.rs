use std::time::Duration;

use serde::Deserialize;

use crate::constants::DEFAULT_SHUTDOWN_TIMEOUT_MS;

/// Basic poll policy template: fixed interval, overall bound
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PollPolicy {
    /// Fixed poll interval (unit: milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Overall poll bound (unit: milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl PollPolicy {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Divide policies by harness concern
#[derive(Debug, Deserialize, Clone)]
pub struct RetryPolicies {
    // Index/metadata convergence across shards (the only long poll)
    #[serde(default)]
    pub propagation: PollPolicy,

    // Node readiness wait after start
    #[serde(default)]
    pub startup: PollPolicy,

    // Graceful shutdown bound before forced termination
    #[serde(default)]
    pub shutdown: PollPolicy,
}

// Default value implementation
impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            propagation: PollPolicy {
                interval_ms: 1_000,
                timeout_ms: 60_000,
            },
            startup: PollPolicy {
                interval_ms: 100,
                timeout_ms: 10_000,
            },
            shutdown: PollPolicy {
                interval_ms: 100,
                timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            },
        }
    }
}

fn default_interval_ms() -> u64 {
    1_000
}
fn default_timeout_ms() -> u64 {
    60_000
}
