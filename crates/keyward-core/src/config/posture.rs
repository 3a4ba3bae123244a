//! Security posture analysis configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the posture aggregator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostureConfig {
    /// Upper bound for a single posture check, in seconds. Zero disables it.
    #[serde(default = "default_check_timeout_secs")]
    pub check_timeout_secs: u64,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            check_timeout_secs: default_check_timeout_secs(),
        }
    }
}

impl PostureConfig {
    /// Per-check timeout, `None` when disabled.
    pub fn check_timeout(&self) -> Option<Duration> {
        (self.check_timeout_secs > 0).then(|| Duration::from_secs(self.check_timeout_secs))
    }
}

fn default_check_timeout_secs() -> u64 {
    30
}
