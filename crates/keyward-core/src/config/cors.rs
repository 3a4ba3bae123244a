//! Cross-origin configuration for the HTTP transport.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How strictly browser origins are checked.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorsMode {
    /// Only origins in the allow-list are accepted.
    #[default]
    Strict,
    /// Allow-list plus any loopback origin, whatever the port.
    Development,
    /// Every origin is accepted.
    Disabled,
}

impl FromStr for CorsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(CorsMode::Strict),
            "development" | "dev" => Ok(CorsMode::Development),
            "disabled" | "off" => Ok(CorsMode::Disabled),
            other => Err(format!(
                "unknown CORS mode '{other}', use 'strict', 'development' or 'disabled'"
            )),
        }
    }
}

impl fmt::Display for CorsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsMode::Strict => f.write_str("strict"),
            CorsMode::Development => f.write_str("development"),
            CorsMode::Disabled => f.write_str("disabled"),
        }
    }
}

/// Origin policy settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CorsConfig {
    /// Checking mode.
    #[serde(default)]
    pub mode: CorsMode,

    /// Exact origins (scheme://host[:port]) that are always accepted.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Parse a comma-separated origin list, dropping blanks.
    pub fn parse_origin_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}
