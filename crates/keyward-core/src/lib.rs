//! # keyward-core
//!
//! Configuration types shared across all Keyward crates.
//!
//! The configuration is loaded from a single YAML file (`keyward.yaml` by
//! default). Every section is optional and falls back to defaults, so an empty
//! file is a valid configuration. Command-line flags in `keyward-cli` override
//! whatever the file provides.

pub mod config;

pub use config::{
    ConfigError, CorsConfig, CorsMode, KeywardConfig, McpConfig, PostureConfig, Transport,
    VaultConfig,
};
