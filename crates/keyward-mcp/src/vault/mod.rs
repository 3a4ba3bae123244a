//! Backend API client.
//!
//! A [`VaultClient`] is a cheap, cloneable wrapper around a `reqwest` client
//! bound to one address, token and namespace. [`ClientFactory`] builds them
//! from resolved credentials.

pub mod client;
pub mod error;
pub mod types;

pub use client::{ClientFactory, VaultClient};
pub use error::{BackendError, ClientError};
pub use types::{HealthStatus, KvVersion, MountEntry, MountSpec};
