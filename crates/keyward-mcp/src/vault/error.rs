//! Backend client errors.

use thiserror::Error;

/// Errors raised while building a client from credentials.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No token was provided by any source.
    #[error("no backend token provided; send the X-Vault-Token header or set VAULT_TOKEN")]
    MissingToken,

    /// The address is not an http(s) URL.
    #[error("invalid backend address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The underlying HTTP client could not be constructed.
    #[error("failed to build backend HTTP client: {0}")]
    Build(String),
}

/// Errors raised by individual backend calls.
///
/// Messages name the method and path so failures can be diagnosed, and never
/// include the token or request bodies.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request did not complete (connect, TLS, timeout).
    #[error("{method} {path}: request failed: {reason}")]
    Request {
        method: String,
        path: String,
        reason: String,
    },

    /// The backend answered with a non-success status.
    #[error("{method} {path}: backend returned {status}{details}", details = format_errors(.errors))]
    Status {
        method: String,
        path: String,
        status: u16,
        errors: Vec<String>,
    },

    /// The response body did not have the expected shape.
    #[error("{path}: unexpected response: {reason}")]
    Decode { path: String, reason: String },
}

impl BackendError {
    /// HTTP status of a `Status` error.
    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

fn format_errors(errors: &[String]) -> String {
    if errors.is_empty() {
        String::new()
    } else {
        format!(": {}", errors.join("; "))
    }
}
