//! Backend credential resolution.
//!
//! Every request carries its own backend address, token and namespace. This
//! module turns the candidate sources for those values into one
//! [`CredentialBundle`]:
//!
//! | Field | Sources, highest first |
//! |-------|------------------------|
//! | address | `X-Vault-Addr` header, `VAULT_ADDR` query, `VAULT_ADDR` env, [`DEFAULT_VAULT_ADDR`] |
//! | token | `X-Vault-Token` header, `VAULT_TOKEN` env |
//! | namespace | `X-Vault-Namespace` header, `VAULT_NAMESPACE` env |
//! | skip TLS verify | `X-Vault-Skip-Verify` header, `VAULT_SKIP_VERIFY` env, `false` |
//!
//! The token is never taken from the query string. A request that tries is
//! rejected by [`inspect_query`] before resolution runs.
//!
//! [`resolve`] is pure: the environment is passed in as a snapshot.

use axum::http::HeaderMap;
use std::fmt;
use thiserror::Error;

/// Address used when no source provides one.
pub const DEFAULT_VAULT_ADDR: &str = "http://127.0.0.1:8200";

pub const HEADER_VAULT_ADDR: &str = "x-vault-addr";
pub const HEADER_VAULT_TOKEN: &str = "x-vault-token";
pub const HEADER_VAULT_NAMESPACE: &str = "x-vault-namespace";
pub const HEADER_VAULT_SKIP_VERIFY: &str = "x-vault-skip-verify";

pub const QUERY_VAULT_ADDR: &str = "VAULT_ADDR";

pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_VAULT_NAMESPACE: &str = "VAULT_NAMESPACE";
pub const ENV_VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";

/// Query parameter names that would carry a token (compared case-insensitively).
const FORBIDDEN_QUERY_KEYS: [&str; 3] = ["vault_token", "x-vault-token", "token"];

/// Fully resolved backend credentials for one request or session.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialBundle {
    /// Backend base URL.
    pub address: String,
    /// Backend token. Empty when no source provided one.
    pub token: String,
    /// Optional namespace sent with every backend call.
    pub namespace: Option<String>,
    /// Disable TLS certificate verification.
    pub skip_tls_verify: bool,
}

impl CredentialBundle {
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("address", &self.address)
            .field("token", &redact(Some(&self.token)))
            .field("namespace", &self.namespace)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

/// Raw, unvalidated values offered by one source.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CandidateValues {
    pub address: Option<String>,
    pub token: Option<String>,
    pub namespace: Option<String>,
    pub skip_tls_verify: Option<String>,
}

impl CandidateValues {
    /// Read candidates from inbound HTTP headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        Self {
            address: get(HEADER_VAULT_ADDR),
            token: get(HEADER_VAULT_TOKEN),
            namespace: get(HEADER_VAULT_NAMESPACE),
            skip_tls_verify: get(HEADER_VAULT_SKIP_VERIFY),
        }
    }

    /// Snapshot the process environment.
    pub fn from_process_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read candidates through an arbitrary environment lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            address: lookup(ENV_VAULT_ADDR),
            token: lookup(ENV_VAULT_TOKEN),
            namespace: lookup(ENV_VAULT_NAMESPACE),
            skip_tls_verify: lookup(ENV_VAULT_SKIP_VERIFY),
        }
    }
}

impl fmt::Debug for CandidateValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CandidateValues")
            .field("address", &self.address)
            .field("token", &redact(self.token.as_deref()))
            .field("namespace", &self.namespace)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish()
    }
}

/// All sources considered for one resolution.
#[derive(Debug, Clone, Default)]
pub struct CredentialSources {
    /// Values from inbound request headers.
    pub header: CandidateValues,
    /// `VAULT_ADDR` from the query string. The only field a query may set.
    pub query_address: Option<String>,
    /// Values from the process environment.
    pub env: CandidateValues,
}

impl CredentialSources {
    /// Sources for a transport without headers or query (stdio).
    pub fn env_only(env: CandidateValues) -> Self {
        Self {
            env,
            ..Self::default()
        }
    }
}

/// Resolve a credential bundle from its candidate sources.
pub fn resolve(sources: &CredentialSources) -> CredentialBundle {
    let address = first_non_empty([
        sources.header.address.as_deref(),
        sources.query_address.as_deref(),
        sources.env.address.as_deref(),
    ])
    .unwrap_or(DEFAULT_VAULT_ADDR)
    .to_string();

    let token = first_non_empty([
        sources.header.token.as_deref(),
        sources.env.token.as_deref(),
    ])
    .unwrap_or_default()
    .to_string();

    let namespace = first_non_empty([
        sources.header.namespace.as_deref(),
        sources.env.namespace.as_deref(),
    ])
    .map(String::from);

    let skip_tls_verify = [
        sources.header.skip_tls_verify.as_deref(),
        sources.env.skip_tls_verify.as_deref(),
    ]
    .into_iter()
    .flatten()
    .find_map(parse_bool)
    .unwrap_or(false);

    CredentialBundle {
        address,
        token,
        namespace,
        skip_tls_verify,
    }
}

/// A request tried to pass a token in its query string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the backend token must not be sent as a query parameter ('{param}'); use the X-Vault-Token header")]
pub struct QueryTokenRejected {
    /// Name of the offending parameter. Never its value.
    pub param: String,
}

/// Check a raw query string and extract the address candidate from it.
///
/// Fails if any parameter could carry a token, whatever other sources exist.
pub fn inspect_query(query: Option<&str>) -> Result<Option<String>, QueryTokenRejected> {
    let Some(query) = query else {
        return Ok(None);
    };

    let mut address = None;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let lowered = key.to_ascii_lowercase();
        if FORBIDDEN_QUERY_KEYS.contains(&lowered.as_str()) {
            return Err(QueryTokenRejected {
                param: key.into_owned(),
            });
        }
        if key == QUERY_VAULT_ADDR && address.is_none() {
            address = Some(value.into_owned());
        }
    }
    Ok(address)
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn redact(value: Option<&str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => "<redacted>",
        _ => "<empty>",
    }
}
