//! HTTP client for the backend API.

use super::error::{BackendError, ClientError};
use super::types::{HealthStatus, KvVersion, MountEntry, MountSpec};
use crate::credentials::CredentialBundle;
use keyward_core::VaultConfig;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::fmt;
use std::time::Duration;
use url::Url;

const TOKEN_HEADER: &str = "x-vault-token";
const NAMESPACE_HEADER: &str = "x-vault-namespace";

/// Builds [`VaultClient`]s from resolved credentials.
///
/// Holds nothing but the timeouts applied to every client it creates.
#[derive(Debug, Clone)]
pub struct ClientFactory {
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Default for ClientFactory {
    fn default() -> Self {
        Self::new(&VaultConfig::default())
    }
}

impl ClientFactory {
    /// Create a factory with the configured timeouts.
    pub fn new(config: &VaultConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    /// Build a client bound to the bundle's address, token and namespace.
    ///
    /// Only presence of the token is checked here; the backend validates it
    /// on the first real call.
    pub fn create(&self, credentials: &CredentialBundle) -> Result<VaultClient, ClientError> {
        if !credentials.has_token() {
            return Err(ClientError::MissingToken);
        }

        let address = credentials.address.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&address).map_err(|e| ClientError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidAddress {
                address,
                reason: "scheme must be http or https".to_string(),
            });
        }
        if parsed.host_str().is_none() {
            return Err(ClientError::InvalidAddress {
                address,
                reason: "missing host".to_string(),
            });
        }

        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&credentials.token).map_err(|_| {
            ClientError::Build("token contains characters not allowed in a header".to_string())
        })?;
        token.set_sensitive(true);
        headers.insert(TOKEN_HEADER, token);
        if let Some(namespace) = &credentials.namespace {
            let value = HeaderValue::from_str(namespace).map_err(|_| {
                ClientError::Build("namespace contains characters not allowed in a header".to_string())
            })?;
            headers.insert(NAMESPACE_HEADER, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .timeout(self.request_timeout)
            .danger_accept_invalid_certs(credentials.skip_tls_verify)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(VaultClient {
            address,
            namespace: credentials.namespace.clone(),
            skip_tls_verify: credentials.skip_tls_verify,
            http,
        })
    }
}

/// Client for one backend address, token and namespace.
///
/// Cloning is cheap: the connection pool is shared.
#[derive(Clone)]
pub struct VaultClient {
    /// Base URL without a trailing slash.
    address: String,
    namespace: Option<String>,
    skip_tls_verify: bool,
    http: reqwest::Client,
}

impl fmt::Debug for VaultClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VaultClient")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("skip_tls_verify", &self.skip_tls_verify)
            .finish_non_exhaustive()
    }
}

impl VaultClient {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    // -----------------------------
    // sys
    // -----------------------------

    /// `GET sys/health`, asking for a 200 in every state so the body is always decoded.
    pub async fn health(&self) -> Result<HealthStatus, BackendError> {
        let path = "sys/health";
        let body = self
            .send(
                Method::GET,
                path,
                &[
                    ("standbyok", "true"),
                    ("perfstandbyok", "true"),
                    ("sealedcode", "200"),
                    ("uninitcode", "200"),
                ],
                None,
            )
            .await?
            .ok_or_else(|| empty_body(path))?;
        serde_json::from_value(body).map_err(|e| decode(path, e))
    }

    pub async fn list_mounts(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.table("sys/mounts").await
    }

    pub async fn list_auth_methods(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.table("sys/auth").await
    }

    pub async fn list_audit_devices(&self) -> Result<Vec<MountEntry>, BackendError> {
        self.table("sys/audit").await
    }

    pub async fn list_policies(&self) -> Result<Vec<String>, BackendError> {
        self.list("sys/policies/acl").await
    }

    /// Custom UI response headers. None configured is an empty list.
    pub async fn list_ui_headers(&self) -> Result<Vec<String>, BackendError> {
        self.list("sys/config/ui/headers").await
    }

    pub async fn create_mount(&self, path: &str, spec: &MountSpec) -> Result<(), BackendError> {
        self.write(&format!("sys/mounts/{path}"), spec).await?;
        Ok(())
    }

    pub async fn delete_mount(&self, path: &str) -> Result<(), BackendError> {
        self.send(Method::DELETE, &format!("sys/mounts/{path}"), &[], None)
            .await?;
        Ok(())
    }

    /// Detect the key/value layout of a mount.
    pub async fn kv_version(&self, mount: &str) -> Result<KvVersion, BackendError> {
        let body = self.get(&format!("sys/internal/ui/mounts/{mount}")).await?;
        Ok(KvVersion::from_options(data_section(&body).get("options")))
    }

    // -----------------------------
    // kv
    // -----------------------------

    /// Read a secret. `None` when it does not exist.
    pub async fn read_secret(&self, mount: &str, path: &str) -> Result<Option<Value>, BackendError> {
        let version = self.kv_version(mount).await?;
        let full_path = version.data_path(mount, path);
        let body = match self.get(&full_path).await {
            Ok(body) => body,
            Err(err) if err.is_not_found() => return Ok(None),
            Err(err) => return Err(err),
        };

        let data = data_section(&body);
        Ok(Some(match version {
            KvVersion::V2 => json!({
                "data": data.get("data").cloned().unwrap_or(Value::Null),
                "metadata": data.get("metadata").cloned().unwrap_or(Value::Null),
            }),
            KvVersion::V1 => json!({ "data": data.clone() }),
        }))
    }

    /// Write a secret, returning version metadata when the engine reports it.
    pub async fn write_secret(
        &self,
        mount: &str,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<Option<Value>, BackendError> {
        let version = self.kv_version(mount).await?;
        let full_path = version.data_path(mount, path);
        let body = match version {
            KvVersion::V2 => self.write(&full_path, &json!({ "data": data })).await?,
            KvVersion::V1 => self.write(&full_path, data).await?,
        };
        Ok(body.map(|b| data_section(&b).clone()))
    }

    pub async fn delete_secret(&self, mount: &str, path: &str) -> Result<(), BackendError> {
        let version = self.kv_version(mount).await?;
        self.send(Method::DELETE, &version.data_path(mount, path), &[], None)
            .await?;
        Ok(())
    }

    pub async fn list_secrets(&self, mount: &str, path: &str) -> Result<Vec<String>, BackendError> {
        let version = self.kv_version(mount).await?;
        self.list(&version.list_path(mount, path)).await
    }

    // -----------------------------
    // pki
    // -----------------------------

    /// Generate an internal root CA, creating an issuer on the mount.
    pub async fn pki_generate_root<B: Serialize + ?Sized>(
        &self,
        mount: &str,
        body: &B,
    ) -> Result<Value, BackendError> {
        let path = format!("{mount}/root/generate/internal");
        let body = self.write(&path, body).await?.ok_or_else(|| empty_body(&path))?;
        Ok(data_section(&body).clone())
    }

    pub async fn pki_list_issuers(&self, mount: &str) -> Result<Vec<String>, BackendError> {
        self.list(&format!("{mount}/issuers")).await
    }

    pub async fn pki_write_role<B: Serialize + ?Sized>(
        &self,
        mount: &str,
        name: &str,
        body: &B,
    ) -> Result<(), BackendError> {
        self.write(&format!("{mount}/roles/{name}"), body).await?;
        Ok(())
    }

    pub async fn pki_list_roles(&self, mount: &str) -> Result<Vec<String>, BackendError> {
        self.list(&format!("{mount}/roles")).await
    }

    /// Issue a certificate. The response includes the private key.
    pub async fn pki_issue<B: Serialize + ?Sized>(
        &self,
        mount: &str,
        role: &str,
        body: &B,
    ) -> Result<Value, BackendError> {
        let path = format!("{mount}/issue/{role}");
        let body = self.write(&path, body).await?.ok_or_else(|| empty_body(&path))?;
        Ok(data_section(&body).clone())
    }

    // -----------------------------
    // transport
    // -----------------------------

    async fn get(&self, path: &str) -> Result<Value, BackendError> {
        self.send(Method::GET, path, &[], None)
            .await?
            .ok_or_else(|| empty_body(path))
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Option<Value>, BackendError> {
        let body = serde_json::to_value(body).map_err(|e| decode(path, e))?;
        self.send(Method::POST, path, &[], Some(body)).await
    }

    /// `LIST` via `GET ?list=true`. A 404 means there is nothing to list.
    async fn list(&self, path: &str) -> Result<Vec<String>, BackendError> {
        let body = match self.send(Method::GET, path, &[("list", "true")], None).await {
            Ok(Some(body)) => body,
            Ok(None) => return Ok(Vec::new()),
            Err(err) if err.is_not_found() => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        match data_section(&body).get("keys") {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(keys) => serde_json::from_value(keys.clone()).map_err(|e| decode(path, e)),
        }
    }

    /// Decode a path-keyed table such as `sys/mounts`.
    async fn table(&self, path: &str) -> Result<Vec<MountEntry>, BackendError> {
        let body = self.get(path).await?;
        let map = data_section(&body)
            .as_object()
            .ok_or_else(|| BackendError::Decode {
                path: path.to_string(),
                reason: "expected an object".to_string(),
            })?;
        MountEntry::table_from(map).map_err(|e| decode(path, e))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Option<Value>, BackendError> {
        let url = format!("{}/v1/{}", self.address, path);
        let mut request = self.http.request(method.clone(), url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = &body {
            request = request.json(body);
        }

        tracing::debug!(method = %method, path, "backend request");

        let request_failed = |e: reqwest::Error| BackendError::Request {
            method: method.to_string(),
            path: path.to_string(),
            reason: e.without_url().to_string(),
        };
        let response = request.send().await.map_err(request_failed)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(request_failed)?;

        if !status.is_success() {
            tracing::debug!(method = %method, path, status = status.as_u16(), "backend error");
            return Err(BackendError::Status {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                errors: error_messages(&bytes),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| decode(path, e))
    }
}

/// The `data` object of a response, or the whole body when there is none.
fn data_section(body: &Value) -> &Value {
    match body.get("data") {
        Some(data) if data.is_object() => data,
        _ => body,
    }
}

/// Extract `{"errors": [...]}` from an error body.
fn error_messages(bytes: &[u8]) -> Vec<String> {
    serde_json::from_slice::<Value>(bytes)
        .ok()
        .and_then(|v| v.get("errors").cloned())
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default()
}

fn decode(path: &str, err: serde_json::Error) -> BackendError {
    BackendError::Decode {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

fn empty_body(path: &str) -> BackendError {
    BackendError::Decode {
        path: path.to_string(),
        reason: "empty response body".to_string(),
    }
}
