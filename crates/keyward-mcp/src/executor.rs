//! Tool execution.
//!
//! `tools/call` arguments are parsed once into a typed [`ToolCall`]; path
//! arguments are normalized and checked there, so execution only ever sees
//! clean values. [`ToolExecutor`] then maps each call onto backend requests.
//!
//! Backend failures are tool results with `isError: true`, not JSON-RPC
//! errors: the call itself was well-formed.

use crate::error::McpError;
use crate::posture::{self, AnalyzeOptions, SecurityScope};
use crate::protocol::ToolContent;
use crate::vault::{BackendError, MountSpec, VaultClient};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::time::Duration;

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Create a successful result with JSON content.
    pub fn success_json(value: Value) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Json { json: value }],
            error: None,
        }
    }

    /// Create a successful result with a text message.
    pub fn success_text(text: impl Into<String>) -> Self {
        Self {
            success: true,
            content: vec![ToolContent::Text { text: text.into() }],
            error: None,
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text { text: msg.clone() }],
            error: Some(msg),
        }
    }
}

// =============================================================================
// Arguments
// =============================================================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateMountArgs {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MountPathArgs {
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListSecretsArgs {
    pub mount: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecretArgs {
    pub mount: String,
    pub path: String,
}

#[derive(Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WriteSecretArgs {
    pub mount: String,
    pub path: String,
    pub data: Map<String, Value>,
}

// Secret payloads stay out of debug output.
impl std::fmt::Debug for WriteSecretArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteSecretArgs")
            .field("mount", &self.mount)
            .field("path", &self.path)
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnablePkiArgs {
    pub path: String,
    #[serde(default)]
    pub max_ttl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePkiIssuerArgs {
    #[serde(skip_serializing)]
    pub mount: String,
    pub common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PkiMountArgs {
    pub mount: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePkiRoleArgs {
    #[serde(skip_serializing)]
    pub mount: String,
    #[serde(skip_serializing)]
    pub name: String,
    pub allowed_domains: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_subdomains: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_ttl: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IssueCertificateArgs {
    #[serde(skip_serializing)]
    pub mount: String,
    #[serde(skip_serializing)]
    pub role: String,
    pub common_name: String,
    /// Sent to the backend as one comma-separated string.
    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "comma_separated"
    )]
    pub alt_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzePostureArgs {
    #[serde(default = "enabled")]
    pub include_health: bool,
    #[serde(default = "enabled")]
    pub include_audit: bool,
    #[serde(default = "enabled")]
    pub include_auth_methods: bool,
    #[serde(default = "enabled")]
    pub include_policies: bool,
    #[serde(default = "enabled")]
    pub include_mounts: bool,
    #[serde(default = "enabled")]
    pub include_ui_config: bool,
    #[serde(default = "enabled")]
    pub parallel: bool,
    #[serde(default)]
    pub fail_fast: bool,
}

impl AnalyzePostureArgs {
    pub fn scope(&self) -> SecurityScope {
        SecurityScope {
            health: self.include_health,
            audit: self.include_audit,
            auth_methods: self.include_auth_methods,
            policies: self.include_policies,
            mounts: self.include_mounts,
            ui_config: self.include_ui_config,
        }
    }
}

fn enabled() -> bool {
    true
}

fn comma_separated<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join(","))
}

/// A parsed, validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ListMounts,
    CreateMount(CreateMountArgs),
    DeleteMount(MountPathArgs),
    ListSecrets(ListSecretsArgs),
    ReadSecret(SecretArgs),
    WriteSecret(WriteSecretArgs),
    DeleteSecret(SecretArgs),
    EnablePki(EnablePkiArgs),
    CreatePkiIssuer(CreatePkiIssuerArgs),
    ListPkiIssuers(PkiMountArgs),
    CreatePkiRole(CreatePkiRoleArgs),
    ListPkiRoles(PkiMountArgs),
    IssuePkiCertificate(IssueCertificateArgs),
    AnalyzeSecurityPosture(AnalyzePostureArgs),
}

impl ToolCall {
    /// Parse `tools/call` arguments for the named tool.
    ///
    /// Missing arguments are treated as an empty object.
    pub fn parse(name: &str, arguments: Value) -> Result<Self, McpError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Map::new()),
            other => other,
        };

        let call = match name {
            "list_mounts" => {
                parse_args::<Map<String, Value>>(name, arguments).and_then(|extra| {
                    match extra.keys().next() {
                        Some(key) => Err(invalid(name, format!("unknown field `{key}`"))),
                        None => Ok(ToolCall::ListMounts),
                    }
                })?
            }
            "create_mount" => {
                let mut args: CreateMountArgs = parse_args(name, arguments)?;
                args.path = clean_path(name, "path", &args.path)?;
                ToolCall::CreateMount(args)
            }
            "delete_mount" => {
                let mut args: MountPathArgs = parse_args(name, arguments)?;
                args.path = clean_path(name, "path", &args.path)?;
                ToolCall::DeleteMount(args)
            }
            "list_secrets" => {
                let mut args: ListSecretsArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                args.path = clean_optional_path(name, "path", &args.path)?;
                ToolCall::ListSecrets(args)
            }
            "read_secret" | "delete_secret" => {
                let mut args: SecretArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                args.path = clean_path(name, "path", &args.path)?;
                if name == "read_secret" {
                    ToolCall::ReadSecret(args)
                } else {
                    ToolCall::DeleteSecret(args)
                }
            }
            "write_secret" => {
                let mut args: WriteSecretArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                args.path = clean_path(name, "path", &args.path)?;
                ToolCall::WriteSecret(args)
            }
            "enable_pki" => {
                let mut args: EnablePkiArgs = parse_args(name, arguments)?;
                args.path = clean_path(name, "path", &args.path)?;
                ToolCall::EnablePki(args)
            }
            "create_pki_issuer" => {
                let mut args: CreatePkiIssuerArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                ToolCall::CreatePkiIssuer(args)
            }
            "list_pki_issuers" | "list_pki_roles" => {
                let mut args: PkiMountArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                if name == "list_pki_issuers" {
                    ToolCall::ListPkiIssuers(args)
                } else {
                    ToolCall::ListPkiRoles(args)
                }
            }
            "create_pki_role" => {
                let mut args: CreatePkiRoleArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                args.name = clean_path(name, "name", &args.name)?;
                ToolCall::CreatePkiRole(args)
            }
            "issue_pki_certificate" => {
                let mut args: IssueCertificateArgs = parse_args(name, arguments)?;
                args.mount = clean_path(name, "mount", &args.mount)?;
                args.role = clean_path(name, "role", &args.role)?;
                ToolCall::IssuePkiCertificate(args)
            }
            "analyze_security_posture" => {
                ToolCall::AnalyzeSecurityPosture(parse_args(name, arguments)?)
            }
            _ => {
                return Err(McpError::ToolNotFound {
                    name: name.to_string(),
                });
            }
        };
        Ok(call)
    }

    /// Tool name of this call.
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ListMounts => "list_mounts",
            ToolCall::CreateMount(_) => "create_mount",
            ToolCall::DeleteMount(_) => "delete_mount",
            ToolCall::ListSecrets(_) => "list_secrets",
            ToolCall::ReadSecret(_) => "read_secret",
            ToolCall::WriteSecret(_) => "write_secret",
            ToolCall::DeleteSecret(_) => "delete_secret",
            ToolCall::EnablePki(_) => "enable_pki",
            ToolCall::CreatePkiIssuer(_) => "create_pki_issuer",
            ToolCall::ListPkiIssuers(_) => "list_pki_issuers",
            ToolCall::CreatePkiRole(_) => "create_pki_role",
            ToolCall::ListPkiRoles(_) => "list_pki_roles",
            ToolCall::IssuePkiCertificate(_) => "issue_pki_certificate",
            ToolCall::AnalyzeSecurityPosture(_) => "analyze_security_posture",
        }
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    serde_json::from_value(arguments).map_err(|e| invalid(tool, e.to_string()))
}

fn invalid(tool: &str, reason: impl Into<String>) -> McpError {
    McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: reason.into(),
    }
}

/// Normalize a backend path argument: no surrounding slashes, no `..`
/// segments, no control characters, not empty.
fn clean_path(tool: &str, field: &str, raw: &str) -> Result<String, McpError> {
    let cleaned = clean_optional_path(tool, field, raw)?;
    if cleaned.is_empty() {
        return Err(invalid(tool, format!("`{field}` must not be empty")));
    }
    Ok(cleaned)
}

fn clean_optional_path(tool: &str, field: &str, raw: &str) -> Result<String, McpError> {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.chars().any(char::is_control) {
        return Err(invalid(tool, format!("`{field}` contains control characters")));
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(invalid(tool, format!("`{field}` must not contain '..' segments")));
    }
    Ok(trimmed.to_string())
}

// =============================================================================
// Execution
// =============================================================================

/// Runs parsed tool calls against a backend client.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    check_timeout: Option<Duration>,
}

impl Default for ToolExecutor {
    fn default() -> Self {
        Self::new(Some(posture::DEFAULT_CHECK_TIMEOUT))
    }
}

impl ToolExecutor {
    /// Create an executor. `check_timeout` bounds each posture check.
    pub fn new(check_timeout: Option<Duration>) -> Self {
        Self { check_timeout }
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: ToolCall, client: &VaultClient) -> ExecutionResult {
        let tool = call.name();
        tracing::info!(tool, address = client.address(), "Executing tool");

        let result = match call {
            ToolCall::AnalyzeSecurityPosture(args) => return self.analyze(args, client).await,
            other => run_backend_call(other, client).await,
        };

        match result {
            Ok(result) => result,
            Err(err) => {
                tracing::warn!(tool, error = %err, "Tool call failed");
                ExecutionResult::error(format!("{tool} failed: {err}"))
            }
        }
    }

    async fn analyze(&self, args: AnalyzePostureArgs, client: &VaultClient) -> ExecutionResult {
        let options = AnalyzeOptions {
            parallel: args.parallel,
            fail_fast: args.fail_fast,
            check_timeout: self.check_timeout,
        };

        match posture::analyze(client, &args.scope(), options).await {
            Ok(report) => match serde_json::to_value(&report) {
                Ok(json) => ExecutionResult::success_json(json),
                Err(e) => ExecutionResult::error(format!("failed to serialize report: {e}")),
            },
            Err(err) => ExecutionResult::error(format!("analyze_security_posture aborted: {err}")),
        }
    }
}

async fn run_backend_call(
    call: ToolCall,
    client: &VaultClient,
) -> Result<ExecutionResult, BackendError> {
    let result = match call {
        ToolCall::ListMounts => {
            let mounts = client.list_mounts().await?;
            ExecutionResult::success_json(json!({ "mounts": mounts }))
        }
        ToolCall::CreateMount(args) => {
            let spec = MountSpec {
                kind: args.kind,
                description: args.description,
                options: args.options,
                config: None,
            };
            client.create_mount(&args.path, &spec).await?;
            ExecutionResult::success_text(format!(
                "Enabled {} secret engine at {}/",
                spec.kind, args.path
            ))
        }
        ToolCall::DeleteMount(args) => {
            client.delete_mount(&args.path).await?;
            ExecutionResult::success_text(format!("Disabled secret engine at {}/", args.path))
        }
        ToolCall::ListSecrets(args) => {
            let keys = client.list_secrets(&args.mount, &args.path).await?;
            ExecutionResult::success_json(json!({
                "mount": args.mount,
                "path": args.path,
                "keys": keys,
            }))
        }
        ToolCall::ReadSecret(args) => match client.read_secret(&args.mount, &args.path).await? {
            Some(secret) => ExecutionResult::success_json(secret),
            None => ExecutionResult::error(format!(
                "read_secret: no secret at {}/{}",
                args.mount, args.path
            )),
        },
        ToolCall::WriteSecret(args) => {
            let metadata = client
                .write_secret(&args.mount, &args.path, &args.data)
                .await?;
            ExecutionResult::success_json(json!({
                "mount": args.mount,
                "path": args.path,
                "metadata": metadata,
            }))
        }
        ToolCall::DeleteSecret(args) => {
            client.delete_secret(&args.mount, &args.path).await?;
            ExecutionResult::success_text(format!("Deleted {}/{}", args.mount, args.path))
        }
        ToolCall::EnablePki(args) => {
            let config = args.max_ttl.map(|ttl| {
                let mut config = Map::new();
                config.insert("max_lease_ttl".to_string(), Value::String(ttl));
                config
            });
            let spec = MountSpec {
                kind: "pki".to_string(),
                description: None,
                options: None,
                config,
            };
            client.create_mount(&args.path, &spec).await?;
            ExecutionResult::success_text(format!("Enabled pki secret engine at {}/", args.path))
        }
        ToolCall::CreatePkiIssuer(args) => {
            let issued = client.pki_generate_root(&args.mount, &args).await?;
            ExecutionResult::success_json(issued)
        }
        ToolCall::ListPkiIssuers(args) => {
            let issuers = client.pki_list_issuers(&args.mount).await?;
            ExecutionResult::success_json(json!({ "mount": args.mount, "issuers": issuers }))
        }
        ToolCall::CreatePkiRole(args) => {
            client.pki_write_role(&args.mount, &args.name, &args).await?;
            ExecutionResult::success_text(format!(
                "Wrote role {} on {}/",
                args.name, args.mount
            ))
        }
        ToolCall::ListPkiRoles(args) => {
            let roles = client.pki_list_roles(&args.mount).await?;
            ExecutionResult::success_json(json!({ "mount": args.mount, "roles": roles }))
        }
        ToolCall::IssuePkiCertificate(args) => {
            let certificate = client.pki_issue(&args.mount, &args.role, &args).await?;
            ExecutionResult::success_json(certificate)
        }
        ToolCall::AnalyzeSecurityPosture(_) => {
            return Ok(ExecutionResult::error(
                "analyze_security_posture is not a backend pass-through",
            ));
        }
    };
    Ok(result)
}
