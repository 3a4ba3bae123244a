//! Tool registry and the built-in tool catalog.
//!
//! The registry stores the [`ToolDefinition`]s advertised by `tools/list`.
//! [`catalog`] builds the fixed set of backend tools; argument parsing and
//! execution live in the `executor` module.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use serde_json::{Value, json};
use std::collections::HashMap;

/// Registry of available MCP tools.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registry pre-populated with [`catalog`].
    pub fn with_catalog() -> Self {
        let mut registry = Self::new();
        for tool in catalog() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool.
    pub fn register(&mut self, tool: ToolDefinition) {
        self.tools.insert(tool.name.clone(), tool);
    }

    /// Unregister a tool by name.
    pub fn unregister(&mut self, name: &str) -> Option<ToolDefinition> {
        self.tools.remove(name)
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// Check if a tool exists.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all tools, sorted by name.
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Get the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Every tool the server exposes.
pub fn catalog() -> Vec<ToolDefinition> {
    vec![
        // mounts
        tool(
            "list_mounts",
            "List enabled secret engines and their configuration.",
            object(json!({}), &[]),
            read_only(),
        ),
        tool(
            "create_mount",
            "Enable a secret engine at a path.",
            object(
                json!({
                    "path": string("Mount path, e.g. 'team-a-kv'"),
                    "type": string("Engine type, e.g. 'kv' or 'pki'"),
                    "description": string("Human-readable description"),
                    "options": {
                        "type": "object",
                        "description": "Engine options, e.g. {\"version\": \"2\"} for kv",
                        "additionalProperties": {"type": "string"}
                    }
                }),
                &["path", "type"],
            ),
            mutating(false),
        ),
        tool(
            "delete_mount",
            "Disable the secret engine at a path. All data under it is lost.",
            object(json!({ "path": string("Mount path") }), &["path"]),
            mutating(true),
        ),
        // kv
        tool(
            "list_secrets",
            "List secret keys under a path of a key/value mount.",
            object(
                json!({
                    "mount": string("Key/value mount path"),
                    "path": string("Folder inside the mount; empty lists the root")
                }),
                &["mount"],
            ),
            read_only(),
        ),
        tool(
            "read_secret",
            "Read a secret from a key/value mount.",
            object(
                json!({
                    "mount": string("Key/value mount path"),
                    "path": string("Secret path inside the mount")
                }),
                &["mount", "path"],
            ),
            read_only(),
        ),
        tool(
            "write_secret",
            "Create or replace a secret in a key/value mount.",
            object(
                json!({
                    "mount": string("Key/value mount path"),
                    "path": string("Secret path inside the mount"),
                    "data": {
                        "type": "object",
                        "description": "Key/value pairs to store"
                    }
                }),
                &["mount", "path", "data"],
            ),
            mutating(false),
        ),
        tool(
            "delete_secret",
            "Delete a secret from a key/value mount.",
            object(
                json!({
                    "mount": string("Key/value mount path"),
                    "path": string("Secret path inside the mount")
                }),
                &["mount", "path"],
            ),
            mutating(true),
        ),
        // pki
        tool(
            "enable_pki",
            "Enable a PKI secret engine at a path.",
            object(
                json!({
                    "path": string("Mount path"),
                    "max_ttl": string("Maximum certificate lifetime, e.g. '87600h'")
                }),
                &["path"],
            ),
            mutating(false),
        ),
        tool(
            "create_pki_issuer",
            "Generate an internal root CA on a PKI mount.",
            object(
                json!({
                    "mount": string("PKI mount path"),
                    "common_name": string("CA common name"),
                    "issuer_name": string("Name for the new issuer"),
                    "ttl": string("CA lifetime")
                }),
                &["mount", "common_name"],
            ),
            mutating(false),
        ),
        tool(
            "list_pki_issuers",
            "List issuer IDs on a PKI mount.",
            object(json!({ "mount": string("PKI mount path") }), &["mount"]),
            read_only(),
        ),
        tool(
            "create_pki_role",
            "Create or update a role that certificates are issued against.",
            object(
                json!({
                    "mount": string("PKI mount path"),
                    "name": string("Role name"),
                    "allowed_domains": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Domains certificates may be issued for"
                    },
                    "allow_subdomains": {
                        "type": "boolean",
                        "description": "Allow subdomains of the allowed domains"
                    },
                    "max_ttl": string("Maximum certificate lifetime")
                }),
                &["mount", "name", "allowed_domains"],
            ),
            mutating(false),
        ),
        tool(
            "list_pki_roles",
            "List roles on a PKI mount.",
            object(json!({ "mount": string("PKI mount path") }), &["mount"]),
            read_only(),
        ),
        tool(
            "issue_pki_certificate",
            "Issue a certificate from a PKI role. The response contains the private key.",
            object(
                json!({
                    "mount": string("PKI mount path"),
                    "role": string("Role to issue against"),
                    "common_name": string("Certificate common name"),
                    "alt_names": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Subject alternative names"
                    },
                    "ttl": string("Certificate lifetime")
                }),
                &["mount", "role", "common_name"],
            ),
            mutating(false),
        ),
        // posture
        tool(
            "analyze_security_posture",
            "Collect health, audit, auth, policy, mount and UI configuration into one report.",
            object(
                json!({
                    "include_health": flag("Include server health", true),
                    "include_audit": flag("Include audit devices", true),
                    "include_auth_methods": flag("Include auth methods", true),
                    "include_policies": flag("Include ACL policy names", true),
                    "include_mounts": flag("Include secret engine mounts", true),
                    "include_ui_config": flag("Include custom UI headers", true),
                    "parallel": flag("Run checks concurrently", true),
                    "fail_fast": flag("Abort on the first failing check (sequential runs only)", false)
                }),
                &[],
            ),
            read_only(),
        ),
    ]
}

fn tool(
    name: &str,
    description: &str,
    input_schema: Value,
    annotations: ToolAnnotations,
) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
        annotations: Some(annotations),
    }
}

fn object(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

fn string(description: &str) -> Value {
    json!({ "type": "string", "description": description })
}

fn flag(description: &str, default: bool) -> Value {
    json!({ "type": "boolean", "description": description, "default": default })
}

fn read_only() -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(true),
        destructive_hint: None,
    }
}

fn mutating(destructive: bool) -> ToolAnnotations {
    ToolAnnotations {
        read_only_hint: Some(false),
        destructive_hint: Some(destructive),
    }
}
