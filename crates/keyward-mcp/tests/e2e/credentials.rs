//! Credential resolution over HTTP.

use super::common::*;
use axum::http::StatusCode;
use keyward_mcp::CandidateValues;
use serde_json::json;

#[tokio::test]
async fn test_query_token_rejected_before_backend() {
    let ctx = TestContext::setup().await;

    for param in ["vault_token", "X-Vault-Token", "TOKEN"] {
        let uri = format!("/mcp?{param}={VALID_TOKEN}");
        let body = rpc(1, "tools/call", json!({"name": "list_mounts"}));
        let reply = ctx.post(&uri, &body, &ctx.vault_headers()).await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{param}");
        let message = reply.body.unwrap()["error"].as_str().unwrap().to_string();
        assert!(message.contains(param), "{message}");
        assert!(!message.contains(VALID_TOKEN), "{message}");
    }

    assert_eq!(ctx.vault.request_count(), 0);
    assert!(ctx.server.sessions().is_empty());
}

#[tokio::test]
async fn test_header_address_beats_query() {
    let ctx = TestContext::setup().await;

    // The query points at a dead port; the header wins.
    let session_id = {
        let reply = ctx
            .post(
                "/mcp?VAULT_ADDR=http://127.0.0.1:1",
                &rpc(1, "initialize", json!({})),
                &ctx.vault_headers(),
            )
            .await;
        reply.headers["mcp-session-id"].to_str().unwrap().to_string()
    };

    let client = ctx.server.sessions().get(&session_id).unwrap();
    assert_eq!(client.address(), ctx.vault.address);

    let response = ctx
        .call_tool(Some(&session_id), "list_mounts", json!({}), &[])
        .await;
    tool_json(&response);
}

#[tokio::test]
async fn test_query_address_used_without_header() {
    let ctx = TestContext::setup().await;

    let uri = format!("/mcp?VAULT_ADDR={}", ctx.vault.address);
    let body = rpc(1, "tools/call", json!({"name": "list_mounts"}));
    let reply = ctx
        .post(&uri, &body, &[("x-vault-token", VALID_TOKEN.to_string())])
        .await;

    assert_eq!(reply.status, StatusCode::OK);
    tool_json(&reply.body.unwrap());
    assert_eq!(ctx.vault.request_count(), 1);
}

#[tokio::test]
async fn test_environment_is_the_fallback() {
    let ctx = TestContext::setup_with_env(|vault| CandidateValues {
        address: Some(vault.address.clone()),
        token: Some(VALID_TOKEN.to_string()),
        ..CandidateValues::default()
    })
    .await;

    let response = ctx.call_tool(None, "list_mounts", json!({}), &[]).await;
    tool_json(&response);
}

#[tokio::test]
async fn test_token_and_namespace_forwarded() {
    let ctx = TestContext::setup().await;

    let mut headers = ctx.vault_headers();
    headers.push(("x-vault-namespace", "team-a".to_string()));
    let response = ctx.call_tool(None, "list_mounts", json!({}), &headers).await;
    tool_json(&response);

    let requests = ctx.vault.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "sys/mounts");
    assert_eq!(requests[0].token.as_deref(), Some(VALID_TOKEN));
    assert_eq!(requests[0].namespace.as_deref(), Some("team-a"));
}
