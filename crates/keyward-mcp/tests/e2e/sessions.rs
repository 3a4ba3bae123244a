//! Session lifecycle tests.

use super::common::*;
use axum::http::StatusCode;
use keyward_mcp::error::CONFIGURATION_ERROR_CODE;
use serde_json::json;

#[tokio::test]
async fn test_session_lifecycle() {
    let ctx = TestContext::setup().await;

    let session_id = ctx.initialize(&ctx.vault_headers()).await;
    assert!(ctx.server.sessions().get(&session_id).is_some());

    // The stored client is reused; later requests need no credentials.
    let response = ctx
        .call_tool(Some(&session_id), "list_mounts", json!({}), &[])
        .await;
    let mounts = tool_json(&response)["mounts"].as_array().unwrap().clone();
    let paths: Vec<_> = mounts.iter().map(|m| m["path"].as_str().unwrap()).collect();
    assert_eq!(paths, vec!["legacy/", "secret/", "sys/"]);

    assert_eq!(ctx.delete_session(&session_id).await, StatusCode::NO_CONTENT);
    assert!(ctx.server.sessions().get(&session_id).is_none());

    // After teardown the session has no client and no credentials to build one.
    let response = ctx
        .call_tool(Some(&session_id), "list_mounts", json!({}), &[])
        .await;
    assert_eq!(rpc_error_code(&response), CONFIGURATION_ERROR_CODE as i64);
}

#[tokio::test]
async fn test_initialize_without_token_still_succeeds() {
    let ctx = TestContext::setup().await;

    let session_id = ctx
        .initialize(&[("x-vault-addr", ctx.vault.address.clone())])
        .await;
    assert!(ctx.server.sessions().get(&session_id).is_none());

    // A later request with a token creates the client on demand.
    let response = ctx
        .call_tool(Some(&session_id), "list_mounts", json!({}), &ctx.vault_headers())
        .await;
    tool_json(&response);
    assert!(ctx.server.sessions().get(&session_id).is_some());
}

#[tokio::test]
async fn test_unknown_session_is_created_lazily() {
    let ctx = TestContext::setup().await;

    let response = ctx
        .call_tool(Some("never-initialized"), "list_mounts", json!({}), &ctx.vault_headers())
        .await;
    tool_json(&response);
    assert!(ctx.server.sessions().get("never-initialized").is_some());
}

#[tokio::test]
async fn test_request_without_session_is_transient() {
    let ctx = TestContext::setup().await;

    let response = ctx
        .call_tool(None, "list_mounts", json!({}), &ctx.vault_headers())
        .await;
    tool_json(&response);
    assert!(ctx.server.sessions().is_empty());
}

#[tokio::test]
async fn test_sessions_use_their_own_credentials() {
    let ctx = TestContext::setup().await;

    let good = ctx.initialize(&ctx.vault_headers()).await;
    let bad = ctx
        .initialize(&[
            ("x-vault-addr", ctx.vault.address.clone()),
            ("x-vault-token", "s.revoked".to_string()),
        ])
        .await;

    let response = ctx.call_tool(Some(&good), "list_mounts", json!({}), &[]).await;
    tool_json(&response);

    let response = ctx.call_tool(Some(&bad), "list_mounts", json!({}), &[]).await;
    let error = tool_error(&response);
    assert!(error.contains("sys/mounts"), "{error}");
    assert!(error.contains("403"), "{error}");
    assert!(!error.contains("s.revoked"));
}
