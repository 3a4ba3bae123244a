//! Key/value and mount tool tests.

use super::common::*;
use serde_json::json;

#[tokio::test]
async fn test_kv_v2_round_trip() {
    let ctx = TestContext::setup().await;
    let session_id = ctx.initialize(&ctx.vault_headers()).await;
    let call = |name: &'static str, args| ctx.call_tool(Some(&session_id), name, args, &[]);

    let written = tool_json(
        &call(
            "write_secret",
            json!({"mount": "secret", "path": "app/db", "data": {"password": "hunter2"}}),
        )
        .await,
    );
    assert_eq!(written["metadata"]["version"], 1);

    let read = tool_json(&call("read_secret", json!({"mount": "secret", "path": "app/db"})).await);
    assert_eq!(read["data"], json!({"password": "hunter2"}));
    assert_eq!(read["metadata"]["version"], 1);

    let listed = tool_json(&call("list_secrets", json!({"mount": "secret"})).await);
    assert_eq!(listed["keys"], json!(["app/"]));

    let listed = tool_json(&call("list_secrets", json!({"mount": "secret", "path": "app"})).await);
    assert_eq!(listed["keys"], json!(["db"]));

    tool_json(&call("delete_secret", json!({"mount": "secret", "path": "app/db"})).await);
    let error = tool_error(&call("read_secret", json!({"mount": "secret", "path": "app/db"})).await);
    assert!(error.contains("secret/app/db"), "{error}");

    // v2 data lives under data/ and is listed through metadata/.
    let paths: Vec<_> = ctx.vault.requests().into_iter().map(|r| r.path).collect();
    assert!(paths.contains(&"secret/data/app/db".to_string()));
    assert!(paths.contains(&"secret/metadata/app".to_string()));
}

#[tokio::test]
async fn test_kv_v1_layout() {
    let ctx = TestContext::setup().await;
    let headers = ctx.vault_headers();

    tool_json(
        &ctx.call_tool(
            None,
            "write_secret",
            json!({"mount": "legacy", "path": "svc/api", "data": {"key": "abc"}}),
            &headers,
        )
        .await,
    );

    let read = tool_json(
        &ctx.call_tool(
            None,
            "read_secret",
            json!({"mount": "legacy", "path": "svc/api"}),
            &headers,
        )
        .await,
    );
    assert_eq!(read, json!({"data": {"key": "abc"}}));

    let written = ctx
        .vault
        .requests()
        .into_iter()
        .find(|r| r.method == "POST")
        .unwrap();
    assert_eq!(written.path, "legacy/svc/api");
    // v1 bodies are not wrapped.
    assert_eq!(written.body, Some(json!({"key": "abc"})));
}

#[tokio::test]
async fn test_list_of_missing_folder_is_empty() {
    let ctx = TestContext::setup().await;
    let response = ctx
        .call_tool(
            None,
            "list_secrets",
            json!({"mount": "secret", "path": "nothing/here"}),
            &ctx.vault_headers(),
        )
        .await;
    assert_eq!(tool_json(&response)["keys"], json!([]));
}

#[tokio::test]
async fn test_path_traversal_never_reaches_backend() {
    let ctx = TestContext::setup().await;
    let response = ctx
        .call_tool(
            None,
            "read_secret",
            json!({"mount": "secret", "path": "../../sys/raw/core"}),
            &ctx.vault_headers(),
        )
        .await;

    assert_eq!(rpc_error_code(&response), -32602);
    assert_eq!(ctx.vault.request_count(), 0);
}

#[tokio::test]
async fn test_mount_tools() {
    let ctx = TestContext::setup().await;
    let headers = ctx.vault_headers();

    let created = tool_json(
        &ctx.call_tool(
            None,
            "create_mount",
            json!({"path": "team-a/", "type": "kv", "options": {"version": "2"}}),
            &headers,
        )
        .await,
    );
    assert!(created.as_str().unwrap().contains("team-a"));

    tool_json(
        &ctx.call_tool(None, "enable_pki", json!({"path": "pki", "max_ttl": "87600h"}), &headers)
            .await,
    );
    tool_json(
        &ctx.call_tool(None, "delete_mount", json!({"path": "team-a"}), &headers)
            .await,
    );

    let requests = ctx.vault.requests();
    assert_eq!(requests[0].path, "sys/mounts/team-a");
    assert_eq!(
        requests[0].body,
        Some(json!({"type": "kv", "options": {"version": "2"}}))
    );
    assert_eq!(requests[1].path, "sys/mounts/pki");
    assert_eq!(
        requests[1].body,
        Some(json!({"type": "pki", "config": {"max_lease_ttl": "87600h"}}))
    );
    assert_eq!(requests[2].method, "DELETE");
}
