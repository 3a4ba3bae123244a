//! Security posture tool tests.

use super::common::*;
use serde_json::json;

#[tokio::test]
async fn test_parallel_report() {
    let ctx = TestContext::setup().await;
    let session_id = ctx.initialize(&ctx.vault_headers()).await;

    let report = tool_json(
        &ctx.call_tool(Some(&session_id), "analyze_security_posture", json!({}), &[])
            .await,
    );

    assert_eq!(report["health"]["cluster_name"], "fake-cluster");
    assert_eq!(report["audit_devices"], json!([]));
    assert_eq!(report["auth_methods"][0]["path"], "token/");
    assert_eq!(report["policies"], json!(["default", "root"]));
    assert_eq!(report["mounts"].as_array().unwrap().len(), 3);
    assert!(report["ui_config"].is_null());

    let metadata = &report["metadata"];
    assert_eq!(metadata["scope"].as_array().unwrap().len(), 6);
    assert_eq!(metadata["errors"], json!([]));
    let warnings = metadata["warnings"].as_array().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].as_str().unwrap().starts_with("ui_config:"));
}

#[tokio::test]
async fn test_health_only_matches_across_modes() {
    let ctx = TestContext::setup().await;
    let headers = ctx.vault_headers();
    let health_only = |parallel: bool| {
        json!({
            "include_audit": false,
            "include_auth_methods": false,
            "include_policies": false,
            "include_mounts": false,
            "include_ui_config": false,
            "parallel": parallel
        })
    };

    let parallel = tool_json(
        &ctx.call_tool(None, "analyze_security_posture", health_only(true), &headers)
            .await,
    );
    let sequential = tool_json(
        &ctx.call_tool(None, "analyze_security_posture", health_only(false), &headers)
            .await,
    );

    assert_eq!(parallel["health"], sequential["health"]);
    assert_eq!(parallel["metadata"]["scope"], json!(["health"]));
    assert!(parallel["policies"].is_null());
    assert_eq!(ctx.vault.request_count(), 2);
}

#[tokio::test]
async fn test_tolerant_run_collects_errors() {
    let ctx = TestContext::setup().await;
    let headers = vec![
        ("x-vault-addr", ctx.vault.address.clone()),
        ("x-vault-token", "s.revoked".to_string()),
    ];

    let report = tool_json(
        &ctx.call_tool(
            None,
            "analyze_security_posture",
            json!({"parallel": false}),
            &headers,
        )
        .await,
    );

    let errors = report["metadata"]["errors"].as_array().unwrap();
    let checks: Vec<_> = errors
        .iter()
        .map(|e| e.as_str().unwrap().split(':').next().unwrap())
        .collect();
    assert_eq!(checks, vec!["health", "audit", "auth_methods", "policies", "mounts"]);
    assert_eq!(report["metadata"]["warnings"].as_array().unwrap().len(), 1);
    assert_eq!(ctx.vault.request_count(), 6);
}

#[tokio::test]
async fn test_fail_fast_aborts_sequential_run() {
    let ctx = TestContext::setup().await;
    let headers = vec![
        ("x-vault-addr", ctx.vault.address.clone()),
        ("x-vault-token", "s.revoked".to_string()),
    ];

    let error = tool_error(
        &ctx.call_tool(
            None,
            "analyze_security_posture",
            json!({"parallel": false, "fail_fast": true}),
            &headers,
        )
        .await,
    );

    assert!(error.contains("health"), "{error}");
    assert_eq!(ctx.vault.request_count(), 1);
}
