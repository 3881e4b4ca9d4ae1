//! Hub orchestration tests: startup fan-out, routing, and config
//! reconciliation against in-process upstream servers.

use std::time::Duration;

use mcp_hub::{ConfigSource, HubOptions, McpHub};
use mcp_hub_core::{ConfigChange, ConfigDiff, ConnectionStatus, HubError};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use tests::{broken_stdio_spec, config_with, http_spec, init_tracing, start_upstream};

fn options() -> HubOptions {
    HubOptions {
        watch: false,
        connect_timeout: Duration::from_secs(10),
    }
}

fn args(message: &str) -> Option<serde_json::Map<String, serde_json::Value>> {
    serde_json::json!({ "message": message }).as_object().cloned()
}

#[tokio::test(flavor = "multi_thread")]
async fn initialize_isolates_per_server_failures() {
    init_tracing();
    let upstream = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![
            ("good", http_spec(upstream.url())),
            ("bad", broken_stdio_spec()),
        ])),
        options(),
    );

    hub.initialize().await.unwrap();

    let good = hub.get_status("good").unwrap();
    assert_eq!(good.status, ConnectionStatus::Connected);
    assert_eq!(good.tools, 1);
    assert!(good.last_started.is_some());

    let bad = hub.get_status("bad").unwrap();
    assert_eq!(bad.status, ConnectionStatus::Errored);
    assert!(bad.error.unwrap().contains("Command not found"));

    let statuses = hub.get_all_statuses();
    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].name, "bad");
    assert_eq!(statuses[1].name, "good");
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_servers_register_without_connecting() {
    init_tracing();
    let upstream = start_upstream().await;
    let mut disabled = http_spec(upstream.url());
    disabled.disabled = true;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![
            ("a", http_spec(upstream.url())),
            ("b", disabled),
        ])),
        options(),
    );

    hub.initialize().await.unwrap();

    assert_eq!(hub.server_count(), 2);
    assert_eq!(hub.get_all_statuses().len(), 2);
    assert_eq!(hub.get_status("a").unwrap().status, ConnectionStatus::Connected);

    let b = hub.get_status("b").unwrap();
    assert_eq!(b.status, ConnectionStatus::Disconnected);
    assert_eq!(b.error, None);
    assert!(b.last_started.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn invokes_route_to_the_named_server() {
    init_tracing();
    let first = start_upstream().await;
    let second = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![
            ("first", http_spec(first.url())),
            ("second", http_spec(second.url())),
        ])),
        options(),
    );
    hub.initialize().await.unwrap();

    let result = hub.call_tool("first", "echo", args("hello")).await.unwrap();
    let rendered = serde_json::to_value(&result.content).unwrap().to_string();
    assert!(rendered.contains("hello"));

    assert_eq!(first.handler.tool_calls(), 1);
    assert_eq!(second.handler.tool_calls(), 0);

    let resource = hub.read_resource("second", "test://info").await.unwrap();
    let rendered = serde_json::to_value(&resource.contents).unwrap().to_string();
    assert!(rendered.contains("upstream info"));

    let prompt = hub.get_prompt("second", "greet", None).await.unwrap();
    let rendered = serde_json::to_value(&prompt.messages).unwrap().to_string();
    assert!(rendered.contains("Hello!"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_server_yields_not_found_with_context() {
    init_tracing();
    let hub = McpHub::new(ConfigSource::Object(config_with(vec![])), options());
    hub.initialize().await.unwrap();

    let err = hub.call_tool("ghost", "echo", None).await.unwrap_err();
    assert!(err.to_string().contains("Server not found: ghost"));
    match err {
        HubError::NotFound { context } => {
            assert_eq!(context.server, "ghost");
            assert_eq!(context.operation, Some("tool_call"));
            assert_eq!(context.tool.as_deref(), Some("echo"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let err = hub.read_resource("ghost", "test://info").await.unwrap_err();
    match err {
        HubError::NotFound { context } => {
            assert_eq!(context.operation, Some("resource_read"));
            assert_eq!(context.uri.as_deref(), Some("test://info"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn config_change_touches_only_changed_servers() {
    init_tracing();
    let kept = start_upstream().await;
    let removed = start_upstream().await;
    let added = start_upstream().await;

    let old_config = config_with(vec![
        ("kept", http_spec(kept.url())),
        ("removed", http_spec(removed.url())),
    ]);
    let hub = McpHub::new(ConfigSource::Object(old_config.clone()), options());
    hub.initialize().await.unwrap();

    let kept_connection = hub.get_connection("kept").unwrap();

    let new_config = config_with(vec![
        ("kept", http_spec(kept.url())),
        ("added", http_spec(added.url())),
    ]);
    let changes = ConfigDiff::between(&old_config, &new_config);
    assert_eq!(changes.added, vec!["added".to_string()]);
    assert_eq!(changes.removed, vec!["removed".to_string()]);
    assert!(changes.modified.is_empty());

    hub.apply_config_change(ConfigChange {
        config: new_config,
        changes,
    })
    .await;

    // Unchanged server keeps its live connection
    let same = hub.get_connection("kept").unwrap();
    assert!(std::sync::Arc::ptr_eq(&kept_connection, &same));
    assert_eq!(same.status(), ConnectionStatus::Connected);

    assert!(hub.get_status("removed").is_err());
    assert_eq!(
        hub.get_status("added").unwrap().status,
        ConnectionStatus::Connected
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn modified_server_is_reconnected_with_new_spec() {
    init_tracing();
    let old_upstream = start_upstream().await;
    let new_upstream = start_upstream().await;

    let old_config = config_with(vec![("srv", http_spec(old_upstream.url()))]);
    let hub = McpHub::new(ConfigSource::Object(old_config.clone()), options());
    hub.initialize().await.unwrap();

    let new_config = config_with(vec![("srv", http_spec(new_upstream.url()))]);
    let changes = ConfigDiff::between(&old_config, &new_config);
    assert_eq!(changes.modified, vec!["srv".to_string()]);

    hub.apply_config_change(ConfigChange {
        config: new_config,
        changes,
    })
    .await;

    assert_eq!(
        hub.get_status("srv").unwrap().status,
        ConnectionStatus::Connected
    );
    hub.call_tool("srv", "echo", args("ping")).await.unwrap();
    assert_eq!(new_upstream.handler.tool_calls(), 1);
    assert_eq!(old_upstream.handler.tool_calls(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn watchable_source_reconciles_pushed_changes() {
    init_tracing();
    let upstream = start_upstream().await;
    let (tx, rx) = mpsc::channel(8);

    let old_config = config_with(vec![]);
    let hub = McpHub::new(
        ConfigSource::Watchable {
            config: old_config.clone(),
            events: rx,
        },
        HubOptions {
            watch: true,
            connect_timeout: Duration::from_secs(10),
        },
    );
    hub.initialize().await.unwrap();
    assert!(hub.watching());

    let new_config = config_with(vec![("pushed", http_spec(upstream.url()))]);
    let changes = ConfigDiff::between(&old_config, &new_config);
    tx.send(ConfigChange {
        config: new_config,
        changes,
    })
    .await
    .unwrap();

    let mut connected = false;
    for _ in 0..100 {
        if hub
            .get_status("pushed")
            .map(|s| s.status == ConnectionStatus::Connected)
            .unwrap_or(false)
        {
            connected = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(connected, "pushed server should connect via watch task");
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_server_keeps_the_registry_entry() {
    init_tracing();
    let upstream = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![("srv", http_spec(upstream.url()))])),
        options(),
    );
    hub.initialize().await.unwrap();

    let conn = hub.get_connection("srv").unwrap();
    let agent = conn.agent().unwrap();

    hub.disconnect_server("srv").await;

    let status = hub.get_status("srv").unwrap();
    assert_eq!(status.status, ConnectionStatus::Disconnected);
    assert_eq!(status.error, None);
    assert_eq!(status.tools, 0);

    // The pool outlives the session so a later reconnect can reuse it
    assert!(!agent.is_released());
    conn.connect().await.unwrap();
    assert_eq!(hub.get_status("srv").unwrap().status, ConnectionStatus::Connected);

    // Unknown names are a quiet no-op
    hub.disconnect_server("ghost").await;
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_all_clears_the_registry() {
    init_tracing();
    let upstream = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![
            ("a", http_spec(upstream.url())),
            ("b", broken_stdio_spec()),
        ])),
        options(),
    );
    hub.initialize().await.unwrap();
    assert_eq!(hub.server_count(), 2);

    hub.disconnect_all().await;
    assert_eq!(hub.server_count(), 0);
    assert!(hub.get_status("a").is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_server_replaces_an_existing_connection() {
    init_tracing();
    let upstream = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![("srv", broken_stdio_spec())])),
        options(),
    );
    hub.initialize().await.unwrap();
    assert_eq!(
        hub.get_status("srv").unwrap().status,
        ConnectionStatus::Errored
    );

    let status = hub
        .connect_server("srv", http_spec(upstream.url()))
        .await
        .unwrap();
    assert_eq!(status.status, ConnectionStatus::Connected);
    assert_eq!(status.tools, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_reports_current_capabilities() {
    init_tracing();
    let upstream = start_upstream().await;
    let hub = McpHub::new(
        ConfigSource::Object(config_with(vec![("srv", http_spec(upstream.url()))])),
        options(),
    );
    hub.initialize().await.unwrap();

    let status = hub.refresh_server("srv").await.unwrap();
    assert_eq!(status.tools, 1);
    assert_eq!(status.prompts, 1);
    assert_eq!(status.resources, 1);

    let statuses = hub.refresh_all_servers().await;
    assert_eq!(statuses.len(), 1);

    let err = hub.refresh_server("ghost").await.unwrap_err();
    assert!(matches!(err, HubError::NotFound { .. }));
}
