//! Integration tests driving the stdio transport against small `/bin/sh`
//! mock servers.

#![cfg(unix)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;

use fleet_mcp_core::error::FleetError;
use fleet_mcp_core::protocol::{JsonRpcRequest, RequestId};
use fleet_mcp_transport::{StdioTransport, Transport};

fn sh_server(script: &str) -> StdioTransport {
    StdioTransport::spawn(
        "/bin/sh",
        &["-c".to_string(), script.to_string()],
        &HashMap::new(),
    )
    .expect("failed to spawn mock server")
}

fn request(id: i64, method: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(method, None, Some(RequestId::Number(id)))
}

#[tokio::test]
async fn request_receives_matching_response() {
    let transport = sh_server(
        r#"read line
printf '{"jsonrpc":"2.0","id":1,"result":{"ok":true}}\n'"#,
    );

    let response = transport
        .request(request(1, "ping"), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(response.is_success());
    assert_eq!(response.result.unwrap()["ok"], true);
    assert_eq!(transport.pending_count().await, 0);

    transport.close().await.unwrap();
}

#[tokio::test]
async fn timeout_leaves_transport_usable() {
    // First request is swallowed; the second one gets a response.
    let transport = sh_server(
        r#"read line
read line
printf '{"jsonrpc":"2.0","id":2,"result":{"pong":true}}\n'"#,
    );

    let err = transport
        .request(request(1, "tools/list"), Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::Timeout(_)), "got {err:?}");

    // The expired entry is gone from the pending table.
    assert_eq!(transport.pending_count().await, 0);

    let response = transport
        .request(request(2, "ping"), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(response.is_success());

    transport.close().await.unwrap();
}

#[tokio::test]
async fn notifications_are_fanned_out() {
    let transport = sh_server(
        r#"read line
printf '{"jsonrpc":"2.0","method":"notifications/tick","params":{"n":1}}\n'
printf '{"jsonrpc":"2.0","id":1,"result":{}}\n'"#,
    );

    let mut first = transport.notifications();
    let mut second = transport.notifications();

    let response = transport
        .request(request(1, "ping"), Duration::from_secs(5))
        .await
        .unwrap();
    assert!(response.is_success());

    for stream in [&mut first, &mut second] {
        let notification = tokio::time::timeout(Duration::from_secs(5), stream.next())
            .await
            .expect("notification not delivered")
            .unwrap()
            .unwrap();
        assert_eq!(notification.method, "notifications/tick");
        assert!(notification.is_notification());
    }

    transport.close().await.unwrap();
}

#[tokio::test]
async fn close_fails_pending_requests() {
    let transport = Arc::new(sh_server("while read line; do :; done"));

    let in_flight = {
        let transport = transport.clone();
        tokio::spawn(async move {
            transport
                .request(request(1, "tools/list"), Duration::from_secs(30))
                .await
        })
    };

    // Let the request register and hit the wire before closing.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.pending_count().await, 1);

    transport.close().await.unwrap();

    let err = in_flight.await.unwrap().unwrap_err();
    assert!(matches!(err, FleetError::ConnectionClosed), "got {err:?}");
    assert_eq!(transport.pending_count().await, 0);
}

#[tokio::test]
async fn server_exit_surfaces_connection_closed() {
    let transport = sh_server("read line; exit 0");

    let err = transport
        .request(request(1, "tools/list"), Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::ConnectionClosed), "got {err:?}");
    assert_eq!(transport.pending_count().await, 0);

    transport.close().await.unwrap();
}

#[tokio::test]
async fn requests_after_close_are_rejected() {
    let transport = sh_server("while read line; do :; done");
    transport.close().await.unwrap();

    let err = transport
        .request(request(1, "ping"), Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(matches!(err, FleetError::ConnectionClosed));

    // Close is idempotent.
    transport.close().await.unwrap();
}
