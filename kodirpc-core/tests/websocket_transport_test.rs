use kodirpc_core::client::{ClientOptions, KodiClient, TransportKind};
use kodirpc_core::transport::websocket::WebSocketTransport;
use kodirpc_core::transport::{Transport, TransportError};
use mock_service::WsServer;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

fn client_for(server: &WsServer, close_on_request: bool) -> KodiClient {
    let mut options = ClientOptions::new(TransportKind::Ws);
    options.connection.host = "127.0.0.1".to_string();
    options.connection.port = Some(server.port());
    options.connection.close_on_request = close_on_request;

    KodiClient::new(options).unwrap()
}

#[tokio::test]
async fn test_close_on_request_uses_one_connection_per_call() {
    let server = WsServer::start().await.unwrap();
    let mut transport = WebSocketTransport::new(server.url(), true);

    transport.request("JSONRPC.Ping", None, None).await.unwrap();
    assert!(!transport.is_connected());

    transport.request("JSONRPC.Ping", None, None).await.unwrap();

    assert_eq!(server.connections(), 2);
    assert!(eventually(|| server.open_connections() == 0).await);
}

#[tokio::test]
async fn test_persistent_connection_is_reused_until_disconnect() {
    let server = WsServer::start().await.unwrap();
    let mut transport = WebSocketTransport::new(server.url(), false);

    let first = transport.request("JSONRPC.Ping", None, None).await.unwrap();
    let second = transport.request("JSONRPC.Ping", None, None).await.unwrap();

    assert_eq!(first.result, json!("pong"));
    assert_eq!(second.result, json!("pong"));
    assert_eq!(server.connections(), 1);
    assert_eq!(server.open_connections(), 1);
    assert!(transport.is_connected());

    transport.disconnect().await;

    assert!(!transport.is_connected());
    assert!(eventually(|| server.open_connections() == 0).await);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn test_supplied_id_is_used_once() {
    let server = WsServer::start().await.unwrap();
    let mut transport = WebSocketTransport::new(server.url(), false);

    let staged = transport
        .request("JSONRPC.Ping", None, Some("my-id".to_string()))
        .await
        .unwrap();
    let generated = transport.request("JSONRPC.Ping", None, None).await.unwrap();

    assert_eq!(staged.id, "my-id");
    assert_ne!(generated.id, "my-id");
    assert_eq!(generated.id.len(), 36);

    transport.disconnect().await;
}

#[tokio::test]
async fn test_malformed_frame_does_not_break_the_call() {
    let server = WsServer::builder()
        .before_each_response("this is not json")
        .start()
        .await
        .unwrap();
    let mut transport = WebSocketTransport::new(server.url(), false);
    let mut errors = transport.channels().subscribe_errors();

    let response = transport.request("JSONRPC.Ping", None, None).await.unwrap();
    assert_eq!(response.result, json!("pong"));

    let err = errors.try_recv().unwrap();
    assert_eq!(err.frame, "this is not json");
    assert!(errors.try_recv().is_err());

    // The connection survived the bad frame.
    assert!(transport.is_connected());
    let response = transport.request("JSONRPC.Ping", None, None).await.unwrap();
    assert_eq!(response.result, json!("pong"));
    assert_eq!(server.connections(), 1);

    transport.disconnect().await;
}

#[tokio::test]
async fn test_notifications_are_published() {
    let server = WsServer::builder()
        .before_each_response(mock_service::notification("Player.OnPlay", json!({"item": {"id": 1}})))
        .start()
        .await
        .unwrap();
    let mut transport = WebSocketTransport::new(server.url(), true);
    let mut notifications = transport.channels().subscribe_notifications();
    let mut errors = transport.channels().subscribe_errors();

    let response = transport.request("JSONRPC.Ping", None, None).await.unwrap();
    assert_eq!(response.result, json!("pong"));

    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.method, "Player.OnPlay");
    assert_eq!(notification.params["data"], json!({"item": {"id": 1}}));
    assert!(errors.try_recv().is_err());
}

#[tokio::test]
async fn test_stale_responses_are_discarded() {
    let server = WsServer::builder()
        .before_each_response(r#"{"id": "stale", "jsonrpc": "2.0", "result": 1}"#)
        .start()
        .await
        .unwrap();
    let mut transport = WebSocketTransport::new(server.url(), true);

    let response = transport.request("JSONRPC.Ping", None, None).await.unwrap();

    assert_eq!(response.result, json!("pong"));
    assert_ne!(response.id, "stale");
}

#[tokio::test]
async fn test_remote_errors_surface() {
    let server = WsServer::start().await.unwrap();
    let mut transport = WebSocketTransport::new(server.url(), true);

    let err = transport
        .request("Ghost.Method", None, None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        TransportError::Remote {
            code: mock_service::METHOD_NOT_FOUND,
            ..
        }
    ));
}

#[tokio::test]
async fn test_connect_failure() {
    // A port nobody listens on anymore.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut transport = WebSocketTransport::new(format!("ws://127.0.0.1:{port}/jsonrpc"), true);
    let err = transport
        .request("JSONRPC.Ping", None, None)
        .await
        .unwrap_err();

    assert!(matches!(err, TransportError::Connect { .. }));
    assert!(!transport.is_connected());

    // Disconnecting something that never connected still completes.
    transport.disconnect().await;
}

#[tokio::test]
async fn test_client_over_persistent_connection() {
    let server = WsServer::builder()
        .before_each_response("\u{0}garbage")
        .start()
        .await
        .unwrap();
    let client = client_for(&server, false);
    let mut errors = client.frame_errors().expect("websocket clients expose frame errors");
    assert!(client.notifications().is_some());

    client.connect().await.unwrap();

    let demo = client.namespace("Demo").unwrap();
    let result = demo.method("echo").unwrap().call(vec![json!("hi")]).await.unwrap();
    assert_eq!(result, json!("hi"));

    let sum = client
        .invoke("Demo.Add", vec![json!(20), json!(22)])
        .await
        .unwrap();
    assert_eq!(sum, json!(42));

    // Introspection plus two calls, all on the connection opened by `connect`.
    assert_eq!(server.requests(), 3);
    assert_eq!(server.connections(), 1);
    assert_eq!(errors.try_recv().unwrap().frame, "\u{0}garbage");

    client.disconnect().await;
    assert!(eventually(|| server.open_connections() == 0).await);
}

#[tokio::test]
async fn test_client_with_close_on_request() {
    let server = WsServer::start().await.unwrap();
    let client = client_for(&server, true);

    let pong = client.invoke("JSONRPC.Ping", vec![]).await.unwrap();
    assert_eq!(pong, json!("pong"));

    // One connection for the introspection, one for the call.
    assert_eq!(server.connections(), 2);
}
