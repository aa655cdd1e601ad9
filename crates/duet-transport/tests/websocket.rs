//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and connect
//! `tokio-tungstenite` clients to it.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use axum::routing::get;
    use axum::Router;
    use duet_transport::{
        Connection, OriginPolicy, Transport, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connect_client(addr: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        ws
    }

    #[tokio::test]
    async fn test_websocket_accept_and_send_receive() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.expect("task should complete");
        assert!(server_conn.id().into_inner() > 0);

        // UTF-8 payloads go out as text frames.
        server_conn
            .send(br#"{"event":"partner-left"}"#)
            .await
            .expect("send should succeed");
        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_data().as_ref(), br#"{"event":"partner-left"}"#);

        client_ws
            .send(Message::Text(r#"{"event":"next"}"#.into()))
            .await
            .unwrap();
        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"{"event":"next"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_send_while_recv_pending() {
        // The reader half must not hold up the writer half.
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let mut client_ws = connect_client(&addr).await;
        let server_conn =
            std::sync::Arc::new(server_handle.await.unwrap());

        let reader = std::sync::Arc::clone(&server_conn);
        let pending = tokio::spawn(async move { reader.recv().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            server_conn.send(b"hello"),
        )
        .await
        .expect("send must not wait for recv")
        .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = pending.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let mut client_ws = connect_client(&addr).await;
        let server_conn = server_handle.await.unwrap();

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_rejects_disallowed_origin() {
        let mut transport = WebSocketTransport::bind_with(
            "127.0.0.1:0",
            OriginPolicy::allow_list(["http://localhost:3000"]),
            Router::new(),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let mut request =
            format!("ws://{addr}").into_client_request().unwrap();
        request
            .headers_mut()
            .insert("origin", "https://evil.example".parse().unwrap());
        match tokio_tungstenite::connect_async(request).await {
            Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
                assert_eq!(response.status(), 403);
            }
            Err(e) => panic!("expected 403, got {e}"),
            Ok(_) => panic!("expected 403, handshake succeeded"),
        }

        let accepted =
            tokio::time::timeout(Duration::from_millis(100), transport.accept())
                .await;
        assert!(accepted.is_err(), "no connection should be handed out");
    }

    #[tokio::test]
    async fn test_websocket_accepts_allowed_origin() {
        let mut transport = WebSocketTransport::bind_with(
            "127.0.0.1:0",
            OriginPolicy::allow_list(["http://localhost:3000"]),
            Router::new(),
        )
        .await
        .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let server_handle =
            tokio::spawn(async move { transport.accept().await });

        let mut request =
            format!("ws://{addr}").into_client_request().unwrap();
        request
            .headers_mut()
            .insert("origin", "http://localhost:3000".parse().unwrap());
        let _client = tokio_tungstenite::connect_async(request)
            .await
            .expect("upgrade should succeed");

        assert!(server_handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_websocket_serves_extra_routes_on_same_listener() {
        let routes = Router::new().route("/ping", get(|| async { "pong" }));
        let mut transport =
            WebSocketTransport::bind_with("127.0.0.1:0", OriginPolicy::Any, routes)
                .await
                .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        let mut stream = TcpStream::connect(&addr).await.unwrap();
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("pong"), "{response}");

        let server_handle =
            tokio::spawn(async move { transport.accept().await });
        let _client = connect_client(&addr).await;
        assert!(server_handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_websocket_stalled_handshake_does_not_block_accept() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().unwrap().to_string();

        // Opens TCP and never sends the upgrade request.
        let _silent = TcpStream::connect(&addr).await.unwrap();

        let server_handle =
            tokio::spawn(async move { transport.accept().await });
        let _client = tokio::time::timeout(
            Duration::from_secs(3),
            connect_client(&addr),
        )
        .await
        .expect("second client must not wait on the silent one");
        assert!(server_handle.await.unwrap().is_ok());
    }
}
