//! WebSocket transport implementation on top of `axum`.
//!
//! One listener serves both the WebSocket upgrade and any extra HTTP routes
//! (e.g. a health check). hyper drives every TCP connection in its own
//! task, so a peer that never finishes its handshake only stalls itself.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::{Connection, ConnectionId, OriginPolicy, Transport, TransportError};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Upgraded connections waiting for [`Transport::accept`].
const ACCEPT_BACKLOG: usize = 128;

#[derive(Clone)]
struct UpgradeState {
    origins: Arc<OriginPolicy>,
    incoming: mpsc::Sender<WebSocketConnection>,
}

/// A WebSocket-based [`Transport`] that listens for incoming connections.
///
/// Dropping the transport stops the listener.
pub struct WebSocketTransport {
    local_addr: SocketAddr,
    incoming: mpsc::Receiver<WebSocketConnection>,
    serve: JoinHandle<()>,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport that accepts every origin.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, OriginPolicy::Any, Router::new()).await
    }

    /// Binds a new WebSocket transport that only upgrades requests whose
    /// `Origin` header passes `origins`, and serves `routes` on the same
    /// listener. Any path not claimed by `routes` is treated as an upgrade
    /// request.
    pub async fn bind_with(
        addr: &str,
        origins: OriginPolicy,
        routes: Router,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        let local_addr =
            listener.local_addr().map_err(TransportError::AcceptFailed)?;

        let (tx, rx) = mpsc::channel(ACCEPT_BACKLOG);
        let state = UpgradeState {
            origins: Arc::new(origins),
            incoming: tx,
        };
        let app = Router::new()
            .fallback(upgrade)
            .with_state(state)
            .merge(routes);

        let serve = tokio::spawn(async move {
            let service =
                app.into_make_service_with_connect_info::<SocketAddr>();
            if let Err(e) = axum::serve(listener, service).await {
                tracing::error!(error = %e, "WebSocket listener stopped");
            }
        });

        tracing::info!(%local_addr, "WebSocket transport listening");
        Ok(Self {
            local_addr,
            incoming: rx,
            serve,
        })
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.serve.abort();
    }
}

async fn upgrade(
    State(state): State<UpgradeState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());
    if !state.origins.allows(origin) {
        tracing::warn!(
            %addr,
            origin = origin.unwrap_or_default(),
            "rejected WebSocket origin"
        );
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| async move {
        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %addr, "accepted WebSocket connection");

        let (sink, stream) = socket.split();
        let conn = WebSocketConnection {
            id,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        };
        if state.incoming.send(conn).await.is_err() {
            tracing::debug!(%id, "transport closed; dropping connection");
        }
    })
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        self.incoming.recv().await.ok_or(TransportError::Stopped)
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        Ok(self.local_addr)
    }
}

/// A single WebSocket connection.
///
/// The socket is split so a reader task can wait in [`recv`](Connection::recv)
/// while a writer task pushes outbound frames.
pub struct WebSocketConnection {
    id: ConnectionId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    stream: Mutex<SplitStream<WebSocket>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// Sends `data` as a text frame when it is valid UTF-8 (the JSON codec
    /// always produces UTF-8), otherwise as a binary frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::Text(text.to_owned()),
            Err(_) => Message::Binary(data.to_vec()),
        };
        self.sink.lock().await.send(msg).await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.into_bytes()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink.lock().await.close().await.map_err(|e| {
            TransportError::SendFailed(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}
