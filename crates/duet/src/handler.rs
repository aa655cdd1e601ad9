//! Per-connection handler: frame decoding and outbound delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Register with the engine, handing it an outbound queue
//!   2. Spawn a writer task that drains that queue onto the socket
//!   3. Loop: receive frames → decode → forward to the engine
//!   4. On close (clean or not), tell the engine

use std::sync::Arc;

use duet_pairing::EngineHandle;
use duet_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use duet_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::DuetError;

/// Drop guard that tells the engine a connection closed when the handler
/// exits, including by panic or early return.
///
/// `Drop` is synchronous, so the close is sent from a spawned task.
struct ConnectionGuard {
    id: ConnectionId,
    engine: EngineHandle,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let id = self.id;
        let engine = self.engine.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.close(id).await {
                tracing::debug!(conn_id = %id, error = %e, "close not delivered");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C>(
    conn: WebSocketConnection,
    engine: EngineHandle,
    codec: C,
) -> Result<(), DuetError>
where
    C: Codec + Clone,
{
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let (tx, rx) = mpsc::unbounded_channel();
    engine.open(conn_id, tx).await?;
    let _guard = ConnectionGuard {
        id: conn_id,
        engine: engine.clone(),
    };
    tracing::debug!(%conn_id, "connection registered");

    let writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, codec.clone()));

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::debug!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "dropping undecodable frame");
                continue;
            }
        };
        tracing::trace!(%conn_id, event = event.name(), "inbound event");
        engine.inbound(conn_id, event).await?;
    }

    writer.abort();
    // _guard drops here → engine close fires.
    Ok(())
}

/// Drains the outbound queue onto the socket until the engine drops the
/// sender or a send fails.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    codec: C,
) {
    let conn_id = conn.id();
    while let Some(event) = rx.recv().await {
        let bytes = match codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
    let _ = conn.close().await;
}
