//! The outbound half of the message channel, as the engine sees it.

use duet_protocol::{ConnectionId, ServerEvent};

/// Error returned when an event cannot be handed to a connection.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The connection is unknown to the transport or already closed.
    #[error("channel to {0} is closed")]
    Closed(ConnectionId),
}

/// Delivers server events to connections.
///
/// Implemented by the transport side. A successful `send` only means the
/// event was queued; the engine never assumes it reached the client.
pub trait Channel {
    /// Queues `event` for `to`.
    fn send(
        &mut self,
        to: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), ChannelError>;

    /// Returns `true` if `id` can currently receive events.
    fn is_open(&self, id: ConnectionId) -> bool;
}

/// Sends `event` and logs (rather than propagates) a delivery failure.
pub(crate) fn deliver(
    channel: &mut impl Channel,
    to: ConnectionId,
    event: ServerEvent,
) {
    if let Err(e) = channel.send(to, event) {
        tracing::debug!(conn_id = %to, error = %e, "dropping outbound event");
    }
}
