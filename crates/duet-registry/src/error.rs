//! Error types for the registry layer.

use std::time::Duration;

use duet_protocol::ConnectionId;

use crate::ConnectionState;

/// Errors raised when a registry operation would break an invariant.
///
/// Every operation validates before it mutates, so an `Err` always means
/// the registry is unchanged.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No connection with this id is registered.
    #[error("connection {0} not found")]
    NotFound(ConnectionId),

    /// A connection with this id is already registered.
    #[error("connection {0} already registered")]
    AlreadyExists(ConnectionId),

    /// A connection cannot be its own partner.
    #[error("connection {0} cannot pair with itself")]
    SelfPairing(ConnectionId),

    /// The connection already has a partner.
    #[error("connection {0} is already paired")]
    AlreadyPaired(ConnectionId),

    /// The two connections asked for different modes.
    #[error("connections {0} and {1} are in different modes")]
    ModeMismatch(ConnectionId, ConnectionId),

    /// The requested state change is not an edge of the state machine.
    #[error("connection {id} cannot go from {from} to {to}")]
    InvalidTransition {
        id: ConnectionId,
        from: ConnectionState,
        to: ConnectionState,
    },
}

/// An action refused by the [`AbuseGuard`](crate::AbuseGuard).
///
/// The `Display` text is what the client sees in its `error` event.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The connection is serving a join penalty.
    #[error("Join rate limit exceeded; try again in {}s", whole_secs_ceil(.remaining))]
    JoinBlocked { remaining: Duration },

    /// Too many chat messages in the current window.
    #[error("Message rate limit exceeded")]
    MessageLimit,

    /// The connection has used up its lifetime report allowance.
    #[error("Report limit exceeded")]
    ReportLimit,
}

/// Whole seconds, rounded up, at least 1.
fn whole_secs_ceil(d: &Duration) -> u64 {
    (d.as_secs() + u64::from(d.subsec_nanos() > 0)).max(1)
}
