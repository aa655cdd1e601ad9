//! Connection types: the server's record of one open channel.

use std::fmt;
use std::time::Instant;

use duet_protocol::{ConnectionId, Mode};

use crate::AbuseCounters;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where a connection is in the pairing lifecycle.
///
/// ```text
///   Idle ──(join)──→ Waiting ──(matched)──→ Matched
///    ↑                  ↑                      │
///    │                  └───────(next)─────────┤
///    └──────────(partner next/disconnect)──────┘
/// ```
///
/// The partner lives inside `Matched`, so "partner present only while
/// matched" holds by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, not looking for a partner.
    Idle,

    /// In its mode's waiting list.
    Waiting,

    /// Paired with `partner`, whose state points back here.
    Matched { partner: ConnectionId },
}

impl ConnectionState {
    /// Returns the partner if matched.
    pub fn partner(&self) -> Option<ConnectionId> {
        match self {
            ConnectionState::Matched { partner } => Some(*partner),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Idle => f.write_str("Idle"),
            ConnectionState::Waiting => f.write_str("Waiting"),
            ConnectionState::Matched { partner } => {
                write!(f, "Matched({partner})")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One connection's state. Created `Idle` when the channel opens and
/// dropped when it closes.
///
/// Fields are read-only from outside the crate; every change goes through
/// [`ConnectionRegistry`](crate::ConnectionRegistry) so the waiting lists
/// and the partner relation stay consistent.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) id: ConnectionId,
    pub(crate) mode: Option<Mode>,
    pub(crate) state: ConnectionState,
    pub(crate) abuse: AbuseCounters,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, now: Instant) -> Self {
        Self {
            id,
            mode: None,
            state: ConnectionState::Idle,
            abuse: AbuseCounters::new(now),
        }
    }

    /// The connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The mode from the last join, if any.
    pub fn mode(&self) -> Option<Mode> {
        self.mode
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// The current partner, if matched.
    pub fn partner(&self) -> Option<ConnectionId> {
        self.state.partner()
    }

    /// Rate-limit counters.
    pub fn abuse(&self) -> &AbuseCounters {
        &self.abuse
    }
}
