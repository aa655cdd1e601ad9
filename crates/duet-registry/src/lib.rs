//! Per-connection state for Duet.
//!
//! This crate owns everything the server remembers about a connection:
//!
//! 1. **Lifecycle** — `Idle`, `Waiting`, or `Matched` ([`ConnectionState`])
//! 2. **Registry** — every live connection, its partner, and the per-mode
//!    waiting lists ([`ConnectionRegistry`], [`MatchQueue`])
//! 3. **Abuse limits** — join penalties, message windows, and the report
//!    cap ([`AbuseGuard`], [`AbuseLimits`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Pairing Layer (above)  ← matchmaking and relay decisions
//!     ↕
//! Registry Layer (this crate)  ← connection state and invariants
//!     ↕
//! Protocol Layer (below)  ← provides ConnectionId, Mode
//! ```

mod abuse;
mod connection;
mod error;
mod queue;
mod registry;

pub use abuse::{AbuseCounters, AbuseGuard, AbuseLimits};
pub use connection::{Connection, ConnectionState};
pub use error::{PolicyError, RegistryError};
pub use queue::MatchQueue;
pub use registry::{ConnectionRegistry, Removed};
