//! Pairing and relay for Duet.
//!
//! The [`PairingEngine`] is the whole core: it owns the
//! [`ConnectionRegistry`](duet_registry::ConnectionRegistry), gates actions
//! through the [`AbuseGuard`](duet_registry::AbuseGuard), pairs waiting
//! connections with the [`Matchmaker`], and forwards signaling and chat
//! through the [`SessionRelay`]. It is synchronous and talks to clients
//! only through the [`Channel`] capability, so it can be tested without a
//! runtime.
//!
//! In a running server the engine lives inside a single Tokio task (the
//! engine actor, see [`spawn_engine`]) and connection handlers reach it
//! through an [`EngineHandle`].

mod actor;
mod channel;
mod engine;
mod error;
mod matchmaker;
mod relay;

pub use actor::{spawn_engine, ClientSender, EngineHandle, EngineStats};
pub use channel::{Channel, ChannelError};
pub use engine::PairingEngine;
pub use error::PairingError;
pub use matchmaker::Matchmaker;
pub use relay::{DropReason, Relayed, SessionRelay};
