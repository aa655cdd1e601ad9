//! Wire protocol for Duet.
//!
//! This crate defines the closed set of events clients and the server
//! exchange:
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`Mode`]) — validated,
//!   strongly-typed messages. Anything that does not decode into one of
//!   these never reaches the pairing engine.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how events are
//!   converted to/from frame bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (ClientEvent) → Pairing engine
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use duet_transport::ConnectionId;
pub use error::ProtocolError;
pub use types::{ClientEvent, Mode, Opaque, ServerEvent};
