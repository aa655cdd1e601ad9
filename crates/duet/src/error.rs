//! Unified error type for the Duet server.

use duet_pairing::PairingError;
use duet_protocol::ProtocolError;
use duet_registry::RegistryError;
use duet_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuetError {
    /// A transport-level error (bind, send, recv, listener stopped).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registry invariant was violated.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The pairing engine refused or is gone.
    #[error(transparent)]
    Pairing(#[from] PairingError),
}
