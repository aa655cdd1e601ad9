//! Error types for the pairing layer.

use duet_registry::{PolicyError, RegistryError};

/// Errors returned by [`PairingEngine`](crate::PairingEngine) operations
/// and by the [`EngineHandle`](crate::EngineHandle).
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    /// The action was refused by a rate limit. The client is told why.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    /// A registry invariant check failed. The client only gets a generic
    /// error; the details are logged.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The engine actor is gone (shut down or panicked).
    #[error("pairing engine is unavailable")]
    Unavailable,
}
