//! # Duet
//!
//! Anonymous random pairing for video, voice, and text sessions.
//!
//! Clients connect over WebSocket, ask to be paired in a mode, and once
//! matched exchange WebRTC signaling and chat with their partner through
//! the server. The server never inspects those payloads. It only decides
//! who is paired with whom and enforces per-connection rate limits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use duet::prelude::*;
//!
//! # async fn start() -> Result<(), DuetError> {
//! let config = ServerConfig::default();
//! let server = DuetServerBuilder::from_config(&config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod health;
mod server;

pub use config::{
    Environment, ParseEnvironmentError, ServerConfig, DEVELOPMENT_ORIGINS,
    PRODUCTION_ORIGINS,
};
pub use error::DuetError;
pub use health::HealthStatus;
pub use server::{DuetServer, DuetServerBuilder};

pub use duet_pairing as pairing;
pub use duet_protocol as protocol;
pub use duet_registry as registry;
pub use duet_transport as transport;

pub mod prelude {
    //! Everything needed to configure and run a server.

    pub use crate::{
        DuetError, DuetServer, DuetServerBuilder, Environment, HealthStatus,
        ServerConfig,
    };
    pub use duet_pairing::EngineStats;
    pub use duet_protocol::{ClientEvent, ConnectionId, Mode, ServerEvent};
    pub use duet_registry::AbuseLimits;
    pub use duet_transport::OriginPolicy;
}
