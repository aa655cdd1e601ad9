//! Server configuration and deployment environment.

use std::fmt;
use std::str::FromStr;

use duet_registry::AbuseLimits;
use duet_transport::OriginPolicy;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Origins a production deployment accepts.
pub const PRODUCTION_ORIGINS: [&str; 2] =
    ["https://chat-random.vercel.app", "https://*.vercel.app"];

/// Origins a development deployment accepts.
pub const DEVELOPMENT_ORIGINS: [&str; 2] =
    ["http://localhost:3000", "http://localhost:5000"];

/// Where the server is deployed. Only affects which browser origins may
/// open a channel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// The origin allow-list for this environment.
    pub fn origin_policy(self) -> OriginPolicy {
        match self {
            Self::Development => OriginPolicy::allow_list(DEVELOPMENT_ORIGINS),
            Self::Production => OriginPolicy::allow_list(PRODUCTION_ORIGINS),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => f.write_str("development"),
            Self::Production => f.write_str("production"),
        }
    }
}

/// Error parsing an [`Environment`] name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown environment {0:?} (expected development or production)")]
pub struct ParseEnvironmentError(String);

impl FromStr for Environment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ParseEnvironmentError(s.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`DuetServer`](crate::DuetServer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub host: String,

    /// Port for both the WebSocket channel and `GET /api/health`.
    pub port: u16,

    /// Deployment environment.
    pub environment: Environment,

    /// Rate limits applied to every connection.
    pub limits: AbuseLimits,

    /// Capacity of the engine's command queue.
    pub engine_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Development,
            limits: AbuseLimits::default(),
            engine_queue: 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
