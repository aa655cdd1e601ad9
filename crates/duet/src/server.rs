//! `DuetServer` builder and server loop.
//!
//! This is the entry point for running a Duet server. It ties together the
//! layers: transport → protocol → pairing engine. The health endpoint is
//! served on the same listener as the WebSocket upgrade.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Instant;

use duet_pairing::{spawn_engine, EngineHandle, EngineStats};
use duet_protocol::{Codec, JsonCodec};
use duet_registry::AbuseLimits;
use duet_transport::{
    OriginPolicy, Transport, TransportError, WebSocketTransport,
};

use crate::handler::handle_connection;
use crate::{health, DuetError, ServerConfig};

/// Builder for configuring and starting a Duet server.
///
/// # Example
///
/// ```rust,no_run
/// use duet::prelude::*;
///
/// # async fn start() -> Result<(), DuetError> {
/// let server = DuetServer::builder()
///     .bind("0.0.0.0:3000")
///     .origins(Environment::Production.origin_policy())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DuetServerBuilder {
    bind_addr: String,
    origins: OriginPolicy,
    limits: AbuseLimits,
    engine_queue: usize,
}

impl DuetServerBuilder {
    /// Creates a new builder with default settings: loopback, any origin,
    /// default limits.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            origins: OriginPolicy::Any,
            limits: AbuseLimits::default(),
            engine_queue: 1024,
        }
    }

    /// Creates a builder from a [`ServerConfig`].
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind_addr())
            .origins(config.environment.origin_policy())
            .limits(config.limits.clone())
            .engine_queue(config.engine_queue)
    }

    /// Sets the address the listener binds to. It serves both the
    /// WebSocket upgrade and `GET /api/health`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets which browser origins may connect.
    pub fn origins(mut self, origins: OriginPolicy) -> Self {
        self.origins = origins;
        self
    }

    /// Sets the rate limits.
    pub fn limits(mut self, limits: AbuseLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets the capacity of the engine's command queue.
    pub fn engine_queue(mut self, size: usize) -> Self {
        self.engine_queue = size.max(1);
        self
    }

    /// Binds the listener and starts the engine actor.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build(self) -> Result<DuetServer, DuetError> {
        let started = Instant::now();
        let transport = WebSocketTransport::bind_with(
            &self.bind_addr,
            self.origins,
            health::router(started),
        )
        .await?;

        let engine = spawn_engine(self.limits, self.engine_queue);

        Ok(DuetServer {
            transport,
            engine,
            codec: JsonCodec,
        })
    }
}

impl Default for DuetServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duet server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuetServer<C: Codec = JsonCodec> {
    transport: WebSocketTransport,
    engine: EngineHandle,
    codec: C,
}

impl DuetServer {
    /// Creates a new builder.
    pub fn builder() -> DuetServerBuilder {
        DuetServerBuilder::new()
    }
}

impl<C> DuetServer<C>
where
    C: Codec + Clone,
{
    /// Returns the listener's address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the engine actor, e.g. for reading [`EngineStats`].
    pub fn engine(&self) -> EngineHandle {
        self.engine.clone()
    }

    /// Current engine counts.
    pub async fn stats(&self) -> Result<EngineStats, DuetError> {
        Ok(self.engine.stats().await?)
    }

    /// Runs the server until the process is terminated.
    pub async fn run(self) -> Result<(), DuetError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the server until `shutdown` completes, then stops the engine.
    ///
    /// Spawns a handler task for each upgraded connection. Handshakes and
    /// origin checks happen per connection inside the transport, so a
    /// stalled or refused client never holds up this loop.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), DuetError>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = ?self.local_addr().ok(), "Duet server running");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = self.transport.accept() => match accepted {
                    Ok(conn) => {
                        let engine = self.engine.clone();
                        let codec = self.codec.clone();
                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(conn, engine, codec).await
                            {
                                tracing::debug!(
                                    error = %e,
                                    "connection ended with error"
                                );
                            }
                        });
                    }
                    Err(TransportError::Stopped) => {
                        tracing::error!("listener stopped; shutting down");
                        self.engine.shutdown().await?;
                        return Err(TransportError::Stopped.into());
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                    }
                },
            }
        }

        tracing::info!("Duet server shutting down");
        self.engine.shutdown().await?;
        Ok(())
    }
}
