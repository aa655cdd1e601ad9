//! Engine actor: a single Tokio task that owns the [`PairingEngine`].
//!
//! Connection handlers never touch pairing state directly. They send
//! commands through an [`EngineHandle`] and the actor applies them one at a
//! time, so no locking is needed and every event sees the effects of all
//! events processed before it.

use std::collections::HashMap;
use std::time::Instant;

use duet_protocol::{ClientEvent, ConnectionId, Mode, ServerEvent};
use duet_registry::AbuseLimits;
use tokio::sync::{mpsc, oneshot};

use crate::{Channel, ChannelError, PairingEngine, PairingError};

/// Channel sender for delivering server events to one connection's writer.
pub type ClientSender = mpsc::UnboundedSender<ServerEvent>;

/// Commands sent to the engine actor.
pub(crate) enum EngineCommand {
    /// Register a new connection and the queue its events go to.
    Open {
        id: ConnectionId,
        sender: ClientSender,
        reply: oneshot::Sender<Result<(), PairingError>>,
    },

    /// A decoded event from a connection.
    Inbound { id: ConnectionId, event: ClientEvent },

    /// The connection's channel closed.
    Close { id: ConnectionId },

    /// Request a snapshot of counts.
    Stats { reply: oneshot::Sender<EngineStats> },

    /// Stop the actor.
    Shutdown,
}

/// Counts describing the engine at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Open connections.
    pub connections: usize,
    /// Connections currently in a pair.
    pub matched: usize,
    waiting: [usize; 3],
}

impl EngineStats {
    /// Connections waiting in `mode`.
    pub fn waiting(&self, mode: Mode) -> usize {
        self.waiting[mode.index()]
    }

    /// Connections waiting across all modes.
    pub fn total_waiting(&self) -> usize {
        self.waiting.iter().sum()
    }
}

/// Handle to the running engine actor.
///
/// Cheap to clone; every connection handler holds one.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Registers `id`. Events for it will be pushed into `sender`.
    pub async fn open(
        &self,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Result<(), PairingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Open {
                id,
                sender,
                reply: reply_tx,
            })
            .await
            .map_err(|_| PairingError::Unavailable)?;
        reply_rx.await.map_err(|_| PairingError::Unavailable)?
    }

    /// Hands an event from `id` to the engine (fire-and-forget).
    ///
    /// Failures are reported to the client as an `error` event, not here.
    pub async fn inbound(
        &self,
        id: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), PairingError> {
        self.sender
            .send(EngineCommand::Inbound { id, event })
            .await
            .map_err(|_| PairingError::Unavailable)
    }

    /// Tells the engine that `id`'s channel closed.
    pub async fn close(&self, id: ConnectionId) -> Result<(), PairingError> {
        self.sender
            .send(EngineCommand::Close { id })
            .await
            .map_err(|_| PairingError::Unavailable)
    }

    /// Requests current counts.
    pub async fn stats(&self) -> Result<EngineStats, PairingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Stats { reply: reply_tx })
            .await
            .map_err(|_| PairingError::Unavailable)?;
        reply_rx.await.map_err(|_| PairingError::Unavailable)
    }

    /// Stops the actor. Commands sent afterwards fail with
    /// [`PairingError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), PairingError> {
        self.sender
            .send(EngineCommand::Shutdown)
            .await
            .map_err(|_| PairingError::Unavailable)
    }
}

/// The [`Channel`] the actor hands to the engine: one outbound queue per
/// open connection.
#[derive(Debug, Default)]
struct Outbox {
    senders: HashMap<ConnectionId, ClientSender>,
}

impl Channel for Outbox {
    fn send(
        &mut self,
        to: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), ChannelError> {
        self.senders
            .get(&to)
            .ok_or(ChannelError::Closed(to))?
            .send(event)
            .map_err(|_| ChannelError::Closed(to))
    }

    fn is_open(&self, id: ConnectionId) -> bool {
        self.senders.get(&id).is_some_and(|s| !s.is_closed())
    }
}

struct EngineActor {
    engine: PairingEngine,
    outbox: Outbox,
    receiver: mpsc::Receiver<EngineCommand>,
}

impl EngineActor {
    async fn run(mut self) {
        tracing::info!("engine actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                EngineCommand::Open { id, sender, reply } => {
                    let result = self.handle_open(id, sender);
                    let _ = reply.send(result);
                }
                EngineCommand::Inbound { id, event } => {
                    self.handle_inbound(id, event);
                }
                EngineCommand::Close { id } => {
                    self.engine.close(id, &mut self.outbox);
                    self.outbox.senders.remove(&id);
                }
                EngineCommand::Stats { reply } => {
                    let _ = reply.send(self.stats());
                }
                EngineCommand::Shutdown => {
                    tracing::info!("engine shutting down");
                    break;
                }
            }
        }

        tracing::info!(
            connections = self.engine.registry().len(),
            "engine actor stopped"
        );
    }

    fn handle_open(
        &mut self,
        id: ConnectionId,
        sender: ClientSender,
    ) -> Result<(), PairingError> {
        self.engine.open(id, Instant::now())?;
        self.outbox.senders.insert(id, sender);
        Ok(())
    }

    /// Applies the event and turns a failure into an `error` event for the
    /// sender. Rate-limit refusals carry their own message; anything else
    /// gets the event's generic one.
    fn handle_inbound(&mut self, id: ConnectionId, event: ClientEvent) {
        let name = event.name();
        let failure = event.failure_message();
        let result =
            self.engine
                .handle(id, event, Instant::now(), &mut self.outbox);

        let message = match result {
            Ok(()) => return,
            Err(PairingError::Policy(e)) => {
                tracing::debug!(conn_id = %id, event = name, error = %e, "action refused");
                e.to_string()
            }
            Err(e) => {
                tracing::error!(conn_id = %id, event = name, error = %e, "event failed");
                failure.to_owned()
            }
        };
        if let Err(e) = self.outbox.send(id, ServerEvent::error(message)) {
            tracing::debug!(conn_id = %id, error = %e, "could not report failure");
        }
    }

    fn stats(&self) -> EngineStats {
        let registry = self.engine.registry();
        let mut waiting = [0; 3];
        for mode in Mode::ALL {
            waiting[mode.index()] = registry.queue().len(mode);
        }
        EngineStats {
            connections: registry.len(),
            matched: registry.matched_count(),
            waiting,
        }
    }
}

/// Spawns the engine actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; handlers wait when it is full.
pub fn spawn_engine(limits: AbuseLimits, channel_size: usize) -> EngineHandle {
    let (tx, rx) = mpsc::channel(channel_size);

    let actor = EngineActor {
        engine: PairingEngine::new(limits),
        outbox: Outbox::default(),
        receiver: rx,
    };
    tokio::spawn(actor.run());

    EngineHandle { sender: tx }
}
