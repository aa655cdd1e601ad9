//! The pairing engine: one value holding all pairing state, driven one
//! event at a time.

use std::time::Instant;

use duet_protocol::{ClientEvent, ConnectionId, Mode, ServerEvent};
use duet_registry::{AbuseGuard, AbuseLimits, ConnectionRegistry, Removed};

use crate::channel::{deliver, Channel};
use crate::{Matchmaker, PairingError, SessionRelay};

/// Owns the registry and the abuse guard and applies client events to
/// them.
///
/// Every method runs to completion without awaiting, so whoever owns the
/// engine serializes all mutations simply by calling it from one place.
/// `now` is always passed in.
#[derive(Debug, Default)]
pub struct PairingEngine {
    registry: ConnectionRegistry,
    guard: AbuseGuard,
}

impl PairingEngine {
    /// Creates an engine enforcing `limits`.
    pub fn new(limits: AbuseLimits) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            guard: AbuseGuard::new(limits),
        }
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Registers a newly opened channel as an `Idle` connection.
    ///
    /// # Errors
    /// [`PairingError::Registry`] if the id is already registered.
    pub fn open(
        &mut self,
        id: ConnectionId,
        now: Instant,
    ) -> Result<(), PairingError> {
        self.registry.create(id, now)?;
        tracing::info!(conn_id = %id, "connection opened");
        Ok(())
    }

    /// Forgets a closed channel: leaves its queue, dissolves its pair
    /// (telling the partner `partner-left`), and drops its counters.
    ///
    /// Closing an unknown or already closed id does nothing.
    pub fn close(
        &mut self,
        id: ConnectionId,
        channel: &mut impl Channel,
    ) -> Option<Removed> {
        let removed = self.registry.remove(id)?;
        if let Some(partner) = removed.detached_partner {
            deliver(channel, partner, ServerEvent::PartnerLeft);
        }
        tracing::info!(
            conn_id = %id,
            state = %removed.connection.state(),
            "connection closed"
        );
        Some(removed)
    }

    /// Applies one client event.
    ///
    /// # Errors
    /// - [`PairingError::Policy`] — refused by a rate limit; nothing changed
    /// - [`PairingError::Registry`] — an invariant check failed
    ///
    /// Events the relay declines (sender not paired, wrong target) are not
    /// errors: they return `Ok` and nothing is sent.
    pub fn handle(
        &mut self,
        id: ConnectionId,
        event: ClientEvent,
        now: Instant,
        channel: &mut impl Channel,
    ) -> Result<(), PairingError> {
        match event {
            ClientEvent::Join { mode } => {
                self.join(id, mode.unwrap_or_default(), now, channel)
            }
            ClientEvent::Next => self.next(id, channel),
            ClientEvent::Report { reported_id } => {
                self.report(id, reported_id, now, channel)
            }
            ClientEvent::ChatMessage { .. } => {
                self.guard.check_message(&mut self.registry, id, now)?;
                SessionRelay::relay(&self.registry, channel, id, event);
                Ok(())
            }
            ClientEvent::Offer { .. }
            | ClientEvent::Answer { .. }
            | ClientEvent::IceCandidate { .. } => {
                SessionRelay::relay(&self.registry, channel, id, event);
                Ok(())
            }
        }
    }

    fn join(
        &mut self,
        id: ConnectionId,
        mode: Mode,
        now: Instant,
        channel: &mut impl Channel,
    ) -> Result<(), PairingError> {
        if let Some(partner) = self.registry.get(id).and_then(|c| c.partner())
        {
            tracing::debug!(conn_id = %id, %partner, "join while matched, ignoring");
            return Ok(());
        }

        self.guard.check_join(&mut self.registry, id, now)?;
        self.registry.enqueue(id, mode)?;
        Matchmaker::run(&mut self.registry, channel)?;
        Ok(())
    }

    /// Leaves the current partner. The partner is told and left `Idle`;
    /// only the caller goes back into the queue.
    fn next(
        &mut self,
        id: ConnectionId,
        channel: &mut impl Channel,
    ) -> Result<(), PairingError> {
        let Some(conn) = self.registry.get(id) else {
            return Ok(());
        };
        let Some(partner) = conn.partner() else {
            tracing::debug!(conn_id = %id, "next while unpaired, ignoring");
            return Ok(());
        };
        let mode = conn.mode().unwrap_or_default();

        self.registry.clear_partner(id)?;
        deliver(channel, partner, ServerEvent::PartnerLeft);
        tracing::info!(conn_id = %id, %partner, "pair dissolved by next");

        self.registry.enqueue(id, mode)?;
        Matchmaker::run(&mut self.registry, channel)?;
        Ok(())
    }

    fn report(
        &mut self,
        id: ConnectionId,
        reported: ConnectionId,
        now: Instant,
        channel: &mut impl Channel,
    ) -> Result<(), PairingError> {
        self.guard.check_report(&mut self.registry, id, now)?;
        deliver(channel, reported, ServerEvent::Reported);
        tracing::info!(reporter = %id, %reported, "connection reported");
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
