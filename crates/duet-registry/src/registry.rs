//! The connection registry: every live connection, its partner, and the
//! waiting lists.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` with no locking. It is owned by
//! exactly one task (the engine actor), which handles one event at a time,
//! so no two mutations ever interleave.

use std::collections::HashMap;
use std::time::Instant;

use duet_protocol::{ConnectionId, Mode};

use crate::{
    AbuseCounters, Connection, ConnectionState, MatchQueue, RegistryError,
};

/// What [`ConnectionRegistry::remove`] took out.
#[derive(Debug, Clone)]
pub struct Removed {
    /// The connection as it was just before removal.
    pub connection: Connection,
    /// The partner that was detached and is now `Idle`, if there was one.
    pub detached_partner: Option<ConnectionId>,
}

/// Owns the state of every open connection.
///
/// ## Invariants
///
/// - A connection is in a waiting list iff its state is `Waiting`, and then
///   only in the list for its recorded mode.
/// - `Matched { partner }` is symmetric: if A's partner is B, B's partner
///   is A. Both have the same mode.
/// - No removed connection is referenced as anyone's partner.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
    queue: MatchQueue,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new `Idle` connection. `now` starts its message window.
    ///
    /// # Errors
    /// [`RegistryError::AlreadyExists`] if `id` is already registered.
    pub fn create(
        &mut self,
        id: ConnectionId,
        now: Instant,
    ) -> Result<&Connection, RegistryError> {
        if self.connections.contains_key(&id) {
            return Err(RegistryError::AlreadyExists(id));
        }
        tracing::debug!(conn_id = %id, "connection registered");
        Ok(self
            .connections
            .entry(id)
            .or_insert_with(|| Connection::new(id, now)))
    }

    /// Looks up a connection.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Returns `true` if `id` is registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Removes a connection together with its queue entry and pairing.
    ///
    /// If it was matched, the partner is reset to `Idle` and reported in
    /// [`Removed::detached_partner`] so the caller can notify it. Removing
    /// an unknown id is a no-op returning `None`.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Removed> {
        let connection = self.connections.remove(&id)?;

        let mut detached_partner = None;
        match connection.state {
            ConnectionState::Waiting => {
                if let Some(mode) = connection.mode {
                    self.queue.remove(mode, id);
                }
            }
            ConnectionState::Matched { partner } => {
                if let Some(other) = self.connections.get_mut(&partner) {
                    if other.state.partner() == Some(id) {
                        other.state = ConnectionState::Idle;
                        detached_partner = Some(partner);
                    }
                }
            }
            ConnectionState::Idle => {}
        }

        tracing::debug!(conn_id = %id, ?detached_partner, "connection removed");
        Some(Removed {
            connection,
            detached_partner,
        })
    }

    /// Moves a connection to `Idle` or `Waiting`.
    ///
    /// `Waiting` re-enqueues under the recorded mode (or the default mode
    /// when none was recorded). `Matched` can only be entered through
    /// [`set_partner`](Self::set_partner), and a matched connection must be
    /// released with [`clear_partner`](Self::clear_partner) first.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] — unknown id
    /// - [`RegistryError::InvalidTransition`] — target is `Matched`, or the
    ///   connection is currently matched
    pub fn set_state(
        &mut self,
        id: ConnectionId,
        to: ConnectionState,
    ) -> Result<(), RegistryError> {
        let conn = self.get_existing(id)?;
        let from = conn.state;
        if matches!(to, ConnectionState::Matched { .. })
            || matches!(from, ConnectionState::Matched { .. })
        {
            return Err(RegistryError::InvalidTransition { id, from, to });
        }
        match to {
            ConnectionState::Waiting => {
                let mode = conn.mode.unwrap_or_default();
                self.enqueue(id, mode)
            }
            _ => {
                self.dequeue(id)?;
                Ok(())
            }
        }
    }

    /// Puts a connection in `mode`'s waiting list and marks it `Waiting`.
    ///
    /// Already waiting in the same mode: no change, queue position kept.
    /// Waiting in another mode: moved to the tail of the new mode's list.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] — unknown id
    /// - [`RegistryError::AlreadyPaired`] — the connection is matched
    pub fn enqueue(
        &mut self,
        id: ConnectionId,
        mode: Mode,
    ) -> Result<(), RegistryError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;

        match (conn.state, conn.mode) {
            (ConnectionState::Matched { .. }, _) => {
                return Err(RegistryError::AlreadyPaired(id));
            }
            (ConnectionState::Waiting, Some(current)) if current == mode => {
                return Ok(());
            }
            (ConnectionState::Waiting, Some(current)) => {
                self.queue.remove(current, id);
            }
            _ => {}
        }

        conn.mode = Some(mode);
        conn.state = ConnectionState::Waiting;
        self.queue.push(mode, id);
        tracing::debug!(conn_id = %id, %mode, "connection waiting");
        Ok(())
    }

    /// Takes a connection out of its waiting list and marks it `Idle`.
    ///
    /// Returns `false` if it was not waiting (state unchanged).
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] if `id` is unknown.
    pub fn dequeue(&mut self, id: ConnectionId) -> Result<bool, RegistryError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        if conn.state != ConnectionState::Waiting {
            return Ok(false);
        }
        if let Some(mode) = conn.mode {
            self.queue.remove(mode, id);
        }
        conn.state = ConnectionState::Idle;
        Ok(true)
    }

    /// Pairs `a` and `b`: both leave their waiting list and become
    /// `Matched` with each other. Either both sides change or neither does.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] — either id unknown
    /// - [`RegistryError::SelfPairing`] — `a == b`
    /// - [`RegistryError::AlreadyPaired`] — either side already matched
    /// - [`RegistryError::ModeMismatch`] — recorded modes differ
    pub fn set_partner(
        &mut self,
        a: ConnectionId,
        b: ConnectionId,
    ) -> Result<(), RegistryError> {
        if a == b {
            return Err(RegistryError::SelfPairing(a));
        }
        let conn_a = self.get_existing(a)?;
        let conn_b = self.get_existing(b)?;
        if conn_a.partner().is_some() {
            return Err(RegistryError::AlreadyPaired(a));
        }
        if conn_b.partner().is_some() {
            return Err(RegistryError::AlreadyPaired(b));
        }
        if conn_a.mode != conn_b.mode {
            return Err(RegistryError::ModeMismatch(a, b));
        }

        // Validated; from here on nothing can fail.
        for (id, partner) in [(a, b), (b, a)] {
            if let Some(conn) = self.connections.get_mut(&id) {
                if conn.state == ConnectionState::Waiting {
                    if let Some(mode) = conn.mode {
                        self.queue.remove(mode, id);
                    }
                }
                conn.state = ConnectionState::Matched { partner };
            }
        }
        tracing::debug!(%a, %b, "pair formed");
        Ok(())
    }

    /// Dissolves the pair `id` belongs to, leaving both sides `Idle`.
    ///
    /// Returns the former partner, or `None` if `id` was not matched.
    ///
    /// # Errors
    /// [`RegistryError::NotFound`] if `id` is unknown.
    pub fn clear_partner(
        &mut self,
        id: ConnectionId,
    ) -> Result<Option<ConnectionId>, RegistryError> {
        let conn = self
            .connections
            .get_mut(&id)
            .ok_or(RegistryError::NotFound(id))?;
        let Some(partner) = conn.state.partner() else {
            return Ok(None);
        };
        conn.state = ConnectionState::Idle;

        if let Some(other) = self.connections.get_mut(&partner) {
            if other.state.partner() == Some(id) {
                other.state = ConnectionState::Idle;
            }
        }
        tracing::debug!(conn_id = %id, %partner, "pair dissolved");
        Ok(Some(partner))
    }

    /// The waiting lists.
    pub fn queue(&self) -> &MatchQueue {
        &self.queue
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns `true` if no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Number of connections currently matched (twice the pair count).
    pub fn matched_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.partner().is_some())
            .count()
    }

    pub(crate) fn counters_mut(
        &mut self,
        id: ConnectionId,
    ) -> Option<&mut AbuseCounters> {
        self.connections.get_mut(&id).map(|c| &mut c.abuse)
    }

    fn get_existing(
        &self,
        id: ConnectionId,
    ) -> Result<&Connection, RegistryError> {
        self.connections.get(&id).ok_or(RegistryError::NotFound(id))
    }
}

// =========================================================================
// Tests
// =========================================================================
