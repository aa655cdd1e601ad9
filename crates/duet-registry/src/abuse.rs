//! Rate limits on join, chat, and report actions.
//!
//! Three independent policies, each checked against the acting
//! connection's own counters at the moment of the action:
//!
//! - **Join gate** — refused while a join penalty is running.
//! - **Message gate** — at most `max_messages_per_window` chat messages per
//!   fixed window. The window restarts only when a message arrives after
//!   the previous window has fully elapsed.
//! - **Report gate** — at most `max_reports` reports per connection,
//!   ever. Filing the last allowed report also starts a join penalty for
//!   the reporter.
//!
//! A check against an unknown connection is refused.

use std::time::{Duration, Instant};

use duet_protocol::ConnectionId;
use serde::{Deserialize, Serialize};

use crate::{ConnectionRegistry, PolicyError};

// ---------------------------------------------------------------------------
// AbuseLimits
// ---------------------------------------------------------------------------

/// Limits enforced by the [`AbuseGuard`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseLimits {
    /// Length of one chat-message window.
    pub message_window: Duration,

    /// Messages accepted per window.
    pub max_messages_per_window: u32,

    /// Reports a connection may file over its lifetime.
    pub max_reports: u32,

    /// How long joins are refused after the last allowed report.
    pub report_join_penalty: Duration,
}

impl Default for AbuseLimits {
    fn default() -> Self {
        Self {
            message_window: Duration::from_secs(60),
            max_messages_per_window: 30,
            max_reports: 5,
            report_join_penalty: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// AbuseCounters
// ---------------------------------------------------------------------------

/// Per-connection counters. Discarded with the connection.
#[derive(Debug, Clone)]
pub struct AbuseCounters {
    reports_filed: u32,
    last_report_time: Option<Instant>,
    messages_in_window: u32,
    window_start: Instant,
    blocked_until: Option<Instant>,
}

impl AbuseCounters {
    pub(crate) fn new(now: Instant) -> Self {
        Self {
            reports_filed: 0,
            last_report_time: None,
            messages_in_window: 0,
            window_start: now,
            blocked_until: None,
        }
    }

    /// Reports filed so far. Never decreases.
    pub fn reports_filed(&self) -> u32 {
        self.reports_filed
    }

    /// When the most recent report was filed.
    pub fn last_report_time(&self) -> Option<Instant> {
        self.last_report_time
    }

    /// Messages accepted in the current window.
    pub fn messages_in_window(&self) -> u32 {
        self.messages_in_window
    }

    /// When the current message window began.
    pub fn window_start(&self) -> Instant {
        self.window_start
    }

    /// End of the running join penalty, if any.
    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocked_until
    }
}

// ---------------------------------------------------------------------------
// AbuseGuard
// ---------------------------------------------------------------------------

/// Evaluates and updates the counters held in the registry.
///
/// Each `check_*` either accepts the action (updating counters as the
/// policy says) or returns a [`PolicyError`] and leaves them untouched.
#[derive(Debug, Clone, Default)]
pub struct AbuseGuard {
    limits: AbuseLimits,
}

impl AbuseGuard {
    /// Creates a guard enforcing `limits`.
    pub fn new(limits: AbuseLimits) -> Self {
        Self { limits }
    }

    /// The limits in force.
    pub fn limits(&self) -> &AbuseLimits {
        &self.limits
    }

    /// Join gate. An expired penalty is cleared on the way through.
    pub fn check_join(
        &self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
        now: Instant,
    ) -> Result<(), PolicyError> {
        let Some(counters) = registry.counters_mut(id) else {
            return Err(PolicyError::JoinBlocked {
                remaining: Duration::ZERO,
            });
        };
        match counters.blocked_until {
            Some(until) if now < until => Err(PolicyError::JoinBlocked {
                remaining: until - now,
            }),
            _ => {
                counters.blocked_until = None;
                Ok(())
            }
        }
    }

    /// Message gate.
    pub fn check_message(
        &self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
        now: Instant,
    ) -> Result<(), PolicyError> {
        let counters = registry
            .counters_mut(id)
            .ok_or(PolicyError::MessageLimit)?;

        let window_expired = now.saturating_duration_since(counters.window_start)
            > self.limits.message_window;
        let count = if window_expired {
            0
        } else {
            counters.messages_in_window
        };
        if count >= self.limits.max_messages_per_window {
            return Err(PolicyError::MessageLimit);
        }

        if window_expired {
            counters.window_start = now;
        }
        counters.messages_in_window = count + 1;
        Ok(())
    }

    /// Report gate. Penalizes the reporter, not the reported connection.
    pub fn check_report(
        &self,
        registry: &mut ConnectionRegistry,
        id: ConnectionId,
        now: Instant,
    ) -> Result<(), PolicyError> {
        let counters = registry
            .counters_mut(id)
            .ok_or(PolicyError::ReportLimit)?;
        if counters.reports_filed >= self.limits.max_reports {
            return Err(PolicyError::ReportLimit);
        }

        counters.reports_filed += 1;
        counters.last_report_time = Some(now);
        if counters.reports_filed == self.limits.max_reports {
            counters.blocked_until =
                now.checked_add(self.limits.report_join_penalty);
            tracing::info!(
                conn_id = %id,
                penalty = ?self.limits.report_join_penalty,
                "report cap reached, join penalty started"
            );
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================
