//! Event types for Duet's wire format.
//!
//! Every frame is one JSON object, adjacently tagged:
//!
//! ```text
//! { "event": "chat-message", "data": { "target": 7, "message": "hi" } }
//! ```
//!
//! Event names are kebab-case and field names camelCase, matching what the
//! browser client sends. Events without fields (`next`, `partner-left`,
//! `reported`) carry no `data` key.

use std::fmt;

use duet_transport::ConnectionId;
use serde::{Deserialize, Serialize};

/// An opaque payload relayed between partners without inspection: SDP
/// blobs, ICE candidate structures, chat text.
pub type Opaque = serde_json::Value;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// The kind of session a connection asks for. Connections only ever match
/// within the same mode.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Audio and video.
    #[default]
    Video,
    /// Audio only.
    Voice,
    /// Chat only.
    Text,
}

impl Mode {
    /// All modes, in the order the matchmaker visits them.
    pub const ALL: [Mode; 3] = [Mode::Video, Mode::Voice, Mode::Text];

    /// Stable index into per-mode tables.
    pub fn index(self) -> usize {
        match self {
            Mode::Video => 0,
            Mode::Voice => 1,
            Mode::Text => 2,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Video => "video",
            Mode::Voice => "voice",
            Mode::Text => "text",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// ClientEvent — client → server
// ---------------------------------------------------------------------------

/// Events a client may send.
///
/// Disconnect is not listed: it is implied by the channel closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    /// Enter matchmaking. A missing mode means [`Mode::Video`].
    Join {
        #[serde(default)]
        mode: Option<Mode>,
    },

    /// Session-description offer for the partner.
    Offer { target: ConnectionId, offer: Opaque },

    /// Session-description answer for the partner.
    Answer { target: ConnectionId, answer: Opaque },

    /// A gathered ICE candidate for the partner.
    IceCandidate {
        target: ConnectionId,
        candidate: Opaque,
    },

    /// Leave the current partner and look for a new one.
    Next,

    /// A chat line for the partner.
    ChatMessage { target: ConnectionId, message: Opaque },

    /// Report another connection.
    #[serde(rename_all = "camelCase")]
    Report { reported_id: ConnectionId },
}

impl ClientEvent {
    /// The wire name of this event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join { .. } => "join",
            ClientEvent::Offer { .. } => "offer",
            ClientEvent::Answer { .. } => "answer",
            ClientEvent::IceCandidate { .. } => "ice-candidate",
            ClientEvent::Next => "next",
            ClientEvent::ChatMessage { .. } => "chat-message",
            ClientEvent::Report { .. } => "report",
        }
    }

    /// The generic message sent back when handling this event fails for a
    /// reason other than a rate limit.
    pub fn failure_message(&self) -> &'static str {
        match self {
            ClientEvent::Join { .. } => "Failed to join queue",
            ClientEvent::Offer { .. } => "Failed to send offer",
            ClientEvent::Answer { .. } => "Failed to send answer",
            ClientEvent::IceCandidate { .. } => "Failed to send ICE candidate",
            ClientEvent::Next => "Failed to find next partner",
            ClientEvent::ChatMessage { .. } => "Failed to send message",
            ClientEvent::Report { .. } => "Failed to process report",
        }
    }
}

// ---------------------------------------------------------------------------
// ServerEvent — server → client
// ---------------------------------------------------------------------------

/// Events the server sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// You have been paired with `partner_id`.
    #[serde(rename_all = "camelCase")]
    Matched { partner_id: ConnectionId },

    /// Your partner's offer.
    Offer { offer: Opaque, sender: ConnectionId },

    /// Your partner's answer.
    Answer { answer: Opaque, sender: ConnectionId },

    /// One of your partner's ICE candidates.
    IceCandidate {
        candidate: Opaque,
        sender: ConnectionId,
    },

    /// Your partner left (pressed next or disconnected).
    PartnerLeft,

    /// A chat line from your partner.
    ChatMessage { message: Opaque },

    /// Someone reported you.
    Reported,

    /// Your last request failed.
    Error { message: String },
}

impl ServerEvent {
    /// Shorthand for an [`Error`](ServerEvent::Error) event.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
