//! Forwarding of signaling and chat between partners.

use duet_protocol::{ClientEvent, ConnectionId, ServerEvent};
use duet_registry::ConnectionRegistry;

use crate::channel::Channel;

/// Why the relay declined to forward an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The sender has no partner.
    NotPaired,
    /// The named target is not the sender's partner.
    WrongTarget {
        target: ConnectionId,
        partner: ConnectionId,
    },
    /// The partner's channel is closed.
    TargetClosed(ConnectionId),
    /// The event is not one the relay forwards.
    NotRelayable,
}

/// Outcome of [`SessionRelay::relay`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relayed {
    /// Handed to the partner's channel.
    Forwarded(ConnectionId),
    /// Silently dropped.
    Dropped(DropReason),
}

/// Routes `offer`, `answer`, `ice-candidate`, and `chat-message` from a
/// connection to its partner.
///
/// Payloads are passed through untouched. The relay only checks that the
/// sender is matched and that the event's `target` is its partner;
/// anything else is dropped without telling the sender.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionRelay;

impl SessionRelay {
    /// Forwards `event` from `sender` to its partner if allowed.
    pub fn relay(
        registry: &ConnectionRegistry,
        channel: &mut impl Channel,
        sender: ConnectionId,
        event: ClientEvent,
    ) -> Relayed {
        let (target, outbound) = match event {
            ClientEvent::Offer { target, offer } => {
                (target, ServerEvent::Offer { offer, sender })
            }
            ClientEvent::Answer { target, answer } => {
                (target, ServerEvent::Answer { answer, sender })
            }
            ClientEvent::IceCandidate { target, candidate } => {
                (target, ServerEvent::IceCandidate { candidate, sender })
            }
            ClientEvent::ChatMessage { target, message } => {
                (target, ServerEvent::ChatMessage { message })
            }
            _ => return Relayed::Dropped(DropReason::NotRelayable),
        };

        let Some(partner) = registry.get(sender).and_then(|c| c.partner())
        else {
            return Self::dropped(sender, DropReason::NotPaired);
        };
        if target != partner {
            return Self::dropped(
                sender,
                DropReason::WrongTarget { target, partner },
            );
        }
        if !channel.is_open(partner) {
            return Self::dropped(sender, DropReason::TargetClosed(partner));
        }

        match channel.send(partner, outbound) {
            Ok(()) => Relayed::Forwarded(partner),
            Err(_) => Self::dropped(sender, DropReason::TargetClosed(partner)),
        }
    }

    fn dropped(sender: ConnectionId, reason: DropReason) -> Relayed {
        tracing::debug!(conn_id = %sender, ?reason, "relay dropped event");
        Relayed::Dropped(reason)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use duet_protocol::Mode;
    use serde_json::json;

    use super::*;
    use crate::channel::testing::RecordingChannel;

    fn cid(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    /// Connections 1 and 2 paired, 3 idle.
    fn paired_registry() -> ConnectionRegistry {
        let now = Instant::now();
        let mut reg = ConnectionRegistry::new();
        for n in 1..=3 {
            reg.create(cid(n), now).unwrap();
        }
        reg.enqueue(cid(1), Mode::Video).unwrap();
        reg.enqueue(cid(2), Mode::Video).unwrap();
        reg.set_partner(cid(1), cid(2)).unwrap();
        reg
    }

    #[test]
    fn test_relay_offer_tags_sender() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();
        let sdp = json!({ "type": "offer", "sdp": "v=0" });

        let out = SessionRelay::relay(
            &reg,
            &mut ch,
            cid(1),
            ClientEvent::Offer { target: cid(2), offer: sdp.clone() },
        );

        assert_eq!(out, Relayed::Forwarded(cid(2)));
        assert_eq!(
            ch.to(cid(2)),
            vec![ServerEvent::Offer { offer: sdp, sender: cid(1) }]
        );
    }

    #[test]
    fn test_relay_answer_and_candidate_reach_partner() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();

        SessionRelay::relay(
            &reg,
            &mut ch,
            cid(2),
            ClientEvent::Answer { target: cid(1), answer: json!("a") },
        );
        SessionRelay::relay(
            &reg,
            &mut ch,
            cid(2),
            ClientEvent::IceCandidate { target: cid(1), candidate: json!("c") },
        );

        assert_eq!(
            ch.to(cid(1)),
            vec![
                ServerEvent::Answer { answer: json!("a"), sender: cid(2) },
                ServerEvent::IceCandidate {
                    candidate: json!("c"),
                    sender: cid(2)
                },
            ]
        );
    }

    #[test]
    fn test_relay_chat_carries_only_message() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();

        SessionRelay::relay(
            &reg,
            &mut ch,
            cid(1),
            ClientEvent::ChatMessage { target: cid(2), message: json!("hi") },
        );
        assert_eq!(
            ch.to(cid(2)),
            vec![ServerEvent::ChatMessage { message: json!("hi") }]
        );
    }

    #[test]
    fn test_relay_from_unpaired_is_dropped() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();

        let out = SessionRelay::relay(
            &reg,
            &mut ch,
            cid(3),
            ClientEvent::Offer { target: cid(1), offer: json!({}) },
        );
        assert_eq!(out, Relayed::Dropped(DropReason::NotPaired));
        assert!(ch.sent.is_empty());
    }

    #[test]
    fn test_relay_to_forged_target_is_dropped() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();

        let out = SessionRelay::relay(
            &reg,
            &mut ch,
            cid(1),
            ClientEvent::ChatMessage { target: cid(3), message: json!("psst") },
        );
        assert_eq!(
            out,
            Relayed::Dropped(DropReason::WrongTarget {
                target: cid(3),
                partner: cid(2)
            })
        );
        assert!(ch.to(cid(3)).is_empty());
    }

    #[test]
    fn test_relay_to_closed_partner_is_dropped() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();
        ch.closed.insert(cid(2));

        let out = SessionRelay::relay(
            &reg,
            &mut ch,
            cid(1),
            ClientEvent::Answer { target: cid(2), answer: json!({}) },
        );
        assert_eq!(out, Relayed::Dropped(DropReason::TargetClosed(cid(2))));
    }

    #[test]
    fn test_relay_ignores_non_relay_events() {
        let reg = paired_registry();
        let mut ch = RecordingChannel::default();
        let out = SessionRelay::relay(&reg, &mut ch, cid(1), ClientEvent::Next);
        assert_eq!(out, Relayed::Dropped(DropReason::NotRelayable));
    }
}
