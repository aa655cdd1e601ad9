//! Integration tests for the pairing engine through its public API, using a
//! mock channel.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use duet_pairing::{
    Channel, ChannelError, DropReason, PairingEngine, Relayed, SessionRelay,
};
use duet_protocol::{ClientEvent, ConnectionId, Mode, ServerEvent};
use duet_registry::{AbuseLimits, ConnectionState};
use serde_json::json;

// =========================================================================
// Mock channel: per-connection inboxes, some of which may be closed.
// =========================================================================

#[derive(Default)]
struct Inboxes {
    inbox: HashMap<ConnectionId, Vec<ServerEvent>>,
    closed: HashSet<ConnectionId>,
}

impl Inboxes {
    fn take(&mut self, id: ConnectionId) -> Vec<ServerEvent> {
        self.inbox.remove(&id).unwrap_or_default()
    }
}

impl Channel for Inboxes {
    fn send(
        &mut self,
        to: ConnectionId,
        event: ServerEvent,
    ) -> Result<(), ChannelError> {
        if self.closed.contains(&to) {
            return Err(ChannelError::Closed(to));
        }
        self.inbox.entry(to).or_default().push(event);
        Ok(())
    }

    fn is_open(&self, id: ConnectionId) -> bool {
        !self.closed.contains(&id)
    }
}

fn cid(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn setup(n: u64) -> (PairingEngine, Inboxes, Instant) {
    let now = Instant::now();
    let mut engine = PairingEngine::new(AbuseLimits::default());
    for i in 1..=n {
        engine.open(cid(i), now).unwrap();
    }
    (engine, Inboxes::default(), now)
}

// =========================================================================
// Tests
// =========================================================================

#[test]
fn test_full_session_lifecycle() {
    let (mut engine, mut out, now) = setup(2);
    let (a, b) = (cid(1), cid(2));

    engine
        .handle(a, ClientEvent::Join { mode: Some(Mode::Video) }, now, &mut out)
        .unwrap();
    engine
        .handle(b, ClientEvent::Join { mode: Some(Mode::Video) }, now, &mut out)
        .unwrap();
    assert_eq!(out.take(a), vec![ServerEvent::Matched { partner_id: b }]);
    assert_eq!(out.take(b), vec![ServerEvent::Matched { partner_id: a }]);

    let offer = json!({ "type": "offer", "sdp": "v=0" });
    engine
        .handle(a, ClientEvent::Offer { target: b, offer: offer.clone() }, now, &mut out)
        .unwrap();
    let answer = json!({ "type": "answer", "sdp": "v=0" });
    engine
        .handle(b, ClientEvent::Answer { target: a, answer: answer.clone() }, now, &mut out)
        .unwrap();
    engine
        .handle(a, ClientEvent::IceCandidate { target: b, candidate: json!({}) }, now, &mut out)
        .unwrap();

    assert_eq!(
        out.take(b),
        vec![
            ServerEvent::Offer { offer, sender: a },
            ServerEvent::IceCandidate { candidate: json!({}), sender: a },
        ]
    );
    assert_eq!(out.take(a), vec![ServerEvent::Answer { answer, sender: b }]);

    engine.close(a, &mut out);
    assert_eq!(out.take(b), vec![ServerEvent::PartnerLeft]);
    assert_eq!(
        engine.registry().get(b).map(|c| c.state()),
        Some(ConnectionState::Idle)
    );
    assert_eq!(engine.registry().len(), 1);
}

#[test]
fn test_odd_one_out_keeps_waiting_until_next_arrival() {
    let (mut engine, mut out, now) = setup(3);
    for n in 1..=3 {
        engine
            .handle(cid(n), ClientEvent::Join { mode: Some(Mode::Text) }, now, &mut out)
            .unwrap();
    }
    assert_eq!(engine.registry().queue().len(Mode::Text), 1);
    assert_eq!(
        engine.registry().get(cid(3)).map(|c| c.state()),
        Some(ConnectionState::Waiting)
    );

    engine.open(cid(4), now).unwrap();
    engine
        .handle(cid(4), ClientEvent::Join { mode: Some(Mode::Text) }, now, &mut out)
        .unwrap();
    assert_eq!(out.take(cid(3)), vec![ServerEvent::Matched { partner_id: cid(4) }]);
}

#[test]
fn test_relay_to_closed_partner_channel_is_dropped() {
    let (mut engine, mut out, now) = setup(2);
    for n in [1, 2] {
        engine
            .handle(cid(n), ClientEvent::Join { mode: None }, now, &mut out)
            .unwrap();
    }
    out.closed.insert(cid(2));

    let relayed = SessionRelay::relay(
        engine.registry(),
        &mut out,
        cid(1),
        ClientEvent::ChatMessage { target: cid(2), message: json!("hello?") },
    );
    assert_eq!(relayed, Relayed::Dropped(DropReason::TargetClosed(cid(2))));
}

#[test]
fn test_message_window_restarts_after_expiry() {
    let (mut engine, mut out, now) = setup(2);
    for n in [1, 2] {
        engine
            .handle(cid(n), ClientEvent::Join { mode: Some(Mode::Text) }, now, &mut out)
            .unwrap();
    }
    let chat = || ClientEvent::ChatMessage { target: cid(2), message: json!(".") };

    for _ in 0..30 {
        engine.handle(cid(1), chat(), now, &mut out).unwrap();
    }
    assert!(engine.handle(cid(1), chat(), now + Duration::from_secs(59), &mut out).is_err());
    engine
        .handle(cid(1), chat(), now + Duration::from_secs(61), &mut out)
        .unwrap();

    assert_eq!(out.take(cid(2)).len(), 31);
}
