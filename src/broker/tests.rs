/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use super::*;
use super::ping::PingAction;
use super::ping::PingState;
use super::ping::Pinger;
use crate::stanza::ErrorCondition;
use crate::stanza::ErrorType;
use crate::stanza::PayloadError;
use crate::stanza::Ping;
use crate::stanza::SmAck;
use crate::stanza::SmEnable;
use crate::stanza::SmEnabled;
use crate::stanza::SmFailed;
use crate::stanza::SmRequest;
use crate::stanza::StreamErrorCondition;
use crate::stanza::StreamErrorElement;
use crate::stanza::StreamParser;
use crate::xml::Tag;
use tokio::time::Instant;

#[derive(Default)]
struct Recorder {
    sent: Mutex<Vec<Box<dyn Xso>>>,
    broken: AtomicBool,
}

#[async_trait]
impl Transport for Recorder {
    async fn send_xso(&self, xso: &dyn Xso) -> Result<(), TransportError> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.sent.lock().push(xso.clone_box());
        Ok(())
    }
}

impl Recorder {
    fn count(&self) -> usize {
        self.sent.lock().len()
    }

    fn message_ids(&self, skip: usize) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .skip(skip)
            .filter_map(|xso| xso.downcast_ref::<Message>())
            .filter_map(|message| message.id.clone())
            .collect()
    }

    fn iq(&self, id: &str) -> Option<Iq> {
        self.sent
            .lock()
            .iter()
            .filter_map(|xso| xso.downcast_ref::<Iq>())
            .find(|iq| iq.id.as_deref() == Some(id))
            .cloned()
    }

    fn last(&self) -> Option<Box<dyn Xso>> {
        self.sent.lock().last().cloned()
    }
}

/// Holds every send until released.
#[derive(Default)]
struct Gate {
    entered: Notify,
    release: Notify,
    sent: Mutex<Vec<Box<dyn Xso>>>,
}

#[async_trait]
impl Transport for Gate {
    async fn send_xso(&self, xso: &dyn Xso) -> Result<(), TransportError> {
        self.entered.notify_one();
        self.release.notified().await;
        self.sent.lock().push(xso.clone_box());
        Ok(())
    }
}

fn setup(config: BrokerConfig) -> (Arc<Recorder>, StanzaBroker) {
    let recorder = Arc::new(Recorder::default());
    let broker = StanzaBroker::new(recorder.clone(), config);
    (recorder, broker)
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn jid(text: &str) -> Jid {
    Jid::new(text).unwrap()
}

fn message(id: &str) -> Message {
    let mut message = Message::chat(jid("peer@example.com"), "hello");
    message.id = Some(id.to_string());
    message
}

fn incoming_message(message_type: MessageType, from: &str) -> Message {
    let mut message = Message::new(message_type);
    message.from = Some(jid(from));
    message
}

fn incoming_presence(presence_type: Option<PresenceType>, from: &str) -> Presence {
    let mut presence = Presence::new(presence_type);
    presence.from = Some(jid(from));
    presence
}

fn request(iq_type: IqType, id: &str) -> Iq {
    let mut iq = Iq::new(iq_type).with_payload(Ping).with_id(id);
    iq.from = Some(jid("alice@example.com/phone"));
    iq
}

fn enabled() -> SmEnabled {
    SmEnabled {
        resume: true,
        id: Some("session-1".to_string()),
        ..Default::default()
    }
}

fn error_condition(iq: &Iq) -> Option<ErrorCondition> {
    iq.error.as_ref().and_then(|error| error.condition)
}

async fn failing_handler(iq: Iq) -> IqHandlerResult {
    match iq.id.as_deref() {
        Some("busy") => Err(StanzaException::new(ErrorType::Wait, ErrorCondition::ResourceConstraint).into()),
        _ => Err(anyhow::anyhow!("database is down")),
    }
}

async fn slow_handler(_: Iq) -> IqHandlerResult {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Ok(None)
}

#[test]
fn sm_ack_bookkeeping() {
    let mut session = SmSession::default();
    session.start_negotiation();
    session.enabled(&enabled());
    let tokens: Vec<_> = (0..5)
        .map(|i| StanzaToken::new(Stanza::Message(message(&i.to_string()))))
        .collect();
    for token in &tokens {
        session.sent(token);
    }
    assert_eq!(session.unacked.len(), 5);

    assert_eq!(session.ack(3), 3);
    assert_eq!(session.outbound_ack_base, 3);
    let states: Vec<_> = tokens.iter().map(StanzaToken::state).collect();
    assert_eq!(
        states,
        [
            StanzaState::Acked,
            StanzaState::Acked,
            StanzaState::Acked,
            StanzaState::Sent,
            StanzaState::Sent
        ]
    );

    assert_eq!(session.ack(3), 0);
    assert_eq!(session.ack(2), 0);
    assert_eq!(session.outbound_ack_base, 3);
    assert_eq!(session.unacked.len(), 2);

    assert_eq!(session.ack(9), 2);
    assert!(session.unacked.is_empty());
    assert_eq!(session.outbound_ack_base, 9);
}

#[test]
fn sm_disabled_paths() {
    let mut session = SmSession::default();
    assert_eq!(session.ack(1), 0);
    assert_eq!(session.ack_reply(), None);

    let token = StanzaToken::new(Stanza::Message(message("a")));
    session.sent(&token);
    assert_eq!(token.state(), StanzaState::SentWithoutAck);
    assert!(session.unacked.is_empty());

    session.received_stanza();
    assert_eq!(session.inbound_counter, 0);
}

#[test]
fn sm_disable_keeps_tokens_accounted() {
    let mut session = SmSession::default();
    session.start_negotiation();
    session.enabled(&enabled());
    let first = StanzaToken::new(Stanza::Message(message("a")));
    let second = StanzaToken::new(Stanza::Message(message("b")));
    session.sent(&first);
    session.sent(&second);
    session.received_stanza();
    assert_eq!(session.ack_reply(), Some(SmAck::new(1)));

    session.disable();
    assert_eq!(first.state(), StanzaState::SentWithoutAck);
    assert_eq!(second.state(), StanzaState::SentWithoutAck);
    assert_eq!(session.state, SmState::Disabled);
    assert_eq!(session.inbound_counter, 0);
}

#[tokio::test(start_paused = true)]
async fn ping_machine() {
    let start = Instant::now();
    let seconds = Duration::from_secs;
    let mut pinger = Pinger::new(seconds(10), seconds(5));
    assert_eq!(pinger.state(), PingState::SendOpportunistic);
    assert_eq!(pinger.expired(start + seconds(9)), PingAction::Wait);
    assert!(!pinger.wants_opportunistic(start + seconds(4)));
    assert!(pinger.wants_opportunistic(start + seconds(6)));

    assert_eq!(pinger.expired(start + seconds(10)), PingAction::SendPing);
    assert_eq!(pinger.state(), PingState::SendNow);
    pinger.ping_sent(start + seconds(10));
    assert_eq!(pinger.state(), PingState::AwaitingPong);
    assert_eq!(pinger.deadline(), start + seconds(15));
    assert!(!pinger.wants_opportunistic(start + seconds(12)));
    assert_eq!(pinger.expired(start + seconds(15)), PingAction::Timeout);

    pinger.alive(start + seconds(15));
    assert_eq!(pinger.state(), PingState::SendOpportunistic);
    assert_eq!(pinger.deadline(), start + seconds(25));
}

#[test]
fn config_builder_and_serde() {
    let config = BrokerConfig::builder()
        .ping_interval(Duration::from_secs(5))
        .sm_resumable(false)
        .max_iq_handlers(0)
        .build();
    assert_eq!(config.ping_interval, Duration::from_secs(5));
    assert_eq!(config.ping_timeout, BrokerConfig::default().ping_timeout);
    assert!(!config.sm_resumable);
    assert_eq!(config.max_iq_handlers, 1);

    let config: BrokerConfig =
        serde_json::from_str(r#"{ "ping_interval": 30, "ping_timeout": 10, "sm_max": 600 }"#).unwrap();
    assert_eq!(config.ping_interval, Duration::from_secs(30));
    assert_eq!(config.ping_timeout, Duration::from_secs(10));
    assert_eq!(config.sm_max, Some(600));
    assert!(config.sm_resumable);
}

#[tokio::test(start_paused = true)]
async fn sends_in_enqueue_order() {
    let (recorder, broker) = setup(BrokerConfig::default());
    let tokens: Vec<_> = ["a", "b", "c"].iter().map(|id| broker.enqueue(message(id))).collect();
    assert!(tokens.iter().all(|token| token.state() == StanzaState::Active));

    broker.start().unwrap();
    assert_eq!(broker.start(), Err(BrokerError::AlreadyRunning));
    settle().await;
    assert_eq!(recorder.message_ids(0), ["a", "b", "c"]);
    assert!(tokens.iter().all(|token| token.state() == StanzaState::SentWithoutAck));

    let token = broker.enqueue(Message::chat(jid("peer@example.com"), "no id"));
    settle().await;
    assert!(token.stanza().id().is_some());
    assert_eq!(token.settled().await, StanzaState::SentWithoutAck);
    broker.stop().await;
    assert!(!broker.is_running());
}

#[tokio::test(start_paused = true)]
async fn token_abort() {
    let (recorder, broker) = setup(BrokerConfig::default());
    let aborted = broker.enqueue(message("a"));
    assert_eq!(aborted.abort(), Ok(()));
    assert_eq!(aborted.state(), StanzaState::Aborted);
    assert_eq!(aborted.abort(), Err(TokenError::TooLate(StanzaState::Aborted)));

    let sent = broker.enqueue(message("b"));
    broker.start().unwrap();
    settle().await;
    assert_eq!(recorder.message_ids(0), ["b"]);
    assert_eq!(sent.abort(), Err(TokenError::TooLate(StanzaState::SentWithoutAck)));
    assert_eq!(aborted.settled().await, StanzaState::Aborted);
}

#[tokio::test(start_paused = true)]
async fn token_abort_while_sending() {
    let gate = Arc::new(Gate::default());
    let broker = StanzaBroker::new(gate.clone(), BrokerConfig::default());
    let token = broker.enqueue(message("a"));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let log = observed.clone();
    token.set_observer(move |_, state| log.lock().push(state));

    broker.start().unwrap();
    gate.entered.notified().await;
    assert_eq!(token.abort(), Err(TokenError::Sending));
    assert_eq!(token.state(), StanzaState::Active);

    gate.release.notify_one();
    assert_eq!(token.settled().await, StanzaState::SentWithoutAck);
    assert_eq!(*observed.lock(), [StanzaState::SentWithoutAck]);
    assert_eq!(gate.sent.lock().len(), 1);
    assert_eq!(token.abort(), Err(TokenError::TooLate(StanzaState::SentWithoutAck)));
}

#[test]
fn final_token_states_stick() {
    let aborted = StanzaToken::new(Stanza::Message(message("a")));
    assert!(aborted.claim());
    aborted.release();
    assert_eq!(aborted.abort(), Ok(()));
    aborted.set_state(StanzaState::SentWithoutAck);
    assert_eq!(aborted.state(), StanzaState::Aborted);
    assert!(!aborted.claim());

    let acked = StanzaToken::new(Stanza::Message(message("b")));
    acked.set_state(StanzaState::Sent);
    acked.set_state(StanzaState::Acked);
    acked.set_state(StanzaState::SentWithoutAck);
    assert_eq!(acked.state(), StanzaState::Acked);
    assert!(!acked.claim());
}

#[tokio::test(start_paused = true)]
async fn rejected_stanzas_are_counted_and_answered() {
    let (recorder, broker) = setup(BrokerConfig::default());
    broker.start_sm().unwrap();
    broker.start().unwrap();
    broker.receive(Inbound::nonza(enabled()));
    settle().await;
    assert_eq!(broker.sm_state(), SmState::Enabled);

    let mut parser = StreamParser::new();
    let items = parser
        .parse_bytes(
            b"<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>\
              <message from='@bad' id='m1'><body>x</body></message>\
              <message from='alice@example.com' id='m2'/>\
              <iq type='set' id='q1' from='alice@example.com/phone' to='@bad'><ping xmlns='urn:xmpp:ping'/></iq>\
              <iq type='result' id='q2' from='@bad'/>\
              <junk/>",
        )
        .unwrap();
    for item in items {
        broker.receive_element(item);
    }
    settle().await;
    assert_eq!(broker.sm_counters().1, 4);

    let reply = recorder.iq("q1").unwrap();
    assert_eq!(reply.iq_type, IqType::Error);
    assert_eq!(reply.to, Some(jid("alice@example.com/phone")));
    assert_eq!(error_condition(&reply), Some(ErrorCondition::BadRequest));
    assert!(recorder.iq("q2").is_none());
}

#[tokio::test(start_paused = true)]
async fn sm_negotiation_and_acks() {
    let (recorder, broker) = setup(BrokerConfig::default());
    broker.start_sm().unwrap();
    assert_eq!(broker.sm_state(), SmState::Negotiating);
    broker.start().unwrap();
    assert_eq!(broker.stop_sm(), Err(BrokerError::Running));
    settle().await;
    let enable = recorder.last().unwrap();
    assert_eq!(
        enable.downcast_ref::<SmEnable>(),
        Some(&SmEnable {
            resume: true,
            max: None
        })
    );

    broker.receive(Inbound::nonza(enabled()));
    let observed = Arc::new(Mutex::new(Vec::new()));
    let tokens: Vec<_> = ["a", "b", "c"].iter().map(|id| broker.enqueue(message(id))).collect();
    let log = observed.clone();
    tokens[0].set_observer(move |_, state| log.lock().push(state));
    settle().await;
    assert_eq!(broker.sm_state(), SmState::Enabled);
    assert_eq!(broker.sm_id().as_deref(), Some("session-1"));
    assert!(tokens.iter().all(|token| token.state() == StanzaState::Sent));
    assert_eq!(broker.sm_unacked().len(), 3);

    broker.receive(Inbound::nonza(SmAck::new(2)));
    settle().await;
    assert_eq!(tokens[0].state(), StanzaState::Acked);
    assert_eq!(tokens[1].state(), StanzaState::Acked);
    assert_eq!(tokens[2].state(), StanzaState::Sent);
    assert_eq!(broker.sm_counters().0, 2);
    assert_eq!(*observed.lock(), [StanzaState::Sent, StanzaState::Acked]);

    broker.receive(incoming_message(MessageType::Chat, "alice@example.com"));
    broker.receive(Inbound::nonza(SmRequest));
    settle().await;
    let ack = recorder.last().unwrap();
    assert_eq!(ack.downcast_ref::<SmAck>(), Some(&SmAck::new(1)));
}

#[tokio::test(start_paused = true)]
async fn sm_resume_replays_survivors_first() {
    let (recorder, broker) = setup(BrokerConfig::default());
    broker.start_sm().unwrap();
    broker.start().unwrap();
    broker.receive(Inbound::nonza(enabled()));
    let a = broker.enqueue(message("A"));
    let b = broker.enqueue(message("B"));
    let c = broker.enqueue(message("C"));
    settle().await;
    broker.receive(Inbound::nonza(SmAck::new(1)));
    settle().await;
    assert_eq!(a.state(), StanzaState::Acked);

    broker.stop().await;
    let d = broker.enqueue(message("D"));
    broker.resume_sm(1).unwrap();
    let before = recorder.count();
    broker.start().unwrap();
    settle().await;

    assert_eq!(recorder.message_ids(before), ["B", "C", "D"]);
    assert_eq!(a.state(), StanzaState::Acked);
    for token in [&b, &c, &d] {
        assert_eq!(token.state(), StanzaState::Sent);
    }
    assert_eq!(broker.sm_unacked().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn sm_failure_falls_back() {
    let (_recorder, broker) = setup(BrokerConfig::default());
    broker.start_sm().unwrap();
    broker.start().unwrap();
    let token = broker.enqueue(message("a"));
    settle().await;
    assert_eq!(token.state(), StanzaState::Sent);

    broker.receive(Inbound::nonza(SmFailed::default()));
    settle().await;
    assert_eq!(token.state(), StanzaState::SentWithoutAck);
    assert_eq!(broker.sm_state(), SmState::Disabled);
}

#[tokio::test(start_paused = true)]
async fn message_dispatch_fallback() {
    let (_recorder, broker) = setup(BrokerConfig::default());
    let hits = Arc::new(Mutex::new(Vec::new()));
    let alice = jid("alice@example.com/phone");

    let log = hits.clone();
    broker
        .register_message_handler(None, None, move |_| log.lock().push("any"))
        .unwrap();
    let log = hits.clone();
    broker
        .register_message_handler(Some(MessageType::Chat), None, move |_| log.lock().push("chat"))
        .unwrap();
    let log = hits.clone();
    broker
        .register_message_handler(Some(MessageType::Chat), Some(alice.clone()), move |_| {
            log.lock().push("alice")
        })
        .unwrap();
    assert!(matches!(
        broker.register_message_handler(None, None, |_| {}),
        Err(BrokerError::HandlerExists(_))
    ));

    broker.start().unwrap();
    broker.receive(incoming_message(MessageType::Chat, "alice@example.com/phone"));
    broker.receive(incoming_message(MessageType::Chat, "bob@example.com/laptop"));
    broker.receive(incoming_message(MessageType::Headline, "alice@example.com/phone"));
    settle().await;
    assert_eq!(*hits.lock(), ["alice", "chat", "any"]);

    assert!(broker.unregister_message_handler(Some(MessageType::Chat), Some(alice)));
    broker.receive(incoming_message(MessageType::Chat, "alice@example.com/phone"));
    settle().await;
    assert_eq!(hits.lock().last(), Some(&"chat"));
}

#[tokio::test(start_paused = true)]
async fn presence_dispatch_fallback() {
    let (_recorder, broker) = setup(BrokerConfig::default());
    let hits = Arc::new(Mutex::new(Vec::new()));

    let log = hits.clone();
    broker
        .register_presence_handler(Some(PresenceType::Subscribe), None, move |_| {
            log.lock().push("subscribe")
        })
        .unwrap();
    let log = hits.clone();
    broker
        .register_presence_handler(None, Some(jid("alice@example.com/phone")), move |_| {
            log.lock().push("alice")
        })
        .unwrap();

    broker.start().unwrap();
    broker.receive(incoming_presence(Some(PresenceType::Subscribe), "bob@example.com"));
    broker.receive(incoming_presence(None, "alice@example.com/phone"));
    broker.receive(incoming_presence(None, "bob@example.com/laptop"));
    broker.receive(incoming_presence(Some(PresenceType::Unavailable), "alice@example.com/phone"));
    settle().await;
    assert_eq!(*hits.lock(), ["subscribe", "alice"]);
}

#[tokio::test(start_paused = true)]
async fn iq_requests_are_answered() {
    let (recorder, broker) = setup(BrokerConfig::default());
    broker
        .register_iq_request_handler::<Ping, _, _>(IqType::Get, |_| async { IqHandlerResult::Ok(None) })
        .unwrap();
    assert_eq!(
        broker.register_iq_request_handler::<Ping, _, _>(IqType::Result, |_| async { IqHandlerResult::Ok(None) }),
        Err(BrokerError::NotARequest)
    );

    broker.start().unwrap();
    broker.receive(request(IqType::Get, "q1"));
    broker.receive(request(IqType::Set, "q2"));
    let mut unknown = Iq::new(IqType::Get).with_id("q3");
    unknown.payload_error = Some(PayloadError::Unknown(Tag::qualified("urn:example:nothing", "query")));
    broker.receive(unknown);
    broker.receive(Iq::new(IqType::Get).with_id("q4"));
    settle().await;

    let reply = recorder.iq("q1").unwrap();
    assert_eq!(reply.iq_type, IqType::Result);
    assert_eq!(reply.to, Some(jid("alice@example.com/phone")));
    assert!(reply.payload.is_none());

    let reply = recorder.iq("q2").unwrap();
    assert_eq!(reply.iq_type, IqType::Error);
    assert_eq!(error_condition(&reply), Some(ErrorCondition::FeatureNotImplemented));

    let reply = recorder.iq("q3").unwrap();
    assert_eq!(error_condition(&reply), Some(ErrorCondition::FeatureNotImplemented));

    let reply = recorder.iq("q4").unwrap();
    assert_eq!(error_condition(&reply), Some(ErrorCondition::BadRequest));

    assert!(broker.unregister_iq_request_handler::<Ping>(IqType::Get));
    broker.receive(request(IqType::Get, "q5"));
    settle().await;
    let reply = recorder.iq("q5").unwrap();
    assert_eq!(error_condition(&reply), Some(ErrorCondition::FeatureNotImplemented));
}

#[tokio::test(start_paused = true)]
async fn iq_handler_errors() {
    let (recorder, broker) = setup(BrokerConfig::default());
    broker
        .register_iq_request_handler::<Ping, _, _>(IqType::Set, failing_handler)
        .unwrap();
    broker.start().unwrap();
    broker.receive(request(IqType::Set, "bad"));
    broker.receive(request(IqType::Set, "busy"));
    settle().await;

    let reply = recorder.iq("bad").unwrap();
    let exception = reply.error.as_ref().unwrap().to_exception();
    assert_eq!(exception, StanzaException::undefined_condition());

    let reply = recorder.iq("busy").unwrap();
    let exception = reply.error.as_ref().unwrap().to_exception();
    assert_eq!(exception.error_type, ErrorType::Wait);
    assert_eq!(exception.condition, ErrorCondition::ResourceConstraint);
}

#[tokio::test(start_paused = true)]
async fn iq_handlers_are_bounded() {
    let config = BrokerConfig::builder().max_iq_handlers(1).build();
    let (recorder, broker) = setup(config);
    broker
        .register_iq_request_handler::<Ping, _, _>(IqType::Get, slow_handler)
        .unwrap();
    broker.start().unwrap();
    broker.receive(request(IqType::Get, "first"));
    broker.receive(request(IqType::Get, "second"));
    settle().await;

    assert!(recorder.iq("first").is_none());
    let reply = recorder.iq("second").unwrap();
    let exception = reply.error.as_ref().unwrap().to_exception();
    assert_eq!(exception.condition, ErrorCondition::ResourceConstraint);
    assert_eq!(exception.error_type, ErrorType::Wait);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(recorder.iq("first").unwrap().iq_type, IqType::Result);
}

#[tokio::test(start_paused = true)]
async fn iq_responses() {
    let (recorder, broker) = setup(BrokerConfig::default());
    let server = jid("example.com");
    broker.start().unwrap();

    let waiter = broker.clone();
    let target = server.clone();
    let ok = tokio::spawn(async move {
        waiter
            .send_iq_and_wait(Iq::get(Ping).with_to(target).with_id("w1"))
            .await
    });
    let waiter = broker.clone();
    let target = server.clone();
    let failed = tokio::spawn(async move {
        waiter
            .send_iq_and_wait(Iq::get(Ping).with_to(target).with_id("w2"))
            .await
    });
    let waiter = broker.clone();
    let target = server.clone();
    let abandoned = tokio::spawn(async move {
        waiter
            .send_iq_and_wait(Iq::get(Ping).with_to(target).with_id("w3"))
            .await
    });
    settle().await;
    assert!(recorder.iq("w1").is_some());
    assert!(matches!(
        broker.register_iq_response_handler(Some(server.clone()), "w1", |_| {}),
        Err(BrokerError::HandlerExists(_))
    ));
    abandoned.abort();

    let mut result = Iq::new(IqType::Result).with_id("w1");
    result.from = Some(server.clone());
    let mut error = Iq::new(IqType::Error).with_id("w2");
    error.from = Some(server.clone());
    error.error = Some(StanzaError::new(ErrorType::Cancel, ErrorCondition::ItemNotFound));
    let mut late = Iq::new(IqType::Result).with_id("w3");
    late.from = Some(server.clone());
    let mut stray = Iq::new(IqType::Result).with_id("nobody");
    stray.from = Some(server.clone());
    broker.receive(result.clone());
    broker.receive(error);
    broker.receive(late);
    broker.receive(stray);
    settle().await;

    assert_eq!(ok.await.unwrap(), Ok(result));
    match failed.await.unwrap() {
        Err(BrokerError::Stanza(exception)) => {
            assert_eq!(exception.condition, ErrorCondition::ItemNotFound)
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(broker.is_running());
}

#[tokio::test(start_paused = true)]
async fn ping_timeout_is_reported_once() {
    let config = BrokerConfig::builder()
        .ping_interval(Duration::from_secs(10))
        .ping_timeout(Duration::from_secs(10))
        .build();
    let (recorder, broker) = setup(config);
    let mut failures = broker.failures().unwrap();
    assert!(broker.failures().is_none());
    broker.start_sm().unwrap();
    broker.start().unwrap();
    broker.receive(Inbound::nonza(enabled()));
    settle().await;
    assert_eq!(recorder.count(), 1);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(failures.try_recv(), Ok(BrokerError::PingTimeout));
    assert!(failures.try_recv().is_err());
    assert!(!broker.is_running());
    assert_eq!(recorder.count(), 2);
    assert!(recorder.last().unwrap().is::<SmRequest>());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(recorder.count(), 2);
    assert!(failures.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn ping_without_sm() {
    let config = BrokerConfig::builder()
        .ping_interval(Duration::from_secs(10))
        .ping_timeout(Duration::from_secs(10))
        .build();
    let (recorder, broker) = setup(config);
    let mut failures = broker.failures().unwrap();
    broker.start().unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    let ping = recorder.last().unwrap();
    let ping = ping.downcast_ref::<Iq>().unwrap();
    assert!(ping.payload_as::<Ping>().is_some());

    let mut pong = Iq::new(IqType::Result);
    pong.id = ping.id.clone();
    broker.receive(pong);
    tokio::time::sleep(Duration::from_secs(9)).await;
    assert!(failures.try_recv().is_err());
    assert!(broker.is_running());
}

#[tokio::test(start_paused = true)]
async fn failures_keep_unsent_stanzas() {
    let (recorder, broker) = setup(BrokerConfig::default());
    let mut failures = broker.failures().unwrap();
    recorder.broken.store(true, Ordering::SeqCst);
    broker.start().unwrap();
    let token = broker.enqueue(message("a"));
    settle().await;
    assert_eq!(failures.try_recv(), Ok(BrokerError::Transport(TransportError::Closed)));
    assert!(!broker.is_running());
    assert_eq!(token.state(), StanzaState::Active);

    recorder.broken.store(false, Ordering::SeqCst);
    broker.start().unwrap();
    settle().await;
    assert_eq!(recorder.message_ids(0), ["a"]);
    assert_eq!(token.state(), StanzaState::SentWithoutAck);
}

#[tokio::test(start_paused = true)]
async fn fatal_stream_conditions() {
    let (_recorder, broker) = setup(BrokerConfig::default());
    let mut failures = broker.failures().unwrap();
    broker.start().unwrap();
    broker.receive(Inbound::nonza(StreamErrorElement::new(StreamErrorCondition::Conflict)));
    settle().await;
    assert_eq!(failures.try_recv(), Ok(BrokerError::Stream("conflict".to_string())));
    assert!(!broker.is_running());

    broker.start().unwrap();
    broker.receive_element(StreamElement::End);
    broker.connection_lost("socket reset");
    settle().await;
    assert_eq!(
        failures.try_recv(),
        Ok(BrokerError::ConnectionLost("stream closed by peer".to_string()))
    );
    assert!(failures.try_recv().is_err());
    assert!(!broker.is_running());
}
