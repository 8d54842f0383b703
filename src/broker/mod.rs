/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Stanza broker: the outbound queue, inbound dispatch, stream
//! management and liveness checks of one XMPP session.
//!
//! The broker owns a single tokio task which alternates between sending
//! queued stanzas and dispatching received ones. IQ request handlers run
//! as separate tasks and their replies are queued like any other stanza.

mod config;
mod dispatch;
mod error;
mod ping;
mod runner;
mod sm;
mod token;
mod transport;

use std::any::TypeId;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use futures_util::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::sync::Semaphore;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::Jid;
use crate::stanza::Iq;
use crate::stanza::IqType;
use crate::stanza::Message;
use crate::stanza::MessageType;
use crate::stanza::Presence;
use crate::stanza::PresenceType;
use crate::stanza::RejectedStanza;
use crate::stanza::Stanza;
use crate::stanza::StanzaError;
use crate::stanza::StanzaException;
use crate::stanza::StreamElement;
use crate::xso::Xso;
use crate::xso::XsoClass;

pub use config::BrokerConfig;
pub use config::BrokerConfigBuilder;
pub use dispatch::IqHandlerFuture;
pub use dispatch::IqHandlerResult;
pub use dispatch::IqResponseCallback;
pub use dispatch::MessageHandler;
pub use dispatch::PresenceHandler;
pub use error::BrokerError;
pub use error::TokenError;
pub use error::TransportError;
pub use sm::SmState;
pub use token::StanzaState;
pub use token::StanzaToken;
pub use transport::Transport;

use dispatch::Dispatcher;
use dispatch::IqRequestHandler;
use sm::SmSession;

/// A received top level element.
#[derive(Clone, Debug, PartialEq)]
pub enum Inbound {
    Stanza(Stanza),
    Nonza(Box<dyn Xso>),
    /// A stanza which could not be decoded. It still counts for stream
    /// management, and a request gets an error reply.
    Rejected(RejectedStanza),
}

impl Inbound {
    pub fn nonza(xso: impl Xso) -> Self {
        Inbound::Nonza(Box::new(xso))
    }
}

impl From<Stanza> for Inbound {
    fn from(stanza: Stanza) -> Self {
        Inbound::Stanza(stanza)
    }
}

impl From<Iq> for Inbound {
    fn from(iq: Iq) -> Self {
        Inbound::Stanza(Stanza::Iq(iq))
    }
}

impl From<Message> for Inbound {
    fn from(message: Message) -> Self {
        Inbound::Stanza(Stanza::Message(message))
    }
}

impl From<Presence> for Inbound {
    fn from(presence: Presence) -> Self {
        Inbound::Stanza(Stanza::Presence(presence))
    }
}

struct RunHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

struct Shared {
    config: BrokerConfig,
    transport: Mutex<Arc<dyn Transport>>,
    outbound: Mutex<VecDeque<StanzaToken>>,
    inbound: Mutex<VecDeque<Inbound>>,
    wakeup: Notify,
    dispatcher: Mutex<Dispatcher>,
    sm: Mutex<SmSession>,
    iq_slots: Arc<Semaphore>,
    failures: mpsc::UnboundedSender<BrokerError>,
    failure_receiver: Mutex<Option<mpsc::UnboundedReceiver<BrokerError>>>,
    failed: AtomicBool,
    run: Mutex<Option<RunHandle>>,
}

impl Shared {
    fn enqueue(&self, mut stanza: Stanza) -> StanzaToken {
        stanza.autoset_id();
        let token = StanzaToken::new(stanza);
        self.outbound.lock().push_back(token.clone());
        self.wakeup.notify_one();
        token
    }

    /// Reports a fatal failure, once per run, and stops the loop.
    fn fail(&self, err: BrokerError) {
        if self.failed.swap(true, Ordering::SeqCst) {
            tracing::debug!(%err, "further failure after the session is gone");
            return;
        }
        tracing::error!(%err, "session failed");
        if self.failures.send(err).is_err() {
            tracing::debug!("nobody listens for failures");
        }
        if let Some(run) = &*self.run.lock() {
            run.stop.send_replace(true);
        }
    }

    fn is_running(&self) -> bool {
        self.run
            .lock()
            .as_ref()
            .is_some_and(|run| !run.task.is_finished())
    }
}

/// Queues, sends and dispatches the stanzas of one session.
///
/// Cloning gives another handle to the same broker.
#[derive(Clone)]
pub struct StanzaBroker {
    shared: Arc<Shared>,
}

impl StanzaBroker {
    pub fn new(transport: Arc<dyn Transport>, config: BrokerConfig) -> Self {
        let (failures, failure_receiver) = mpsc::unbounded_channel();
        let iq_slots = Arc::new(Semaphore::new(config.max_iq_handlers.max(1)));
        StanzaBroker {
            shared: Arc::new(Shared {
                config,
                transport: Mutex::new(transport),
                outbound: Mutex::new(VecDeque::new()),
                inbound: Mutex::new(VecDeque::new()),
                wakeup: Notify::new(),
                dispatcher: Mutex::new(Dispatcher::default()),
                sm: Mutex::new(SmSession::default()),
                iq_slots,
                failures,
                failure_receiver: Mutex::new(Some(failure_receiver)),
                failed: AtomicBool::new(false),
                run: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    /// Receiver of fatal session failures. Only the first call gets it.
    pub fn failures(&self) -> Option<mpsc::UnboundedReceiver<BrokerError>> {
        self.shared.failure_receiver.lock().take()
    }

    /// Replaces the transport, e.g. after reconnecting for a resumption.
    pub fn set_transport(&self, transport: Arc<dyn Transport>) -> Result<(), BrokerError> {
        self.ensure_stopped()?;
        *self.shared.transport.lock() = transport;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_running()
    }

    /// Spawns the processing loop on the current tokio runtime.
    pub fn start(&self) -> Result<(), BrokerError> {
        let mut run = self.shared.run.lock();
        if run.as_ref().is_some_and(|run| !run.task.is_finished()) {
            return Err(BrokerError::AlreadyRunning);
        }
        self.shared.failed.store(false, Ordering::SeqCst);
        let (stop, stop_receiver) = watch::channel(false);
        let task = tokio::spawn(Arc::clone(&self.shared).run(stop_receiver));
        *run = Some(RunHandle { stop, task });
        Ok(())
    }

    /// Stops the processing loop. Stanzas which were not sent yet stay
    /// queued for the next start.
    pub async fn stop(&self) {
        let run = self.shared.run.lock().take();
        if let Some(run) = run {
            run.stop.send_replace(true);
            if let Err(err) = run.task.await {
                tracing::error!(%err, "broker task did not finish cleanly");
            }
        }
    }

    /// Queues a stanza, assigning an id if it has none.
    pub fn enqueue(&self, stanza: impl Into<Stanza>) -> StanzaToken {
        self.shared.enqueue(stanza.into())
    }

    pub fn register_iq_response_handler(
        &self,
        peer: Option<Jid>,
        id: &str,
        callback: impl FnOnce(Iq) + Send + 'static,
    ) -> Result<(), BrokerError> {
        self.shared
            .dispatcher
            .lock()
            .add_iq_response(peer, id, Box::new(callback))
    }

    pub fn unregister_iq_response_handler(&self, peer: Option<Jid>, id: &str) -> bool {
        self.shared
            .dispatcher
            .lock()
            .take_iq_response(&peer, id)
            .is_some()
    }

    /// Serves requests of `iq_type` carrying a `C` payload.
    pub fn register_iq_request_handler<C, F, Fut>(&self, iq_type: IqType, handler: F) -> Result<(), BrokerError>
    where
        C: XsoClass,
        F: Fn(Iq) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = IqHandlerResult> + Send + 'static,
    {
        if !iq_type.is_request() {
            return Err(BrokerError::NotARequest);
        }
        let handler: IqRequestHandler = Arc::new(move |iq| handler(iq).boxed());
        self.shared.dispatcher.lock().add_iq_request(
            iq_type,
            TypeId::of::<C>(),
            std::any::type_name::<C>(),
            handler,
        )
    }

    pub fn unregister_iq_request_handler<C: XsoClass>(&self, iq_type: IqType) -> bool {
        self.shared
            .dispatcher
            .lock()
            .remove_iq_request(iq_type, TypeId::of::<C>())
    }

    /// `None` for the type or the sender matches any. The handler runs on
    /// the broker task and must not block.
    pub fn register_message_handler(
        &self,
        message_type: Option<MessageType>,
        from: Option<Jid>,
        handler: impl Fn(Message) + Send + Sync + 'static,
    ) -> Result<(), BrokerError> {
        self.shared
            .dispatcher
            .lock()
            .add_message(message_type, from, Arc::new(handler))
    }

    pub fn unregister_message_handler(&self, message_type: Option<MessageType>, from: Option<Jid>) -> bool {
        self.shared.dispatcher.lock().remove_message(message_type, from)
    }

    /// `None` as the type means available presence, `None` as the sender
    /// matches any. The handler must not block, as for messages.
    pub fn register_presence_handler(
        &self,
        presence_type: Option<PresenceType>,
        from: Option<Jid>,
        handler: impl Fn(Presence) + Send + Sync + 'static,
    ) -> Result<(), BrokerError> {
        self.shared
            .dispatcher
            .lock()
            .add_presence(presence_type, from, Arc::new(handler))
    }

    pub fn unregister_presence_handler(&self, presence_type: Option<PresenceType>, from: Option<Jid>) -> bool {
        self.shared.dispatcher.lock().remove_presence(presence_type, from)
    }

    /// Sends a request and waits for its response. An `error` response
    /// is returned as [`BrokerError::Stanza`].
    pub async fn send_iq_and_wait(&self, mut iq: Iq) -> Result<Iq, BrokerError> {
        iq.autoset_id();
        let id = iq.id.clone().unwrap_or_default();
        let (sender, receiver) = oneshot::channel();
        self.register_iq_response_handler(iq.to.clone(), &id, move |response| {
            if sender.send(response).is_err() {
                tracing::debug!("response arrived after the waiter left");
            }
        })?;
        self.enqueue(iq);
        let response = receiver.await.map_err(|_| BrokerError::Cancelled)?;
        if response.iq_type == IqType::Error {
            let exception = response
                .error
                .as_ref()
                .map_or_else(StanzaException::undefined_condition, StanzaError::to_exception);
            return Err(exception.into());
        }
        Ok(response)
    }

    /// Asks for stream management on the next start.
    pub fn start_sm(&self) -> Result<(), BrokerError> {
        self.ensure_stopped()?;
        let mut sm = self.shared.sm.lock();
        sm.disable();
        sm.start_negotiation();
        Ok(())
    }

    /// Applies a resumption done by the negotiation layer. Stanzas the
    /// peer did not receive are sent again before anything queued later.
    pub fn resume_sm(&self, counter: u32) -> Result<(), BrokerError> {
        self.ensure_stopped()?;
        let survivors = self.shared.sm.lock().resume(counter);
        tracing::debug!(counter, replay = survivors.len(), "stream management resumed");
        let mut outbound = self.shared.outbound.lock();
        for token in survivors.into_iter().rev() {
            outbound.push_front(token);
        }
        Ok(())
    }

    pub fn stop_sm(&self) -> Result<(), BrokerError> {
        self.ensure_stopped()?;
        self.shared.sm.lock().disable();
        Ok(())
    }

    pub fn sm_state(&self) -> SmState {
        self.shared.sm.lock().state
    }

    pub fn sm_id(&self) -> Option<String> {
        self.shared.sm.lock().id.clone()
    }

    /// Whether the peer may resume the session, and where.
    pub fn sm_resumption(&self) -> Option<(bool, Option<(String, u16)>, Option<u32>)> {
        let sm = self.shared.sm.lock();
        (sm.state == SmState::Enabled).then(|| (sm.resumable, sm.location.clone(), sm.max))
    }

    pub fn sm_counters(&self) -> (u32, u32) {
        let sm = self.shared.sm.lock();
        (sm.outbound_ack_base, sm.inbound_counter)
    }

    pub fn sm_unacked(&self) -> Vec<StanzaToken> {
        self.shared.sm.lock().unacked.iter().cloned().collect()
    }

    /// Hands a received element to the broker.
    pub fn receive(&self, item: impl Into<Inbound>) {
        self.shared.inbound.lock().push_back(item.into());
        self.shared.wakeup.notify_one();
    }

    /// Hands over the output of a [`StreamParser`](crate::stanza::StreamParser).
    pub fn receive_element(&self, element: StreamElement) {
        match element {
            StreamElement::Header(header) => {
                tracing::debug!(id = ?header.id, "stream header");
            }
            StreamElement::Stanza(stanza) => self.receive(stanza),
            StreamElement::Nonza(nonza) => self.receive(Inbound::Nonza(nonza)),
            StreamElement::Rejected {
                error,
                stanza: Some(stanza),
            } => {
                tracing::debug!(%error, kind = ?stanza.kind, id = ?stanza.id, "undecodable stanza");
                self.receive(Inbound::Rejected(stanza));
            }
            StreamElement::Rejected { error, stanza: None } => {
                tracing::debug!(%error, "dropping undecodable element");
            }
            StreamElement::End => self.connection_lost("stream closed by peer"),
        }
    }

    pub fn connection_lost(&self, reason: &str) {
        self.shared.fail(BrokerError::ConnectionLost(reason.to_string()));
    }

    fn ensure_stopped(&self) -> Result<(), BrokerError> {
        if self.shared.is_running() {
            Err(BrokerError::Running)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests;
