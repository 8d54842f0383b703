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

use tokio::sync::watch;
use tokio::time::Instant;

use crate::stanza::ErrorCondition;
use crate::stanza::ErrorType;
use crate::stanza::Iq;
use crate::stanza::IqType;
use crate::stanza::Message;
use crate::stanza::Ping;
use crate::stanza::Presence;
use crate::stanza::SmAck;
use crate::stanza::SmEnable;
use crate::stanza::SmEnabled;
use crate::stanza::SmFailed;
use crate::stanza::SmRequest;
use crate::stanza::SmResumed;
use crate::stanza::Stanza;
use crate::stanza::StanzaException;
use crate::stanza::StreamErrorElement;
use crate::xso::Xso;

use super::BrokerError;
use super::IqHandlerResult;
use super::Inbound;
use super::Shared;
use super::SmState;
use super::StanzaState;
use super::StanzaToken;
use super::TransportError;
use super::ping::PingAction;
use super::ping::Pinger;

impl Shared {
    pub(super) async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        tracing::debug!("broker started");
        let mut pinger = Pinger::new(self.config.ping_interval, self.config.ping_timeout);
        if let Err(err) = self.begin().await {
            self.fail(err);
            return;
        }
        loop {
            if *stop.borrow_and_update() {
                break;
            }
            if let Err(err) = self.process(&mut pinger, &stop).await {
                self.fail(err);
                break;
            }
            if *stop.borrow_and_update() {
                break;
            }
            let deadline = pinger.deadline();
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.wakeup.notified() => {}
                _ = tokio::time::sleep_until(deadline) => {
                    if let Err(err) = self.ping_timer(&mut pinger).await {
                        self.fail(err);
                        break;
                    }
                }
            }
        }
        tracing::debug!(
            outbound = self.outbound.lock().len(),
            inbound = self.inbound.lock().len(),
            "broker stopped"
        );
    }

    async fn begin(&self) -> Result<(), BrokerError> {
        let negotiating = self.sm.lock().state == SmState::Negotiating;
        if negotiating {
            let enable = SmEnable {
                resume: self.config.sm_resumable,
                max: self.config.sm_max,
            };
            {
                let mut sm = self.sm.lock();
                sm.disable();
                sm.start_negotiation();
            }
            self.send_nonza(&enable).await?;
            tracing::debug!("stream management requested");
        }
        Ok(())
    }

    /// Handles everything already queued: received elements first, then
    /// the outbound queue in one batch.
    async fn process(self: &Arc<Self>, pinger: &mut Pinger, stop: &watch::Receiver<bool>) -> Result<(), BrokerError> {
        loop {
            if *stop.borrow() {
                return Ok(());
            }
            let item = self.inbound.lock().pop_front();
            let Some(item) = item else {
                break;
            };
            self.dispatch(item, pinger).await?;
        }
        self.flush(pinger, stop).await
    }

    async fn flush(&self, pinger: &mut Pinger, stop: &watch::Receiver<bool>) -> Result<(), BrokerError> {
        let transport = self.transport.lock().clone();
        let mut count = 0usize;
        while !*stop.borrow() {
            let token = self.outbound.lock().pop_front();
            let Some(token) = token else {
                break;
            };
            if !token.claim() {
                continue;
            }
            match transport.send_xso(token.stanza().as_xso()).await {
                Ok(()) => {
                    self.sm.lock().sent(&token);
                    count += 1;
                }
                Err(TransportError::Encode(err)) => {
                    tracing::error!(%err, id = ?token.stanza().id(), "dropping a stanza which cannot be encoded");
                    token.set_state(StanzaState::Aborted);
                }
                Err(err) => {
                    token.release();
                    self.outbound.lock().push_front(token);
                    return Err(err.into());
                }
            }
        }
        if count > 0 {
            tracing::debug!(count, "sent stanzas");
            if pinger.wants_opportunistic(Instant::now()) {
                self.send_ping(pinger).await?;
            }
        }
        Ok(())
    }

    async fn ping_timer(&self, pinger: &mut Pinger) -> Result<(), BrokerError> {
        match pinger.expired(Instant::now()) {
            PingAction::Wait => Ok(()),
            PingAction::SendPing => self.send_ping(pinger).await,
            PingAction::Timeout => {
                tracing::warn!("no answer to ping");
                Err(BrokerError::PingTimeout)
            }
        }
    }

    async fn send_ping(&self, pinger: &mut Pinger) -> Result<(), BrokerError> {
        let sm_enabled = self.sm.lock().state == SmState::Enabled;
        if sm_enabled {
            self.send_nonza(&SmRequest).await?;
        } else {
            let mut stanza = Stanza::Iq(Iq::get(Ping));
            stanza.autoset_id();
            pinger.pending_id = stanza.id().map(str::to_string);
            let token = StanzaToken::new(stanza);
            self.send_nonza(token.stanza().as_xso()).await?;
            self.sm.lock().sent(&token);
        }
        pinger.ping_sent(Instant::now());
        Ok(())
    }

    async fn send_nonza(&self, xso: &dyn Xso) -> Result<(), BrokerError> {
        let transport = self.transport.lock().clone();
        transport.send_xso(xso).await?;
        Ok(())
    }

    async fn dispatch(self: &Arc<Self>, item: Inbound, pinger: &mut Pinger) -> Result<(), BrokerError> {
        let is_pong = matches!(
            &item,
            Inbound::Stanza(Stanza::Iq(iq))
                if !iq.is_request() && iq.id.is_some() && iq.id == pinger.pending_id
        );
        pinger.alive(Instant::now());
        match item {
            Inbound::Stanza(stanza) => {
                self.sm.lock().received_stanza();
                match stanza {
                    Stanza::Iq(_) if is_pong => {}
                    Stanza::Iq(iq) if iq.is_request() => self.dispatch_request(iq),
                    Stanza::Iq(iq) => self.dispatch_response(iq),
                    Stanza::Message(message) => self.dispatch_message(message),
                    Stanza::Presence(presence) => self.dispatch_presence(presence),
                }
                Ok(())
            }
            Inbound::Nonza(nonza) => self.dispatch_nonza(nonza).await,
            Inbound::Rejected(stanza) => {
                self.sm.lock().received_stanza();
                if stanza.is_iq_request() {
                    let exception = StanzaException::bad_request().with_text("malformed request");
                    match stanza.error_reply(&exception) {
                        Some(reply) => {
                            self.enqueue(Stanza::Iq(reply));
                        }
                        None => {
                            tracing::warn!(id = ?stanza.id, "cannot answer a malformed request");
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn dispatch_response(&self, iq: Iq) {
        let id = iq.id.clone().unwrap_or_default();
        let callback = self.dispatcher.lock().take_iq_response(&iq.from, &id);
        match callback {
            Some(callback) => callback(iq),
            None => {
                tracing::debug!(from = ?iq.from, id, "dropping unexpected IQ response");
            }
        }
    }

    fn dispatch_request(self: &Arc<Self>, iq: Iq) {
        if let Some(err) = &iq.payload_error {
            tracing::debug!(%err, id = ?iq.id, "cannot decode request payload");
            self.reply_error(&iq, &err.to_exception());
            return;
        }
        let Some(payload) = &iq.payload else {
            self.reply_error(&iq, &StanzaException::bad_request().with_text("request without payload"));
            return;
        };
        let handler = self
            .dispatcher
            .lock()
            .iq_request(iq.iq_type, payload.as_any().type_id());
        let Some(handler) = handler else {
            tracing::debug!(tag = ?payload.xso_tag(), kind = ?iq.iq_type, "no handler for request");
            self.reply_error(&iq, &StanzaException::feature_not_implemented());
            return;
        };
        let Ok(permit) = Arc::clone(&self.iq_slots).try_acquire_owned() else {
            tracing::warn!(id = ?iq.id, "too many requests in progress");
            self.reply_error(
                &iq,
                &StanzaException::new(ErrorType::Wait, ErrorCondition::ResourceConstraint),
            );
            return;
        };
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let result = handler(iq.clone()).await;
            drop(permit);
            shared.answer(&iq, result);
        });
    }

    fn answer(&self, request: &Iq, result: IqHandlerResult) {
        let reply = match result {
            Ok(payload) => request.make_reply(IqType::Result).map(|mut reply| {
                reply.payload = payload;
                reply
            }),
            Err(err) => {
                let exception = match err.downcast::<StanzaException>() {
                    Ok(exception) => exception,
                    Err(err) => {
                        tracing::warn!(%err, id = ?request.id, "request handler failed");
                        StanzaException::undefined_condition()
                    }
                };
                request.make_error_reply(&exception)
            }
        };
        match reply {
            Ok(reply) => {
                self.enqueue(Stanza::Iq(reply));
            }
            Err(err) => {
                tracing::warn!(%err, id = ?request.id, "cannot build the reply");
            }
        }
    }

    fn reply_error(&self, request: &Iq, exception: &StanzaException) {
        match request.make_error_reply(exception) {
            Ok(reply) => {
                self.enqueue(Stanza::Iq(reply));
            }
            Err(err) => {
                tracing::warn!(%err, id = ?request.id, "cannot build the error reply");
            }
        }
    }

    fn dispatch_message(&self, message: Message) {
        let handler = self.dispatcher.lock().message(message.message_type, &message.from);
        match handler {
            Some(handler) => handler(message),
            None => {
                tracing::debug!(from = ?message.from, kind = ?message.message_type, "no handler for message");
            }
        }
    }

    fn dispatch_presence(&self, presence: Presence) {
        let handler = self.dispatcher.lock().presence(presence.presence_type, &presence.from);
        match handler {
            Some(handler) => handler(presence),
            None => {
                tracing::debug!(from = ?presence.from, kind = ?presence.presence_type, "no handler for presence");
            }
        }
    }

    async fn dispatch_nonza(&self, nonza: Box<dyn Xso>) -> Result<(), BrokerError> {
        if let Some(ack) = nonza.downcast_ref::<SmAck>() {
            let acked = self.sm.lock().ack(ack.counter);
            tracing::debug!(counter = ack.counter, acked, "stream management ack");
        } else if nonza.is::<SmRequest>() {
            let reply = self.sm.lock().ack_reply();
            if let Some(reply) = reply {
                self.send_nonza(&reply).await?;
            }
        } else if let Some(enabled) = nonza.downcast_ref::<SmEnabled>() {
            self.sm.lock().enabled(enabled);
            tracing::debug!(id = ?enabled.id, resume = enabled.resume, "stream management enabled");
        } else if let Some(failed) = nonza.downcast_ref::<SmFailed>() {
            tracing::warn!(condition = ?failed.condition, "stream management refused");
            self.sm.lock().disable();
        } else if let Some(error) = nonza.downcast_ref::<StreamErrorElement>() {
            return Err(BrokerError::Stream(error.to_string()));
        } else if nonza.is::<SmResumed>() {
            tracing::warn!("resumption must be applied with resume_sm while stopped");
        } else {
            tracing::debug!(tag = ?nonza.xso_tag(), "ignoring element");
        }
        Ok(())
    }
}
