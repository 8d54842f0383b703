/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::any::TypeId;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::Jid;
use crate::stanza::Iq;
use crate::stanza::IqType;
use crate::stanza::Message;
use crate::stanza::MessageType;
use crate::stanza::Presence;
use crate::stanza::PresenceType;
use crate::xso::Xso;

use super::BrokerError;

/// Called once with the response to a request.
pub type IqResponseCallback = Box<dyn FnOnce(Iq) + Send>;

/// Result of an IQ request handler: the payload of the `result` reply,
/// or an error. A [`StanzaException`](crate::stanza::StanzaException)
/// error is sent to the peer as is, anything else as
/// `undefined-condition`.
pub type IqHandlerResult = anyhow::Result<Option<Box<dyn Xso>>>;

pub type IqHandlerFuture = BoxFuture<'static, IqHandlerResult>;

pub(super) type IqRequestHandler = Arc<dyn Fn(Iq) -> IqHandlerFuture + Send + Sync>;

/// Called on the broker task in arrival order, so it must return quickly.
/// Longer work belongs in a task spawned by the handler.
pub type MessageHandler = Arc<dyn Fn(Message) + Send + Sync>;

/// Same contract as [`MessageHandler`].
pub type PresenceHandler = Arc<dyn Fn(Presence) + Send + Sync>;

type ResponseKey = (Option<Jid>, String);

type RequestKey = (IqType, TypeId);

type MessageKey = (Option<MessageType>, Option<Jid>);

type PresenceKey = (Option<PresenceType>, Option<Jid>);

#[derive(Default)]
pub(super) struct Dispatcher {
    iq_responses: HashMap<ResponseKey, IqResponseCallback>,
    iq_requests: HashMap<RequestKey, IqRequestHandler>,
    messages: HashMap<MessageKey, MessageHandler>,
    presences: HashMap<PresenceKey, PresenceHandler>,
}

fn peer_name(peer: &Option<Jid>) -> String {
    peer.as_ref().map_or_else(|| "server".to_string(), Jid::to_string)
}

impl Dispatcher {
    pub(super) fn add_iq_response(
        &mut self,
        peer: Option<Jid>,
        id: &str,
        callback: IqResponseCallback,
    ) -> Result<(), BrokerError> {
        match self.iq_responses.entry((peer, id.to_string())) {
            Entry::Occupied(entry) => Err(BrokerError::HandlerExists(format!(
                "response {} from {}",
                entry.key().1,
                peer_name(&entry.key().0)
            ))),
            Entry::Vacant(entry) => {
                entry.insert(callback);
                Ok(())
            }
        }
    }

    pub(super) fn take_iq_response(&mut self, peer: &Option<Jid>, id: &str) -> Option<IqResponseCallback> {
        self.iq_responses.remove(&(peer.clone(), id.to_string()))
    }

    pub(super) fn add_iq_request(
        &mut self,
        iq_type: IqType,
        payload: TypeId,
        payload_name: &str,
        handler: IqRequestHandler,
    ) -> Result<(), BrokerError> {
        match self.iq_requests.entry((iq_type, payload)) {
            Entry::Occupied(_) => Err(BrokerError::HandlerExists(format!(
                "{iq_type:?} requests of {payload_name}"
            ))),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub(super) fn remove_iq_request(&mut self, iq_type: IqType, payload: TypeId) -> bool {
        self.iq_requests.remove(&(iq_type, payload)).is_some()
    }

    pub(super) fn iq_request(&self, iq_type: IqType, payload: TypeId) -> Option<IqRequestHandler> {
        self.iq_requests.get(&(iq_type, payload)).cloned()
    }

    pub(super) fn add_message(
        &mut self,
        message_type: Option<MessageType>,
        from: Option<Jid>,
        handler: MessageHandler,
    ) -> Result<(), BrokerError> {
        match self.messages.entry((message_type, from)) {
            Entry::Occupied(entry) => Err(BrokerError::HandlerExists(format!(
                "{:?} messages from {}",
                entry.key().0,
                peer_name(&entry.key().1)
            ))),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub(super) fn remove_message(&mut self, message_type: Option<MessageType>, from: Option<Jid>) -> bool {
        self.messages.remove(&(message_type, from)).is_some()
    }

    /// Most specific handler: exact type and sender, then any sender of
    /// the type, then the catch all.
    pub(super) fn message(&self, message_type: MessageType, from: &Option<Jid>) -> Option<MessageHandler> {
        let kind = Some(message_type);
        self.messages
            .get(&(kind, from.clone()))
            .or_else(|| self.messages.get(&(kind, None)))
            .or_else(|| self.messages.get(&(None, None)))
            .cloned()
    }

    pub(super) fn add_presence(
        &mut self,
        presence_type: Option<PresenceType>,
        from: Option<Jid>,
        handler: PresenceHandler,
    ) -> Result<(), BrokerError> {
        match self.presences.entry((presence_type, from)) {
            Entry::Occupied(entry) => Err(BrokerError::HandlerExists(format!(
                "{:?} presences from {}",
                entry.key().0,
                peer_name(&entry.key().1)
            ))),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    pub(super) fn remove_presence(&mut self, presence_type: Option<PresenceType>, from: Option<Jid>) -> bool {
        self.presences.remove(&(presence_type, from)).is_some()
    }

    /// Exact type and sender, then any sender of the type. A `None` type
    /// stands for available presence.
    pub(super) fn presence(
        &self,
        presence_type: Option<PresenceType>,
        from: &Option<Jid>,
    ) -> Option<PresenceHandler> {
        self.presences
            .get(&(presence_type, from.clone()))
            .or_else(|| self.presences.get(&(presence_type, None)))
            .cloned()
    }
}
