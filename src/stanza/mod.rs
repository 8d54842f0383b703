/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Stanzas, stream level elements and the stream splitter.

pub mod constants;
mod error;
mod features;
mod iq;
mod message;
mod ping;
mod presence;
mod sm;
mod stanza_error;
mod stream;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;

use crate::Jid;
use crate::xml::EventSink;
use crate::xso::Xso;
use crate::xso::XsoError;

pub use error::PayloadError;
pub use error::StanzaException;
pub use error::StreamError;
pub use features::STREAM_FEATURES;
pub use features::StreamErrorCondition;
pub use features::StreamErrorElement;
pub use features::StreamFeatures;
pub use features::register_stream_feature;
pub use iq::IQ_PAYLOADS;
pub use iq::Iq;
pub use iq::IqType;
pub use iq::register_iq_payload;
pub use message::MESSAGE_EXTENSIONS;
pub use message::Message;
pub use message::MessageType;
pub use message::Thread;
pub use message::register_message_extension;
pub use ping::Ping;
pub use presence::PRESENCE_EXTENSIONS;
pub use presence::Presence;
pub use presence::PresenceShow;
pub use presence::PresenceType;
pub use presence::register_presence_extension;
pub use sm::SmAck;
pub use sm::SmEnable;
pub use sm::SmEnabled;
pub use sm::SmFailed;
pub use sm::SmFeature;
pub use sm::SmRequest;
pub use sm::SmResume;
pub use sm::SmResumed;
pub use stanza_error::ErrorCondition;
pub use stanza_error::ErrorType;
pub use stanza_error::StanzaError;
pub use stream::STREAM_FOOTER;
pub use stream::RejectedStanza;
pub use stream::StanzaKind;
pub use stream::StreamElement;
pub use stream::StreamHeader;
pub use stream::StreamParser;

/// Random stanza id with 120 bits of randomness.
pub fn generate_id() -> String {
    let mut bytes = [0u8; 15];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stanza {
    Iq(Iq),
    Message(Message),
    Presence(Presence),
}

impl Stanza {
    pub fn as_xso(&self) -> &dyn Xso {
        match self {
            Stanza::Iq(iq) => iq,
            Stanza::Message(message) => message,
            Stanza::Presence(presence) => presence,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Stanza::Iq(iq) => iq.id.as_deref(),
            Stanza::Message(message) => message.id.as_deref(),
            Stanza::Presence(presence) => presence.id.as_deref(),
        }
    }

    pub fn sender(&self) -> Option<&Jid> {
        match self {
            Stanza::Iq(iq) => iq.from.as_ref(),
            Stanza::Message(message) => message.from.as_ref(),
            Stanza::Presence(presence) => presence.from.as_ref(),
        }
    }

    pub fn recipient(&self) -> Option<&Jid> {
        match self {
            Stanza::Iq(iq) => iq.to.as_ref(),
            Stanza::Message(message) => message.to.as_ref(),
            Stanza::Presence(presence) => presence.to.as_ref(),
        }
    }

    pub fn autoset_id(&mut self) {
        match self {
            Stanza::Iq(iq) => iq.autoset_id(),
            Stanza::Message(message) => message.autoset_id(),
            Stanza::Presence(presence) => presence.autoset_id(),
        }
    }

    pub fn encode(&self, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        self.as_xso().encode(sink)
    }
}

impl From<Iq> for Stanza {
    fn from(iq: Iq) -> Self {
        Stanza::Iq(iq)
    }
}

impl From<Message> for Stanza {
    fn from(message: Message) -> Self {
        Stanza::Message(message)
    }
}

impl From<Presence> for Stanza {
    fn from(presence: Presence) -> Self {
        Stanza::Presence(presence)
    }
}
