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

use parking_lot::Mutex;

use crate::Jid;
use crate::xml::Attributes;
use crate::xml::EventReader;
use crate::xml::EventSink;
use crate::xml::Tag;
use crate::xml::XmlEvent;
use crate::xml::XmlWriter;
use crate::xml::is_xml_whitespace;
use crate::xso::LanguageTag;
use crate::xso::ParseContext;
use crate::xso::Xso;
use crate::xso::XsoClass;
use crate::xso::XsoClassRef;
use crate::xso::XsoError;
use crate::xso::XsoParser;

use super::Iq;
use super::IqType;
use super::Message;
use super::Presence;
use super::SmAck;
use super::SmEnabled;
use super::SmFailed;
use super::SmRequest;
use super::SmResumed;
use super::Stanza;
use super::StanzaException;
use super::StreamError;
use super::StreamErrorElement;
use super::StreamFeatures;
use super::constants::CLIENT_NS;
use super::constants::STREAM_NS;
use super::constants::STREAM_PREFIX;
use super::constants::STREAM_VERSION;
use super::error::description;

/// Attributes of a `<stream:stream>` start tag.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamHeader {
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub id: Option<String>,
    pub version: Option<String>,
    pub lang: Option<LanguageTag>,
}

impl StreamHeader {
    /// Header of a client stream to the domain of `jid`.
    pub fn client(jid: &Jid) -> Self {
        StreamHeader {
            from: Some(jid.to_bare()),
            to: Some(jid.to_domain()),
            id: None,
            version: Some(STREAM_VERSION.to_string()),
            lang: None,
        }
    }

    pub fn from_attrs(attrs: &Attributes) -> Result<Self, StreamError> {
        let jid = |name: &str| {
            attrs
                .get(&Tag::local(name))
                .and_then(|value| Jid::new(value).ok())
        };
        let version = attrs.get(&Tag::local("version")).cloned();
        if let Some(version) = &version {
            if version.split('.').next() != Some("1") {
                return Err(StreamError::BadStream(description::UNSUPPORTED_VERSION));
            }
        }
        Ok(StreamHeader {
            from: jid("from"),
            to: jid("to"),
            id: attrs.get(&Tag::local("id")).cloned(),
            version,
            lang: attrs
                .get(&Tag::xml_lang())
                .and_then(|value| LanguageTag::parse(value).ok()),
        })
    }

    /// The opening of the stream, without the closing tag.
    pub fn to_xml(&self) -> Result<String, StreamError> {
        let mut attrs = Attributes::new();
        let mut set = |name: Tag, value: Option<String>| {
            if let Some(value) = value {
                attrs.insert(name, value);
            }
        };
        set(Tag::local("from"), self.from.as_ref().map(Jid::to_string));
        set(Tag::local("to"), self.to.as_ref().map(Jid::to_string));
        set(Tag::local("id"), self.id.clone());
        set(Tag::local("version"), self.version.clone());
        set(Tag::xml_lang(), self.lang.as_ref().map(LanguageTag::to_string));

        let mut writer = XmlWriter::new();
        writer.start_prefix_mapping(Some(STREAM_PREFIX), STREAM_NS)?;
        writer.start_prefix_mapping(None, CLIENT_NS)?;
        writer.start(&Tag::qualified(STREAM_NS, "stream"), &attrs)?;
        Ok(format!("<?xml version='1.0'?>{}", writer.take_output()))
    }
}

/// Closing tag of a stream.
pub const STREAM_FOOTER: &str = "</stream:stream>";

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StanzaKind {
    Iq,
    Message,
    Presence,
}

/// Addressing of a stanza which failed to decode, as far as its start tag
/// could be read. Malformed addresses are left out.
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedStanza {
    pub kind: StanzaKind,
    pub id: Option<String>,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    /// Only for IQs with a known type.
    pub iq_type: Option<IqType>,
}

impl RejectedStanza {
    fn from_start(tag: &Tag, attrs: &Attributes) -> Option<Self> {
        if tag.namespace() != Some(CLIENT_NS) {
            return None;
        }
        let kind = match tag.name() {
            "iq" => StanzaKind::Iq,
            "message" => StanzaKind::Message,
            "presence" => StanzaKind::Presence,
            _ => return None,
        };
        let attr = |name: &str| attrs.get(&Tag::local(name));
        let jid = |name: &str| attr(name).and_then(|value| Jid::new(value).ok());
        let iq_type = match (kind, attr("type").map(String::as_str)) {
            (StanzaKind::Iq, Some("get")) => Some(IqType::Get),
            (StanzaKind::Iq, Some("set")) => Some(IqType::Set),
            (StanzaKind::Iq, Some("result")) => Some(IqType::Result),
            (StanzaKind::Iq, Some("error")) => Some(IqType::Error),
            _ => None,
        };
        Some(RejectedStanza {
            kind,
            id: attr("id").cloned(),
            from: jid("from"),
            to: jid("to"),
            iq_type,
        })
    }

    pub fn is_iq_request(&self) -> bool {
        self.kind == StanzaKind::Iq && self.iq_type.is_some_and(IqType::is_request)
    }

    /// Error response to a rejected IQ request. Needs the request id.
    pub fn error_reply(&self, exc: &StanzaException) -> Option<Iq> {
        if !self.is_iq_request() || self.id.is_none() {
            return None;
        }
        let request = Iq {
            id: self.id.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            iq_type: self.iq_type.unwrap_or_default(),
            ..Default::default()
        };
        request.make_error_reply(exc).ok()
    }
}

/// One item of an incoming stream.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamElement {
    Header(StreamHeader),
    Stanza(Stanza),
    /// Any other registered top level element.
    Nonza(Box<dyn Xso>),
    /// A top level element which could not be decoded. The stream itself
    /// is still usable. `stanza` is set when the element was a stanza.
    Rejected {
        error: XsoError,
        stanza: Option<RejectedStanza>,
    },
    End,
}

type Items = Arc<Mutex<Vec<StreamElement>>>;

/// Splits an XMPP stream into its header, top level elements and end.
pub struct StreamParser {
    reader: EventReader,
    parser: XsoParser,
    items: Items,
    started: bool,
    current: Option<RejectedStanza>,
}

impl StreamParser {
    pub fn new() -> Self {
        let items = Items::default();
        let mut parser = XsoParser::new();
        let mut add = |class: XsoClassRef, wrap: fn(Box<dyn Xso>) -> Option<StreamElement>| {
            let items = items.clone();
            let added = parser.add_class_ref(class, move |xso| {
                if let Some(item) = wrap(xso) {
                    items.lock().push(item);
                }
            });
            if let Err(err) = added {
                tracing::error!(%err, "cannot register a stream element");
            }
        };
        add(XsoClassRef::of::<Iq>(), |xso| {
            xso.downcast::<Iq>().ok().map(|iq| StreamElement::Stanza(Stanza::Iq(*iq)))
        });
        add(XsoClassRef::of::<Message>(), |xso| {
            xso.downcast::<Message>()
                .ok()
                .map(|message| StreamElement::Stanza(Stanza::Message(*message)))
        });
        add(XsoClassRef::of::<Presence>(), |xso| {
            xso.downcast::<Presence>()
                .ok()
                .map(|presence| StreamElement::Stanza(Stanza::Presence(*presence)))
        });
        for class in [
            XsoClassRef::of::<SmRequest>(),
            XsoClassRef::of::<SmAck>(),
            XsoClassRef::of::<SmEnabled>(),
            XsoClassRef::of::<SmResumed>(),
            XsoClassRef::of::<SmFailed>(),
            XsoClassRef::of::<StreamFeatures>(),
            XsoClassRef::of::<StreamErrorElement>(),
        ] {
            add(class, |xso| Some(StreamElement::Nonza(xso)));
        }
        StreamParser {
            reader: EventReader::new(),
            parser,
            items,
            started: false,
            current: None,
        }
    }

    /// Makes `C` a known top level element, reported as a nonza.
    pub fn add_nonza<C: XsoClass>(&mut self) -> Result<(), XsoError> {
        let items = self.items.clone();
        self.parser.add_class_ref(XsoClassRef::of::<C>(), move |xso| {
            items.lock().push(StreamElement::Nonza(xso));
        })
    }

    pub fn parse_bytes(&mut self, bytes: &[u8]) -> Result<Vec<StreamElement>, StreamError> {
        for event in self.reader.feed(bytes)? {
            self.handle(event)?;
        }
        Ok(std::mem::take(&mut *self.items.lock()))
    }

    /// Starts over, as needed after TLS or SASL negotiation.
    pub fn reset(&mut self) {
        self.reader.reset();
        self.parser.set_context(ParseContext::default());
        self.items.lock().clear();
        self.started = false;
        self.current = None;
    }

    fn handle(&mut self, event: XmlEvent) -> Result<(), StreamError> {
        if !self.started {
            return match event {
                XmlEvent::Start { tag, attrs } if tag == Tag::qualified(STREAM_NS, "stream") => {
                    let header = StreamHeader::from_attrs(&attrs)?;
                    self.parser.set_context(ParseContext {
                        lang: header.lang.clone(),
                    });
                    self.started = true;
                    self.items.lock().push(StreamElement::Header(header));
                    Ok(())
                }
                XmlEvent::Text(text) if is_xml_whitespace(&text) => Ok(()),
                _ => Err(StreamError::BadStream(description::NO_STREAM_HEADER)),
            };
        }
        if event == XmlEvent::End && self.parser.is_idle() {
            self.started = false;
            self.items.lock().push(StreamElement::End);
            return Ok(());
        }
        if let XmlEvent::Start { tag, attrs } = &event {
            if self.parser.is_idle() {
                self.current = RejectedStanza::from_start(tag, attrs);
            }
        }
        if let Err(error) = self.parser.feed(event) {
            tracing::debug!(%error, "top level element rejected");
            self.items.lock().push(StreamElement::Rejected {
                error,
                stanza: self.current.take(),
            });
        }
        Ok(())
    }
}

impl Default for StreamParser {
    fn default() -> Self {
        Self::new()
    }
}
