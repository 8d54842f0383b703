/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::Jid;
use crate::xml::Tag;
use crate::xso::Attr;
use crate::xso::Candidates;
use crate::xso::Child;
use crate::xso::ChildMap;
use crate::xso::ChildValueMap;
use crate::xso::ClassRegistry;
use crate::xso::EnumCodec;
use crate::xso::JidCodec;
use crate::xso::LangText;
use crate::xso::LanguageMap;
use crate::xso::LanguageTag;
use crate::xso::Schema;
use crate::xso::StringCodec;
use crate::xso::Text;
use crate::xso::UnknownPolicy;
use crate::xso::Xso;
use crate::xso::XsoClass;
use crate::xso::XsoError;
use crate::xso::XsoList;

use super::StanzaError;
use super::constants::CLIENT_NS;
use super::generate_id;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum MessageType {
    #[default]
    Chat,
    Error,
    Groupchat,
    Headline,
    Normal,
}

const MESSAGE_TYPES: &[(&str, MessageType)] = &[
    ("chat", MessageType::Chat),
    ("error", MessageType::Error),
    ("groupchat", MessageType::Groupchat),
    ("headline", MessageType::Headline),
    ("normal", MessageType::Normal),
];

/// Extension payloads of messages, like receipts or chat markers.
pub static MESSAGE_EXTENSIONS: Lazy<ClassRegistry> = Lazy::new(ClassRegistry::new);

pub fn register_message_extension<C: XsoClass>() -> Result<(), XsoError> {
    MESSAGE_EXTENSIONS.register::<C>()
}

/// Conversation thread identifier.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Thread {
    pub id: Option<String>,
    pub parent: Option<String>,
}

impl XsoClass for Thread {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Thread>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(CLIENT_NS, "thread"))
                .attr(Attr::local("parent", StringCodec, |t: &Thread| t.parent.as_ref(), |t, v| t.parent = v))
                .text(Text::new("id", StringCodec, |t: &Thread| t.id.as_ref(), |t, v| t.id = v))
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Message {
    pub id: Option<String>,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub message_type: MessageType,
    pub lang: Option<LanguageTag>,
    pub body: LanguageMap,
    pub subject: LanguageMap,
    pub thread: Option<Thread>,
    pub extensions: IndexMap<Tag, XsoList<Box<dyn Xso>>>,
    pub error: Option<StanzaError>,
}

impl XsoClass for Message {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Message>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(CLIENT_NS, "message"))
                .attr(Attr::local("id", StringCodec, |m: &Message| m.id.as_ref(), |m, v| m.id = v))
                .attr(Attr::local("from", JidCodec, |m: &Message| m.from.as_ref(), |m, v| m.from = v))
                .attr(Attr::local("to", JidCodec, |m: &Message| m.to.as_ref(), |m, v| m.to = v))
                .attr(
                    Attr::local(
                        "type",
                        EnumCodec::new(MESSAGE_TYPES),
                        |m: &Message| Some(&m.message_type),
                        |m, v| {
                            if let Some(v) = v {
                                m.message_type = v;
                            }
                        },
                    )
                    .when_missing(|_| Some(MessageType::Normal)),
                )
                .attr(Attr::xml_lang(|m: &Message| m.lang.as_ref(), |m, v| m.lang = v))
                .child(ChildValueMap::new(
                    "subject",
                    LangText::new(Tag::qualified(CLIENT_NS, "subject")),
                    |m: &Message| m.subject.as_map(),
                    |m| m.subject.as_map_mut(),
                ))
                .child(ChildValueMap::new(
                    "body",
                    LangText::new(Tag::qualified(CLIENT_NS, "body")),
                    |m: &Message| m.body.as_map(),
                    |m| m.body.as_map_mut(),
                ))
                .child(Child::new(
                    "thread",
                    Candidates::of::<Thread>(),
                    |m: &Message| &m.thread,
                    |m| &mut m.thread,
                ))
                .child(Child::new(
                    "error",
                    Candidates::of::<StanzaError>(),
                    |m: &Message| &m.error,
                    |m| &mut m.error,
                ))
                .child(ChildMap::by_tag(
                    "extensions",
                    Candidates::open(&MESSAGE_EXTENSIONS),
                    |m: &Message| &m.extensions,
                    |m| &mut m.extensions,
                ))
                .unknown_children(UnknownPolicy::Drop)
                .unknown_attrs(UnknownPolicy::Drop)
                .lang(|m: &Message| m.lang.as_ref())
                .build_static()
        });
        &SCHEMA
    }
}

impl Message {
    pub fn new(message_type: MessageType) -> Self {
        Message {
            message_type,
            ..Default::default()
        }
    }

    pub fn chat(to: Jid, body: &str) -> Self {
        let mut message = Self::new(MessageType::Chat);
        message.to = Some(to);
        message.body.insert(None, body);
        message
    }

    /// Addressed back to the sender, with the same type and no id.
    pub fn make_reply(&self) -> Message {
        Message {
            from: self.to.clone(),
            to: self.from.clone(),
            message_type: self.message_type,
            thread: self.thread.clone(),
            ..Default::default()
        }
    }

    pub fn extension<C: Xso>(&self) -> Option<&C> {
        self.extensions
            .values()
            .flat_map(|list| list.filter_type::<C>())
            .next()
    }

    pub fn add_extension(&mut self, extension: impl Xso) {
        self.extensions
            .entry(extension.xso_tag().clone())
            .or_default()
            .push(Box::new(extension));
    }

    pub fn autoset_id(&mut self) {
        if self.id.is_none() {
            self.id = Some(generate_id());
        }
    }
}
