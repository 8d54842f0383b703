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
use crate::xso::ChildValue;
use crate::xso::ChildValueMap;
use crate::xso::ClassRegistry;
use crate::xso::EnumCodec;
use crate::xso::Integer;
use crate::xso::JidCodec;
use crate::xso::LangText;
use crate::xso::LanguageMap;
use crate::xso::LanguageTag;
use crate::xso::Schema;
use crate::xso::StringCodec;
use crate::xso::TextChild;
use crate::xso::UnknownPolicy;
use crate::xso::Xso;
use crate::xso::XsoClass;
use crate::xso::XsoError;
use crate::xso::XsoList;

use super::StanzaError;
use super::constants::CLIENT_NS;
use super::generate_id;

/// Presence types. An absent type means available.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PresenceType {
    Error,
    Probe,
    Subscribe,
    Subscribed,
    Unavailable,
    Unsubscribe,
    Unsubscribed,
}

const PRESENCE_TYPES: &[(&str, PresenceType)] = &[
    ("error", PresenceType::Error),
    ("probe", PresenceType::Probe),
    ("subscribe", PresenceType::Subscribe),
    ("subscribed", PresenceType::Subscribed),
    ("unavailable", PresenceType::Unavailable),
    ("unsubscribe", PresenceType::Unsubscribe),
    ("unsubscribed", PresenceType::Unsubscribed),
];

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum PresenceShow {
    Away,
    Chat,
    Dnd,
    Xa,
}

const SHOW_VALUES: &[(&str, PresenceShow)] = &[
    ("away", PresenceShow::Away),
    ("chat", PresenceShow::Chat),
    ("dnd", PresenceShow::Dnd),
    ("xa", PresenceShow::Xa),
];

pub static PRESENCE_EXTENSIONS: Lazy<ClassRegistry> = Lazy::new(ClassRegistry::new);

pub fn register_presence_extension<C: XsoClass>() -> Result<(), XsoError> {
    PRESENCE_EXTENSIONS.register::<C>()
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Presence {
    pub id: Option<String>,
    pub from: Option<Jid>,
    pub to: Option<Jid>,
    pub presence_type: Option<PresenceType>,
    pub lang: Option<LanguageTag>,
    pub show: Option<PresenceShow>,
    pub status: LanguageMap,
    pub priority: Option<i8>,
    pub extensions: IndexMap<Tag, XsoList<Box<dyn Xso>>>,
    pub error: Option<StanzaError>,
}

impl XsoClass for Presence {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Presence>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(CLIENT_NS, "presence"))
                .attr(Attr::local("id", StringCodec, |p: &Presence| p.id.as_ref(), |p, v| p.id = v))
                .attr(Attr::local("from", JidCodec, |p: &Presence| p.from.as_ref(), |p, v| p.from = v))
                .attr(Attr::local("to", JidCodec, |p: &Presence| p.to.as_ref(), |p, v| p.to = v))
                .attr(Attr::local(
                    "type",
                    EnumCodec::new(PRESENCE_TYPES),
                    |p: &Presence| p.presence_type.as_ref(),
                    |p, v| p.presence_type = v,
                ))
                .attr(Attr::xml_lang(|p: &Presence| p.lang.as_ref(), |p, v| p.lang = v))
                .child(ChildValue::new(
                    "show",
                    TextChild::new(Tag::qualified(CLIENT_NS, "show"), EnumCodec::new(SHOW_VALUES)),
                    |p: &Presence| &p.show,
                    |p| &mut p.show,
                ))
                .child(ChildValueMap::new(
                    "status",
                    LangText::new(Tag::qualified(CLIENT_NS, "status")),
                    |p: &Presence| p.status.as_map(),
                    |p| p.status.as_map_mut(),
                ))
                .child(ChildValue::new(
                    "priority",
                    TextChild::new(Tag::qualified(CLIENT_NS, "priority"), Integer::<i8>::new()),
                    |p: &Presence| &p.priority,
                    |p| &mut p.priority,
                ))
                .child(Child::new(
                    "error",
                    Candidates::of::<StanzaError>(),
                    |p: &Presence| &p.error,
                    |p| &mut p.error,
                ))
                .child(ChildMap::by_tag(
                    "extensions",
                    Candidates::open(&PRESENCE_EXTENSIONS),
                    |p: &Presence| &p.extensions,
                    |p| &mut p.extensions,
                ))
                .unknown_children(UnknownPolicy::Drop)
                .unknown_attrs(UnknownPolicy::Drop)
                .lang(|p: &Presence| p.lang.as_ref())
                .build_static()
        });
        &SCHEMA
    }
}

impl Presence {
    pub fn new(presence_type: Option<PresenceType>) -> Self {
        Presence {
            presence_type,
            ..Default::default()
        }
    }

    pub fn available() -> Self {
        Self::new(None)
    }

    pub fn unavailable() -> Self {
        Self::new(Some(PresenceType::Unavailable))
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
