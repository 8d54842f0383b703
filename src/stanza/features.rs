/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::xml::Element;
use crate::xml::Tag;
use crate::xso::Candidates;
use crate::xso::ChildMap;
use crate::xso::ChildTag;
use crate::xso::ChildValue;
use crate::xso::ClassRegistry;
use crate::xso::Schema;
use crate::xso::StringCodec;
use crate::xso::TextChild;
use crate::xso::Xso;
use crate::xso::XsoClass;
use crate::xso::XsoError;
use crate::xso::XsoList;

use super::SmFeature;
use super::constants::STREAM_NS;
use super::constants::STREAM_PREFIX;
use super::constants::STREAMS_NS;

/// Feature classes understood inside `<stream:features/>`.
pub static STREAM_FEATURES: Lazy<ClassRegistry> = Lazy::new(|| {
    let registry = ClassRegistry::new();
    if let Err(err) = registry.register::<SmFeature>() {
        tracing::error!(%err, "cannot register the stream management feature");
    }
    registry
});

pub fn register_stream_feature<C: XsoClass>() -> Result<(), XsoError> {
    STREAM_FEATURES.register::<C>()
}

/// Stream features advertised by the peer. Features without a registered
/// class are kept as plain elements.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamFeatures {
    pub features: IndexMap<Tag, XsoList<Box<dyn Xso>>>,
    pub unknown: Vec<Element>,
}

impl XsoClass for StreamFeatures {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<StreamFeatures>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(STREAM_NS, "features"))
                .declare_prefix(Some(STREAM_PREFIX), STREAM_NS)
                .child(ChildMap::by_tag(
                    "features",
                    Candidates::open(&STREAM_FEATURES),
                    |f: &StreamFeatures| &f.features,
                    |f| &mut f.features,
                ))
                .collector(|f: &StreamFeatures| &f.unknown, |f| &mut f.unknown)
                .build_static()
        });
        &SCHEMA
    }
}

impl StreamFeatures {
    pub fn has(&self, tag: &Tag) -> bool {
        self.features.contains_key(tag) || self.unknown.iter().any(|element| &element.tag == tag)
    }

    pub fn get<C: XsoClass>(&self) -> Option<&C> {
        self.features
            .get(C::schema().tag())
            .and_then(|list| list.filter_type::<C>().next())
    }

    pub fn supports_sm(&self) -> bool {
        self.get::<SmFeature>().is_some()
    }
}

/// Defined conditions of stream errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StreamErrorCondition {
    BadFormat,
    BadNamespacePrefix,
    Conflict,
    ConnectionTimeout,
    HostGone,
    HostUnknown,
    ImproperAddressing,
    InternalServerError,
    InvalidFrom,
    InvalidNamespace,
    InvalidXml,
    NotAuthorized,
    NotWellFormed,
    PolicyViolation,
    RemoteConnectionFailed,
    Reset,
    ResourceConstraint,
    RestrictedXml,
    SeeOtherHost,
    SystemShutdown,
    UndefinedCondition,
    UnsupportedEncoding,
    UnsupportedFeature,
    UnsupportedStanzaType,
    UnsupportedVersion,
}

const STREAM_CONDITIONS: &[(&str, StreamErrorCondition)] = &[
    ("bad-format", StreamErrorCondition::BadFormat),
    ("bad-namespace-prefix", StreamErrorCondition::BadNamespacePrefix),
    ("conflict", StreamErrorCondition::Conflict),
    ("connection-timeout", StreamErrorCondition::ConnectionTimeout),
    ("host-gone", StreamErrorCondition::HostGone),
    ("host-unknown", StreamErrorCondition::HostUnknown),
    ("improper-addressing", StreamErrorCondition::ImproperAddressing),
    ("internal-server-error", StreamErrorCondition::InternalServerError),
    ("invalid-from", StreamErrorCondition::InvalidFrom),
    ("invalid-namespace", StreamErrorCondition::InvalidNamespace),
    ("invalid-xml", StreamErrorCondition::InvalidXml),
    ("not-authorized", StreamErrorCondition::NotAuthorized),
    ("not-well-formed", StreamErrorCondition::NotWellFormed),
    ("policy-violation", StreamErrorCondition::PolicyViolation),
    ("remote-connection-failed", StreamErrorCondition::RemoteConnectionFailed),
    ("reset", StreamErrorCondition::Reset),
    ("resource-constraint", StreamErrorCondition::ResourceConstraint),
    ("restricted-xml", StreamErrorCondition::RestrictedXml),
    ("see-other-host", StreamErrorCondition::SeeOtherHost),
    ("system-shutdown", StreamErrorCondition::SystemShutdown),
    ("undefined-condition", StreamErrorCondition::UndefinedCondition),
    ("unsupported-encoding", StreamErrorCondition::UnsupportedEncoding),
    ("unsupported-feature", StreamErrorCondition::UnsupportedFeature),
    ("unsupported-stanza-type", StreamErrorCondition::UnsupportedStanzaType),
    ("unsupported-version", StreamErrorCondition::UnsupportedVersion),
];

impl Display for StreamErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = STREAM_CONDITIONS
            .iter()
            .find(|(_, value)| value == self)
            .map_or("undefined-condition", |(name, _)| name);
        f.write_str(name)
    }
}

/// `<stream:error/>`, always fatal.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamErrorElement {
    pub condition: Option<StreamErrorCondition>,
    pub text: Option<String>,
    pub app_conditions: Vec<Element>,
}

impl XsoClass for StreamErrorElement {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<StreamErrorElement>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(STREAM_NS, "error"))
                .declare_prefix(Some(STREAM_PREFIX), STREAM_NS)
                .child(ChildTag::new(
                    "condition",
                    STREAM_CONDITIONS
                        .iter()
                        .map(|(name, condition)| (Tag::qualified(STREAMS_NS, name), *condition))
                        .collect(),
                    |e: &StreamErrorElement| &e.condition,
                    |e| &mut e.condition,
                ))
                .child(ChildValue::new(
                    "text",
                    TextChild::new(Tag::qualified(STREAMS_NS, "text"), StringCodec),
                    |e: &StreamErrorElement| &e.text,
                    |e| &mut e.text,
                ))
                .collector(|e: &StreamErrorElement| &e.app_conditions, |e| &mut e.app_conditions)
                .build_static()
        });
        &SCHEMA
    }
}

impl StreamErrorElement {
    pub fn new(condition: StreamErrorCondition) -> Self {
        StreamErrorElement {
            condition: Some(condition),
            ..Default::default()
        }
    }
}

impl Display for StreamErrorElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.condition {
            Some(condition) => write!(f, "{condition}")?,
            None => f.write_str("undefined-condition")?,
        }
        if let Some(text) = &self.text {
            write!(f, ": {text}")?;
        }
        Ok(())
    }
}
