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

use once_cell::sync::Lazy;

use crate::Jid;
use crate::xml::Element;
use crate::xml::Tag;
use crate::xso::Attr;
use crate::xso::ChildTag;
use crate::xso::ChildValueMap;
use crate::xso::EnumCodec;
use crate::xso::JidCodec;
use crate::xso::LangText;
use crate::xso::LanguageMap;
use crate::xso::LanguageRange;
use crate::xso::Schema;
use crate::xso::XsoClass;

use super::StanzaException;
use super::constants::CLIENT_NS;
use super::constants::STANZAS_NS;

#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ErrorType {
    Auth,
    #[default]
    Cancel,
    Continue,
    Modify,
    Wait,
}

const ERROR_TYPES: &[(&str, ErrorType)] = &[
    ("auth", ErrorType::Auth),
    ("cancel", ErrorType::Cancel),
    ("continue", ErrorType::Continue),
    ("modify", ErrorType::Modify),
    ("wait", ErrorType::Wait),
];

impl Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = ERROR_TYPES
            .iter()
            .find(|(_, value)| value == self)
            .map_or("", |(name, _)| name);
        f.write_str(name)
    }
}

/// Defined conditions of stanza errors.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorCondition {
    BadRequest,
    Conflict,
    FeatureNotImplemented,
    Forbidden,
    Gone,
    InternalServerError,
    ItemNotFound,
    JidMalformed,
    NotAcceptable,
    NotAllowed,
    NotAuthorized,
    PolicyViolation,
    RecipientUnavailable,
    Redirect,
    RegistrationRequired,
    RemoteServerNotFound,
    RemoteServerTimeout,
    ResourceConstraint,
    ServiceUnavailable,
    SubscriptionRequired,
    UndefinedCondition,
    UnexpectedRequest,
}

pub(super) const CONDITIONS: &[(&str, ErrorCondition)] = &[
    ("bad-request", ErrorCondition::BadRequest),
    ("conflict", ErrorCondition::Conflict),
    ("feature-not-implemented", ErrorCondition::FeatureNotImplemented),
    ("forbidden", ErrorCondition::Forbidden),
    ("gone", ErrorCondition::Gone),
    ("internal-server-error", ErrorCondition::InternalServerError),
    ("item-not-found", ErrorCondition::ItemNotFound),
    ("jid-malformed", ErrorCondition::JidMalformed),
    ("not-acceptable", ErrorCondition::NotAcceptable),
    ("not-allowed", ErrorCondition::NotAllowed),
    ("not-authorized", ErrorCondition::NotAuthorized),
    ("policy-violation", ErrorCondition::PolicyViolation),
    ("recipient-unavailable", ErrorCondition::RecipientUnavailable),
    ("redirect", ErrorCondition::Redirect),
    ("registration-required", ErrorCondition::RegistrationRequired),
    ("remote-server-not-found", ErrorCondition::RemoteServerNotFound),
    ("remote-server-timeout", ErrorCondition::RemoteServerTimeout),
    ("resource-constraint", ErrorCondition::ResourceConstraint),
    ("service-unavailable", ErrorCondition::ServiceUnavailable),
    ("subscription-required", ErrorCondition::SubscriptionRequired),
    ("undefined-condition", ErrorCondition::UndefinedCondition),
    ("unexpected-request", ErrorCondition::UnexpectedRequest),
];

impl ErrorCondition {
    pub fn as_str(&self) -> &'static str {
        CONDITIONS
            .iter()
            .find(|(_, value)| value == self)
            .map_or("undefined-condition", |(name, _)| name)
    }

    pub fn tag(&self) -> Tag {
        Tag::qualified(STANZAS_NS, self.as_str())
    }

    pub(super) fn markers() -> Vec<(Tag, ErrorCondition)> {
        CONDITIONS
            .iter()
            .map(|(name, condition)| (Tag::qualified(STANZAS_NS, name), *condition))
            .collect()
    }
}

impl Display for ErrorCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `<error/>` child of a stanza.
///
/// Unknown children, such as application specific conditions, are kept
/// verbatim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StanzaError {
    pub error_type: ErrorType,
    pub by: Option<Jid>,
    pub condition: Option<ErrorCondition>,
    pub text: LanguageMap,
    pub app_conditions: Vec<Element>,
}

impl XsoClass for StanzaError {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<StanzaError>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(CLIENT_NS, "error"))
                .attr(
                    Attr::local(
                        "type",
                        EnumCodec::new(ERROR_TYPES),
                        |e: &StanzaError| Some(&e.error_type),
                        |e, v| {
                            if let Some(v) = v {
                                e.error_type = v;
                            }
                        },
                    )
                    .required(),
                )
                .attr(Attr::local("by", JidCodec, |e: &StanzaError| e.by.as_ref(), |e, v| e.by = v))
                .child(ChildTag::new(
                    "condition",
                    ErrorCondition::markers(),
                    |e: &StanzaError| &e.condition,
                    |e| &mut e.condition,
                ))
                .child(ChildValueMap::new(
                    "text",
                    LangText::new(Tag::qualified(STANZAS_NS, "text")),
                    |e: &StanzaError| e.text.as_map(),
                    |e| e.text.as_map_mut(),
                ))
                .collector(|e: &StanzaError| &e.app_conditions, |e| &mut e.app_conditions)
                .build_static()
        });
        &SCHEMA
    }
}

impl StanzaError {
    pub fn new(error_type: ErrorType, condition: ErrorCondition) -> Self {
        StanzaError {
            error_type,
            condition: Some(condition),
            ..Default::default()
        }
    }

    pub fn to_exception(&self) -> StanzaException {
        StanzaException {
            error_type: self.error_type,
            condition: self.condition.unwrap_or(ErrorCondition::UndefinedCondition),
            text: self
                .text
                .lookup(&[LanguageRange::Wildcard])
                .map(str::to_string),
            app_condition: self.app_conditions.first().cloned(),
        }
    }
}

impl From<&StanzaException> for StanzaError {
    fn from(exc: &StanzaException) -> Self {
        let mut error = StanzaError::new(exc.error_type, exc.condition);
        if let Some(text) = &exc.text {
            error.text.insert(None, text);
        }
        error.app_conditions.extend(exc.app_condition.iter().cloned());
        error
    }
}

impl From<StanzaException> for StanzaError {
    fn from(exc: StanzaException) -> Self {
        StanzaError::from(&exc)
    }
}
