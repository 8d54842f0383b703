/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

use crate::xml::Element;
use crate::xml::Tag;
use crate::xml::XmlError;
use crate::xso::XsoError;

use super::ErrorCondition;
use super::ErrorType;

/// Fatal problems of the stream itself.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StreamError {
    #[error("invalid XML syntax: {0}")]
    BadXml(#[from] XmlError),

    #[error("invalid stream protocol: {0}")]
    BadStream(&'static str),
}

/// A stanza level error as a Rust error value.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("{condition} ({error_type})")]
pub struct StanzaException {
    pub error_type: ErrorType,
    pub condition: ErrorCondition,
    pub text: Option<String>,
    pub app_condition: Option<Element>,
}

impl StanzaException {
    pub fn new(error_type: ErrorType, condition: ErrorCondition) -> Self {
        StanzaException {
            error_type,
            condition,
            text: None,
            app_condition: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn with_app_condition(mut self, element: Element) -> Self {
        self.app_condition = Some(element);
        self
    }

    pub fn bad_request() -> Self {
        Self::new(ErrorType::Modify, ErrorCondition::BadRequest)
    }

    pub fn feature_not_implemented() -> Self {
        Self::new(ErrorType::Cancel, ErrorCondition::FeatureNotImplemented)
    }

    pub fn undefined_condition() -> Self {
        Self::new(ErrorType::Cancel, ErrorCondition::UndefinedCondition)
    }
}

/// Why the payload of a request could not be decoded.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PayloadError {
    #[error("no payload class registered for {0}")]
    Unknown(Tag),

    #[error("malformed payload {tag}: {error}")]
    Malformed { tag: Tag, error: XsoError },
}

impl PayloadError {
    /// The error to answer the request with.
    pub fn to_exception(&self) -> StanzaException {
        match self {
            PayloadError::Unknown(_) => StanzaException::feature_not_implemented(),
            PayloadError::Malformed { error, .. } => {
                StanzaException::bad_request().with_text(&error.to_string())
            }
        }
    }
}

pub(super) mod description {
    pub(in super::super) const NO_STREAM_HEADER: &str = "stream does not start with a stream header";
    pub(in super::super) const UNSUPPORTED_VERSION: &str = "unsupported stream version";
    pub(in super::super) const NOT_A_REQUEST: &str = "only get and set requests can be replied to";
    pub(in super::super) const NOT_A_REPLY_TYPE: &str = "a reply must be of type result or error";
}
