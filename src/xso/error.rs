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

use crate::xml::Attributes;
use crate::xml::Tag;
use crate::xml::XmlError;

/// Failure to convert character data into a typed value.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("cannot parse '{text}' as {type_name}: {reason}")]
pub struct CodecError {
    pub text: String,
    pub type_name: &'static str,
    pub reason: &'static str,
}

impl CodecError {
    pub fn new(text: &str, type_name: &'static str, reason: &'static str) -> Self {
        CodecError {
            text: text.to_string(),
            type_name,
            reason,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum XsoError {
    #[error("field '{field}': {source}")]
    Codec {
        field: &'static str,
        source: CodecError,
    },

    #[error("missing attribute {0}")]
    MissingAttribute(Tag),

    #[error("missing child for field '{0}'")]
    MissingChild(&'static str),

    #[error("unexpected attribute {0}")]
    UnknownAttribute(Tag),

    #[error("unexpected child element {0}")]
    UnknownChild(Tag),

    #[error("unexpected character data")]
    UnexpectedText,

    #[error("no class registered for top level element {tag}")]
    UnknownTopLevelTag { tag: Tag, attrs: Attributes },

    #[error("tag {0} is already registered")]
    AmbiguousRegistration(Tag),

    #[error("invalid schema for {tag}: {reason}")]
    Schema { tag: Tag, reason: &'static str },

    #[error("expected an instance of {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value of field '{0}' cannot be serialized")]
    UnencodableValue(&'static str),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Xml(#[from] XmlError),
}

/// What was being decoded when a failure happened.
#[derive(Debug, Clone, PartialEq)]
pub enum Offender {
    Attribute { tag: Tag, value: String },
    Child(Tag),
    Text(String),
}

/// Argument of the per-class error recovery hook.
///
/// `field` names the descriptor which failed, or is `None` for content no
/// descriptor claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub field: Option<&'static str>,
    pub offender: Offender,
    pub error: XsoError,
}

pub(super) mod description {
    pub const DUPLICATE_ATTRIBUTE: &str = "attribute tag declared twice";
    pub const DUPLICATE_CHILD: &str = "child tag claimed by two descriptors";
    pub const DUPLICATE_TEXT: &str = "more than one text descriptor";
    pub const DUPLICATE_COLLECTOR: &str = "more than one collector";
    pub const END_WITHOUT_START: &str = "end event without an open element";
}
