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

use crate::Location;
use crate::SaxError;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum XmlError {
    #[error("{error} at {location}")]
    Syntax { error: SaxError, location: Location },

    #[error("namespace prefix '{0}' is not bound")]
    UnboundPrefix(String),

    #[error("end tag '{found}' does not match start tag '{expected}'")]
    TagMismatch { expected: String, found: String },

    #[error("duplicate attribute '{0}'")]
    DuplicateAttribute(String),

    #[error("malformed tag: {0}")]
    MalformedTag(&'static str),

    #[error("unbalanced event sequence: {0}")]
    Unbalanced(&'static str),
}

pub(super) mod description {
    pub(in super::super) const UNTERMINATED_NAMESPACE: &str = "namespace is not terminated by '}'";
    pub(in super::super) const EMPTY_LOCALNAME: &str = "local name is empty";
    pub(in super::super) const BAD_ARITY: &str = "tag parts must be a (namespace, localname) pair";
    pub(in super::super) const MISSING_LOCALNAME: &str = "local name is missing";
    pub(in super::super) const END_WITHOUT_START: &str = "end event without an open element";
    pub(in super::super) const TEXT_OUTSIDE_ELEMENT: &str = "text event outside of an element";
    pub(in super::super) const ELEMENT_AFTER_ROOT: &str = "start event after the root element ended";
    pub(in super::super) const UNFINISHED_ELEMENT: &str = "element is not closed";
}
