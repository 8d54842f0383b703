/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Namespace-aware XML events on top of the SAX tokenizer.

mod element;
mod error;
mod reader;
mod writer;

use std::fmt::Display;

use indexmap::IndexMap;

pub use element::Element;
pub use element::ElementBuilder;
pub use element::Node;
pub use error::XmlError;
use error::description;
pub use reader::EventReader;
pub use reader::read_events;
pub use writer::XmlWriter;

pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// A namespace qualified element or attribute name.
///
/// An absent namespace is distinct from the empty namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag {
    namespace: Option<String>,
    name: String,
}

impl Tag {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Tag {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }

    pub fn qualified(namespace: &str, name: &str) -> Self {
        Self::new(Some(namespace), name)
    }

    pub fn local(name: &str) -> Self {
        Self::new(None, name)
    }

    /// The `xml:lang` attribute.
    pub fn xml_lang() -> Self {
        Self::qualified(XML_NS, "lang")
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, namespace: Option<&str>, name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.name == name
    }
}

/// Formats in the `{namespace}localname` wire notation.
impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{{{}}}{}", namespace, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Accepted spellings of a tag.
#[derive(Clone, Copy, Debug)]
pub enum TagInput<'a> {
    /// `{namespace}localname` or a bare `localname`.
    Wire(&'a str),
    /// Split `[namespace, localname]` parts.
    Parts(&'a [Option<&'a str>]),
    Tag(&'a Tag),
}

impl<'a> From<&'a str> for TagInput<'a> {
    fn from(s: &'a str) -> Self {
        TagInput::Wire(s)
    }
}

impl<'a> From<&'a Tag> for TagInput<'a> {
    fn from(tag: &'a Tag) -> Self {
        TagInput::Tag(tag)
    }
}

pub fn normalize_tag<'a>(input: impl Into<TagInput<'a>>) -> Result<Tag, XmlError> {
    match input.into() {
        TagInput::Tag(tag) => Ok(tag.clone()),
        TagInput::Wire(s) => {
            let (namespace, name) = match s.strip_prefix('{') {
                Some(rest) => match rest.split_once('}') {
                    Some((namespace, name)) => (Some(namespace), name),
                    None => {
                        return Err(XmlError::MalformedTag(description::UNTERMINATED_NAMESPACE));
                    }
                },
                None => (None, s),
            };
            if name.is_empty() {
                return Err(XmlError::MalformedTag(description::EMPTY_LOCALNAME));
            }
            Ok(Tag::new(namespace, name))
        }
        TagInput::Parts(parts) => match parts {
            [namespace, Some(name)] if !name.is_empty() => Ok(Tag::new(*namespace, name)),
            [_, _] => Err(XmlError::MalformedTag(description::MISSING_LOCALNAME)),
            _ => Err(XmlError::MalformedTag(description::BAD_ARITY)),
        },
    }
}

pub fn tag_to_wire_string(tag: &Tag) -> String {
    tag.to_string()
}

/// Attributes of an element in document order.
pub type Attributes = IndexMap<Tag, String>;

/// One step of the event protocol between the tokenizer and the XSO layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum XmlEvent {
    Start { tag: Tag, attrs: Attributes },
    Text(String),
    End,
}

/// Receiver of serialized events.
pub trait EventSink {
    /// Requests a prefix binding for the next element. `None` binds the
    /// default namespace.
    fn start_prefix_mapping(
        &mut self,
        _prefix: Option<&str>,
        _namespace: &str,
    ) -> Result<(), XmlError> {
        Ok(())
    }

    fn start(&mut self, tag: &Tag, attrs: &Attributes) -> Result<(), XmlError>;

    fn text(&mut self, text: &str) -> Result<(), XmlError>;

    fn end(&mut self) -> Result<(), XmlError>;
}

/// Sink which records the events as they are emitted.
#[derive(Debug, Default)]
pub struct EventCollector {
    events: Vec<XmlEvent>,
}

impl EventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[XmlEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<XmlEvent> {
        self.events
    }
}

impl EventSink for EventCollector {
    fn start(&mut self, tag: &Tag, attrs: &Attributes) -> Result<(), XmlError> {
        self.events.push(XmlEvent::Start {
            tag: tag.clone(),
            attrs: attrs.clone(),
        });
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some(XmlEvent::Text(prev)) = self.events.last_mut() {
            prev.push_str(text);
        } else {
            self.events.push(XmlEvent::Text(text.to_string()));
        }
        Ok(())
    }

    fn end(&mut self) -> Result<(), XmlError> {
        self.events.push(XmlEvent::End);
        Ok(())
    }
}

pub fn is_xml_whitespace(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
}

#[cfg(test)]
mod tests;
