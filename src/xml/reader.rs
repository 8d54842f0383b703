/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::HashMap;

use crate::Location;
use crate::SaxElement;
use crate::SaxError;
use crate::SaxHandler;
use crate::SaxParser;

use super::Attributes;
use super::Tag;
use super::XML_NS;
use super::XmlError;
use super::XmlEvent;

#[derive(Default)]
struct Scope {
    default: Option<String>,
    prefixes: HashMap<String, String>,
}

struct PendingStart {
    name: String,
    attrs: Vec<(String, String)>,
}

#[derive(Default)]
struct Resolver {
    pending: Option<PendingStart>,
    scopes: Vec<Scope>,
    names: Vec<String>,
    events: Vec<XmlEvent>,
    error: Option<XmlError>,
}

impl Resolver {
    fn lookup(&self, prefix: &str) -> Option<&str> {
        if prefix == "xml" {
            return Some(XML_NS);
        }
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.prefixes.get(prefix))
            .map(String::as_str)
    }

    fn resolve_element(&self, name: &str) -> Result<Tag, XmlError> {
        match name.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(namespace) => Ok(Tag::qualified(namespace, local)),
                None => Err(XmlError::UnboundPrefix(prefix.to_string())),
            },
            None => {
                let default = self.scopes.last().and_then(|scope| scope.default.as_deref());
                Ok(Tag::new(default, name))
            }
        }
    }

    // Unprefixed attributes are in no namespace.
    fn resolve_attribute(&self, name: &str) -> Result<Tag, XmlError> {
        match name.split_once(':') {
            Some((prefix, local)) => match self.lookup(prefix) {
                Some(namespace) => Ok(Tag::qualified(namespace, local)),
                None => Err(XmlError::UnboundPrefix(prefix.to_string())),
            },
            None => Ok(Tag::local(name)),
        }
    }

    fn open(&mut self, empty: bool) -> Result<(), XmlError> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let mut scope = Scope {
            default: self.scopes.last().and_then(|scope| scope.default.clone()),
            prefixes: HashMap::new(),
        };
        let mut plain = Vec::with_capacity(pending.attrs.len());
        for (name, value) in pending.attrs {
            if name == "xmlns" {
                scope.default = if value.is_empty() { None } else { Some(value) };
            } else if let Some(prefix) = name.strip_prefix("xmlns:") {
                scope.prefixes.insert(prefix.to_string(), value);
            } else {
                plain.push((name, value));
            }
        }
        self.scopes.push(scope);

        let tag = self.resolve_element(&pending.name)?;
        let mut attrs = Attributes::with_capacity(plain.len());
        for (name, value) in plain {
            let attr = self.resolve_attribute(&name)?;
            if attrs.insert(attr, value).is_some() {
                return Err(XmlError::DuplicateAttribute(name));
            }
        }
        self.events.push(XmlEvent::Start { tag, attrs });
        if empty {
            self.scopes.pop();
            self.events.push(XmlEvent::End);
        } else {
            self.names.push(pending.name);
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), XmlError> {
        self.open(false)?;
        match self.names.pop() {
            Some(expected) if expected == name => {
                self.scopes.pop();
                self.events.push(XmlEvent::End);
                Ok(())
            }
            Some(expected) => Err(XmlError::TagMismatch {
                expected,
                found: name.to_string(),
            }),
            None => Err(XmlError::Unbalanced(super::description::END_WITHOUT_START)),
        }
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        self.open(false)?;
        if let Some(XmlEvent::Text(prev)) = self.events.last_mut() {
            prev.push_str(text);
        } else {
            self.events.push(XmlEvent::Text(text.to_string()));
        }
        Ok(())
    }

    fn handle(&mut self, element: &SaxElement) -> Result<(), XmlError> {
        match element {
            SaxElement::StartTag(name) => {
                self.open(false)?;
                self.pending = Some(PendingStart {
                    name: name.to_string(),
                    attrs: Vec::new(),
                });
            }
            SaxElement::Attribute(name, value) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.attrs.push((name.to_string(), value.to_string()));
                }
            }
            SaxElement::StartTagContent => self.open(false)?,
            SaxElement::StartTagEmpty => self.open(true)?,
            SaxElement::EndTag(name) => self.close(name)?,
            SaxElement::CData(text) => self.text(text)?,
        }
        Ok(())
    }
}

impl SaxHandler for Resolver {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        self.handle(element).map_err(|err| {
            self.error = Some(err);
            SaxError::HandlerAbort
        })
    }
}

/// Turns raw bytes into namespace resolved [XmlEvent]s.
///
/// Bytes can be fed in arbitrary chunks. Each call returns the events
/// completed by that chunk; consecutive character data is merged within
/// one call.
pub struct EventReader {
    parser: SaxParser,
    resolver: Resolver,
}

impl EventReader {
    pub fn new() -> Self {
        EventReader {
            parser: SaxParser::new(),
            resolver: Resolver::default(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<XmlEvent>, XmlError> {
        match self.parser.parse_bytes(&mut self.resolver, bytes) {
            Ok(()) => Ok(std::mem::take(&mut self.resolver.events)),
            Err(SaxError::HandlerAbort) => match self.resolver.error.take() {
                Some(err) => Err(err),
                None => Err(self.syntax(SaxError::HandlerAbort)),
            },
            Err(err) => Err(self.syntax(err)),
        }
    }

    /// Checks that the document is complete.
    pub fn finish(&mut self) -> Result<(), XmlError> {
        self.parser.parse_finish().map_err(|err| self.syntax(err))
    }

    pub fn reset(&mut self) {
        self.parser.reset();
        self.resolver = Resolver::default();
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.resolver.names.len()
    }

    fn syntax(&self, error: SaxError) -> XmlError {
        XmlError::Syntax {
            error,
            location: self.parser.location(),
        }
    }
}

impl Default for EventReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses a complete document into its events.
pub fn read_events(xml: &str) -> Result<Vec<XmlEvent>, XmlError> {
    let mut reader = EventReader::new();
    let events = reader.feed(xml.as_bytes())?;
    reader.finish()?;
    Ok(events)
}
