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

use super::Attributes;
use super::EventSink;
use super::Tag;
use super::XmlError;
use super::XmlEvent;
use super::XmlWriter;
use super::error::description;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A generic XML subtree.
///
/// Used for payloads nobody declared a class for, and for element values
/// handled by element codecs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    pub tag: Tag,
    pub attrs: Attributes,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Element {
            tag,
            attrs: Attributes::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: Tag, value: &str) -> Self {
        self.attrs.insert(name, value.to_string());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.append_text(text);
        self
    }

    pub fn attr(&self, name: &Tag) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: Tag, value: &str) {
        self.attrs.insert(name, value.to_string());
    }

    pub fn append_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    pub fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(prev)) = self.children.last_mut() {
            prev.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Concatenation of the direct character data children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    pub fn find_child(&self, tag: &Tag) -> Option<&Element> {
        self.elements().find(|element| &element.tag == tag)
    }

    pub fn write_events(&self, sink: &mut dyn EventSink) -> Result<(), XmlError> {
        sink.start(&self.tag, &self.attrs)?;
        for node in &self.children {
            match node {
                Node::Element(element) => element.write_events(sink)?,
                Node::Text(text) => sink.text(text)?,
            }
        }
        sink.end()
    }

    pub fn from_events(events: impl IntoIterator<Item = XmlEvent>) -> Result<Element, XmlError> {
        let mut builder = ElementBuilder::new();
        let mut result = None;
        for event in events {
            if result.is_some() {
                return Err(XmlError::Unbalanced(description::ELEMENT_AFTER_ROOT));
            }
            result = builder.feed(event)?;
        }
        result.ok_or(XmlError::Unbalanced(description::UNFINISHED_ELEMENT))
    }

    pub fn parse(xml: &str) -> Result<Element, XmlError> {
        Self::from_events(super::read_events(xml)?)
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut writer = XmlWriter::new();
        self.write_events(&mut writer).map_err(|_| std::fmt::Error)?;
        f.write_str(&writer.into_string())
    }
}

/// Assembles an [Element] from a stream of events.
#[derive(Debug, Default)]
pub struct ElementBuilder {
    stack: Vec<Element>,
    done: Option<Element>,
}

impl ElementBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the element once its end event has been fed.
    pub fn feed(&mut self, event: XmlEvent) -> Result<Option<Element>, XmlError> {
        match event {
            XmlEvent::Start { tag, attrs } => {
                self.stack.push(Element {
                    tag,
                    attrs,
                    children: Vec::new(),
                });
            }
            XmlEvent::Text(text) => match self.stack.last_mut() {
                Some(element) => element.append_text(&text),
                None => return Err(XmlError::Unbalanced(description::TEXT_OUTSIDE_ELEMENT)),
            },
            XmlEvent::End => {
                let element = self
                    .stack
                    .pop()
                    .ok_or(XmlError::Unbalanced(description::END_WITHOUT_START))?;
                match self.stack.last_mut() {
                    Some(parent) => parent.append_child(element),
                    None => return Ok(Some(element)),
                }
            }
        }
        Ok(None)
    }

    /// Takes the element completed through the [EventSink] interface.
    pub fn take(&mut self) -> Option<Element> {
        self.done.take()
    }
}

impl EventSink for ElementBuilder {
    fn start(&mut self, tag: &Tag, attrs: &Attributes) -> Result<(), XmlError> {
        self.feed(XmlEvent::Start {
            tag: tag.clone(),
            attrs: attrs.clone(),
        })
        .map(|_| ())
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        self.feed(XmlEvent::Text(text.to_string())).map(|_| ())
    }

    fn end(&mut self) -> Result<(), XmlError> {
        if let Some(element) = self.feed(XmlEvent::End)? {
            self.done = Some(element);
        }
        Ok(())
    }
}
