/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::entities::escape_into;

use super::Attributes;
use super::EventSink;
use super::Tag;
use super::XML_NS;
use super::XmlError;
use super::error::description;

struct Frame {
    name: String,
    default: Option<String>,
    prefixes: Vec<(String, String)>,
}

/// Serializes events into XML text.
///
/// Namespace declarations are emitted only where the namespace in scope
/// changes. A writer created with [XmlWriter::in_stream] starts inside an
/// already open stream element, so stanzas are written without repeating
/// the stream's declarations.
#[derive(Default)]
pub struct XmlWriter {
    out: String,
    stack: Vec<Frame>,
    pending: Vec<(Option<String>, String)>,
    open: bool,
    base_default: Option<String>,
    base_prefixes: Vec<(String, String)>,
    generated: usize,
}

impl XmlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn in_stream(default_namespace: &str) -> Self {
        XmlWriter {
            base_default: Some(default_namespace.to_string()),
            ..Self::default()
        }
    }

    /// Output written so far, closing a start tag which is still open.
    pub fn take_output(&mut self) -> String {
        self.close_start_tag();
        std::mem::take(&mut self.out)
    }

    pub fn into_string(mut self) -> String {
        self.take_output()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn close_start_tag(&mut self) {
        if self.open {
            self.out.push('>');
            self.open = false;
        }
    }

    fn current_default(&self) -> Option<&str> {
        match self.stack.last() {
            Some(frame) => frame.default.as_deref(),
            None => self.base_default.as_deref(),
        }
    }

    fn lookup_prefix<'a>(&'a self, extra: &'a [(String, String)], namespace: &str) -> Option<&'a str> {
        extra
            .iter()
            .chain(self.stack.iter().rev().flat_map(|frame| frame.prefixes.iter()))
            .chain(self.base_prefixes.iter())
            .find(|(_, ns)| ns == namespace)
            .map(|(prefix, _)| prefix.as_str())
    }

    fn push_attribute(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("='");
        escape_into(&mut self.out, value);
        self.out.push('\'');
    }
}

impl EventSink for XmlWriter {
    fn start_prefix_mapping(
        &mut self,
        prefix: Option<&str>,
        namespace: &str,
    ) -> Result<(), XmlError> {
        self.pending
            .push((prefix.map(str::to_string), namespace.to_string()));
        Ok(())
    }

    fn start(&mut self, tag: &Tag, attrs: &Attributes) -> Result<(), XmlError> {
        self.close_start_tag();

        let mut default = self.current_default().map(str::to_string);
        let mut declare_default = false;
        let mut prefixes: Vec<(String, String)> = Vec::new();
        for (prefix, namespace) in std::mem::take(&mut self.pending) {
            match prefix {
                Some(prefix) => prefixes.push((prefix, namespace)),
                None => {
                    declare_default = default.as_deref() != Some(namespace.as_str());
                    default = Some(namespace);
                }
            }
        }

        let name = match tag.namespace() {
            namespace if namespace == default.as_deref() => tag.name().to_string(),
            Some(namespace) => match self.lookup_prefix(&prefixes, namespace) {
                Some(prefix) => format!("{}:{}", prefix, tag.name()),
                None => {
                    default = Some(namespace.to_string());
                    declare_default = true;
                    tag.name().to_string()
                }
            },
            None => {
                default = None;
                declare_default = true;
                tag.name().to_string()
            }
        };

        let mut attr_names = Vec::with_capacity(attrs.len());
        for attr in attrs.keys() {
            let attr_name = match attr.namespace() {
                None => attr.name().to_string(),
                Some(XML_NS) => format!("xml:{}", attr.name()),
                Some(namespace) => match self.lookup_prefix(&prefixes, namespace) {
                    Some(prefix) => format!("{}:{}", prefix, attr.name()),
                    None => {
                        let prefix = format!("ns{}", self.generated);
                        self.generated += 1;
                        let attr_name = format!("{}:{}", prefix, attr.name());
                        prefixes.push((prefix, namespace.to_string()));
                        attr_name
                    }
                },
            };
            attr_names.push(attr_name);
        }

        self.out.push('<');
        self.out.push_str(&name);
        if declare_default {
            let namespace = default.clone().unwrap_or_default();
            self.push_attribute("xmlns", &namespace);
        }
        for (prefix, namespace) in &prefixes {
            let decl = format!("xmlns:{prefix}");
            let namespace = namespace.clone();
            self.push_attribute(&decl, &namespace);
        }
        for (attr_name, value) in attr_names.iter().zip(attrs.values()) {
            self.push_attribute(attr_name, value);
        }
        self.open = true;
        self.stack.push(Frame {
            name,
            default,
            prefixes,
        });
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), XmlError> {
        if self.stack.is_empty() {
            return Err(XmlError::Unbalanced(description::TEXT_OUTSIDE_ELEMENT));
        }
        if text.is_empty() {
            return Ok(());
        }
        self.close_start_tag();
        escape_into(&mut self.out, text);
        Ok(())
    }

    fn end(&mut self) -> Result<(), XmlError> {
        let frame = self
            .stack
            .pop()
            .ok_or(XmlError::Unbalanced(description::END_WITHOUT_START))?;
        if self.open {
            self.out.push_str("/>");
            self.open = false;
        } else {
            self.out.push_str("</");
            self.out.push_str(&frame.name);
            self.out.push('>');
        }
        Ok(())
    }
}
