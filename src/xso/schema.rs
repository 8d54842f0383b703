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

use indexmap::IndexMap;

use crate::xml::Attributes;
use crate::xml::Element;
use crate::xml::EventSink;
use crate::xml::Tag;

use super::Decoded;
use super::Decoder;
use super::LanguageTag;
use super::ParseContext;
use super::XsoError;
use super::error::description;

/// What to do with content no descriptor claims.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnknownPolicy {
    #[default]
    Fail,
    Drop,
}

/// A descriptor bound to one attribute.
pub trait AttrField<T>: Send + Sync {
    fn name(&self) -> &'static str;

    fn tag(&self) -> &Tag;

    fn decode(&self, obj: &mut T, value: &str, ctx: &ParseContext) -> Result<(), XsoError>;

    /// Called when the attribute is not present on the element.
    fn missing(&self, obj: &mut T, ctx: &ParseContext) -> Result<(), XsoError>;

    fn encode(&self, obj: &T) -> Result<Option<String>, XsoError>;
}

/// A descriptor bound to the character data of the element.
pub trait TextField<T>: Send + Sync {
    fn name(&self) -> &'static str;

    fn decode(&self, obj: &mut T, text: &str) -> Result<(), XsoError>;

    fn encode(&self, obj: &T) -> Result<Option<String>, XsoError>;
}

/// A descriptor bound to child elements.
pub trait ChildField<T>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tags known when the schema is built.
    fn fixed_tags(&self) -> Vec<Tag>;

    /// Tags resolved at decode time through an open registry.
    fn claims(&self, _tag: &Tag) -> bool {
        false
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError>;

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError>;

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError>;

    fn validate(&self, _obj: &T) -> Result<(), XsoError> {
        Ok(())
    }
}

/// Receives every child element nobody else claimed.
pub struct Collector<T> {
    pub(crate) get: fn(&T) -> &Vec<Element>,
    pub(crate) get_mut: fn(&mut T) -> &mut Vec<Element>,
}

/// The complete description of one element class.
pub struct Schema<T> {
    pub(crate) tag: Tag,
    pub(crate) attrs: IndexMap<Tag, Box<dyn AttrField<T>>>,
    pub(crate) text: Option<Box<dyn TextField<T>>>,
    pub(crate) children: Vec<Box<dyn ChildField<T>>>,
    child_index: HashMap<Tag, usize>,
    open_children: Vec<usize>,
    pub(crate) collector: Option<Collector<T>>,
    pub(crate) unknown_attrs: UnknownPolicy,
    pub(crate) unknown_children: UnknownPolicy,
    pub(crate) unknown_text: UnknownPolicy,
    namespaces: Vec<(Option<String>, String)>,
    lang: Option<fn(&T) -> Option<&LanguageTag>>,
}

impl<T> Schema<T> {
    pub fn builder(tag: Tag) -> SchemaBuilder<T> {
        SchemaBuilder {
            tag,
            attrs: Vec::new(),
            text: Vec::new(),
            children: Vec::new(),
            collectors: Vec::new(),
            unknown_attrs: UnknownPolicy::Fail,
            unknown_children: UnknownPolicy::Fail,
            unknown_text: UnknownPolicy::Fail,
            namespaces: Vec::new(),
            lang: None,
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn lang_of<'a>(&self, obj: &'a T) -> Option<&'a LanguageTag> {
        self.lang.and_then(|lang| lang(obj))
    }

    /// Index of the child descriptor handling `tag`. Fixed tags take
    /// precedence over open registries.
    pub(crate) fn child_for(&self, tag: &Tag) -> Option<usize> {
        if let Some(index) = self.child_index.get(tag) {
            return Some(*index);
        }
        self.open_children
            .iter()
            .copied()
            .find(|index| self.children[*index].claims(tag))
    }

    /// Runs the checks of every child descriptor.
    pub fn validate_children(&self, obj: &T) -> Result<(), XsoError> {
        for child in &self.children {
            child.validate(obj)?;
        }
        Ok(())
    }

    pub fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        let mut attrs = Attributes::with_capacity(self.attrs.len());
        for field in self.attrs.values() {
            if let Some(value) = field.encode(obj)? {
                attrs.insert(field.tag().clone(), value);
            }
        }
        for (prefix, namespace) in &self.namespaces {
            sink.start_prefix_mapping(prefix.as_deref(), namespace)?;
        }
        sink.start(&self.tag, &attrs)?;
        if let Some(text) = &self.text {
            if let Some(text) = text.encode(obj)? {
                sink.text(&text)?;
            }
        }
        for child in &self.children {
            child.encode(obj, sink)?;
        }
        if let Some(collector) = &self.collector {
            for element in (collector.get)(obj) {
                element.write_events(sink)?;
            }
        }
        sink.end()?;
        Ok(())
    }
}

pub struct SchemaBuilder<T> {
    tag: Tag,
    attrs: Vec<Box<dyn AttrField<T>>>,
    text: Vec<Box<dyn TextField<T>>>,
    children: Vec<Box<dyn ChildField<T>>>,
    collectors: Vec<Collector<T>>,
    unknown_attrs: UnknownPolicy,
    unknown_children: UnknownPolicy,
    unknown_text: UnknownPolicy,
    namespaces: Vec<(Option<String>, String)>,
    lang: Option<fn(&T) -> Option<&LanguageTag>>,
}

impl<T> SchemaBuilder<T> {
    pub fn attr(mut self, field: impl AttrField<T> + 'static) -> Self {
        self.attrs.push(Box::new(field));
        self
    }

    pub fn text(mut self, field: impl TextField<T> + 'static) -> Self {
        self.text.push(Box::new(field));
        self
    }

    pub fn child(mut self, field: impl ChildField<T> + 'static) -> Self {
        self.children.push(Box::new(field));
        self
    }

    pub fn collector(
        mut self,
        get: fn(&T) -> &Vec<Element>,
        get_mut: fn(&mut T) -> &mut Vec<Element>,
    ) -> Self {
        self.collectors.push(Collector { get, get_mut });
        self
    }

    pub fn unknown_attrs(mut self, policy: UnknownPolicy) -> Self {
        self.unknown_attrs = policy;
        self
    }

    pub fn unknown_children(mut self, policy: UnknownPolicy) -> Self {
        self.unknown_children = policy;
        self
    }

    pub fn unknown_text(mut self, policy: UnknownPolicy) -> Self {
        self.unknown_text = policy;
        self
    }

    /// Binds `prefix` (or the default namespace for `None`) on the element
    /// when it is serialized.
    pub fn declare_prefix(mut self, prefix: Option<&str>, namespace: &str) -> Self {
        self.namespaces
            .push((prefix.map(str::to_string), namespace.to_string()));
        self
    }

    /// Declares which field holds the language of an instance.
    pub fn lang(mut self, lang: fn(&T) -> Option<&LanguageTag>) -> Self {
        self.lang = Some(lang);
        self
    }

    pub fn build(self) -> Result<Schema<T>, XsoError> {
        let conflict = |reason| XsoError::Schema {
            tag: self.tag.clone(),
            reason,
        };

        let mut attrs = IndexMap::with_capacity(self.attrs.len());
        for field in self.attrs {
            let tag = field.tag().clone();
            if attrs.insert(tag, field).is_some() {
                return Err(conflict(description::DUPLICATE_ATTRIBUTE));
            }
        }

        let mut child_index = HashMap::new();
        let mut open_children = Vec::new();
        for (index, field) in self.children.iter().enumerate() {
            let tags = field.fixed_tags();
            if tags.is_empty() {
                open_children.push(index);
            }
            for tag in tags {
                if child_index.insert(tag, index).is_some() {
                    return Err(conflict(description::DUPLICATE_CHILD));
                }
            }
        }

        if self.text.len() > 1 {
            return Err(conflict(description::DUPLICATE_TEXT));
        }
        if self.collectors.len() > 1 {
            return Err(conflict(description::DUPLICATE_COLLECTOR));
        }

        Ok(Schema {
            tag: self.tag,
            attrs,
            text: self.text.into_iter().next(),
            children: self.children,
            child_index,
            open_children,
            collector: self.collectors.into_iter().next(),
            unknown_attrs: self.unknown_attrs,
            unknown_children: self.unknown_children,
            unknown_text: self.unknown_text,
            namespaces: self.namespaces,
            lang: self.lang,
        })
    }

    /// Builds a schema for a static declaration.
    ///
    /// # Panics
    ///
    /// If the declaration is ambiguous.
    pub fn build_static(self) -> Schema<T> {
        match self.build() {
            Ok(schema) => schema,
            Err(err) => panic!("{err}"),
        }
    }
}
