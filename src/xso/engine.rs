/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::xml::Attributes;
use crate::xml::Element;
use crate::xml::ElementBuilder;
use crate::xml::Tag;
use crate::xml::XmlEvent;
use crate::xml::is_xml_whitespace;

use super::DecodeFailure;
use super::Offender;
use super::ParseContext;
use super::UnknownPolicy;
use super::Xso;
use super::XsoClass;
use super::XsoError;

pub(crate) const UNFINISHED: &str = "element ended before it was complete";

/// Result of decoding one child element.
pub enum Decoded {
    Object(Box<dyn Xso>),
    Marker(Tag),
    Element(Element, ParseContext),
}

/// An element decode in progress.
///
/// The decoder is created from the start event of its element and is fed
/// every following event up to and including the matching end event, at
/// which point it returns the decoded value.
pub trait Decoder: Send {
    fn feed(&mut self, event: XmlEvent) -> Result<Option<Decoded>, XsoError>;
}

/// Consumes a subtree which is not interesting.
pub(crate) struct Skipper {
    depth: usize,
}

impl Skipper {
    pub(crate) fn new() -> Self {
        Skipper { depth: 1 }
    }

    fn with_depth(depth: usize) -> Self {
        Skipper { depth }
    }

    /// Returns true when the subtree is finished.
    fn skip(&mut self, event: &XmlEvent) -> bool {
        match event {
            XmlEvent::Start { .. } => self.depth += 1,
            XmlEvent::End => self.depth -= 1,
            XmlEvent::Text(_) => (),
        }
        self.depth == 0
    }
}

/// Decodes an empty marker element into its tag, ignoring any content.
pub(crate) struct MarkerDecoder {
    tag: Tag,
    skipper: Skipper,
}

impl MarkerDecoder {
    pub(crate) fn start(tag: &Tag) -> Box<dyn Decoder> {
        Box::new(MarkerDecoder {
            tag: tag.clone(),
            skipper: Skipper::new(),
        })
    }
}

impl Decoder for MarkerDecoder {
    fn feed(&mut self, event: XmlEvent) -> Result<Option<Decoded>, XsoError> {
        if self.skipper.skip(&event) {
            return Ok(Some(Decoded::Marker(self.tag.clone())));
        }
        Ok(None)
    }
}

/// Collects a subtree as a generic element.
pub(crate) struct ElementDecoder {
    builder: ElementBuilder,
    ctx: ParseContext,
}

impl ElementDecoder {
    pub(crate) fn start(
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        let mut builder = ElementBuilder::new();
        builder.feed(XmlEvent::Start {
            tag: tag.clone(),
            attrs: attrs.clone(),
        })?;
        Ok(Box::new(ElementDecoder {
            builder,
            ctx: ctx.enter(attrs),
        }))
    }
}

impl Decoder for ElementDecoder {
    fn feed(&mut self, event: XmlEvent) -> Result<Option<Decoded>, XsoError> {
        Ok(self
            .builder
            .feed(event)?
            .map(|element| Decoded::Element(element, self.ctx.clone())))
    }
}

enum Nested {
    Idle,
    Child {
        field: usize,
        tag: Tag,
        decoder: Box<dyn Decoder>,
        depth: usize,
    },
    Collect(ElementBuilder),
    Skip(Skipper),
}

/// Drives the schema of `T` over the events of one element.
struct ObjectDecoder<T: XsoClass> {
    obj: T,
    ctx: ParseContext,
    text: String,
    nested: Nested,
}

pub(crate) fn start_object<T: XsoClass>(
    attrs: &Attributes,
    ctx: &ParseContext,
) -> Result<Box<dyn Decoder>, XsoError> {
    let schema = T::schema();
    let ctx = ctx.enter(attrs);
    let mut obj = T::default();

    let mut seen = vec![false; schema.attrs.len()];
    for (tag, value) in attrs {
        match schema.attrs.get_full(tag) {
            Some((index, _, field)) => {
                seen[index] = true;
                if let Err(error) = field.decode(&mut obj, value, &ctx) {
                    recover(
                        &mut obj,
                        Some(field.name()),
                        Offender::Attribute {
                            tag: tag.clone(),
                            value: value.clone(),
                        },
                        error,
                    )?;
                }
            }
            None => {
                if schema.unknown_attrs == UnknownPolicy::Fail {
                    recover(
                        &mut obj,
                        None,
                        Offender::Attribute {
                            tag: tag.clone(),
                            value: value.clone(),
                        },
                        XsoError::UnknownAttribute(tag.clone()),
                    )?;
                }
            }
        }
    }

    for (field, _) in schema.attrs.values().zip(seen).filter(|(_, seen)| !seen) {
        if let Err(error) = field.missing(&mut obj, &ctx) {
            recover(
                &mut obj,
                Some(field.name()),
                Offender::Attribute {
                    tag: field.tag().clone(),
                    value: String::new(),
                },
                error,
            )?;
        }
    }

    Ok(Box::new(ObjectDecoder {
        obj,
        ctx,
        text: String::new(),
        nested: Nested::Idle,
    }))
}

fn recover<T: XsoClass>(
    obj: &mut T,
    field: Option<&'static str>,
    offender: Offender,
    error: XsoError,
) -> Result<(), XsoError> {
    let failure = DecodeFailure {
        field,
        offender,
        error,
    };
    if obj.handle_error(&failure) {
        Ok(())
    } else {
        Err(failure.error)
    }
}

impl<T: XsoClass> ObjectDecoder<T> {
    fn start_child(&mut self, tag: Tag, attrs: Attributes) -> Result<(), XsoError> {
        let schema = T::schema();
        if let Some(field) = schema.child_for(&tag) {
            match schema.children[field].start(&tag, &attrs, &self.ctx) {
                Ok(decoder) => {
                    self.nested = Nested::Child {
                        field,
                        tag,
                        decoder,
                        depth: 1,
                    };
                }
                Err(error) => {
                    self.nested = Nested::Skip(Skipper::new());
                    let name = schema.children[field].name();
                    recover(&mut self.obj, Some(name), Offender::Child(tag), error)?;
                }
            }
        } else if schema.collector.is_some() {
            let mut builder = ElementBuilder::new();
            builder.feed(XmlEvent::Start { tag, attrs })?;
            self.nested = Nested::Collect(builder);
        } else {
            self.nested = Nested::Skip(Skipper::new());
            if schema.unknown_children == UnknownPolicy::Fail {
                let error = XsoError::UnknownChild(tag.clone());
                recover(&mut self.obj, None, Offender::Child(tag), error)?;
            }
        }
        Ok(())
    }

    fn feed_child(
        &mut self,
        field: usize,
        tag: Tag,
        mut decoder: Box<dyn Decoder>,
        mut depth: usize,
        event: XmlEvent,
    ) -> Result<(), XsoError> {
        match event {
            XmlEvent::Start { .. } => depth += 1,
            XmlEvent::End => depth -= 1,
            XmlEvent::Text(_) => (),
        }
        let child = &T::schema().children[field];
        match decoder.feed(event) {
            Ok(Some(decoded)) => {
                if let Err(error) = child.store(&mut self.obj, decoded) {
                    recover(&mut self.obj, Some(child.name()), Offender::Child(tag), error)?;
                }
            }
            Ok(None) => {
                self.nested = Nested::Child {
                    field,
                    tag,
                    decoder,
                    depth,
                };
            }
            Err(error) => {
                if depth > 0 {
                    self.nested = Nested::Skip(Skipper::with_depth(depth));
                }
                recover(&mut self.obj, Some(child.name()), Offender::Child(tag), error)?;
            }
        }
        Ok(())
    }

    fn feed_own(&mut self, event: XmlEvent) -> Result<Option<Decoded>, XsoError> {
        let schema = T::schema();
        match event {
            XmlEvent::Start { tag, attrs } => self.start_child(tag, attrs)?,
            XmlEvent::Text(text) => {
                if schema.text.is_some() {
                    self.text.push_str(&text);
                } else if !is_xml_whitespace(&text) && schema.unknown_text == UnknownPolicy::Fail {
                    recover(&mut self.obj, None, Offender::Text(text), XsoError::UnexpectedText)?;
                }
            }
            XmlEvent::End => return self.finish().map(Some),
        }
        Ok(None)
    }

    fn finish(&mut self) -> Result<Decoded, XsoError> {
        let schema = T::schema();
        let mut obj = std::mem::take(&mut self.obj);
        if let Some(field) = &schema.text {
            if let Err(error) = field.decode(&mut obj, &self.text) {
                let offender = Offender::Text(std::mem::take(&mut self.text));
                recover(&mut obj, Some(field.name()), offender, error)?;
            }
        }
        obj.validate()?;
        obj.after_load();
        Ok(Decoded::Object(Box::new(obj)))
    }
}

impl<T: XsoClass> Decoder for ObjectDecoder<T> {
    fn feed(&mut self, event: XmlEvent) -> Result<Option<Decoded>, XsoError> {
        match std::mem::replace(&mut self.nested, Nested::Idle) {
            Nested::Idle => return self.feed_own(event),
            Nested::Child {
                field,
                tag,
                decoder,
                depth,
            } => self.feed_child(field, tag, decoder, depth, event)?,
            Nested::Collect(mut builder) => match builder.feed(event)? {
                Some(element) => {
                    if let Some(collector) = &T::schema().collector {
                        (collector.get_mut)(&mut self.obj).push(element);
                    }
                }
                None => self.nested = Nested::Collect(builder),
            },
            Nested::Skip(mut skipper) => {
                if !skipper.skip(&event) {
                    self.nested = Nested::Skip(skipper);
                }
            }
        }
        Ok(None)
    }
}
