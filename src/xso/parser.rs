/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use indexmap::IndexMap;

use crate::xml::Tag;
use crate::xml::XmlError;
use crate::xml::XmlEvent;

use super::Decoded;
use super::Decoder;
use super::ParseContext;
use super::Xso;
use super::XsoClass;
use super::XsoClassRef;
use super::XsoError;
use super::error::description;

type Callback = Box<dyn FnMut(Box<dyn Xso>) + Send>;

enum State {
    Idle,
    Decoding {
        tag: Tag,
        decoder: Box<dyn Decoder>,
        depth: usize,
    },
    Skipping(usize),
}

/// Decodes a sequence of top level elements.
///
/// Each registered class comes with a callback which receives the decoded
/// instances. A failing element is reported once and the rest of its
/// subtree is skipped, so the parser stays usable for the next element.
pub struct XsoParser {
    classes: IndexMap<Tag, (XsoClassRef, Callback)>,
    ctx: ParseContext,
    state: State,
}

impl XsoParser {
    pub fn new() -> Self {
        Self::with_context(ParseContext::default())
    }

    /// A parser whose elements inherit from `ctx`, like the language of an
    /// enclosing stream.
    pub fn with_context(ctx: ParseContext) -> Self {
        XsoParser {
            classes: IndexMap::new(),
            ctx,
            state: State::Idle,
        }
    }

    pub fn set_context(&mut self, ctx: ParseContext) {
        self.ctx = ctx;
    }

    pub fn add_class<C: XsoClass>(
        &mut self,
        mut callback: impl FnMut(C) + Send + 'static,
    ) -> Result<(), XsoError> {
        self.add_class_ref(XsoClassRef::of::<C>(), move |xso| {
            if let Ok(obj) = xso.downcast::<C>() {
                callback(*obj);
            }
        })
    }

    pub fn add_class_ref(
        &mut self,
        class: XsoClassRef,
        callback: impl FnMut(Box<dyn Xso>) + Send + 'static,
    ) -> Result<(), XsoError> {
        if self.classes.contains_key(class.tag()) {
            return Err(XsoError::AmbiguousRegistration(class.tag().clone()));
        }
        self.classes
            .insert(class.tag().clone(), (class, Box::new(callback)));
        Ok(())
    }

    pub fn remove_class(&mut self, tag: &Tag) -> bool {
        self.classes.shift_remove(tag).is_some()
    }

    /// True between top level elements.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, State::Idle)
    }

    pub fn feed(&mut self, event: XmlEvent) -> Result<(), XsoError> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => match event {
                XmlEvent::Start { tag, attrs } => {
                    let Some((class, _)) = self.classes.get(&tag) else {
                        self.state = State::Skipping(1);
                        return Err(XsoError::UnknownTopLevelTag { tag, attrs });
                    };
                    match class.start(&attrs, &self.ctx) {
                        Ok(decoder) => {
                            self.state = State::Decoding {
                                tag,
                                decoder,
                                depth: 1,
                            };
                        }
                        Err(err) => {
                            self.state = State::Skipping(1);
                            return Err(err);
                        }
                    }
                }
                XmlEvent::Text(_) => (),
                XmlEvent::End => {
                    return Err(XmlError::Unbalanced(description::END_WITHOUT_START).into());
                }
            },
            State::Decoding {
                tag,
                mut decoder,
                mut depth,
            } => {
                match event {
                    XmlEvent::Start { .. } => depth += 1,
                    XmlEvent::End => depth -= 1,
                    XmlEvent::Text(_) => (),
                }
                match decoder.feed(event) {
                    Ok(Some(Decoded::Object(obj))) => {
                        if let Some((_, callback)) = self.classes.get_mut(&tag) {
                            callback(obj);
                        }
                    }
                    Ok(Some(_)) => (),
                    Ok(None) => {
                        self.state = State::Decoding {
                            tag,
                            decoder,
                            depth,
                        };
                    }
                    Err(err) => {
                        if depth > 0 {
                            self.state = State::Skipping(depth);
                        }
                        return Err(err);
                    }
                }
            }
            State::Skipping(mut depth) => {
                match event {
                    XmlEvent::Start { .. } => depth += 1,
                    XmlEvent::End => depth -= 1,
                    XmlEvent::Text(_) => (),
                }
                if depth > 0 {
                    self.state = State::Skipping(depth);
                }
            }
        }
        Ok(())
    }
}

impl Default for XsoParser {
    fn default() -> Self {
        Self::new()
    }
}
