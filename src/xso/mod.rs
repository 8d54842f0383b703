/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! XML stream objects.
//!
//! A schema class is a plain Rust struct which implements [XsoClass] and
//! describes its attributes, text and children with a [Schema]. The engine
//! decodes such structs incrementally from [XmlEvent]s and encodes them
//! back into any [EventSink].
//!
//! ```
//! use iks_xso::xml::Tag;
//! use iks_xso::xso::{self, Attr, Schema, StringCodec, Text, XsoClass};
//! use once_cell::sync::Lazy;
//!
//! #[derive(Clone, Debug, Default, PartialEq)]
//! struct Note {
//!     author: Option<String>,
//!     text: Option<String>,
//! }
//!
//! impl XsoClass for Note {
//!     fn schema() -> &'static Schema<Self> {
//!         static SCHEMA: Lazy<Schema<Note>> = Lazy::new(|| {
//!             Schema::builder(Tag::qualified("urn:example:note", "note"))
//!                 .attr(Attr::local("author", StringCodec, |n: &Note| n.author.as_ref(), |n, v| n.author = v))
//!                 .text(Text::new("text", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
//!                 .build_static()
//!         });
//!         &SCHEMA
//!     }
//! }
//!
//! let note: Note = xso::from_str("<note xmlns='urn:example:note' author='me'>hi</note>").unwrap();
//! assert_eq!(note.author.as_deref(), Some("me"));
//! assert_eq!(xso::to_string(&note).unwrap(), "<note xmlns='urn:example:note' author='me'>hi</note>");
//! ```

mod context;
mod descriptors;
mod engine;
mod error;
mod lang;
mod list;
mod parser;
mod schema;
mod types;

use std::any::Any;
use std::any::TypeId;
use std::fmt::Debug;

pub use context::ParseContext;
pub use descriptors::Attr;
pub use descriptors::Candidates;
pub use descriptors::Child;
pub use descriptors::ChildFlag;
pub use descriptors::ChildList;
pub use descriptors::ChildMap;
pub use descriptors::ChildTag;
pub use descriptors::ChildValue;
pub use descriptors::ChildValueList;
pub use descriptors::ChildValueMap;
pub use descriptors::ChildValueMultiMap;
pub use descriptors::ClassRegistry;
pub use descriptors::Text;
pub use engine::Decoded;
pub use engine::Decoder;
pub use error::CodecError;
pub use error::DecodeFailure;
pub use error::Offender;
pub use error::XsoError;
pub use lang::LanguageRange;
pub use lang::LanguageTag;
pub use lang::lookup_language;
pub use list::LanguageMap;
pub use list::XsoList;
pub use parser::XsoParser;
pub use schema::AttrField;
pub use schema::ChildField;
pub use schema::Schema;
pub use schema::SchemaBuilder;
pub use schema::TextField;
pub use schema::UnknownPolicy;
pub use types::Base64Codec;
pub use types::BoolCodec;
pub use types::Codec;
pub use types::ConnectionLocationCodec;
pub use types::DateCodec;
pub use types::DateTimeCodec;
pub use types::ElementCodec;
pub use types::EnumCodec;
pub use types::HexCodec;
pub use types::Integer;
pub use types::JidCodec;
pub use types::JsonCodec;
pub use types::KeyedText;
pub use types::LangText;
pub use types::LanguageTagCodec;
pub use types::StringCodec;
pub use types::TextChild;
pub use types::TimeCodec;

use crate::xml::Attributes;
use crate::xml::Element;
use crate::xml::EventCollector;
use crate::xml::EventSink;
use crate::xml::Tag;
use crate::xml::XmlEvent;
use crate::xml::XmlWriter;
use crate::xml::read_events;

/// A struct mapped to one XML element.
pub trait XsoClass: Clone + Debug + Default + PartialEq + Send + Sync + 'static {
    fn schema() -> &'static Schema<Self>;

    /// Checks the instance after decoding.
    ///
    /// The default validates every child descriptor. Overrides adding
    /// cross-field rules should call [Schema::validate_children] as well.
    fn validate(&self) -> Result<(), XsoError> {
        Self::schema().validate_children(self)
    }

    /// Runs once after a successful decode, never for instances built in
    /// code.
    fn after_load(&mut self) {}

    /// Error recovery hook. Returning `true` suppresses the failure and
    /// leaves the field unset.
    fn handle_error(&mut self, _failure: &DecodeFailure) -> bool {
        false
    }
}

/// Object safe view of any [XsoClass] instance.
pub trait Xso: Any + Debug + Send + Sync {
    fn xso_tag(&self) -> &Tag;

    fn xso_type_name(&self) -> &'static str;

    fn xso_lang(&self) -> Option<&LanguageTag>;

    fn encode(&self, sink: &mut dyn EventSink) -> Result<(), XsoError>;

    fn validate_xso(&self) -> Result<(), XsoError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync>;

    fn clone_box(&self) -> Box<dyn Xso>;

    fn eq_xso(&self, other: &dyn Xso) -> bool;
}

impl<T: XsoClass> Xso for T {
    fn xso_tag(&self) -> &Tag {
        T::schema().tag()
    }

    fn xso_type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn xso_lang(&self) -> Option<&LanguageTag> {
        T::schema().lang_of(self)
    }

    fn encode(&self, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        T::schema().encode(self, sink)
    }

    fn validate_xso(&self) -> Result<(), XsoError> {
        self.validate()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send + Sync> {
        self
    }

    fn clone_box(&self) -> Box<dyn Xso> {
        Box::new(self.clone())
    }

    fn eq_xso(&self, other: &dyn Xso) -> bool {
        other.as_any().downcast_ref::<T>() == Some(self)
    }
}

impl dyn Xso {
    pub fn is<T: Xso>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Xso>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Xso>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    pub fn downcast<T: Xso>(self: Box<Self>) -> Result<Box<T>, XsoError> {
        let found = self.xso_type_name();
        self.into_any()
            .downcast::<T>()
            .map_err(|_| XsoError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })
    }
}

impl Clone for Box<dyn Xso> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

impl PartialEq for Box<dyn Xso> {
    fn eq(&self, other: &Self) -> bool {
        self.eq_xso(other.as_ref())
    }
}

type StartFn = fn(&Attributes, &ParseContext) -> Result<Box<dyn Decoder>, XsoError>;

/// Runtime handle of a schema class, used by registries.
#[derive(Clone)]
pub struct XsoClassRef {
    tag: Tag,
    type_id: TypeId,
    type_name: &'static str,
    start: StartFn,
}

impl XsoClassRef {
    pub fn of<C: XsoClass>() -> Self {
        XsoClassRef {
            tag: C::schema().tag().clone(),
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            start: engine::start_object::<C>,
        }
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Starts decoding an element of this class.
    pub fn start(
        &self,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        (self.start)(attrs, ctx)
    }
}

impl Debug for XsoClassRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XsoClassRef")
            .field("tag", &self.tag)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// Values a child descriptor can hold: a concrete class or any object.
pub trait XsoItem: Clone + PartialEq + Debug + Send + Sync + 'static {
    fn as_xso(&self) -> &dyn Xso;

    fn from_xso(xso: Box<dyn Xso>) -> Result<Self, XsoError>;
}

impl<C: XsoClass> XsoItem for C {
    fn as_xso(&self) -> &dyn Xso {
        self
    }

    fn from_xso(xso: Box<dyn Xso>) -> Result<Self, XsoError> {
        xso.downcast::<C>().map(|obj| *obj)
    }
}

impl XsoItem for Box<dyn Xso> {
    fn as_xso(&self) -> &dyn Xso {
        self.as_ref()
    }

    fn from_xso(xso: Box<dyn Xso>) -> Result<Self, XsoError> {
        Ok(xso)
    }
}

/// Serializes an object as a standalone element.
pub fn to_string(xso: &dyn Xso) -> Result<String, XsoError> {
    let mut writer = XmlWriter::new();
    xso.encode(&mut writer)?;
    Ok(writer.into_string())
}

/// Decodes one element given as a complete event sequence.
pub fn from_events<C: XsoClass>(
    events: impl IntoIterator<Item = XmlEvent>,
    ctx: &ParseContext,
) -> Result<C, XsoError> {
    let mut events = events.into_iter();
    let Some(XmlEvent::Start { tag, attrs }) = events.next() else {
        return Err(crate::xml::XmlError::Unbalanced(error::description::END_WITHOUT_START).into());
    };
    if &tag != C::schema().tag() {
        return Err(XsoError::UnknownTopLevelTag { tag, attrs });
    }
    let mut decoder = engine::start_object::<C>(&attrs, ctx)?;
    for event in events {
        if let Some(Decoded::Object(obj)) = decoder.feed(event)? {
            return C::from_xso(obj);
        }
    }
    Err(crate::xml::XmlError::Unbalanced(engine::UNFINISHED).into())
}

pub fn from_str<C: XsoClass>(xml: &str) -> Result<C, XsoError> {
    from_events(read_events(xml)?, &ParseContext::default())
}

pub fn from_element<C: XsoClass>(element: &Element, ctx: &ParseContext) -> Result<C, XsoError> {
    let mut collector = EventCollector::new();
    element.write_events(&mut collector)?;
    from_events(collector.into_events(), ctx)
}

/// Converts an object into a generic element tree.
pub fn to_element(xso: &dyn Xso) -> Result<Element, XsoError> {
    let mut builder = crate::xml::ElementBuilder::new();
    xso.encode(&mut builder)?;
    builder
        .take()
        .ok_or(crate::xml::XmlError::Unbalanced(engine::UNFINISHED).into())
}

#[cfg(test)]
mod tests;
