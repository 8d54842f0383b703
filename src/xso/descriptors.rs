/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::hash::Hash;

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::xml::Attributes;
use crate::xml::Element;
use crate::xml::EventSink;
use crate::xml::Tag;

use super::AttrField;
use super::ChildField;
use super::Codec;
use super::Decoded;
use super::Decoder;
use super::ElementCodec;
use super::LanguageTag;
use super::LanguageTagCodec;
use super::ParseContext;
use super::TextField;
use super::XsoClass;
use super::XsoClassRef;
use super::XsoError;
use super::XsoItem;
use super::XsoList;
use super::engine::ElementDecoder;
use super::engine::MarkerDecoder;

pub struct Attr<T, C: Codec> {
    name: &'static str,
    tag: Tag,
    codec: C,
    get: fn(&T) -> Option<&C::Value>,
    set: fn(&mut T, Option<C::Value>),
    required: bool,
    default: Option<C::Value>,
    missing: Option<fn(&ParseContext) -> Option<C::Value>>,
    erroneous_as_absent: bool,
}

impl<T, C: Codec> Attr<T, C> {
    pub fn new(
        name: &'static str,
        tag: Tag,
        codec: C,
        get: fn(&T) -> Option<&C::Value>,
        set: fn(&mut T, Option<C::Value>),
    ) -> Self {
        Attr {
            name,
            tag,
            codec,
            get,
            set,
            required: false,
            default: None,
            missing: None,
            erroneous_as_absent: false,
        }
    }

    /// An attribute in no namespace, named like the field.
    pub fn local(
        name: &'static str,
        codec: C,
        get: fn(&T) -> Option<&C::Value>,
        set: fn(&mut T, Option<C::Value>),
    ) -> Self {
        Self::new(name, Tag::local(name), codec, get, set)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Value stored when the attribute is absent. It is never written back.
    pub fn default_value(mut self, value: C::Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Synthesizes a value from the context when the attribute is absent.
    pub fn when_missing(mut self, missing: fn(&ParseContext) -> Option<C::Value>) -> Self {
        self.missing = Some(missing);
        self
    }

    /// Treats values the codec rejects as if the attribute was absent.
    pub fn erroneous_as_absent(mut self) -> Self {
        self.erroneous_as_absent = true;
        self
    }
}

impl<T> Attr<T, LanguageTagCodec> {
    /// `xml:lang`, inherited from the enclosing elements when absent. An
    /// empty or malformed value falls back to the context language.
    pub fn xml_lang(
        get: fn(&T) -> Option<&LanguageTag>,
        set: fn(&mut T, Option<LanguageTag>),
    ) -> Self {
        Self::new("lang", Tag::xml_lang(), LanguageTagCodec, get, set)
            .when_missing(|ctx| ctx.lang.clone())
            .erroneous_as_absent()
    }
}

impl<T: 'static, C: Codec> AttrField<T> for Attr<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn tag(&self) -> &Tag {
        &self.tag
    }

    fn decode(&self, obj: &mut T, value: &str, ctx: &ParseContext) -> Result<(), XsoError> {
        match self.codec.parse(value) {
            Ok(value) => {
                (self.set)(obj, Some(value));
                Ok(())
            }
            Err(_) if self.erroneous_as_absent => self.missing(obj, ctx),
            Err(source) => Err(XsoError::Codec {
                field: self.name,
                source,
            }),
        }
    }

    fn missing(&self, obj: &mut T, ctx: &ParseContext) -> Result<(), XsoError> {
        if let Some(value) = self.missing.and_then(|missing| missing(ctx)) {
            (self.set)(obj, Some(value));
            return Ok(());
        }
        if self.required {
            return Err(XsoError::MissingAttribute(self.tag.clone()));
        }
        (self.set)(obj, self.default.clone());
        Ok(())
    }

    fn encode(&self, obj: &T) -> Result<Option<String>, XsoError> {
        match (self.get)(obj) {
            None if self.required => Err(XsoError::MissingAttribute(self.tag.clone())),
            None => Ok(None),
            Some(value) if self.default.as_ref() == Some(value) => Ok(None),
            Some(value) => Ok(Some(self.codec.format(value))),
        }
    }
}

/// Character data of the element, parsed once the element is complete.
pub struct Text<T, C: Codec> {
    name: &'static str,
    codec: C,
    get: fn(&T) -> Option<&C::Value>,
    set: fn(&mut T, Option<C::Value>),
    erroneous_as_absent: bool,
}

impl<T, C: Codec> Text<T, C> {
    pub fn new(
        name: &'static str,
        codec: C,
        get: fn(&T) -> Option<&C::Value>,
        set: fn(&mut T, Option<C::Value>),
    ) -> Self {
        Text {
            name,
            codec,
            get,
            set,
            erroneous_as_absent: false,
        }
    }

    pub fn erroneous_as_absent(mut self) -> Self {
        self.erroneous_as_absent = true;
        self
    }
}

impl<T: 'static, C: Codec> TextField<T> for Text<T, C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn decode(&self, obj: &mut T, text: &str) -> Result<(), XsoError> {
        if text.is_empty() {
            return Ok(());
        }
        match self.codec.parse(text) {
            Ok(value) => (self.set)(obj, Some(value)),
            Err(_) if self.erroneous_as_absent => (),
            Err(source) => {
                return Err(XsoError::Codec {
                    field: self.name,
                    source,
                });
            }
        }
        Ok(())
    }

    fn encode(&self, obj: &T) -> Result<Option<String>, XsoError> {
        Ok((self.get)(obj).map(|value| self.codec.format(value)))
    }
}

/// An open set of classes which can be extended at runtime.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: RwLock<IndexMap<Tag, XsoClassRef>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<C: XsoClass>(&self) -> Result<(), XsoError> {
        self.register_class(XsoClassRef::of::<C>())
    }

    pub fn register_class(&self, class: XsoClassRef) -> Result<(), XsoError> {
        let mut classes = self.classes.write();
        if classes.contains_key(class.tag()) {
            return Err(XsoError::AmbiguousRegistration(class.tag().clone()));
        }
        classes.insert(class.tag().clone(), class);
        Ok(())
    }

    pub fn unregister(&self, tag: &Tag) -> Option<XsoClassRef> {
        self.classes.write().shift_remove(tag)
    }

    pub fn get(&self, tag: &Tag) -> Option<XsoClassRef> {
        self.classes.read().get(tag).cloned()
    }

    pub fn contains(&self, tag: &Tag) -> bool {
        self.classes.read().contains_key(tag)
    }

    pub fn tags(&self) -> Vec<Tag> {
        self.classes.read().keys().cloned().collect()
    }
}

/// Classes a child descriptor accepts.
pub enum Candidates {
    Fixed(Vec<XsoClassRef>),
    Open(&'static ClassRegistry),
}

impl Candidates {
    pub fn of<C: XsoClass>() -> Self {
        Candidates::Fixed(vec![XsoClassRef::of::<C>()])
    }

    pub fn any_of(classes: Vec<XsoClassRef>) -> Self {
        Candidates::Fixed(classes)
    }

    pub fn open(registry: &'static ClassRegistry) -> Self {
        Candidates::Open(registry)
    }

    fn lookup(&self, tag: &Tag) -> Option<XsoClassRef> {
        match self {
            Candidates::Fixed(classes) => classes.iter().find(|class| class.tag() == tag).cloned(),
            Candidates::Open(registry) => registry.get(tag),
        }
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        match self {
            Candidates::Fixed(classes) => classes.iter().map(|class| class.tag().clone()).collect(),
            Candidates::Open(_) => Vec::new(),
        }
    }

    fn claims(&self, tag: &Tag) -> bool {
        match self {
            Candidates::Fixed(_) => false,
            Candidates::Open(registry) => registry.contains(tag),
        }
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        self.lookup(tag)
            .ok_or_else(|| XsoError::UnknownChild(tag.clone()))?
            .start(attrs, ctx)
    }

    /// The stored object must be exactly the class registered for its tag.
    fn check_strict<X: XsoItem>(&self, item: &X) -> Result<(), XsoError> {
        let xso = item.as_xso();
        match self.lookup(xso.xso_tag()) {
            Some(class) if class.type_id() == xso.as_any().type_id() => Ok(()),
            Some(class) => Err(XsoError::TypeMismatch {
                expected: class.type_name(),
                found: xso.xso_type_name(),
            }),
            None => Err(XsoError::UnknownChild(xso.xso_tag().clone())),
        }
    }
}

fn expect_object(decoded: Decoded) -> Result<Box<dyn super::Xso>, XsoError> {
    match decoded {
        Decoded::Object(obj) => Ok(obj),
        Decoded::Marker(_) | Decoded::Element(..) => Err(XsoError::TypeMismatch {
            expected: "object",
            found: "element",
        }),
    }
}

fn expect_element(decoded: Decoded) -> Result<(Element, ParseContext), XsoError> {
    match decoded {
        Decoded::Element(element, ctx) => Ok((element, ctx)),
        Decoded::Object(obj) => Err(XsoError::TypeMismatch {
            expected: "element",
            found: obj.xso_type_name(),
        }),
        Decoded::Marker(_) => Err(XsoError::TypeMismatch {
            expected: "element",
            found: "marker",
        }),
    }
}

fn expect_marker(decoded: Decoded) -> Result<Tag, XsoError> {
    match decoded {
        Decoded::Marker(tag) => Ok(tag),
        Decoded::Object(obj) => Err(XsoError::TypeMismatch {
            expected: "marker",
            found: obj.xso_type_name(),
        }),
        Decoded::Element(..) => Err(XsoError::TypeMismatch {
            expected: "marker",
            found: "element",
        }),
    }
}

fn write_marker(sink: &mut dyn EventSink, tag: &Tag) -> Result<(), XsoError> {
    sink.start(tag, &Attributes::new())?;
    sink.end()?;
    Ok(())
}

/// At most one child object. When several match, the last one is kept.
pub struct Child<T, X> {
    name: &'static str,
    candidates: Candidates,
    get: fn(&T) -> &Option<X>,
    get_mut: fn(&mut T) -> &mut Option<X>,
    required: bool,
    strict: bool,
}

impl<T, X: XsoItem> Child<T, X> {
    pub fn new(
        name: &'static str,
        candidates: Candidates,
        get: fn(&T) -> &Option<X>,
        get_mut: fn(&mut T) -> &mut Option<X>,
    ) -> Self {
        Child {
            name,
            candidates,
            get,
            get_mut,
            required: false,
            strict: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Rejects stored objects whose type is not the one registered for
    /// their tag.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }
}

impl<T: 'static, X: XsoItem> ChildField<T> for Child<T, X> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.candidates.fixed_tags()
    }

    fn claims(&self, tag: &Tag) -> bool {
        self.candidates.claims(tag)
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        self.candidates.start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let item = X::from_xso(expect_object(value)?)?;
        *(self.get_mut)(obj) = Some(item);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        if let Some(item) = (self.get)(obj) {
            if self.strict {
                self.candidates.check_strict(item)?;
            }
            item.as_xso().encode(sink)?;
        }
        Ok(())
    }

    fn validate(&self, obj: &T) -> Result<(), XsoError> {
        match (self.get)(obj) {
            None if self.required => Err(XsoError::MissingChild(self.name)),
            None => Ok(()),
            Some(item) => {
                if self.strict {
                    self.candidates.check_strict(item)?;
                }
                item.as_xso().validate_xso()
            }
        }
    }
}

/// All matching child objects in document order.
pub struct ChildList<T, X> {
    name: &'static str,
    candidates: Candidates,
    get: fn(&T) -> &XsoList<X>,
    get_mut: fn(&mut T) -> &mut XsoList<X>,
}

impl<T, X: XsoItem> ChildList<T, X> {
    pub fn new(
        name: &'static str,
        candidates: Candidates,
        get: fn(&T) -> &XsoList<X>,
        get_mut: fn(&mut T) -> &mut XsoList<X>,
    ) -> Self {
        ChildList {
            name,
            candidates,
            get,
            get_mut,
        }
    }
}

impl<T: 'static, X: XsoItem> ChildField<T> for ChildList<T, X> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.candidates.fixed_tags()
    }

    fn claims(&self, tag: &Tag) -> bool {
        self.candidates.claims(tag)
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        self.candidates.start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let item = X::from_xso(expect_object(value)?)?;
        (self.get_mut)(obj).push(item);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        for item in (self.get)(obj).iter() {
            item.as_xso().encode(sink)?;
        }
        Ok(())
    }

    fn validate(&self, obj: &T) -> Result<(), XsoError> {
        for item in (self.get)(obj).iter() {
            item.as_xso().validate_xso()?;
        }
        Ok(())
    }
}

/// Child objects grouped into ordered buckets by a key function.
pub struct ChildMap<T, K, X> {
    name: &'static str,
    candidates: Candidates,
    key: fn(&X) -> K,
    get: fn(&T) -> &IndexMap<K, XsoList<X>>,
    get_mut: fn(&mut T) -> &mut IndexMap<K, XsoList<X>>,
}

impl<T, K, X: XsoItem> ChildMap<T, K, X> {
    pub fn new(
        name: &'static str,
        candidates: Candidates,
        key: fn(&X) -> K,
        get: fn(&T) -> &IndexMap<K, XsoList<X>>,
        get_mut: fn(&mut T) -> &mut IndexMap<K, XsoList<X>>,
    ) -> Self {
        ChildMap {
            name,
            candidates,
            key,
            get,
            get_mut,
        }
    }
}

impl<T, X: XsoItem> ChildMap<T, Tag, X> {
    /// Buckets keyed by the tag of each child.
    pub fn by_tag(
        name: &'static str,
        candidates: Candidates,
        get: fn(&T) -> &IndexMap<Tag, XsoList<X>>,
        get_mut: fn(&mut T) -> &mut IndexMap<Tag, XsoList<X>>,
    ) -> Self {
        Self::new(
            name,
            candidates,
            |item: &X| item.as_xso().xso_tag().clone(),
            get,
            get_mut,
        )
    }
}

impl<T, K, X> ChildField<T> for ChildMap<T, K, X>
where
    T: 'static,
    K: Hash + Eq + Send + Sync + 'static,
    X: XsoItem,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.candidates.fixed_tags()
    }

    fn claims(&self, tag: &Tag) -> bool {
        self.candidates.claims(tag)
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        self.candidates.start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let item = X::from_xso(expect_object(value)?)?;
        let key = (self.key)(&item);
        (self.get_mut)(obj).entry(key).or_default().push(item);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        for bucket in (self.get)(obj).values() {
            for item in bucket.iter() {
                item.as_xso().encode(sink)?;
            }
        }
        Ok(())
    }

    fn validate(&self, obj: &T) -> Result<(), XsoError> {
        for bucket in (self.get)(obj).values() {
            for item in bucket.iter() {
                item.as_xso().validate_xso()?;
            }
        }
        Ok(())
    }
}

/// One of several empty marker elements, exposed as a value.
pub struct ChildTag<T, E: 'static> {
    name: &'static str,
    values: Vec<(Tag, E)>,
    get: fn(&T) -> &Option<E>,
    get_mut: fn(&mut T) -> &mut Option<E>,
    allow_none: bool,
}

impl<T, E: Clone + PartialEq + Send + Sync + 'static> ChildTag<T, E> {
    pub fn new(
        name: &'static str,
        values: Vec<(Tag, E)>,
        get: fn(&T) -> &Option<E>,
        get_mut: fn(&mut T) -> &mut Option<E>,
    ) -> Self {
        ChildTag {
            name,
            values,
            get,
            get_mut,
            allow_none: false,
        }
    }

    /// No marker at all is a valid value.
    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }
}

impl<T: 'static, E: Clone + PartialEq + Send + Sync + 'static> ChildField<T> for ChildTag<T, E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.values.iter().map(|(tag, _)| tag.clone()).collect()
    }

    fn start(
        &self,
        tag: &Tag,
        _attrs: &Attributes,
        _ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        Ok(MarkerDecoder::start(tag))
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let tag = expect_marker(value)?;
        let value = self
            .values
            .iter()
            .find(|(candidate, _)| *candidate == tag)
            .map(|(_, value)| value.clone())
            .ok_or(XsoError::UnknownChild(tag))?;
        *(self.get_mut)(obj) = Some(value);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        let Some(value) = (self.get)(obj) else {
            return Ok(());
        };
        let (tag, _) = self
            .values
            .iter()
            .find(|(_, candidate)| candidate == value)
            .ok_or(XsoError::UnencodableValue(self.name))?;
        write_marker(sink, tag)
    }

    fn validate(&self, obj: &T) -> Result<(), XsoError> {
        if (self.get)(obj).is_none() && !self.allow_none {
            return Err(XsoError::MissingChild(self.name));
        }
        Ok(())
    }
}

/// Presence of one empty marker element.
pub struct ChildFlag<T> {
    name: &'static str,
    tag: Tag,
    get: fn(&T) -> bool,
    set: fn(&mut T, bool),
}

impl<T> ChildFlag<T> {
    pub fn new(name: &'static str, tag: Tag, get: fn(&T) -> bool, set: fn(&mut T, bool)) -> Self {
        ChildFlag { name, tag, get, set }
    }
}

impl<T: 'static> ChildField<T> for ChildFlag<T> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        vec![self.tag.clone()]
    }

    fn start(
        &self,
        tag: &Tag,
        _attrs: &Attributes,
        _ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        Ok(MarkerDecoder::start(tag))
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        expect_marker(value)?;
        (self.set)(obj, true);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        if (self.get)(obj) {
            write_marker(sink, &self.tag)?;
        }
        Ok(())
    }
}

/// A single child exposed as a plain value through an element codec.
pub struct ChildValue<T, E: ElementCodec> {
    name: &'static str,
    codec: E,
    get: fn(&T) -> &Option<E::Value>,
    get_mut: fn(&mut T) -> &mut Option<E::Value>,
    required: bool,
}

impl<T, E: ElementCodec> ChildValue<T, E> {
    pub fn new(
        name: &'static str,
        codec: E,
        get: fn(&T) -> &Option<E::Value>,
        get_mut: fn(&mut T) -> &mut Option<E::Value>,
    ) -> Self {
        ChildValue {
            name,
            codec,
            get,
            get_mut,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

impl<T: 'static, E: ElementCodec> ChildField<T> for ChildValue<T, E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.codec.tags()
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        ElementDecoder::start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let (element, ctx) = expect_element(value)?;
        *(self.get_mut)(obj) = Some(self.codec.unpack(&element, &ctx)?);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        if let Some(value) = (self.get)(obj) {
            self.codec.pack(value).write_events(sink)?;
        }
        Ok(())
    }

    fn validate(&self, obj: &T) -> Result<(), XsoError> {
        if self.required && (self.get)(obj).is_none() {
            return Err(XsoError::MissingChild(self.name));
        }
        Ok(())
    }
}

pub struct ChildValueList<T, E: ElementCodec> {
    name: &'static str,
    codec: E,
    get: fn(&T) -> &Vec<E::Value>,
    get_mut: fn(&mut T) -> &mut Vec<E::Value>,
}

impl<T, E: ElementCodec> ChildValueList<T, E> {
    pub fn new(
        name: &'static str,
        codec: E,
        get: fn(&T) -> &Vec<E::Value>,
        get_mut: fn(&mut T) -> &mut Vec<E::Value>,
    ) -> Self {
        ChildValueList {
            name,
            codec,
            get,
            get_mut,
        }
    }
}

impl<T: 'static, E: ElementCodec> ChildField<T> for ChildValueList<T, E> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.codec.tags()
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        ElementDecoder::start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let (element, ctx) = expect_element(value)?;
        let value = self.codec.unpack(&element, &ctx)?;
        (self.get_mut)(obj).push(value);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        for value in (self.get)(obj) {
            self.codec.pack(value).write_events(sink)?;
        }
        Ok(())
    }
}

/// Children unpacked into `(key, value)` pairs. A later duplicate key
/// replaces the earlier value.
pub struct ChildValueMap<T, K, V, E> {
    name: &'static str,
    codec: E,
    get: fn(&T) -> &IndexMap<K, V>,
    get_mut: fn(&mut T) -> &mut IndexMap<K, V>,
}

impl<T, K, V, E> ChildValueMap<T, K, V, E>
where
    E: ElementCodec<Value = (K, V)>,
{
    pub fn new(
        name: &'static str,
        codec: E,
        get: fn(&T) -> &IndexMap<K, V>,
        get_mut: fn(&mut T) -> &mut IndexMap<K, V>,
    ) -> Self {
        ChildValueMap {
            name,
            codec,
            get,
            get_mut,
        }
    }
}

impl<T, K, V, E> ChildField<T> for ChildValueMap<T, K, V, E>
where
    T: 'static,
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: ElementCodec<Value = (K, V)>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.codec.tags()
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        ElementDecoder::start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let (element, ctx) = expect_element(value)?;
        let (key, value) = self.codec.unpack(&element, &ctx)?;
        (self.get_mut)(obj).insert(key, value);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        for (key, value) in (self.get)(obj) {
            let pair = (key.clone(), value.clone());
            self.codec.pack(&pair).write_events(sink)?;
        }
        Ok(())
    }
}

/// Like [ChildValueMap] but keeps every value of a repeated key, in
/// document order.
pub struct ChildValueMultiMap<T, K, V, E> {
    name: &'static str,
    codec: E,
    get: fn(&T) -> &IndexMap<K, Vec<V>>,
    get_mut: fn(&mut T) -> &mut IndexMap<K, Vec<V>>,
}

impl<T, K, V, E> ChildValueMultiMap<T, K, V, E>
where
    E: ElementCodec<Value = (K, V)>,
{
    pub fn new(
        name: &'static str,
        codec: E,
        get: fn(&T) -> &IndexMap<K, Vec<V>>,
        get_mut: fn(&mut T) -> &mut IndexMap<K, Vec<V>>,
    ) -> Self {
        ChildValueMultiMap {
            name,
            codec,
            get,
            get_mut,
        }
    }
}

impl<T, K, V, E> ChildField<T> for ChildValueMultiMap<T, K, V, E>
where
    T: 'static,
    K: Clone + Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: ElementCodec<Value = (K, V)>,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn fixed_tags(&self) -> Vec<Tag> {
        self.codec.tags()
    }

    fn start(
        &self,
        tag: &Tag,
        attrs: &Attributes,
        ctx: &ParseContext,
    ) -> Result<Box<dyn Decoder>, XsoError> {
        ElementDecoder::start(tag, attrs, ctx)
    }

    fn store(&self, obj: &mut T, value: Decoded) -> Result<(), XsoError> {
        let (element, ctx) = expect_element(value)?;
        let (key, value) = self.codec.unpack(&element, &ctx)?;
        (self.get_mut)(obj).entry(key).or_default().push(value);
        Ok(())
    }

    fn encode(&self, obj: &T, sink: &mut dyn EventSink) -> Result<(), XsoError> {
        for (key, values) in (self.get)(obj) {
            for value in values {
                let pair = (key.clone(), value.clone());
                self.codec.pack(&pair).write_events(sink)?;
            }
        }
        Ok(())
    }
}
