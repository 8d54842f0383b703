/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Codecs between character data and typed values.

use std::fmt::Debug;
use std::fmt::Display;
use std::marker::PhantomData;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use chrono::NaiveDate;
use chrono::NaiveTime;
use chrono::SecondsFormat;
use chrono::TimeDelta;
use chrono::Timelike;
use chrono::Utc;

use crate::Jid;
use crate::xml::Element;
use crate::xml::Tag;

use super::CodecError;
use super::LanguageTag;
use super::ParseContext;
use super::XsoError;

/// Conversion between attribute or text content and a value.
pub trait Codec: Send + Sync + 'static {
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    fn parse(&self, s: &str) -> Result<Self::Value, CodecError>;

    fn format(&self, value: &Self::Value) -> String;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct StringCodec;

impl Codec for StringCodec {
    type Value = String;

    fn parse(&self, s: &str) -> Result<String, CodecError> {
        Ok(s.to_string())
    }

    fn format(&self, value: &String) -> String {
        value.clone()
    }
}

/// Decimal integers of any primitive width.
pub struct Integer<N>(PhantomData<fn() -> N>);

impl<N> Integer<N> {
    pub fn new() -> Self {
        Integer(PhantomData)
    }
}

impl<N> Default for Integer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N> Codec for Integer<N>
where
    N: FromStr + Display + Clone + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = N;

    fn parse(&self, s: &str) -> Result<N, CodecError> {
        s.trim()
            .parse()
            .map_err(|_| CodecError::new(s, std::any::type_name::<N>(), "not a decimal integer"))
    }

    fn format(&self, value: &N) -> String {
        value.to_string()
    }
}

/// Accepts `true`/`1` and `false`/`0`, writes `true` and `false`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoolCodec;

impl Codec for BoolCodec {
    type Value = bool;

    fn parse(&self, s: &str) -> Result<bool, CodecError> {
        match s.trim() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(CodecError::new(s, "bool", "expected true, false, 1 or 0")),
        }
    }

    fn format(&self, value: &bool) -> String {
        String::from(if *value { "true" } else { "false" })
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DateTimeCodec;

impl Codec for DateTimeCodec {
    type Value = DateTime<Utc>;

    fn parse(&self, s: &str) -> Result<DateTime<Utc>, CodecError> {
        DateTime::parse_from_rfc3339(s.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| CodecError::new(s, "datetime", "not an ISO 8601 date and time"))
    }

    fn format(&self, value: &DateTime<Utc>) -> String {
        value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DateCodec;

impl Codec for DateCodec {
    type Value = NaiveDate;

    fn parse(&self, s: &str) -> Result<NaiveDate, CodecError> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|_| CodecError::new(s, "date", "not an ISO 8601 date"))
    }

    fn format(&self, value: &NaiveDate) -> String {
        value.format("%Y-%m-%d").to_string()
    }
}

/// Time of day, normalized to UTC.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeCodec;

fn split_zone(s: &str) -> Option<(&str, i64)> {
    if let Some(time) = s.strip_suffix('Z') {
        return Some((time, 0));
    }
    let bytes = s.as_bytes();
    if bytes.len() > 6 && bytes[bytes.len() - 3] == b':' {
        let sign = match bytes[bytes.len() - 6] {
            b'+' => 1,
            b'-' => -1,
            _ => return Some((s, 0)),
        };
        let hours: i64 = s[s.len() - 5..s.len() - 3].parse().ok()?;
        let minutes: i64 = s[s.len() - 2..].parse().ok()?;
        return Some((&s[..s.len() - 6], sign * (hours * 3600 + minutes * 60)));
    }
    Some((s, 0))
}

impl Codec for TimeCodec {
    type Value = NaiveTime;

    fn parse(&self, s: &str) -> Result<NaiveTime, CodecError> {
        let err = || CodecError::new(s, "time", "not an ISO 8601 time");
        let (time, offset) = split_zone(s.trim()).ok_or_else(err)?;
        let naive = NaiveTime::parse_from_str(time, "%H:%M:%S%.f").map_err(|_| err())?;
        let delta = TimeDelta::try_seconds(offset).ok_or_else(err)?;
        Ok(naive.overflowing_sub_signed(delta).0)
    }

    fn format(&self, value: &NaiveTime) -> String {
        if value.nanosecond() == 0 {
            value.format("%H:%M:%SZ").to_string()
        } else {
            value.format("%H:%M:%S%.3fZ").to_string()
        }
    }
}

/// Base64 binary data.
///
/// With `empty_as_equal` an empty payload is written as `=`, keeping it
/// distinguishable from an absent one.
#[derive(Clone, Copy, Debug, Default)]
pub struct Base64Codec {
    pub empty_as_equal: bool,
}

impl Codec for Base64Codec {
    type Value = Vec<u8>;

    fn parse(&self, s: &str) -> Result<Vec<u8>, CodecError> {
        let compact: String = s.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        if self.empty_as_equal && compact == "=" {
            return Ok(Vec::new());
        }
        STANDARD
            .decode(compact.as_bytes())
            .map_err(|_| CodecError::new(s, "base64", "invalid base64 data"))
    }

    fn format(&self, value: &Vec<u8>) -> String {
        if self.empty_as_equal && value.is_empty() {
            return "=".to_string();
        }
        STANDARD.encode(value)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct HexCodec;

impl Codec for HexCodec {
    type Value = Vec<u8>;

    fn parse(&self, s: &str) -> Result<Vec<u8>, CodecError> {
        let s = s.trim();
        if s.len() % 2 != 0 {
            return Err(CodecError::new(s, "hex", "odd number of digits"));
        }
        s.as_bytes()
            .chunks(2)
            .map(|pair| {
                let high = (pair[0] as char).to_digit(16);
                let low = (pair[1] as char).to_digit(16);
                match (high, low) {
                    (Some(high), Some(low)) => Ok((high * 16 + low) as u8),
                    _ => Err(CodecError::new(s, "hex", "invalid hex digit")),
                }
            })
            .collect()
    }

    fn format(&self, value: &Vec<u8>) -> String {
        value.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct JidCodec;

impl Codec for JidCodec {
    type Value = Jid;

    fn parse(&self, s: &str) -> Result<Jid, CodecError> {
        Jid::new(s).map_err(|err| CodecError::new(s, "jid", err.0))
    }

    fn format(&self, value: &Jid) -> String {
        value.to_string()
    }
}

/// A `host:port` pair, IPv6 hosts in brackets.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConnectionLocationCodec;

impl Codec for ConnectionLocationCodec {
    type Value = (String, u16);

    fn parse(&self, s: &str) -> Result<(String, u16), CodecError> {
        let err = |reason| CodecError::new(s, "connection location", reason);
        let (host, port) = match s.strip_prefix('[') {
            Some(rest) => rest.split_once("]:").ok_or(err("unterminated IPv6 address"))?,
            None => {
                let (host, port) = s.rsplit_once(':').ok_or(err("missing port"))?;
                if host.contains(':') {
                    return Err(err("IPv6 address must be in brackets"));
                }
                (host, port)
            }
        };
        if host.is_empty() {
            return Err(err("missing host"));
        }
        let port = port.parse().map_err(|_| err("invalid port"))?;
        Ok((host.to_string(), port))
    }

    fn format(&self, value: &(String, u16)) -> String {
        let (host, port) = value;
        if host.contains(':') {
            format!("[{host}]:{port}")
        } else {
            format!("{host}:{port}")
        }
    }
}

/// A closed set of values spelled by fixed strings.
pub struct EnumCodec<E: 'static> {
    values: &'static [(&'static str, E)],
}

impl<E: 'static> EnumCodec<E> {
    pub const fn new(values: &'static [(&'static str, E)]) -> Self {
        EnumCodec { values }
    }
}

impl<E> Codec for EnumCodec<E>
where
    E: Copy + PartialEq + Debug + Send + Sync + 'static,
{
    type Value = E;

    fn parse(&self, s: &str) -> Result<E, CodecError> {
        self.values
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, value)| *value)
            .ok_or_else(|| CodecError::new(s, std::any::type_name::<E>(), "not an allowed value"))
    }

    fn format(&self, value: &E) -> String {
        self.values
            .iter()
            .find(|(_, v)| v == value)
            .map(|(name, _)| name.to_string())
            .unwrap_or_default()
    }
}

/// Opaque JSON content.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    type Value = serde_json::Value;

    fn parse(&self, s: &str) -> Result<serde_json::Value, CodecError> {
        serde_json::from_str(s).map_err(|_| CodecError::new(s, "json", "invalid JSON"))
    }

    fn format(&self, value: &serde_json::Value) -> String {
        value.to_string()
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LanguageTagCodec;

impl Codec for LanguageTagCodec {
    type Value = LanguageTag;

    fn parse(&self, s: &str) -> Result<LanguageTag, CodecError> {
        LanguageTag::parse(s)
    }

    fn format(&self, value: &LanguageTag) -> String {
        value.to_string()
    }
}

/// Conversion between a whole child element and a plain value.
pub trait ElementCodec: Send + Sync + 'static {
    type Value: Clone + PartialEq + Debug + Send + Sync + 'static;

    /// Tags of the elements this codec understands.
    fn tags(&self) -> Vec<Tag>;

    fn unpack(&self, element: &Element, ctx: &ParseContext) -> Result<Self::Value, XsoError>;

    fn pack(&self, value: &Self::Value) -> Element;
}

/// An element whose text content is the value.
pub struct TextChild<C> {
    tag: Tag,
    codec: C,
}

impl<C: Codec> TextChild<C> {
    pub fn new(tag: Tag, codec: C) -> Self {
        TextChild { tag, codec }
    }
}

impl<C: Codec> ElementCodec for TextChild<C> {
    type Value = C::Value;

    fn tags(&self) -> Vec<Tag> {
        vec![self.tag.clone()]
    }

    fn unpack(&self, element: &Element, _ctx: &ParseContext) -> Result<C::Value, XsoError> {
        self.codec
            .parse(&element.text())
            .map_err(|source| XsoError::Codec {
                field: "text",
                source,
            })
    }

    fn pack(&self, value: &C::Value) -> Element {
        Element::new(self.tag.clone()).with_text(&self.codec.format(value))
    }
}

/// Text keyed by its effective `xml:lang`.
pub struct LangText {
    tag: Tag,
}

impl LangText {
    pub fn new(tag: Tag) -> Self {
        LangText { tag }
    }
}

impl ElementCodec for LangText {
    type Value = (Option<LanguageTag>, String);

    fn tags(&self) -> Vec<Tag> {
        vec![self.tag.clone()]
    }

    fn unpack(&self, element: &Element, ctx: &ParseContext) -> Result<Self::Value, XsoError> {
        Ok((ctx.lang.clone(), element.text()))
    }

    fn pack(&self, (lang, text): &Self::Value) -> Element {
        let mut element = Element::new(self.tag.clone()).with_text(text);
        if let Some(lang) = lang {
            element.set_attr(Tag::xml_lang(), lang.as_str());
        }
        element
    }
}

/// A `(key, text)` pair stored as an attribute and the text content, like
/// `<header name='key'>text</header>`.
pub struct KeyedText {
    tag: Tag,
    key: Tag,
}

impl KeyedText {
    pub fn new(tag: Tag, key: Tag) -> Self {
        KeyedText { tag, key }
    }
}

impl ElementCodec for KeyedText {
    type Value = (String, String);

    fn tags(&self) -> Vec<Tag> {
        vec![self.tag.clone()]
    }

    fn unpack(&self, element: &Element, _ctx: &ParseContext) -> Result<Self::Value, XsoError> {
        let key = element
            .attr(&self.key)
            .ok_or_else(|| XsoError::MissingAttribute(self.key.clone()))?;
        Ok((key.to_string(), element.text()))
    }

    fn pack(&self, (key, text): &Self::Value) -> Element {
        Element::new(self.tag.clone())
            .with_attr(self.key.clone(), key)
            .with_text(text)
    }
}
