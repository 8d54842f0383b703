/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;
mod location;

pub use error::SaxError;
use error::description;
pub use location::Location;

/// A lexical item produced by the tokenizer.
#[derive(Debug, Eq, PartialEq)]
pub enum SaxElement<'a> {
    /// A start tag or empty element tag, with its raw (prefixed) name.
    ///
    /// Sent as soon as the name is parsed, before any attribute.
    StartTag(&'a str),

    /// An attribute of the last StartTag: raw name and unescaped value.
    Attribute(&'a str, &'a str),

    /// The last StartTag is complete and content follows.
    StartTagContent,

    /// The last StartTag was an empty element tag. No EndTag follows it.
    StartTagEmpty,

    /// An end tag with its raw name.
    EndTag(&'a str),

    /// Character data.
    ///
    /// A single block of text might be delivered in several pieces, for
    /// example around references, CDATA sections, comments, or when the
    /// input is split between parse calls.
    CData(&'a str),
}

/// Receiver of the tokenizer output.
///
/// Returning [SaxError::HandlerAbort] (or any other error) stops the
/// parsing and is passed back to the caller of
/// [parse_bytes()](SaxParser::parse_bytes).
pub trait SaxHandler {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError>;
}

/// Incremental tokenizer for the restricted XML used by XMPP streams.
///
/// Input can be given in chunks of any size; the handler is invoked for
/// each lexical item as soon as it is complete. Document type declarations
/// are refused as required by RFC 6120 section 11.1, comments and
/// processing instructions are skipped.
///
/// ```
/// use iks_xso::{SaxElement, SaxError, SaxHandler, SaxParser};
///
/// struct Printer;
/// impl SaxHandler for Printer {
///     fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
///         println!("{element:?}");
///         Ok(())
///     }
/// }
///
/// let mut parser = SaxParser::new();
/// parser.parse_bytes(&mut Printer, b"<message><bo").unwrap();
/// parser.parse_bytes(&mut Printer, b"dy>hi</body></message>").unwrap();
/// parser.parse_finish().unwrap();
/// ```
pub struct SaxParser {
    state: State,
    uni_len: u32,
    uni_left: u32,
    uni_char: u32,
    depth: usize,
    is_end_tag: bool,
    is_quot_value: bool,
    seen_content: bool,
    value_pos: usize,
    buffer: Vec<u8>,
    ref_buffer: Vec<u8>,
    char_ref_value: u32,
    is_value_ref: bool,
    location: Location,
}

#[derive(Eq, PartialEq)]
enum State {
    Prolog,
    TagStart,
    PI,
    PIEnd,
    Markup,
    CDataSectionC,
    CDataSectionCD,
    CDataSectionCDA,
    CDataSectionCDAT,
    CDataSectionCDATA,
    CDataSectionCDATAb,
    CDataSectionBody,
    CDataSectionMaybeEnd,
    CDataSectionMaybeEnd2,
    CommentStart,
    CommentBody,
    CommentMaybeEnd,
    CommentEnd,
    TagName,
    EndTagWhitespace,
    EmptyTagEnd,
    AttributeWhitespace,
    AttributeName,
    AttributeValueStart,
    AttributeValue,
    AttributeEq,
    CData,
    Reference,
    CharReference,
    CharReferenceBody,
    HexCharReference,
    Entity,
    Epilog,
}

const INITIAL_BUFFER_CAPACITY: usize = 128;

const REF_BUFFER_SIZE: usize = 8;

macro_rules! whitespace {
    () => {
        b' ' | b'\t' | b'\r' | b'\n'
    };
}

fn as_str(bytes: &[u8]) -> Result<&str, SaxError> {
    std::str::from_utf8(bytes).map_err(|_| SaxError::BadXml(description::UTF8_INVALID_SEQUENCE))
}

fn is_valid_xml_char(c: u32) -> bool {
    match c {
        0x09 | 0x0a | 0x0d | 0x20..0xd7ff | 0xe000..0xfffd | 0x10000..0x10ffff => true,
        _ => false,
    }
}

macro_rules! xml_error {
    ($a:ident) => {
        return Err(SaxError::BadXml(description::$a))
    };
}

impl SaxParser {
    /// Creates a new SAX parser instance.
    ///
    /// The instance can be reused for multiple document with the [reset()](SaxParser::reset) method.
    pub fn new() -> SaxParser {
        SaxParser {
            state: State::Prolog,
            uni_len: 0,
            uni_left: 0,
            uni_char: 0,
            depth: 0,
            is_end_tag: false,
            is_quot_value: false,
            seen_content: false,
            value_pos: 0,
            buffer: Vec::<u8>::with_capacity(INITIAL_BUFFER_CAPACITY),
            ref_buffer: Vec::<u8>::with_capacity(REF_BUFFER_SIZE),
            char_ref_value: 0,
            is_value_ref: false,
            location: Location::new(),
        }
    }

    /// Resets the parser into a clean state.
    ///
    /// XMPP streams are restarted after TLS and SASL negotiation; the
    /// same parser is reset and reused for the new stream.
    pub fn reset(&mut self) {
        self.state = State::Prolog;
        self.uni_len = 0;
        self.uni_left = 0;
        self.uni_char = 0;
        self.depth = 0;
        self.is_end_tag = false;
        self.is_quot_value = false;
        self.seen_content = false;
        self.value_pos = 0;
        self.buffer.clear();
        self.ref_buffer.clear();
        self.char_ref_value = 0;
        self.is_value_ref = false;
        self.location = Location::new();
    }

    fn check_buffer(&mut self, need: usize) -> Result<(), SaxError> {
        if self.buffer.len() >= self.buffer.capacity() {
            let diff = std::cmp::max(need, self.buffer.capacity());
            let result = self.buffer.try_reserve_exact(diff);
            if result.is_err() {
                return Err(SaxError::NoMemory);
            }
        }
        Ok(())
    }

    fn send_u32_cdata(
        &mut self,
        handler: &mut impl SaxHandler,
        value: u32,
    ) -> Result<(), SaxError> {
        if !is_valid_xml_char(value) {
            xml_error!(CHAR_INVALID);
        }

        let mut buf: [u8; 4] = [0; 4];
        let mut size = 1;
        const DATA_MASK: u32 = 0b00111111;
        const DATA_PREFIX: u8 = 0b10000000;
        match value {
            0..=0x7f => buf[0] = value as u8,
            0x80..=0x7ff => {
                buf[0] = 0b11000000 | ((value >> 6) as u8);
                buf[1] = DATA_PREFIX | ((value & DATA_MASK) as u8);
                size = 2;
            }
            0x800..=0xffff => {
                buf[0] = 0b11100000 | ((value >> 12) as u8);
                buf[1] = DATA_PREFIX | (((value >> 6) & DATA_MASK) as u8);
                buf[2] = DATA_PREFIX | ((value & DATA_MASK) as u8);
                size = 3;
            }
            0x10000..=0x10ffff => {
                buf[0] = 0b11110000 | ((value >> 18) as u8);
                buf[1] = DATA_PREFIX | (((value >> 12) & DATA_MASK) as u8);
                buf[2] = DATA_PREFIX | (((value >> 6) & DATA_MASK) as u8);
                buf[3] = DATA_PREFIX | ((value & DATA_MASK) as u8);
                size = 4;
            }
            _ => (),
        }

        if self.is_value_ref {
            self.check_buffer(size)?;
            self.buffer.extend(&buf[0..size]);
            Ok(())
        } else {
            handler.handle_element(&SaxElement::CData(as_str(&buf[0..size])?))
        }
    }

    fn flush_cdata(&mut self, handler: &mut impl SaxHandler, bytes: &[u8]) -> Result<(), SaxError> {
        if self.buffer.is_empty() {
            return handler.handle_element(&SaxElement::CData(as_str(bytes)?));
        }
        self.check_buffer(bytes.len())?;
        self.buffer.extend_from_slice(bytes);
        let result = handler.handle_element(&SaxElement::CData(as_str(&self.buffer)?));
        self.buffer.clear();
        result
    }

    /// Checks if the document is complete.
    ///
    /// A completed document should have a root tag and should not have any
    /// unfinished XML constructs, such as open comments and markup.
    pub fn parse_finish(&mut self) -> Result<(), SaxError> {
        if !self.seen_content {
            xml_error!(DOC_NO_CONTENT);
        }
        if self.depth > 0 {
            xml_error!(DOC_OPEN_TAGS);
        }
        if self.state != State::Epilog {
            xml_error!(DOC_OPEN_MARKUP);
        }
        Ok(())
    }

    /// Parses given XML bytes and checks if the document is complete.
    ///
    /// This is a convenience function which calls [parse_bytes()](SaxParser::parse_bytes)
    /// and [parse_finish()](SaxParser::parse_finish) methods for you.
    pub fn parse_bytes_finish(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
    ) -> Result<(), SaxError> {
        self.parse_bytes(handler, bytes)?;
        self.parse_finish()
    }

    /// Parses given XML bytes.
    pub fn parse_bytes(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
    ) -> Result<(), SaxError> {
        let mut pos: usize = 0;
        let mut back: usize = 0;

        while pos < bytes.len() {
            let mut redo: bool = false;
            let c = bytes[pos];

            if self.uni_left > 0 {
                if c & 0xc0 != 0x80 {
                    xml_error!(UTF8_INVALID_CONT_BYTE);
                }
                self.uni_char <<= 6;
                self.uni_char += c as u32 & 0x3f;
                self.uni_left -= 1;
                if self.uni_left == 0 {
                    // Sequences longer than the actual character codepoint
                    // size are security hazards.
                    if (self.uni_len == 2 && self.uni_char <= 0x7f)
                        || (self.uni_len == 3 && self.uni_char <= 0x7ff)
                        || (self.uni_len == 4 && self.uni_char <= 0xffff)
                    {
                        xml_error!(UTF8_OVERLONG_SEQUENCE);
                    }
                    if !is_valid_xml_char(self.uni_char) {
                        xml_error!(CHAR_INVALID);
                    }
                }
            } else if c & 0x80 == 0x80 {
                if c & 0x60 == 0x40 {
                    self.uni_len = 2;
                    self.uni_left = 1;
                    self.uni_char = c as u32 & 0x1f;
                } else if c & 0x70 == 0x60 {
                    self.uni_len = 3;
                    self.uni_left = 2;
                    self.uni_char = c as u32 & 0x0f;
                } else if c & 0x78 == 0x70 {
                    self.uni_len = 4;
                    self.uni_left = 3;
                    self.uni_char = c as u32 & 0x07;
                } else {
                    xml_error!(UTF8_INVALID_PREFIX_BYTE);
                }
            } else if c < 0x20 && (c != 0x09 && c != 0x0a && c != 0x0d) {
                xml_error!(CHAR_INVALID);
            }

            match self.state {
                State::Prolog => match c {
                    b'<' => self.state = State::TagStart,
                    whitespace!() => (),
                    _ => {
                        xml_error!(DOC_CDATA_WITHOUT_PARENT);
                    }
                },

                State::TagStart => match c {
                    b'!' => {
                        self.state = State::Markup;
                    }
                    b'?' => self.state = State::PI,
                    b'/' => {
                        if self.depth == 0 {
                            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                        }
                        back = pos + 1;
                        self.is_end_tag = true;
                        self.state = State::TagName;
                    }
                    whitespace!() => {
                        xml_error!(TAG_WHITESPACE_START);
                    }
                    b'>' => {
                        xml_error!(TAG_EMPTY_NAME);
                    }
                    _ => {
                        if self.depth == 0 && self.seen_content {
                            xml_error!(TAG_OUTSIDE_ROOT);
                        }
                        self.depth += 1;
                        back = pos;
                        self.is_end_tag = false;
                        self.seen_content = true;
                        self.state = State::TagName;
                    }
                },

                State::Markup => match c {
                    b'-' => self.state = State::CommentStart,
                    b'[' => {
                        if self.depth == 0 {
                            xml_error!(MARKUP_CDATA_SECTION_OUTSIDE_ROOT);
                        }
                        self.state = State::CDataSectionC;
                    }
                    b'D' => {
                        return Err(SaxError::NotSupported(description::DOCTYPE_RESTRICTED));
                    }
                    _ => {
                        xml_error!(MARKUP_UNRECOGNIZED);
                    }
                },

                State::CDataSectionC => {
                    if c != b'C' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCD;
                }

                State::CDataSectionCD => {
                    if c != b'D' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDA;
                }

                State::CDataSectionCDA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDAT;
                }

                State::CDataSectionCDAT => {
                    if c != b'T' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATA;
                }

                State::CDataSectionCDATA => {
                    if c != b'A' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    self.state = State::CDataSectionCDATAb;
                }

                State::CDataSectionCDATAb => {
                    if c != b'[' {
                        xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                    }
                    back = pos + 1;
                    self.state = State::CDataSectionBody;
                }

                State::CDataSectionBody => match c {
                    b']' => {
                        if back < pos {
                            self.flush_cdata(handler, &bytes[back..pos])?;
                        }
                        self.state = State::CDataSectionMaybeEnd;
                    }
                    _ => (),
                },

                State::CDataSectionMaybeEnd => match c {
                    b']' => self.state = State::CDataSectionMaybeEnd2,
                    _ => {
                        handler.handle_element(&SaxElement::CData("]"))?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::CDataSectionMaybeEnd2 => match c {
                    b'>' => {
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    b']' => {
                        handler.handle_element(&SaxElement::CData("]"))?;
                    }
                    _ => {
                        handler.handle_element(&SaxElement::CData("]]"))?;
                        back = pos;
                        self.state = State::CDataSectionBody;
                    }
                },

                State::CommentStart => {
                    if c != b'-' {
                        xml_error!(COMMENT_MISSING_DASH);
                    }
                    self.state = State::CommentBody;
                }

                State::CommentBody => match c {
                    b'-' => self.state = State::CommentMaybeEnd,
                    _ => (),
                },

                State::CommentMaybeEnd => match c {
                    b'-' => self.state = State::CommentEnd,
                    _ => self.state = State::CommentBody,
                },

                State::CommentEnd => {
                    if c != b'>' {
                        xml_error!(COMMENT_MISSING_END);
                    }
                    if self.depth > 0 {
                        back = pos + 1;
                        self.state = State::CData;
                    } else if self.seen_content {
                        self.state = State::Epilog;
                    } else {
                        self.state = State::Prolog;
                    }
                }

                State::PI => match c {
                    b'?' => self.state = State::PIEnd,
                    _ => (),
                },

                State::PIEnd => match c {
                    b'>' => {
                        if self.seen_content {
                            if self.depth > 0 {
                                back = pos + 1;
                                self.state = State::CData;
                            } else {
                                self.state = State::Epilog;
                            }
                        } else {
                            self.state = State::Prolog;
                        }
                    }
                    _ => {
                        xml_error!(PI_MISSING_END);
                    }
                },

                State::TagName => match c {
                    b'/' | b'>' | whitespace!() => {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        {
                            if self.buffer.is_empty() {
                                xml_error!(TAG_EMPTY_NAME);
                            }
                            let s = as_str(&self.buffer)?;
                            if self.is_end_tag {
                                if c == b'/' {
                                    xml_error!(TAG_DOUBLE_END);
                                }
                                handler.handle_element(&SaxElement::EndTag(s))?;
                            } else {
                                handler.handle_element(&SaxElement::StartTag(s))?;
                            }
                        }
                        self.buffer.clear();
                        match c {
                            b'/' => {
                                handler.handle_element(&SaxElement::StartTagEmpty)?;
                                self.state = State::EmptyTagEnd;
                            }
                            b'>' => {
                                if self.is_end_tag {
                                    if self.depth == 0 {
                                        xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                                    }
                                    self.depth -= 1;
                                    if self.depth == 0 {
                                        self.state = State::Epilog;
                                    } else {
                                        back = pos + 1;
                                        self.state = State::CData;
                                    }
                                } else {
                                    handler.handle_element(&SaxElement::StartTagContent)?;
                                    back = pos + 1;
                                    self.state = State::CData;
                                }
                            }
                            whitespace!() => {
                                if self.is_end_tag {
                                    self.state = State::EndTagWhitespace;
                                } else {
                                    self.state = State::AttributeWhitespace;
                                }
                            }
                            _ => unreachable!(),
                        }
                    }
                    _ => (),
                },

                State::EmptyTagEnd => match c {
                    b'>' => {
                        if self.depth == 0 {
                            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                        }
                        self.depth -= 1;
                        if self.depth == 0 {
                            self.state = State::Epilog;
                        } else {
                            back = pos + 1;
                            self.state = State::CData;
                        }
                    }
                    _ => {
                        xml_error!(TAG_EMPTY_TAG_MISSING_END);
                    }
                },

                State::EndTagWhitespace => match c {
                    b'>' => {
                        if self.depth == 0 {
                            xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                        }
                        self.depth -= 1;
                        if self.depth == 0 {
                            self.state = State::Epilog;
                        } else {
                            back = pos + 1;
                            self.state = State::CData;
                        }
                    }
                    whitespace!() => (),
                    _ => {
                        xml_error!(TAG_END_TAG_ATTRIBUTES);
                    }
                },

                State::AttributeWhitespace => match c {
                    whitespace!() => (),
                    b'/' => {
                        if self.is_end_tag {
                            xml_error!(TAG_DOUBLE_END);
                        }
                        handler.handle_element(&SaxElement::StartTagEmpty)?;
                        self.state = State::EmptyTagEnd;
                    }
                    b'>' => {
                        handler.handle_element(&SaxElement::StartTagContent)?;
                        back = pos + 1;
                        self.state = State::CData;
                    }
                    _ => {
                        back = pos;
                        self.state = State::AttributeName;
                        redo = true;
                    }
                },

                State::AttributeName => match c {
                    b'=' | whitespace!() => {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        if c == b'=' {
                            self.state = State::AttributeValueStart;
                        } else {
                            self.state = State::AttributeEq;
                        }
                    }
                    b'/' | b'>' | b'<' => {
                        xml_error!(TAG_ATTRIBUTE_BAD_NAME);
                    }
                    _ => (),
                },

                State::AttributeEq => match c {
                    b'=' => self.state = State::AttributeValueStart,
                    whitespace!() => (),
                    _ => {
                        xml_error!(TAG_ATTRIBUTE_WITHOUT_EQUAL);
                    }
                },

                State::AttributeValueStart => match c {
                    b'"' => {
                        self.is_quot_value = false;
                        self.value_pos = self.buffer.len();
                        back = pos + 1;
                        self.state = State::AttributeValue;
                    }
                    b'\'' => {
                        self.is_quot_value = true;
                        self.value_pos = self.buffer.len();
                        back = pos + 1;
                        self.state = State::AttributeValue;
                    }
                    whitespace!() => (),
                    _ => {
                        xml_error!(TAG_ATTRIBUTE_WITHOUT_QUOTE);
                    }
                },

                State::AttributeValue => {
                    if (self.is_quot_value && c == b'\'') || (!self.is_quot_value && c == b'"') {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        let attr = as_str(&self.buffer[0..self.value_pos])?;
                        let value = as_str(&self.buffer[self.value_pos..])?;
                        handler.handle_element(&SaxElement::Attribute(attr, value))?;
                        self.buffer.clear();
                        self.state = State::AttributeWhitespace;
                    } else if c == b'&' {
                        if back < pos {
                            self.check_buffer(pos - back)?;
                            self.buffer.extend_from_slice(&bytes[back..pos]);
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = true;
                        self.state = State::Reference;
                    } else if c == b'<' {
                        xml_error!(TAG_ATTRIBUTE_BAD_VALUE);
                    }
                }

                State::CData => match c {
                    b'<' => {
                        if back < pos {
                            self.flush_cdata(handler, &bytes[back..pos])?;
                        }
                        back = pos + 1;
                        self.state = State::TagStart;
                    }
                    b'&' => {
                        if back < pos {
                            self.flush_cdata(handler, &bytes[back..pos])?;
                        }
                        self.ref_buffer.clear();
                        self.is_value_ref = false;
                        self.state = State::Reference;
                    }
                    _ => (),
                },

                State::Reference => match c {
                    b'#' => {
                        self.char_ref_value = 0;
                        self.state = State::CharReference;
                    }
                    _ => {
                        self.ref_buffer.push(c);
                        self.state = State::Entity;
                    }
                },

                State::Entity => match c {
                    b';' => {
                        let ent = match self.ref_buffer.as_slice() {
                            b"amp" => "&",
                            b"lt" => "<",
                            b"gt" => ">",
                            b"quot" => "\"",
                            b"apos" => "'",
                            _ => {
                                return Err(SaxError::NotSupported(
                                    description::REFERENCE_CUSTOM_ENTITY,
                                ));
                            }
                        };
                        if self.is_value_ref {
                            self.check_buffer(1)?;
                            self.buffer.push(ent.as_bytes()[0]);
                            back = pos + 1;
                            self.state = State::AttributeValue;
                        } else {
                            back = pos + 1;
                            self.state = State::CData;
                            handler.handle_element(&SaxElement::CData(ent))?;
                        }
                    }
                    _ => {
                        if self.ref_buffer.len() >= REF_BUFFER_SIZE {
                            return Err(SaxError::NotSupported(
                                description::REFERENCE_CUSTOM_ENTITY,
                            ));
                        }
                        self.ref_buffer.push(c);
                    }
                },

                State::CharReference => match c {
                    b'x' => self.state = State::HexCharReference,
                    b'0'..=b'9' => {
                        self.char_ref_value = (c - b'0').into();
                        self.state = State::CharReferenceBody;
                    }
                    _ => {
                        xml_error!(REFERENCE_INVALID_DECIMAL);
                    }
                },

                State::CharReferenceBody => match c {
                    b';' => {
                        self.send_u32_cdata(handler, self.char_ref_value)?;
                        back = pos + 1;
                        if self.is_value_ref {
                            self.state = State::AttributeValue;
                        } else {
                            self.state = State::CData;
                        }
                    }
                    b'0'..=b'9' => {
                        let digit: u32 = (c - b'0').into();
                        self.char_ref_value = self.char_ref_value.saturating_mul(10) + digit;
                    }
                    _ => {
                        xml_error!(REFERENCE_INVALID_DECIMAL);
                    }
                },

                State::HexCharReference => match c {
                    b';' => {
                        self.send_u32_cdata(handler, self.char_ref_value)?;
                        back = pos + 1;
                        if self.is_value_ref {
                            self.state = State::AttributeValue;
                        } else {
                            self.state = State::CData;
                        }
                    }
                    b'0'..=b'9' => {
                        let digit: u32 = (c - b'0').into();
                        self.char_ref_value = self.char_ref_value.saturating_mul(16) + digit;
                    }
                    b'a'..=b'f' => {
                        let digit: u32 = (c - b'a').into();
                        self.char_ref_value = self.char_ref_value.saturating_mul(16) + digit + 10;
                    }
                    b'A'..=b'F' => {
                        let digit: u32 = (c - b'A').into();
                        self.char_ref_value = self.char_ref_value.saturating_mul(16) + digit + 10;
                    }
                    _ => {
                        xml_error!(REFERENCE_INVALID_HEX);
                    }
                },

                State::Epilog => match c {
                    b'<' => self.state = State::TagStart,
                    whitespace!() => (),
                    _ => {
                        xml_error!(DOC_CDATA_WITHOUT_PARENT);
                    }
                },
            }

            if !redo {
                pos += 1;
                self.location.advance(c);
            }
        }

        if back < pos {
            match self.state {
                State::TagName | State::AttributeName | State::AttributeValue => {
                    self.check_buffer(pos - back)?;
                    self.buffer.extend_from_slice(&bytes[back..pos])
                }
                State::CData | State::CDataSectionBody => {
                    // A multi-byte character split across chunks is held
                    // back until its remaining bytes arrive.
                    let partial = if self.uni_left > 0 {
                        (self.uni_len - self.uni_left) as usize
                    } else {
                        0
                    };
                    let split = pos - partial.min(pos - back);
                    if back < split {
                        self.flush_cdata(handler, &bytes[back..split])?;
                    }
                    self.check_buffer(pos - split)?;
                    self.buffer.extend_from_slice(&bytes[split..pos]);
                }
                _ => (),
            }
        }

        Ok(())
    }

    /// Position of the last consumed byte.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Number of currently open elements.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for SaxParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
