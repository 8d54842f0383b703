/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

#[derive(Debug, Eq, PartialEq)]
enum Owned {
    Start(String),
    Attr(String, String),
    Content,
    Empty,
    End(String),
    Text(String),
}

#[derive(Default)]
struct Recorder {
    items: Vec<Owned>,
}

impl SaxHandler for Recorder {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        let item = match element {
            SaxElement::StartTag(name) => Owned::Start(name.to_string()),
            SaxElement::Attribute(name, value) => Owned::Attr(name.to_string(), value.to_string()),
            SaxElement::StartTagContent => Owned::Content,
            SaxElement::StartTagEmpty => Owned::Empty,
            SaxElement::EndTag(name) => Owned::End(name.to_string()),
            SaxElement::CData(text) => {
                if let Some(Owned::Text(prev)) = self.items.last_mut() {
                    prev.push_str(text);
                    return Ok(());
                }
                Owned::Text(text.to_string())
            }
        };
        self.items.push(item);
        Ok(())
    }
}

fn start(name: &str) -> Owned {
    Owned::Start(name.to_string())
}

fn end(name: &str) -> Owned {
    Owned::End(name.to_string())
}

fn text(s: &str) -> Owned {
    Owned::Text(s.to_string())
}

fn attr(name: &str, value: &str) -> Owned {
    Owned::Attr(name.to_string(), value.to_string())
}

fn check(xml: &str, expected: &[Owned]) {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    parser.parse_bytes(&mut recorder, xml.as_bytes()).unwrap();
    parser.parse_finish().unwrap();
    assert_eq!(recorder.items, expected);
    assert_eq!(parser.location().bytes, xml.len());

    // byte by byte, which also splits multi-byte characters
    let mut recorder = Recorder::default();
    parser.reset();
    for i in 0..xml.len() {
        parser
            .parse_bytes(&mut recorder, &xml.as_bytes()[i..i + 1])
            .unwrap();
    }
    parser.parse_finish().unwrap();
    assert_eq!(recorder.items, expected);
}

fn check_bad(xml: &[u8], bad_byte: usize, error: SaxError) {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    let result = parser
        .parse_bytes(&mut recorder, xml)
        .and_then(|_| parser.parse_finish());
    assert_eq!(result, Err(error));
    assert_eq!(parser.location().bytes, bad_byte);
}

fn is_bad_xml(err: SaxError) -> bool {
    matches!(err, SaxError::BadXml(_))
}

#[test]
fn tags() {
    check("<lonely/>", &[start("lonely"), Owned::Empty]);
    check(
        "<?xml version='1.0'?><parent><child/>child</parent>",
        &[
            start("parent"),
            Owned::Content,
            start("child"),
            Owned::Empty,
            text("child"),
            end("parent"),
        ],
    );
    check(
        "<mytag abc='123' id=\"XC72\"></mytag>",
        &[
            start("mytag"),
            attr("abc", "123"),
            attr("id", "XC72"),
            Owned::Content,
            end("mytag"),
        ],
    );
    check(
        "<a><b x1 ='lala'/><c x2\t= \t'bibi'/></a>",
        &[
            start("a"),
            Owned::Content,
            start("b"),
            attr("x1", "lala"),
            Owned::Empty,
            start("c"),
            attr("x2", "bibi"),
            Owned::Empty,
            end("a"),
        ],
    );
}

#[test]
fn stanza_with_prefixes() {
    check(
        "<stream:stream xmlns:stream='http://etherx.jabber.org/streams'><message/></stream:stream>",
        &[
            start("stream:stream"),
            attr("xmlns:stream", "http://etherx.jabber.org/streams"),
            Owned::Content,
            start("message"),
            Owned::Empty,
            end("stream:stream"),
        ],
    );
}

#[test]
fn comments_and_cdata_sections() {
    check(
        "<body>Jab<!-- little comment -->ber <![CDATA[<site> ]] ]]>!</body>",
        &[
            start("body"),
            Owned::Content,
            text("Jabber <site> ]] !"),
            end("body"),
        ],
    );
}

#[test]
fn references() {
    check(
        "<body>I&apos;m &lt;b&gt; &#x3B;&#65; \u{10abc}</body>",
        &[
            start("body"),
            Owned::Content,
            text("I'm <b> ;A \u{10abc}"),
            end("body"),
        ],
    );
    check(
        "<a b='a&amp;b &#x42;&#65;'/>",
        &[start("a"), attr("b", "a&b BA"), Owned::Empty],
    );
}

#[test]
fn multibyte_text() {
    check(
        "<a>[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]</a>",
        &[
            start("a"),
            Owned::Content,
            text("[[bg:Чингис хан]][[bn:চেঙ্গিজ খান]]"),
            end("a"),
        ],
    );
}

#[test]
fn doctype_is_refused() {
    check_bad(
        b"<!DOCTYPE greeting []><x/>",
        2,
        SaxError::NotSupported(description::DOCTYPE_RESTRICTED),
    );
}

#[test]
fn custom_entities_are_refused() {
    check_bad(
        b"<a>&lala;</a>",
        8,
        SaxError::NotSupported(description::REFERENCE_CUSTOM_ENTITY),
    );
}

#[test]
fn bad_input() {
    let cases: &[(&[u8], usize)] = &[
        (b"<a>< b/></a>", 4),
        (b"<a></a><b/>", 8),
        (b"<a a='1' b></a>", 10),
        (b"<a>&#1a;</a>", 6),
        (b"<a>&#xq;</a>", 6),
        (b"<test>\xFF</test>", 6),
        (b"<test>\xC0\x80</test>", 7),
    ];
    for (xml, bad_byte) in cases {
        let mut recorder = Recorder::default();
        let mut parser = SaxParser::new();
        let err = parser.parse_bytes(&mut recorder, xml).unwrap_err();
        assert!(is_bad_xml(err), "{err:?}");
        assert_eq!(parser.location().bytes, *bad_byte);
    }
}

#[test]
fn unfinished_document() {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    parser.parse_bytes(&mut recorder, b" <a> ").unwrap();
    assert_eq!(parser.depth(), 1);
    assert!(is_bad_xml(parser.parse_finish().unwrap_err()));
}

#[test]
fn handler_abort() {
    struct Aborter;
    impl SaxHandler for Aborter {
        fn handle_element(&mut self, _element: &SaxElement) -> Result<(), SaxError> {
            Err(SaxError::HandlerAbort)
        }
    }
    let mut parser = SaxParser::new();
    assert_eq!(
        parser.parse_bytes(&mut Aborter, b"<a/>"),
        Err(SaxError::HandlerAbort)
    );
}
