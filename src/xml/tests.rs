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

const CLIENT: &str = "jabber:client";
const STREAMS: &str = "http://etherx.jabber.org/streams";

fn start(namespace: Option<&str>, name: &str, attrs: &[(&str, &str)]) -> XmlEvent {
    XmlEvent::Start {
        tag: Tag::new(namespace, name),
        attrs: attrs
            .iter()
            .map(|(name, value)| (Tag::local(name), value.to_string()))
            .collect(),
    }
}

fn write(events: &[XmlEvent], writer: &mut XmlWriter) {
    for event in events {
        match event {
            XmlEvent::Start { tag, attrs } => writer.start(tag, attrs).unwrap(),
            XmlEvent::Text(text) => writer.text(text).unwrap(),
            XmlEvent::End => writer.end().unwrap(),
        }
    }
}

#[test]
fn tag_notations() {
    assert_eq!(normalize_tag("{urn:x}y").unwrap(), Tag::qualified("urn:x", "y"));
    assert_eq!(normalize_tag("{}y").unwrap(), Tag::qualified("", "y"));
    assert_eq!(normalize_tag("y").unwrap(), Tag::local("y"));
    assert_eq!(
        normalize_tag(TagInput::Parts(&[Some("urn:x"), Some("y")])).unwrap(),
        Tag::qualified("urn:x", "y")
    );
    assert_eq!(
        normalize_tag(TagInput::Parts(&[None, Some("y")])).unwrap(),
        Tag::local("y")
    );
    let tag = Tag::qualified("urn:x", "y");
    assert_eq!(normalize_tag(&tag).unwrap(), tag);

    assert!(matches!(normalize_tag("{urn:x"), Err(XmlError::MalformedTag(_))));
    assert!(matches!(normalize_tag("{urn:x}"), Err(XmlError::MalformedTag(_))));
    assert!(matches!(
        normalize_tag(TagInput::Parts(&[Some("urn:x")])),
        Err(XmlError::MalformedTag(_))
    ));
    assert!(matches!(
        normalize_tag(TagInput::Parts(&[Some("urn:x"), None])),
        Err(XmlError::MalformedTag(_))
    ));
}

#[test]
fn tag_wire_string() {
    let tag = normalize_tag("{urn:x}y").unwrap();
    assert_eq!(tag_to_wire_string(&tag), "{urn:x}y");
    assert_eq!(normalize_tag(tag_to_wire_string(&tag).as_str()).unwrap(), tag);
    assert_eq!(tag_to_wire_string(&Tag::local("y")), "y");
    assert_ne!(Tag::local("y"), Tag::qualified("", "y"));
}

#[test]
fn namespaces_resolved() {
    let events = read_events(
        "<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>\
         <message to='a@b'><body xml:lang='en'>hi</body><x xmlns='urn:x'/><y xmlns=''/></message>\
         </stream:stream>",
    )
    .unwrap();

    let mut lang = Attributes::new();
    lang.insert(Tag::xml_lang(), "en".to_string());
    assert_eq!(
        events,
        vec![
            start(Some(STREAMS), "stream", &[]),
            start(Some(CLIENT), "message", &[("to", "a@b")]),
            XmlEvent::Start {
                tag: Tag::qualified(CLIENT, "body"),
                attrs: lang,
            },
            XmlEvent::Text("hi".to_string()),
            XmlEvent::End,
            start(Some("urn:x"), "x", &[]),
            XmlEvent::End,
            start(None, "y", &[]),
            XmlEvent::End,
            XmlEvent::End,
            XmlEvent::End,
        ]
    );
}

#[test]
fn chunked_input() {
    let xml = "<a xmlns='urn:a'><b>t&amp;u</b></a>";
    let mut reader = EventReader::new();
    let mut events = Vec::new();
    for byte in xml.as_bytes() {
        events.extend(reader.feed(std::slice::from_ref(byte)).unwrap());
    }
    reader.finish().unwrap();

    let mut merged: Vec<XmlEvent> = Vec::new();
    for event in events {
        match (merged.last_mut(), event) {
            (Some(XmlEvent::Text(prev)), XmlEvent::Text(text)) => prev.push_str(&text),
            (_, event) => merged.push(event),
        }
    }
    assert_eq!(
        merged,
        vec![
            start(Some("urn:a"), "a", &[]),
            start(Some("urn:a"), "b", &[]),
            XmlEvent::Text("t&u".to_string()),
            XmlEvent::End,
            XmlEvent::End,
        ]
    );
}

#[test]
fn depth_tracking() {
    let mut reader = EventReader::new();
    reader.feed(b"<a><b>").unwrap();
    assert_eq!(reader.depth(), 2);
    reader.feed(b"</b>").unwrap();
    assert_eq!(reader.depth(), 1);
}

#[test]
fn reader_errors() {
    assert_eq!(
        read_events("<p:a/>"),
        Err(XmlError::UnboundPrefix("p".to_string()))
    );
    assert_eq!(
        read_events("<a><b></a>"),
        Err(XmlError::TagMismatch {
            expected: "b".to_string(),
            found: "a".to_string()
        })
    );
    assert_eq!(
        read_events("<a xmlns:p='u' xmlns:q='u' p:x='1' q:x='2'/>"),
        Err(XmlError::DuplicateAttribute("q:x".to_string()))
    );
    assert!(matches!(
        read_events("<a><!DOCTYPE a></a>"),
        Err(XmlError::Syntax { .. })
    ));
    assert!(matches!(read_events("<a>"), Err(XmlError::Syntax { .. })));
}

#[test]
fn writer_preserves_document() {
    let xml = "<message xmlns='jabber:client' to='a@b'><body>hi &amp; bye</body><x xmlns='urn:x'/></message>";
    let mut writer = XmlWriter::new();
    write(&read_events(xml).unwrap(), &mut writer);
    assert_eq!(writer.into_string(), xml);
}

#[test]
fn writer_namespace_changes() {
    let mut writer = XmlWriter::new();
    write(
        &[
            start(Some("urn:a"), "a", &[]),
            start(None, "b", &[]),
            XmlEvent::End,
            start(Some("urn:a"), "c", &[]),
            XmlEvent::End,
            XmlEvent::End,
        ],
        &mut writer,
    );
    assert_eq!(
        writer.into_string(),
        "<a xmlns='urn:a'><b xmlns=''/><c/></a>"
    );
}

#[test]
fn writer_attribute_namespaces() {
    let mut attrs = Attributes::new();
    attrs.insert(Tag::xml_lang(), "de".to_string());
    attrs.insert(Tag::qualified("urn:ext", "flag"), "1".to_string());
    let mut writer = XmlWriter::new();
    writer.start(&Tag::qualified("urn:a", "a"), &attrs).unwrap();
    writer.end().unwrap();
    assert_eq!(
        writer.into_string(),
        "<a xmlns='urn:a' xmlns:ns0='urn:ext' xml:lang='de' ns0:flag='1'/>"
    );
}

#[test]
fn writer_in_stream() {
    let mut writer = XmlWriter::new();
    writer.start_prefix_mapping(Some("stream"), STREAMS).unwrap();
    writer.start_prefix_mapping(None, CLIENT).unwrap();
    writer
        .start(&Tag::qualified(STREAMS, "stream"), &Attributes::new())
        .unwrap();
    assert_eq!(
        writer.take_output(),
        "<stream:stream xmlns='jabber:client' xmlns:stream='http://etherx.jabber.org/streams'>"
    );

    let mut writer = XmlWriter::in_stream(CLIENT);
    write(
        &[
            start(Some(CLIENT), "presence", &[("type", "unavailable")]),
            XmlEvent::End,
        ],
        &mut writer,
    );
    assert_eq!(writer.into_string(), "<presence type='unavailable'/>");
}

#[test]
fn writer_escapes() {
    let mut writer = XmlWriter::new();
    write(
        &[
            start(None, "a", &[("q", "it's <x>")]),
            XmlEvent::Text("1 < 2 & 3".to_string()),
            XmlEvent::End,
        ],
        &mut writer,
    );
    let out = writer.into_string();
    assert_eq!(read_events(&out).unwrap()[1], XmlEvent::Text("1 < 2 & 3".to_string()));
    assert!(out.contains("&lt;x&gt;"));
}

#[test]
fn writer_unbalanced() {
    let mut writer = XmlWriter::new();
    assert!(matches!(writer.end(), Err(XmlError::Unbalanced(_))));
    assert!(matches!(writer.text("x"), Err(XmlError::Unbalanced(_))));
}

#[test]
fn element_tree() {
    let element = Element::parse(
        "<iq xmlns='jabber:client' type='get' id='1'><query xmlns='urn:q'>a<item/>b</query></iq>",
    )
    .unwrap();
    assert_eq!(element.tag, Tag::qualified(CLIENT, "iq"));
    assert_eq!(element.attr(&Tag::local("type")), Some("get"));
    let query = element.find_child(&Tag::qualified("urn:q", "query")).unwrap();
    assert_eq!(query.text(), "ab");
    assert_eq!(query.elements().count(), 1);
    assert!(element.find_child(&Tag::qualified(CLIENT, "query")).is_none());
    assert_eq!(
        element.to_string(),
        "<iq xmlns='jabber:client' type='get' id='1'><query xmlns='urn:q'>a<item/>b</query></iq>"
    );
}

#[test]
fn element_builder_sink() {
    let element = Element::new(Tag::qualified("urn:a", "a"))
        .with_attr(Tag::local("k"), "v")
        .with_child(Element::new(Tag::qualified("urn:a", "b")).with_text("x"));
    let mut builder = ElementBuilder::new();
    element.write_events(&mut builder).unwrap();
    assert_eq!(builder.take(), Some(element));
    assert_eq!(builder.take(), None);
}

#[test]
fn element_event_errors() {
    assert!(matches!(
        Element::from_events(vec![XmlEvent::End]),
        Err(XmlError::Unbalanced(_))
    ));
    assert!(matches!(
        Element::from_events(vec![start(None, "a", &[])]),
        Err(XmlError::Unbalanced(_))
    ));
    assert!(matches!(
        Element::from_events(vec![
            start(None, "a", &[]),
            XmlEvent::End,
            start(None, "b", &[]),
        ]),
        Err(XmlError::Unbalanced(_))
    ));
}

#[test]
fn event_collector_merges_text() {
    let mut collector = EventCollector::new();
    collector.start(&Tag::local("a"), &Attributes::new()).unwrap();
    collector.text("x").unwrap();
    collector.text("").unwrap();
    collector.text("y").unwrap();
    collector.end().unwrap();
    assert_eq!(
        collector.into_events(),
        vec![start(None, "a", &[]), XmlEvent::Text("xy".to_string()), XmlEvent::End]
    );
}

#[test]
fn whitespace_detection() {
    assert!(is_xml_whitespace(" \t\r\n"));
    assert!(is_xml_whitespace(""));
    assert!(!is_xml_whitespace(" x "));
}
