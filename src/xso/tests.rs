/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use proptest::prelude::*;

use super::*;
use crate::xml::normalize_tag;
use crate::xml::tag_to_wire_string;

const NS: &str = "urn:example:test";
const BEACON_NS: &str = "urn:example:beacon";

fn tag(name: &str) -> Tag {
    Tag::qualified(NS, name)
}

fn lang(s: &str) -> LanguageTag {
    LanguageTag::parse(s).unwrap()
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Item {
    name: Option<String>,
    lang: Option<LanguageTag>,
}

impl XsoClass for Item {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Item>> = Lazy::new(|| {
            Schema::builder(tag("item"))
                .attr(Attr::local("name", StringCodec, |i: &Item| i.name.as_ref(), |i, v| i.name = v))
                .attr(Attr::xml_lang(|i: &Item| i.lang.as_ref(), |i, v| i.lang = v))
                .lang(|i: &Item| i.lang.as_ref())
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Note {
    text: Option<String>,
}

impl XsoClass for Note {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Note>> = Lazy::new(|| {
            Schema::builder(tag("note"))
                .text(Text::new("text", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Mood {
    Happy,
    Sad,
}

const MOODS: &[(&str, Mood)] = &[("happy", Mood::Happy), ("sad", Mood::Sad)];

#[derive(Clone, Debug, Default, PartialEq)]
struct Container {
    id: String,
    count: Option<u32>,
    enabled: Option<bool>,
    lang: Option<LanguageTag>,
    items: XsoList<Item>,
    note: Option<Note>,
    urgent: bool,
    mood: Option<Mood>,
    headers: IndexMap<String, Vec<String>>,
    subjects: LanguageMap,
    extra: Vec<Element>,
    loaded: bool,
}

impl XsoClass for Container {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Container>> = Lazy::new(|| {
            Schema::builder(tag("container"))
                .attr(
                    Attr::local(
                        "id",
                        StringCodec,
                        |c: &Container| Some(&c.id),
                        |c, v| {
                            if let Some(v) = v {
                                c.id = v;
                            }
                        },
                    )
                    .required(),
                )
                .attr(
                    Attr::local("count", Integer::<u32>::new(), |c: &Container| c.count.as_ref(), |c, v| c.count = v)
                        .default_value(0),
                )
                .attr(
                    Attr::local("enabled", BoolCodec, |c: &Container| c.enabled.as_ref(), |c, v| c.enabled = v)
                        .erroneous_as_absent(),
                )
                .attr(Attr::xml_lang(|c: &Container| c.lang.as_ref(), |c, v| c.lang = v))
                .child(ChildList::new(
                    "items",
                    Candidates::of::<Item>(),
                    |c: &Container| &c.items,
                    |c| &mut c.items,
                ))
                .child(Child::new(
                    "note",
                    Candidates::of::<Note>(),
                    |c: &Container| &c.note,
                    |c| &mut c.note,
                ))
                .child(ChildFlag::new(
                    "urgent",
                    tag("urgent"),
                    |c: &Container| c.urgent,
                    |c, v| c.urgent = v,
                ))
                .child(
                    ChildTag::new(
                        "mood",
                        MOODS.iter().map(|(name, mood)| (tag(name), *mood)).collect(),
                        |c: &Container| &c.mood,
                        |c| &mut c.mood,
                    )
                    .allow_none(),
                )
                .child(ChildValueMultiMap::new(
                    "headers",
                    KeyedText::new(tag("header"), Tag::local("name")),
                    |c: &Container| &c.headers,
                    |c| &mut c.headers,
                ))
                .child(ChildValueMap::new(
                    "subjects",
                    LangText::new(tag("subject")),
                    |c: &Container| c.subjects.as_map(),
                    |c| c.subjects.as_map_mut(),
                ))
                .collector(|c: &Container| &c.extra, |c| &mut c.extra)
                .unknown_attrs(UnknownPolicy::Drop)
                .build_static()
        });
        &SCHEMA
    }

    fn after_load(&mut self) {
        self.loaded = true;
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Bag {
    items: XsoList<Item>,
}

impl XsoClass for Bag {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Bag>> = Lazy::new(|| {
            Schema::builder(tag("bag"))
                .child(ChildList::new(
                    "items",
                    Candidates::of::<Item>(),
                    |b: &Bag| &b.items,
                    |b| &mut b.items,
                ))
                .unknown_children(UnknownPolicy::Drop)
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Counter {
    value: Option<i64>,
}

impl XsoClass for Counter {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Counter>> = Lazy::new(|| {
            Schema::builder(tag("counter"))
                .text(Text::new(
                    "value",
                    Integer::<i64>::new(),
                    |c: &Counter| c.value.as_ref(),
                    |c, v| c.value = v,
                ))
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Range {
    low: Option<i64>,
    high: Option<i64>,
    note: Option<Note>,
}

impl XsoClass for Range {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Range>> = Lazy::new(|| {
            Schema::builder(tag("range"))
                .attr(Attr::local("low", Integer::<i64>::new(), |r: &Range| r.low.as_ref(), |r, v| r.low = v))
                .attr(Attr::local("high", Integer::<i64>::new(), |r: &Range| r.high.as_ref(), |r, v| r.high = v))
                .child(
                    Child::new(
                        "note",
                        Candidates::of::<Note>(),
                        |r: &Range| &r.note,
                        |r| &mut r.note,
                    )
                    .required(),
                )
                .build_static()
        });
        &SCHEMA
    }

    fn validate(&self) -> Result<(), XsoError> {
        Self::schema().validate_children(self)?;
        if let (Some(low), Some(high)) = (self.low, self.high) {
            if low > high {
                return Err(XsoError::Validation("low is above high".to_string()));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
struct Beacon {
    seq: Option<u32>,
}

impl XsoClass for Beacon {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Beacon>> = Lazy::new(|| {
            Schema::builder(Tag::qualified(BEACON_NS, "beacon"))
                .attr(
                    Attr::local("seq", Integer::<u32>::new(), |p: &Beacon| p.seq.as_ref(), |p, v| p.seq = v)
                        .required(),
                )
                .build_static()
        });
        &SCHEMA
    }
}

/// Same tag as [Beacon], different class.
#[derive(Clone, Debug, Default, PartialEq)]
struct BeaconV2;

impl XsoClass for BeaconV2 {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<BeaconV2>> =
            Lazy::new(|| Schema::builder(Tag::qualified(BEACON_NS, "beacon")).build_static());
        &SCHEMA
    }
}

static PAYLOADS: Lazy<ClassRegistry> = Lazy::new(|| {
    let registry = ClassRegistry::new();
    registry.register::<Beacon>().unwrap();
    registry
});

#[derive(Clone, Debug, Default, PartialEq)]
struct Envelope {
    payload: Option<Box<dyn Xso>>,
    failures: Vec<Option<&'static str>>,
}

impl XsoClass for Envelope {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Envelope>> = Lazy::new(|| {
            Schema::builder(tag("envelope"))
                .child(
                    Child::new(
                        "payload",
                        Candidates::open(&PAYLOADS),
                        |e: &Envelope| &e.payload,
                        |e| &mut e.payload,
                    )
                    .strict(),
                )
                .build_static()
        });
        &SCHEMA
    }

    fn handle_error(&mut self, failure: &DecodeFailure) -> bool {
        self.failures.push(failure.field);
        matches!(failure.offender, Offender::Child(_))
    }
}

fn top_level_events(xml: &str) -> Vec<XmlEvent> {
    let mut events = read_events(&format!("<w>{xml}</w>")).unwrap();
    events.pop();
    events.remove(0);
    events
}

const CONTAINER: &str = "<container xmlns='urn:example:test' id='c1' count='3' xml:lang='de' unknown='dropped'>\
    <item name='a'/>\n  <item name='b' xml:lang='en'/>\
    <note>hello</note><urgent/><happy/>\
    <header name='X'>1</header><header name='Y'>3</header><header name='X'>2</header>\
    <subject>Betreff</subject><subject xml:lang='en'>Subject</subject>\
    <ext xmlns='urn:other'><deep/></ext>\
    </container>";

#[test]
fn decode_all_descriptor_kinds() {
    let c: Container = from_str(CONTAINER).unwrap();
    assert_eq!(c.id, "c1");
    assert_eq!(c.count, Some(3));
    assert_eq!(c.enabled, None);
    assert_eq!(c.lang, Some(lang("de")));
    assert_eq!(c.items.len(), 2);
    assert_eq!(c.items[0].name.as_deref(), Some("a"));
    assert_eq!(c.items[0].lang, Some(lang("de")));
    assert_eq!(c.items[1].lang, Some(lang("en")));
    assert_eq!(c.note.as_ref().and_then(|n| n.text.as_deref()), Some("hello"));
    assert!(c.urgent);
    assert_eq!(c.mood, Some(Mood::Happy));
    assert_eq!(c.headers["X"], vec!["1".to_string(), "2".to_string()]);
    assert_eq!(c.headers["Y"], vec!["3".to_string()]);
    assert_eq!(c.headers.keys().collect::<Vec<_>>(), vec!["X", "Y"]);
    assert_eq!(c.subjects.get(Some(&lang("de"))), Some("Betreff"));
    assert_eq!(c.subjects.get(Some(&lang("EN"))), Some("Subject"));
    assert_eq!(c.extra.len(), 1);
    assert_eq!(c.extra[0].tag, Tag::qualified("urn:other", "ext"));
    assert!(c.loaded);
}

#[test]
fn round_trip() {
    let c: Container = from_str(CONTAINER).unwrap();
    let xml = to_string(&c).unwrap();
    let again: Container = from_str(&xml).unwrap();
    assert_eq!(again, c);
}

#[test]
fn encode_in_declaration_order() {
    let c = Container {
        id: "c1".to_string(),
        count: Some(0),
        items: vec![Item {
            name: Some("a".to_string()),
            lang: None,
        }]
        .into(),
        urgent: true,
        mood: Some(Mood::Sad),
        extra: vec![Element::new(Tag::qualified("urn:other", "ext"))],
        ..Default::default()
    };
    assert_eq!(
        to_string(&c).unwrap(),
        "<container xmlns='urn:example:test' id='c1'><item name='a'/><urgent/><sad/><ext xmlns='urn:other'/></container>"
    );
    assert!(!c.loaded);
}

#[test]
fn required_attribute() {
    assert_eq!(
        from_str::<Container>("<container xmlns='urn:example:test'/>"),
        Err(XsoError::MissingAttribute(Tag::local("id")))
    );
    let mut c = Container::default();
    c.count = Some(1);
    assert!(to_string(&c).is_ok());
    let beacon = Beacon::default();
    assert_eq!(
        to_string(&beacon),
        Err(XsoError::MissingAttribute(Tag::local("seq")))
    );
}

#[test]
fn attribute_codec_failures() {
    let err = from_str::<Container>("<container xmlns='urn:example:test' id='c' count='many'/>").unwrap_err();
    assert!(matches!(err, XsoError::Codec { field: "count", .. }));

    let c: Container = from_str("<container xmlns='urn:example:test' id='c' enabled='maybe'/>").unwrap();
    assert_eq!(c.enabled, None);
    let c: Container = from_str("<container xmlns='urn:example:test' id='c' enabled='1'/>").unwrap();
    assert_eq!(c.enabled, Some(true));
    assert_eq!(c.count, Some(0));
}

#[test]
fn unknown_attribute_policy() {
    assert_eq!(
        from_str::<Item>("<item xmlns='urn:example:test' foo='x'/>"),
        Err(XsoError::UnknownAttribute(Tag::local("foo")))
    );
    assert!(from_str::<Container>("<container xmlns='urn:example:test' id='c' foo='x'/>").is_ok());
}

#[test]
fn unknown_child_policy() {
    assert_eq!(
        from_str::<Item>("<item xmlns='urn:example:test'><x/></item>"),
        Err(XsoError::UnknownChild(tag("x")))
    );
}

#[test]
fn dropped_subtree_keeps_cursor_in_sync() {
    let bag: Bag = from_str(
        "<bag xmlns='urn:example:test'>\
         <item name='1'/>\
         <junk><item name='x'/><deeper><item/></deeper></junk>\
         <item name='3'/>\
         </bag>",
    )
    .unwrap();
    let names: Vec<_> = bag.items.iter().map(|i| i.name.as_deref()).collect();
    assert_eq!(names, vec![Some("1"), Some("3")]);
}

#[test]
fn text_policy() {
    assert_eq!(
        from_str::<Item>("<item xmlns='urn:example:test'>text</item>"),
        Err(XsoError::UnexpectedText)
    );
    assert!(from_str::<Item>("<item xmlns='urn:example:test'> \n </item>").is_ok());
}

#[test]
fn text_parsed_once() {
    let counter: Counter =
        from_str("<counter xmlns='urn:example:test'>1<!-- split -->2<![CDATA[3]]></counter>").unwrap();
    assert_eq!(counter.value, Some(123));

    let empty: Counter = from_str("<counter xmlns='urn:example:test'/>").unwrap();
    assert_eq!(empty.value, None);

    let err = from_str::<Counter>("<counter xmlns='urn:example:test'>x</counter>").unwrap_err();
    assert!(matches!(err, XsoError::Codec { field: "value", .. }));
}

#[test]
fn required_child_and_validate() {
    assert_eq!(
        from_str::<Range>("<range xmlns='urn:example:test' low='1' high='2'/>"),
        Err(XsoError::MissingChild("note"))
    );
    let range: Range =
        from_str("<range xmlns='urn:example:test' low='1' high='2'><note/></range>").unwrap();
    assert_eq!(range.note, Some(Note::default()));
    assert!(matches!(
        from_str::<Range>("<range xmlns='urn:example:test' low='3' high='2'><note/></range>"),
        Err(XsoError::Validation(_))
    ));
}

#[test]
fn last_child_wins() {
    let c: Container = from_str(
        "<container xmlns='urn:example:test' id='c'><note>one</note><note>two</note><sad/><happy/></container>",
    )
    .unwrap();
    assert_eq!(c.note.and_then(|n| n.text).as_deref(), Some("two"));
    assert_eq!(c.mood, Some(Mood::Happy));
}

#[test]
fn open_registry_payload() {
    let envelope: Envelope = from_str(
        "<envelope xmlns='urn:example:test'><beacon xmlns='urn:example:beacon' seq='4'/></envelope>",
    )
    .unwrap();
    let beacon = envelope.payload.as_ref().and_then(|p| p.downcast_ref::<Beacon>());
    assert_eq!(beacon, Some(&Beacon { seq: Some(4) }));
    assert!(envelope.failures.is_empty());
    assert_eq!(
        to_string(&envelope).unwrap(),
        "<envelope xmlns='urn:example:test'><beacon xmlns='urn:example:beacon' seq='4'/></envelope>"
    );
}

#[test]
fn error_hook_suppresses_bad_payload() {
    let envelope: Envelope = from_str(
        "<envelope xmlns='urn:example:test'><beacon xmlns='urn:example:beacon' seq='x'><a/></beacon></envelope>",
    )
    .unwrap();
    assert!(envelope.payload.is_none());
    assert_eq!(envelope.failures, vec![Some("payload")]);

    let envelope: Envelope = from_str(
        "<envelope xmlns='urn:example:test'><other xmlns='urn:x'><b/></other></envelope>",
    )
    .unwrap();
    assert!(envelope.payload.is_none());
    assert_eq!(envelope.failures, vec![None]);
}

#[test]
fn strict_child_type() {
    let mut envelope = Envelope::default();
    envelope.payload = Some(Box::new(Beacon { seq: Some(1) }));
    assert!(envelope.validate().is_ok());

    envelope.payload = Some(Box::new(BeaconV2));
    assert!(matches!(envelope.validate(), Err(XsoError::TypeMismatch { .. })));
    assert!(matches!(to_string(&envelope), Err(XsoError::TypeMismatch { .. })));
}

#[test]
fn ambiguous_registration() {
    let first = ClassRegistry::new();
    first.register::<Beacon>().unwrap();
    assert!(matches!(
        first.register::<BeaconV2>(),
        Err(XsoError::AmbiguousRegistration(_))
    ));

    let second = ClassRegistry::new();
    second.register::<BeaconV2>().unwrap();
    assert!(matches!(
        second.register::<Beacon>(),
        Err(XsoError::AmbiguousRegistration(_))
    ));

    assert!(second.unregister(&Tag::qualified(BEACON_NS, "beacon")).is_some());
    second.register::<Beacon>().unwrap();
}

#[test]
fn ambiguous_schema() {
    let twice = Schema::<Note>::builder(tag("n"))
        .attr(Attr::local("a", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
        .attr(Attr::local("a", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
        .build();
    assert!(matches!(twice, Err(XsoError::Schema { .. })));

    let two_texts = Schema::<Note>::builder(tag("n"))
        .text(Text::new("a", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
        .text(Text::new("b", StringCodec, |n: &Note| n.text.as_ref(), |n, v| n.text = v))
        .build();
    assert!(matches!(two_texts, Err(XsoError::Schema { .. })));

    let same_child = Schema::<Container>::builder(tag("n"))
        .child(ChildFlag::new("a", tag("f"), |c: &Container| c.urgent, |c, v| c.urgent = v))
        .child(ChildFlag::new("b", tag("f"), |c: &Container| c.urgent, |c, v| c.urgent = v))
        .build();
    assert!(matches!(same_child, Err(XsoError::Schema { .. })));
}

#[test]
fn top_level_dispatch() {
    let items = Arc::new(Mutex::new(Vec::new()));
    let sink = items.clone();
    let mut parser = XsoParser::new();
    parser
        .add_class::<Item>(move |item| sink.lock().push(item))
        .unwrap();
    assert!(parser.add_class::<Item>(|_| ()).is_err());

    let mut errors = Vec::new();
    for event in top_level_events(
        "<item xmlns='urn:example:test' name='a'/>\
         <unknown xmlns='urn:x'><item xmlns='urn:example:test'/></unknown>\
         <item xmlns='urn:example:test' name='b' bad='1'><x/></item>\
         <item xmlns='urn:example:test' name='c'/>",
    ) {
        if let Err(err) = parser.feed(event) {
            errors.push(err);
        }
    }
    assert!(parser.is_idle());
    assert_eq!(errors.len(), 2);
    assert!(matches!(errors[0], XsoError::UnknownTopLevelTag { .. }));
    assert!(matches!(errors[1], XsoError::UnknownAttribute(_)));
    let names: Vec<_> = items.lock().iter().map(|i| i.name.clone()).collect();
    assert_eq!(names, vec![Some("a".to_string()), Some("c".to_string())]);

    assert!(parser.remove_class(&tag("item")));
    assert!(matches!(
        parser.feed(top_level_events("<item xmlns='urn:example:test'/>").remove(0)),
        Err(XsoError::UnknownTopLevelTag { .. })
    ));
}

#[test]
fn parser_context_language() {
    let items = Arc::new(Mutex::new(Vec::new()));
    let sink = items.clone();
    let mut parser = XsoParser::with_context(ParseContext::with_lang(lang("fr")));
    parser
        .add_class::<Item>(move |item| sink.lock().push(item))
        .unwrap();
    for event in top_level_events("<item xmlns='urn:example:test'/><item xmlns='urn:example:test' xml:lang=''/>") {
        parser.feed(event).unwrap();
    }
    let langs: Vec<_> = items.lock().iter().map(|i| i.lang.clone()).collect();
    assert_eq!(langs, vec![Some(lang("fr")), None]);
}

#[test]
fn list_filters() {
    let items: XsoList<Item> = ["en", "de", "de"]
        .iter()
        .enumerate()
        .map(|(n, l)| Item {
            name: Some(n.to_string()),
            lang: Some(lang(l)),
        })
        .collect();
    let names = |selected: Vec<&Item>| -> Vec<String> {
        selected.iter().filter_map(|i| i.name.clone()).collect()
    };
    let de = [LanguageRange::parse("de-AT").unwrap()];
    assert_eq!(names(items.filter_lang(&de).collect()), vec!["1", "2"]);
    let fr = [LanguageRange::parse("fr").unwrap()];
    assert_eq!(names(items.filter_lang(&fr).collect()), vec!["0"]);
    assert_eq!(
        names(items.filter_by(|i| i.name.as_deref() == Some("2")).collect()),
        vec!["2"]
    );

    let mixed: XsoList<Box<dyn Xso>> = vec![
        Box::new(Item::default()) as Box<dyn Xso>,
        Box::new(Note {
            text: Some("n".to_string()),
        }),
    ]
    .into();
    let notes: Vec<&Note> = mixed.filter_type::<Note>().collect();
    assert_eq!(notes.len(), 1);
    assert_eq!(mixed.filter_type::<Item>().count(), 1);
    assert_eq!(mixed.clone(), mixed);
}

#[test]
fn language_lookup() {
    let available = [lang("en"), lang("de-DE"), lang("zh-Hant-CN")];
    let find = |range: &str| {
        lookup_language(available.iter(), &[LanguageRange::parse(range).unwrap()]).cloned()
    };
    assert_eq!(find("de-de-1996"), Some(lang("de-DE")));
    assert_eq!(find("en-GB"), Some(lang("en")));
    assert_eq!(find("zh-Hant-CN-x-private"), Some(lang("zh-Hant-CN")));
    assert_eq!(find("fr"), None);
    assert_eq!(find("*"), None);
    assert_eq!(
        lookup_language(
            available.iter(),
            &[LanguageRange::parse("fr").unwrap(), LanguageRange::parse("en").unwrap()]
        ),
        Some(&lang("en"))
    );
    assert!(LanguageTag::parse("").is_err());
    assert!(LanguageTag::parse("toolongtag").is_err());
    assert_eq!(lang("EN-us"), lang("en-US"));
    assert_eq!(lang("EN-us").as_str(), "EN-us");
}

#[test]
fn language_map() {
    let mut map = LanguageMap::new();
    map.insert(None, "hi");
    map.insert(Some(lang("de")), "hallo");
    assert_eq!(map.lookup(&[LanguageRange::parse("de-AT").unwrap()]), Some("hallo"));
    assert_eq!(map.lookup(&[LanguageRange::parse("fr").unwrap()]), Some("hi"));
    assert_eq!(map.remove(None), Some("hi".to_string()));
    assert_eq!(map.lookup(&[LanguageRange::parse("fr").unwrap()]), Some("hallo"));
    assert_eq!(map.len(), 1);
}

#[test]
fn scalar_codecs() {
    assert_eq!(Integer::<i64>::new().parse(" 42 "), Ok(42));
    assert!(Integer::<u32>::new().parse("-1").is_err());
    assert_eq!(BoolCodec.parse("1"), Ok(true));
    assert_eq!(BoolCodec.parse("false"), Ok(false));
    assert!(BoolCodec.parse("yes").is_err());
    assert_eq!(BoolCodec.format(&true), "true");

    let dt = DateTimeCodec.parse("2024-05-01T10:20:30+02:00").unwrap();
    assert_eq!(DateTimeCodec.format(&dt), "2024-05-01T08:20:30Z");
    let date = DateCodec.parse("2024-02-29").unwrap();
    assert_eq!(DateCodec.format(&date), "2024-02-29");
    assert!(DateCodec.parse("2023-02-29").is_err());
    let time = TimeCodec.parse("12:30:00+02:00").unwrap();
    assert_eq!(TimeCodec.format(&time), "10:30:00Z");
    let time = TimeCodec.parse("23:59:59.5Z").unwrap();
    assert_eq!(TimeCodec.format(&time), "23:59:59.500Z");

    let plain = Base64Codec::default();
    assert_eq!(plain.parse("aG k=\n"), Ok(b"hi".to_vec()));
    assert_eq!(plain.format(&Vec::new()), "");
    let equal = Base64Codec { empty_as_equal: true };
    assert_eq!(equal.parse("="), Ok(Vec::new()));
    assert_eq!(equal.format(&Vec::new()), "=");
    assert!(plain.parse("!!").is_err());

    assert_eq!(HexCodec.parse("00ff10"), Ok(vec![0, 255, 16]));
    assert_eq!(HexCodec.format(&vec![0, 255, 16]), "00ff10");
    assert!(HexCodec.parse("abc").is_err());
    assert!(HexCodec.parse("zz").is_err());

    assert_eq!(JidCodec.parse("a@b/c").unwrap().full(), "a@b/c");
    assert!(JidCodec.parse("@b").is_err());

    let location = ConnectionLocationCodec;
    assert_eq!(location.parse("example.com:5222"), Ok(("example.com".to_string(), 5222)));
    assert_eq!(location.parse("[::1]:5222"), Ok(("::1".to_string(), 5222)));
    assert_eq!(location.format(&("::1".to_string(), 5222)), "[::1]:5222");
    assert!(location.parse("::1:5222").is_err());
    assert!(location.parse("host").is_err());
    assert!(location.parse("host:99999").is_err());

    let moods = EnumCodec::new(MOODS);
    assert_eq!(moods.parse("sad"), Ok(Mood::Sad));
    assert_eq!(moods.format(&Mood::Happy), "happy");
    let err = moods.parse("angry").unwrap_err();
    assert_eq!(err.text, "angry");

    let value = JsonCodec.parse(r#"{"a": [1, 2]}"#).unwrap();
    assert_eq!(value, serde_json::json!({"a": [1, 2]}));
    assert_eq!(JsonCodec.format(&value), r#"{"a":[1,2]}"#);
}

#[test]
fn element_codecs() {
    let ctx = ParseContext::with_lang(lang("de"));
    let codec = TextChild::new(tag("n"), Integer::<i64>::new());
    let element = codec.pack(&7);
    assert_eq!(element.to_string(), "<n xmlns='urn:example:test'>7</n>");
    assert_eq!(codec.unpack(&element, &ctx), Ok(7));

    let codec = LangText::new(tag("body"));
    let element = codec.pack(&(Some(lang("en")), "hi".to_string()));
    assert_eq!(element.attr(&Tag::xml_lang()), Some("en"));
    assert_eq!(
        codec.unpack(&element, &ctx.enter(&element.attrs)),
        Ok((Some(lang("en")), "hi".to_string()))
    );
    let plain = Element::new(tag("body")).with_text("hallo");
    assert_eq!(
        codec.unpack(&plain, &ctx.enter(&plain.attrs)),
        Ok((Some(lang("de")), "hallo".to_string()))
    );

    let codec = KeyedText::new(tag("header"), Tag::local("name"));
    let element = Element::new(tag("header"));
    assert_eq!(
        codec.unpack(&element, &ctx),
        Err(XsoError::MissingAttribute(Tag::local("name")))
    );
}

#[test]
fn dynamic_object_helpers() {
    let boxed: Box<dyn Xso> = Box::new(Note {
        text: Some("x".to_string()),
    });
    assert_eq!(boxed.xso_tag(), &tag("note"));
    assert!(boxed.is::<Note>());
    assert!(!boxed.is::<Item>());
    assert!(boxed.eq_xso(boxed.clone().as_ref()));
    let element = to_element(boxed.as_ref()).unwrap();
    let note: Note = from_element(&element, &ParseContext::default()).unwrap();
    assert_eq!(note.text.as_deref(), Some("x"));
    assert!(matches!(
        boxed.clone().downcast::<Item>(),
        Err(XsoError::TypeMismatch { .. })
    ));
    assert_eq!(*boxed.downcast::<Note>().unwrap(), note);
}

proptest! {
    #[test]
    fn tag_normalization_idempotent(
        namespace in proptest::option::of("[a-z:./]{0,12}"),
        name in "[a-zA-Z_][a-zA-Z0-9_.-]{0,8}",
    ) {
        let wire = match &namespace {
            Some(namespace) => format!("{{{namespace}}}{name}"),
            None => name.clone(),
        };
        let tag = normalize_tag(wire.as_str()).unwrap();
        prop_assert_eq!(normalize_tag(tag_to_wire_string(&tag).as_str()).unwrap(), tag);
    }
}
