/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

//! Stream management nonzas.

use once_cell::sync::Lazy;

use crate::xml::Tag;
use crate::xso::Attr;
use crate::xso::BoolCodec;
use crate::xso::ChildTag;
use crate::xso::ConnectionLocationCodec;
use crate::xso::Integer;
use crate::xso::Schema;
use crate::xso::StringCodec;
use crate::xso::UnknownPolicy;
use crate::xso::XsoClass;

use super::ErrorCondition;
use super::constants::SM_NS;

fn sm_tag(name: &str) -> Tag {
    Tag::qualified(SM_NS, name)
}

/// Advertised in the stream features when the server supports SM.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmFeature;

impl XsoClass for SmFeature {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmFeature>> = Lazy::new(|| {
            Schema::builder(sm_tag("sm"))
                .unknown_children(UnknownPolicy::Drop)
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmEnable {
    pub resume: bool,
    pub max: Option<u32>,
}

impl XsoClass for SmEnable {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmEnable>> = Lazy::new(|| {
            Schema::builder(sm_tag("enable"))
                .attr(
                    Attr::local(
                        "resume",
                        BoolCodec,
                        |e: &SmEnable| Some(&e.resume),
                        |e, v| e.resume = v.unwrap_or(false),
                    )
                    .default_value(false),
                )
                .attr(Attr::local("max", Integer::<u32>::new(), |e: &SmEnable| e.max.as_ref(), |e, v| e.max = v))
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmEnabled {
    pub resume: bool,
    pub id: Option<String>,
    pub location: Option<(String, u16)>,
    pub max: Option<u32>,
}

impl XsoClass for SmEnabled {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmEnabled>> = Lazy::new(|| {
            Schema::builder(sm_tag("enabled"))
                .attr(
                    Attr::local(
                        "resume",
                        BoolCodec,
                        |e: &SmEnabled| Some(&e.resume),
                        |e, v| e.resume = v.unwrap_or(false),
                    )
                    .default_value(false),
                )
                .attr(Attr::local("id", StringCodec, |e: &SmEnabled| e.id.as_ref(), |e, v| e.id = v))
                .attr(Attr::local(
                    "location",
                    ConnectionLocationCodec,
                    |e: &SmEnabled| e.location.as_ref(),
                    |e, v| e.location = v,
                ))
                .attr(Attr::local("max", Integer::<u32>::new(), |e: &SmEnabled| e.max.as_ref(), |e, v| e.max = v))
                .build_static()
        });
        &SCHEMA
    }
}

/// Resumption request, `counter` is the number of stanzas received.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmResume {
    pub counter: u32,
    pub previd: String,
}

impl XsoClass for SmResume {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmResume>> = Lazy::new(|| {
            Schema::builder(sm_tag("resume"))
                .attr(
                    Attr::local(
                        "h",
                        Integer::<u32>::new(),
                        |r: &SmResume| Some(&r.counter),
                        |r, value| {
                            if let Some(value) = value {
                                r.counter = value;
                            }
                        },
                    )
                    .required(),
                )
                .attr(
                    Attr::local(
                        "previd",
                        StringCodec,
                        |r: &SmResume| Some(&r.previd),
                        |r, value| {
                            if let Some(value) = value {
                                r.previd = value;
                            }
                        },
                    )
                    .required(),
                )
                .build_static()
        });
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmResumed {
    pub counter: u32,
    pub previd: String,
}

impl XsoClass for SmResumed {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmResumed>> = Lazy::new(|| {
            Schema::builder(sm_tag("resumed"))
                .attr(
                    Attr::local(
                        "h",
                        Integer::<u32>::new(),
                        |r: &SmResumed| Some(&r.counter),
                        |r, value| {
                            if let Some(value) = value {
                                r.counter = value;
                            }
                        },
                    )
                    .required(),
                )
                .attr(
                    Attr::local(
                        "previd",
                        StringCodec,
                        |r: &SmResumed| Some(&r.previd),
                        |r, value| {
                            if let Some(value) = value {
                                r.previd = value;
                            }
                        },
                    )
                    .required(),
                )
                .build_static()
        });
        &SCHEMA
    }
}

/// Negotiation failure, optionally with the peer's counter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmFailed {
    pub condition: Option<ErrorCondition>,
    pub counter: Option<u32>,
}

impl XsoClass for SmFailed {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmFailed>> = Lazy::new(|| {
            Schema::builder(sm_tag("failed"))
                .attr(Attr::local("h", Integer::<u32>::new(), |f: &SmFailed| f.counter.as_ref(), |f, v| f.counter = v))
                .child(
                    ChildTag::new(
                        "condition",
                        ErrorCondition::markers(),
                        |f: &SmFailed| &f.condition,
                        |f| &mut f.condition,
                    )
                    .allow_none(),
                )
                .unknown_children(UnknownPolicy::Drop)
                .build_static()
        });
        &SCHEMA
    }
}

/// Request for an acknowledgement.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmRequest;

impl XsoClass for SmRequest {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmRequest>> =
            Lazy::new(|| Schema::builder(sm_tag("r")).build_static());
        &SCHEMA
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SmAck {
    pub counter: u32,
}

impl SmAck {
    pub fn new(counter: u32) -> Self {
        SmAck { counter }
    }
}

impl XsoClass for SmAck {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<SmAck>> = Lazy::new(|| {
            Schema::builder(sm_tag("a"))
                .attr(
                    Attr::local(
                        "h",
                        Integer::<u32>::new(),
                        |a: &SmAck| Some(&a.counter),
                        |a, value| {
                            if let Some(value) = value {
                                a.counter = value;
                            }
                        },
                    )
                    .required(),
                )
                .build_static()
        });
        &SCHEMA
    }
}
