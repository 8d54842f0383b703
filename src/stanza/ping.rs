/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use once_cell::sync::Lazy;

use crate::xml::Tag;
use crate::xso::Schema;
use crate::xso::XsoClass;

use super::constants::PING_NS;

/// Application level ping payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ping;

impl XsoClass for Ping {
    fn schema() -> &'static Schema<Self> {
        static SCHEMA: Lazy<Schema<Ping>> =
            Lazy::new(|| Schema::builder(Tag::qualified(PING_NS, "ping")).build_static());
        &SCHEMA
    }
}
