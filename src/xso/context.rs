/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use crate::xml::Attributes;
use crate::xml::Tag;

use super::LanguageTag;

/// State inherited down the element tree during one top level decode.
///
/// Every element gets its own copy, so overrides never leak to siblings
/// or the parent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParseContext {
    pub lang: Option<LanguageTag>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lang(lang: LanguageTag) -> Self {
        ParseContext { lang: Some(lang) }
    }

    /// Context for the element carrying `attrs`.
    ///
    /// An empty `xml:lang` resets the language, an invalid one leaves the
    /// inherited value in place.
    pub fn enter(&self, attrs: &Attributes) -> ParseContext {
        let mut ctx = self.clone();
        if let Some(value) = attrs.get(&Tag::xml_lang()) {
            if value.is_empty() {
                ctx.lang = None;
            } else if let Ok(lang) = LanguageTag::parse(value) {
                ctx.lang = Some(lang);
            }
        }
        ctx
    }
}
