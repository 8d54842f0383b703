/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::ops::Deref;

use indexmap::IndexMap;

use super::LanguageRange;
use super::LanguageTag;
use super::Xso;
use super::XsoItem;
use super::lookup_language;

/// Ordered child objects with filtering helpers.
#[derive(Clone, Debug, PartialEq)]
pub struct XsoList<X> {
    items: Vec<X>,
}

impl<X> Default for XsoList<X> {
    fn default() -> Self {
        XsoList { items: Vec::new() }
    }
}

impl<X> Deref for XsoList<X> {
    type Target = [X];

    fn deref(&self) -> &[X] {
        &self.items
    }
}

impl<X> From<Vec<X>> for XsoList<X> {
    fn from(items: Vec<X>) -> Self {
        XsoList { items }
    }
}

impl<X> FromIterator<X> for XsoList<X> {
    fn from_iter<I: IntoIterator<Item = X>>(iter: I) -> Self {
        XsoList {
            items: iter.into_iter().collect(),
        }
    }
}

impl<X> IntoIterator for XsoList<X> {
    type Item = X;
    type IntoIter = std::vec::IntoIter<X>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<X: XsoItem> XsoList<X> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: X) {
        self.items.push(item);
    }

    pub fn remove(&mut self, index: usize) -> X {
        self.items.remove(index)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Items which are instances of `C`.
    pub fn filter_type<C: Xso>(&self) -> impl Iterator<Item = &C> {
        self.items
            .iter()
            .filter_map(|item| item.as_xso().as_any().downcast_ref::<C>())
    }

    /// Items in the best matching language.
    ///
    /// The language is chosen by RFC 4647 lookup among the languages
    /// present, falling back to the first language present.
    pub fn filter_lang(&self, ranges: &[LanguageRange]) -> impl Iterator<Item = &X> {
        let present: Vec<&LanguageTag> = self
            .items
            .iter()
            .filter_map(|item| item.as_xso().xso_lang())
            .collect();
        let selected = lookup_language(present.iter().copied(), ranges)
            .or_else(|| present.first().copied())
            .cloned();
        self.items
            .iter()
            .filter(move |item| item.as_xso().xso_lang() == selected.as_ref())
    }

    pub fn filter_by<'a>(
        &'a self,
        predicate: impl Fn(&X) -> bool + 'a,
    ) -> impl Iterator<Item = &'a X> {
        self.items.iter().filter(move |item| predicate(*item))
    }
}

/// Text alternatives keyed by language. `None` holds text without a
/// language.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LanguageMap {
    map: IndexMap<Option<LanguageTag>, String>,
}

impl LanguageMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, lang: Option<LanguageTag>, text: &str) {
        self.map.insert(lang, text.to_string());
    }

    pub fn get(&self, lang: Option<&LanguageTag>) -> Option<&str> {
        self.map.get(&lang.cloned()).map(String::as_str)
    }

    /// Best text for the given preferences.
    ///
    /// Lookup among the tagged texts first, then the untagged text, then
    /// whichever text came first.
    pub fn lookup(&self, ranges: &[LanguageRange]) -> Option<&str> {
        let tagged = self.map.keys().flatten();
        if let Some(lang) = lookup_language(tagged, ranges) {
            return self.get(Some(lang));
        }
        self.map
            .get(&None::<LanguageTag>)
            .or_else(|| self.map.values().next())
            .map(String::as_str)
    }

    pub fn remove(&mut self, lang: Option<&LanguageTag>) -> Option<String> {
        self.map.shift_remove(&lang.cloned())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Option<&LanguageTag>, &str)> {
        self.map
            .iter()
            .map(|(lang, text)| (lang.as_ref(), text.as_str()))
    }

    pub fn as_map(&self) -> &IndexMap<Option<LanguageTag>, String> {
        &self.map
    }

    pub fn as_map_mut(&mut self) -> &mut IndexMap<Option<LanguageTag>, String> {
        &mut self.map
    }
}
