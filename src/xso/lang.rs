/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;

use super::CodecError;

/// A BCP 47 language tag as carried by `xml:lang`.
///
/// Comparison and hashing ignore ASCII case, the original spelling is kept
/// for serialization.
#[derive(Clone, Debug)]
pub struct LanguageTag {
    tag: String,
    folded: String,
}

impl LanguageTag {
    pub fn parse(s: &str) -> Result<LanguageTag, CodecError> {
        let valid = !s.is_empty()
            && s.split('-').all(|subtag| {
                (1..=8).contains(&subtag.len()) && subtag.bytes().all(|b| b.is_ascii_alphanumeric())
            });
        if !valid {
            return Err(CodecError::new(s, "language tag", "not a sequence of 1-8 character subtags"));
        }
        Ok(LanguageTag {
            tag: s.to_string(),
            folded: s.to_ascii_lowercase(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.tag
    }

    /// Lowercased form used for matching.
    pub fn match_str(&self) -> &str {
        &self.folded
    }
}

impl PartialEq for LanguageTag {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded
    }
}

impl Eq for LanguageTag {}

impl Hash for LanguageTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
    }
}

impl Display for LanguageTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag)
    }
}

impl TryFrom<&str> for LanguageTag {
    type Error = CodecError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        LanguageTag::parse(s)
    }
}

/// A language priority list entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LanguageRange {
    Wildcard,
    Tag(LanguageTag),
}

impl LanguageRange {
    pub fn parse(s: &str) -> Result<LanguageRange, CodecError> {
        if s == "*" {
            Ok(LanguageRange::Wildcard)
        } else {
            LanguageTag::parse(s).map(LanguageRange::Tag)
        }
    }
}

impl From<LanguageTag> for LanguageRange {
    fn from(tag: LanguageTag) -> Self {
        LanguageRange::Tag(tag)
    }
}

/// RFC 4647 lookup of the best available tag for a priority list.
///
/// Each range is progressively truncated from the end, also dropping a
/// trailing single character subtag, until it matches an available tag.
/// Wildcards take no part in lookup.
pub fn lookup_language<'a>(
    available: impl IntoIterator<Item = &'a LanguageTag> + Clone,
    ranges: &[LanguageRange],
) -> Option<&'a LanguageTag> {
    for range in ranges {
        let LanguageRange::Tag(tag) = range else {
            continue;
        };
        let mut prefix = tag.match_str();
        loop {
            if let Some(found) = available
                .clone()
                .into_iter()
                .find(|candidate| candidate.match_str() == prefix)
            {
                return Some(found);
            }
            let Some(pos) = prefix.rfind('-') else {
                break;
            };
            prefix = &prefix[..pos];
            if let Some(pos) = prefix.rfind('-') {
                if prefix.len() - pos == 2 {
                    prefix = &prefix[..pos];
                }
            }
        }
    }
    None
}
