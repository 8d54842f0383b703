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

use std::fmt::Display;
use std::hash::Hash;
use std::hash::Hasher;
use std::num::NonZero;
use std::str::FromStr;

pub use error::BadJid;
use error::description;

const MAX_PART_SIZE: usize = 1023;

// RFC 7622 section 3.3.1 forbids these in the localpart.
const LOCAL_FORBIDDEN: &[char] = &['"', '&', '\'', '/', ':', '<', '>', '@'];

struct JidParts<'a> {
    local: Option<&'a str>,
    domain: &'a str,
    resource: Option<&'a str>,
}

impl<'a> JidParts<'a> {
    fn new(jid: &'a str) -> Result<JidParts<'a>, BadJid> {
        let slash_pos = jid.find('/');
        let at_pos = match slash_pos {
            Some(pos) => jid[..pos].find('@'),
            None => jid.find('@'),
        };
        let mut domain = match (at_pos, slash_pos) {
            (None, None) => jid,
            (Some(pos), None) => &jid[pos + 1..],
            (None, Some(pos)) => &jid[..pos],
            (Some(pos), Some(pos2)) => &jid[pos + 1..pos2],
        };
        if domain.ends_with('.') {
            // Remove final dot as per RFC 7622 section 3.2
            domain = &domain[..domain.len() - 1];
        }
        if domain.is_empty() {
            return Err(BadJid(description::DOMAIN_EMPTY));
        }
        if domain.len() > MAX_PART_SIZE {
            return Err(BadJid(description::DOMAIN_TOO_LONG));
        }
        let local = match at_pos {
            Some(0) => return Err(BadJid(description::LOCAL_EMPTY)),
            Some(pos) if pos > MAX_PART_SIZE => {
                return Err(BadJid(description::LOCAL_TOO_LONG));
            }
            Some(pos) => {
                let part = &jid[..pos];
                if part.contains(LOCAL_FORBIDDEN) {
                    return Err(BadJid(description::LOCAL_FORBIDDEN_CHAR));
                }
                Some(part)
            }
            None => None,
        };
        let resource = match slash_pos {
            Some(pos) => Some(check_resource(&jid[pos + 1..])?),
            None => None,
        };

        Ok(JidParts {
            local,
            domain,
            resource,
        })
    }
}

fn check_resource(resource: &str) -> Result<&str, BadJid> {
    if resource.is_empty() {
        return Err(BadJid(description::RESOURCE_EMPTY));
    }
    if resource.len() > MAX_PART_SIZE {
        return Err(BadJid(description::RESOURCE_TOO_LONG));
    }
    Ok(resource)
}

/// The address of an entity in the XMPP protocol.
///
/// Each JID has three parts:
/// - Local part: Optionally identifies a local entity on the domain.
/// - Domain part: Identifies an XMPP server.
/// - Resource part: Optionally identifies a session or an object.
///
/// More details can be found in [RFC7622](https://datatracker.ietf.org/doc/rfc7622/)
#[derive(Debug, Clone, Eq)]
pub struct Jid {
    full: String,
    slash_pos: Option<NonZero<u16>>,
    at_pos: Option<NonZero<u16>>,
}

impl Jid {
    /// Create a JID from a string.
    pub fn new(jid: &str) -> Result<Self, BadJid> {
        let parts = JidParts::new(jid)?;
        Ok(Self::from_parts(parts.local, parts.domain, parts.resource))
    }

    // Parts are validated, so every position is non-zero and fits the
    // three 1023 octet limits.
    fn from_parts(local: Option<&str>, domain: &str, resource: Option<&str>) -> Jid {
        let mut full = String::with_capacity(
            domain.len()
                + local.map_or(0, |local| local.len() + 1)
                + resource.map_or(0, |resource| resource.len() + 1),
        );
        let mut at_pos = None;
        if let Some(local) = local {
            full.push_str(local);
            at_pos = NonZero::new(full.len() as u16);
            full.push('@');
        }
        full.push_str(domain);
        let mut slash_pos = None;
        if let Some(resource) = resource {
            slash_pos = NonZero::new(full.len() as u16);
            full.push('/');
            full.push_str(resource);
        }
        Jid {
            full,
            slash_pos,
            at_pos,
        }
    }

    /// Full form of the JID with all the components.
    pub fn full(&self) -> &str {
        &self.full
    }

    /// Bare form of the JID without the resource part.
    pub fn bare(&self) -> &str {
        match self.slash_pos {
            Some(pos) => &self.full[..pos.get() as usize],
            None => &self.full,
        }
    }

    /// Only the local part of the JID.
    pub fn localpart(&self) -> Option<&str> {
        self.at_pos.map(|pos| &self.full[..pos.get() as usize])
    }

    /// Only the domain part of the JID.
    pub fn domainpart(&self) -> &str {
        let start = match self.at_pos {
            Some(pos) => pos.get() as usize + 1,
            None => 0,
        };
        let end = match self.slash_pos {
            Some(pos) => pos.get() as usize,
            None => self.full.len(),
        };
        &self.full[start..end]
    }

    /// Only the resource part of the JID.
    pub fn resourcepart(&self) -> Option<&str> {
        self.slash_pos
            .map(|pos| &self.full[pos.get() as usize + 1..])
    }

    /// True if the JID does not contain a resource part.
    pub fn is_bare(&self) -> bool {
        self.slash_pos.is_none()
    }

    /// The same address without the resource part.
    pub fn to_bare(&self) -> Jid {
        Self::from_parts(self.localpart(), self.domainpart(), None)
    }

    /// The domain of the address as a JID of its own.
    pub fn to_domain(&self) -> Jid {
        Self::from_parts(None, self.domainpart(), None)
    }

    /// Creates another JID by overriding the resource part.
    pub fn with_resource(&self, resource: &str) -> Result<Jid, BadJid> {
        let resource = check_resource(resource)?;
        Ok(Self::from_parts(
            self.localpart(),
            self.domainpart(),
            Some(resource),
        ))
    }
}

impl FromStr for Jid {
    type Err = BadJid;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Jid::new(s)
    }
}

impl TryFrom<&str> for Jid {
    type Error = BadJid;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Jid::new(s)
    }
}

impl Display for Jid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full)
    }
}

impl PartialEq for Jid {
    fn eq(&self, other: &Jid) -> bool {
        self.full == other.full
    }
}

impl PartialOrd for Jid {
    fn partial_cmp(&self, other: &Jid) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Jid {
    fn cmp(&self, other: &Jid) -> std::cmp::Ordering {
        self.full.cmp(&other.full)
    }
}

impl Hash for Jid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.full.hash(state)
    }
}
