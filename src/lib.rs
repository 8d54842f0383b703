/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod entities;
mod jid;
mod sax;

pub mod stanza;
pub mod xml;
pub mod xso;

#[cfg(feature = "broker")]
pub mod broker;

pub use sax::Location;
pub use sax::SaxElement;
pub use sax::SaxError;
pub use sax::SaxHandler;
pub use sax::SaxParser;

pub use jid::BadJid;
pub use jid::Jid;
