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

/// A position in the tokenizer input.
///
/// An XMPP stream is a single never-ending document, so the position
/// counts every byte received since the last
/// [reset()](crate::SaxParser::reset). Reported with stream errors.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Location {
    /// Number of consumed bytes.
    pub bytes: usize,
    /// Number of consumed newline characters.
    pub lines: usize,
    /// Bytes consumed after the last newline character.
    pub column: usize,
}

impl Location {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn advance(&mut self, c: u8) {
        self.bytes += 1;
        if c == b'\n' {
            self.lines += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {} (byte {})", self.lines, self.column, self.bytes)
    }
}
