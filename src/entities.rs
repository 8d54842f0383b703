/*
** This file is a part of Iksemel (XML parser for Jabber/XMPP)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Iksemel is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

pub fn escaped_size(s: &str) -> usize {
    s.chars()
        .map(|c| match c {
            '<' => predefined::LT.len(),
            '>' => predefined::GT.len(),
            '&' => predefined::AMP.len(),
            '\'' => predefined::APOS.len(),
            '"' => predefined::QUOT.len(),
            _ => c.len_utf8(),
        })
        .sum()
}

/// Appends the escaped form of `s` to `out`.
///
/// Both quote characters are escaped so the result is safe in character
/// data and in attribute values delimited by either quote.
pub fn escape_into(out: &mut String, s: &str) {
    out.reserve(escaped_size(s));
    let mut last = 0;
    for (pos, c) in s.char_indices() {
        let entity = match c {
            '<' => predefined::LT,
            '>' => predefined::GT,
            '&' => predefined::AMP,
            '\'' => predefined::APOS,
            '"' => predefined::QUOT,
            _ => continue,
        };
        out.push_str(&s[last..pos]);
        out.push_str(entity);
        last = pos + 1;
    }
    out.push_str(&s[last..]);
}

#[cfg(test)]
pub fn escape(s: &str) -> String {
    let mut out = String::new();
    escape_into(&mut out, s);
    out
}
