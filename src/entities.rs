/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fmt::Display;

pub mod predefined {
    pub const LT: &str = "&lt;";
    pub const GT: &str = "&gt;";
    pub const AMP: &str = "&amp;";
    pub const APOS: &str = "&apos;";
    pub const QUOT: &str = "&quot;";
}

fn entity(c: char) -> Option<&'static str> {
    match c {
        '<' => Some(predefined::LT),
        '>' => Some(predefined::GT),
        '&' => Some(predefined::AMP),
        '\'' => Some(predefined::APOS),
        '"' => Some(predefined::QUOT),
        _ => None,
    }
}

/// Writes the text with the markup characters replaced by entities.
pub fn escape(s: &str, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let mut start = 0;
    for (pos, c) in s.char_indices() {
        if let Some(entity) = entity(c) {
            f.write_str(&s[start..pos])?;
            f.write_str(entity)?;
            start = pos + c.len_utf8();
        }
    }
    f.write_str(&s[start..])
}

/// Display adaptor for [escape()].
pub struct Escaped<'a>(pub &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        escape(self.0, f)
    }
}
