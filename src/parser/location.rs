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

/// A position in the log byte stream.
///
/// Returned from [location()](crate::SaxParser::location) and carried by
/// syntax errors of the log reader, so that a problem in a multi megabyte
/// log can be found in an editor. Lines and columns count from one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Location {
    /// Number of bytes consumed from the stream.
    pub bytes: usize,
    /// Current line, starting from 1.
    pub line: usize,
    /// Current column in bytes, starting from 1.
    pub column: usize,
}

impl Location {
    pub fn new() -> Self {
        Location {
            bytes: 0,
            line: 1,
            column: 1,
        }
    }

    pub(super) fn advance(&mut self, c: u8) {
        self.bytes += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Location::new()
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "line {}, column {} (byte {})",
            self.line, self.column, self.bytes
        )
    }
}
