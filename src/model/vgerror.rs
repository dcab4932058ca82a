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

use super::Stack;
use super::kind;

/// A single error report of the analysed program.
///
/// Leak reports are errors too, they are told apart by their kind and carry
/// the leaked byte and block counts.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct VgError {
    /// Identifier of the error, the key of its [ErrorCounts](super::Counts) pair.
    pub unique: String,
    pub tid: Option<u32>,
    pub thread_name: Option<String>,
    pub kind: String,
    acronym: &'static str,
    pub what: String,
    pub aux_what: Vec<String>,
    /// Occurrence count, known once the error counts are seen.
    pub count: Option<u64>,
    pub leaked_bytes: Option<u64>,
    pub leaked_blocks: Option<u64>,
    /// Primary stack, followed by the auxiliary stack if there is one.
    pub stacks: Vec<Stack>,
}

impl VgError {
    pub fn new(unique: &str) -> VgError {
        VgError {
            unique: unique.to_string(),
            ..VgError::default()
        }
    }

    /// Sets the kind and derives its acronym.
    ///
    /// Returns false if the kind is not in the vocabulary, the acronym is
    /// then [UNKNOWN_ACRONYM](kind::UNKNOWN_ACRONYM).
    pub fn set_kind(&mut self, kind: &str) -> bool {
        self.kind = kind.to_string();
        match kind::acronym(kind) {
            Some(acronym) => {
                self.acronym = acronym;
                true
            }
            None => {
                self.acronym = kind::UNKNOWN_ACRONYM;
                false
            }
        }
    }

    pub fn acronym(&self) -> &'static str {
        self.acronym
    }

    pub fn is_leak(&self) -> bool {
        kind::is_leak_kind(&self.kind) || self.leaked_bytes.is_some()
    }

    pub fn primary_stack(&self) -> Option<&Stack> {
        self.stacks.first()
    }

    pub fn aux_stack(&self) -> Option<&Stack> {
        self.stacks.get(1)
    }
}

impl Display for VgError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.count {
            Some(count) => write!(f, "{} [{}]: {}", self.acronym, count, self.what),
            None => write!(f, "{}: {}", self.acronym, self.what),
        }
    }
}
