/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use thiserror::Error;

/// Logs which cannot be merged at all.
///
/// The master log is left untouched when one of these is returned.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MergeError {
    #[error("logs are from different tools: '{master}' and '{slave}'")]
    ToolMismatch { master: String, slave: String },

    #[error("logs are from different executables: '{master}' and '{slave}'")]
    ExeMismatch { master: String, slave: String },

    #[error("no logs to merge")]
    NoLogs,
}

/// A part of the merge which was skipped, the rest of the merge went on.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum MergeProblem {
    #[error("occurrence count of error {unique} overflows")]
    CountOverflow { unique: String },

    #[error("count of suppression {name} overflows")]
    SuppressionOverflow { name: String },

    #[error("leak totals of error {unique} overflow")]
    LeakOverflow { unique: String },

    #[error("error {unique} has no error counts pair")]
    MissingPair { unique: String },

    #[error("description of leak {unique} cannot be recomputed: '{what}'")]
    UnparsableWhat { unique: String, what: String },

    #[error("log #{index} skipped: {reason}")]
    Skipped { index: usize, reason: MergeError },
}
