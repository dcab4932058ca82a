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

use crate::Location;

/// Fatal problems of the log reader.
///
/// Records emitted before the error stay valid, nothing is rolled back.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ReadError {
    #[error("not enough memory")]
    NoMemory,

    /// The input is not well formed XML.
    #[error("invalid XML at {location}: {description}")]
    BadXml {
        description: &'static str,
        location: Location,
    },

    /// Malformed XML after the log was already complete.
    ///
    /// This happens when the client forks without an exec and both processes
    /// keep writing into the same log file.
    #[error(
        "invalid XML at {location} after the end of the log: {description}; \
         the client probably forked without exec and a second log was written into the same file"
    )]
    AfterFinish {
        description: &'static str,
        location: Location,
    },

    #[error("unknown tag <{name}> at {location}")]
    UnknownTag { name: String, location: Location },

    #[error("unknown error kind '{kind}' at {location}")]
    UnknownKind { kind: String, location: Location },

    #[error("unsupported protocol version '{version}' at {location}")]
    ProtocolVersion { version: String, location: Location },

    /// Input was given after a fatal error had already been reported.
    #[error("log reader stopped after an earlier error")]
    Halted,
}

pub(super) mod description {
    pub(in super::super) const HANDLER_ABORT: &str = "log reader aborted without a reason";
}
