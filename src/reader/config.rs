/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

/// Protocol version of the log format understood by default.
pub const DEFAULT_PROTOCOL_VERSION: u32 = 1;

/// What to do with an error kind outside of the known vocabulary.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum KindPolicy {
    /// Abort reading, like an unknown tag does.
    #[default]
    Strict,
    /// Keep reading and show the kind with the `???` acronym.
    Lenient,
}

/// Settings of a [LogReader](super::LogReader).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ReaderConfig {
    pub kind_policy: KindPolicy,
    /// Accepted values of `<protocolversion>`.
    pub protocols: Vec<u32>,
}

impl ReaderConfig {
    pub fn new() -> ReaderConfig {
        ReaderConfig {
            kind_policy: KindPolicy::Strict,
            protocols: vec![DEFAULT_PROTOCOL_VERSION],
        }
    }

    pub fn with_kind_policy(mut self, kind_policy: KindPolicy) -> ReaderConfig {
        self.kind_policy = kind_policy;
        self
    }

    pub fn accept_protocol(mut self, version: u32) -> ReaderConfig {
        if !self.protocols.contains(&version) {
            self.protocols.push(version);
        }
        self
    }

    pub fn accepts_protocol(&self, version: u32) -> bool {
        self.protocols.contains(&version)
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self::new()
    }
}
