/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod builder;
mod config;
mod error;

use std::str::FromStr;

use crate::Location;
use crate::SaxError;
use crate::SaxParser;
use crate::model::Log;
use crate::model::TopStatus;

use builder::Dispatch;
use builder::Fault;
use builder::LogBuilder;
pub use config::DEFAULT_PROTOCOL_VERSION;
pub use config::KindPolicy;
pub use config::ReaderConfig;
use error::description;
pub use error::ReadError;

/// A part of the log which became complete.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Record {
    Status,
    Info,
    Preamble,
    /// Index of the error in [Log::errors].
    Error(usize),
    ErrorCounts,
    SuppCounts,
}

/// Receives the records of a log while it is being read.
///
/// The header records are held back until the first `<status>` block
/// closes, they are then delivered as `Status`, `Info`, `Preamble`. Every
/// later record is delivered as soon as its closing tag is read.
pub trait LogListener {
    fn record_ready(&mut self, log: &Log, record: Record);

    /// Called when the totals change after the header was delivered.
    fn status_updated(&mut self, _status: &TopStatus) {}
}

impl LogListener for () {
    fn record_ready(&mut self, _log: &Log, _record: Record) {}
}

/// Incremental reader of Valgrind XML logs.
///
/// Bytes can be pushed in arbitrary pieces as the tool writes them, the
/// listener sees the same records in the same order regardless of how the
/// input was split.
///
/// # Examples
///
/// ```
/// use vglog::{Log, LogListener, LogReader, Record};
///
/// struct Counter { errors: usize }
/// impl LogListener for Counter {
///     fn record_ready(&mut self, _log: &Log, record: Record) {
///         if let Record::Error(_) = record {
///             self.errors += 1;
///         }
///     }
/// }
///
/// let mut counter = Counter { errors: 0 };
/// let mut reader = LogReader::new();
/// reader.parse_bytes(&mut counter, b"<valgrindoutput><protocolversion>1</protocol").unwrap();
/// reader.parse_bytes(&mut counter, b"version><error><unique>0x1</unique>").unwrap();
/// reader.parse_bytes(&mut counter, b"<kind>InvalidRead</kind></error></valgrindoutput>").unwrap();
/// assert_eq!(counter.errors, 1);
/// let log = reader.into_log().unwrap();
/// assert_eq!(log.errors[0].acronym(), "IVR");
/// ```
pub struct LogReader {
    builder: LogBuilder,
    parser: SaxParser,
    halted: bool,
}

impl LogReader {
    pub fn new() -> LogReader {
        LogReader::with_config(ReaderConfig::default())
    }

    pub fn with_config(config: ReaderConfig) -> LogReader {
        LogReader {
            builder: LogBuilder::new(config),
            parser: SaxParser::new(),
            halted: false,
        }
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.builder.config
    }

    /// Forgets the partially read log and starts over with the same settings.
    pub fn reset(&mut self) {
        let config = self.builder.config.clone();
        self.builder = LogBuilder::new(config);
        self.parser.reset();
        self.halted = false;
    }

    /// Processes the next piece of the log.
    ///
    /// After an error the reader refuses further input with
    /// [Halted](ReadError::Halted) until it is [reset](LogReader::reset).
    pub fn parse_bytes<L: LogListener + ?Sized>(
        &mut self,
        listener: &mut L,
        bytes: &[u8],
    ) -> Result<(), ReadError> {
        if self.halted {
            return Err(ReadError::Halted);
        }
        let mut dispatch = Dispatch {
            builder: &mut self.builder,
            listener,
        };
        match self.parser.parse_bytes(&mut dispatch, bytes) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.convert(err)),
        }
    }

    /// Checks that the log is complete.
    pub fn finish(&mut self) -> Result<(), ReadError> {
        if self.halted {
            return Err(ReadError::Halted);
        }
        match self.parser.parse_finish() {
            Ok(()) => Ok(()),
            Err(err) => Err(self.convert(err)),
        }
    }

    /// The log read so far.
    pub fn log(&self) -> &Log {
        &self.builder.log
    }

    pub fn into_log(mut self) -> Result<Log, ReadError> {
        self.finish()?;
        Ok(self.builder.log)
    }

    /// True once the closing `</valgrindoutput>` tag was read.
    pub fn is_finished(&self) -> bool {
        self.builder.finished
    }

    pub fn location(&self) -> Location {
        self.parser.location()
    }

    fn convert(&mut self, err: SaxError) -> ReadError {
        self.halted = true;
        let location = self.parser.location();
        match err {
            SaxError::NoMemory => ReadError::NoMemory,
            SaxError::BadXml(description) if self.builder.finished => ReadError::AfterFinish {
                description,
                location,
            },
            SaxError::BadXml(description) => ReadError::BadXml {
                description,
                location,
            },
            SaxError::HandlerAbort => match self.builder.fault.take() {
                Some(Fault::UnknownTag(name)) => ReadError::UnknownTag { name, location },
                Some(Fault::UnknownKind(kind)) => ReadError::UnknownKind { kind, location },
                Some(Fault::ProtocolVersion(version)) => {
                    ReadError::ProtocolVersion { version, location }
                }
                None => ReadError::BadXml {
                    description: description::HANDLER_ABORT,
                    location,
                },
            },
        }
    }
}

impl Default for LogReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads a complete log held in memory.
pub fn parse_log(bytes: &[u8], config: ReaderConfig) -> Result<Log, ReadError> {
    let mut reader = LogReader::with_config(config);
    reader.parse_bytes(&mut (), bytes)?;
    reader.into_log()
}

impl FromStr for Log {
    type Err = ReadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_log(s.as_bytes(), ReaderConfig::default())
    }
}
