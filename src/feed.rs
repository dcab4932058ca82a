/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::fs::File;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::model::Log;
use crate::reader::LogListener;
use crate::reader::LogReader;
use crate::reader::ReadError;
use crate::reader::ReaderConfig;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("cannot read the log file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Read(#[from] ReadError),
}

/// Follows a log file which is still being written by the tool.
///
/// Each [poll()](LogFeed::poll) hands the bytes appended since the previous
/// poll to a [LogReader]. Waiting between polls is up to the caller.
pub struct LogFeed {
    file: File,
    path: PathBuf,
    buffer: Vec<u8>,
    offset: u64,
}

impl LogFeed {
    pub fn open(path: impl AsRef<Path>) -> Result<LogFeed, FeedError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        debug!(path = %path.display(), "following log file");
        Ok(LogFeed {
            file,
            path,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            offset: 0,
        })
    }

    pub fn with_buffer_size(mut self, size: usize) -> LogFeed {
        self.buffer = vec![0u8; size.max(1)];
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes consumed so far.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Feeds every byte appended since the last call, returns their count.
    pub fn poll<L: LogListener + ?Sized>(
        &mut self,
        reader: &mut LogReader,
        listener: &mut L,
    ) -> Result<usize, FeedError> {
        let mut total = 0;
        loop {
            let bytes_read = match self.file.read(&mut self.buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            };
            self.offset += bytes_read as u64;
            total += bytes_read;
            reader.parse_bytes(listener, &self.buffer[..bytes_read])?;
        }
        if total > 0 {
            debug!(path = %self.path.display(), bytes = total, offset = self.offset, "log grew");
        }
        Ok(total)
    }
}

/// Reads a complete log file.
pub fn load_log(path: impl AsRef<Path>, config: ReaderConfig) -> Result<Log, FeedError> {
    let mut feed = LogFeed::open(path)?;
    let mut reader = LogReader::with_config(config);
    feed.poll(&mut reader, &mut ())?;
    Ok(reader.into_log()?)
}
