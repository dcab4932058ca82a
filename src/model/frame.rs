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
use std::path::Path;
use std::path::PathBuf;

/// One entry of a stack trace.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    /// Instruction pointer, never empty in a well formed log.
    pub ip: String,
    pub obj: Option<String>,
    pub function: Option<String>,
    pub dir: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    display: String,
    resolved: Option<PathBuf>,
    readable: bool,
    writable: bool,
    path_printed: bool,
}

/// An ordered stack trace, innermost call first.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Stack {
    pub frames: Vec<Frame>,
}

impl Frame {
    pub fn new(ip: &str) -> Frame {
        Frame {
            ip: ip.to_string(),
            ..Frame::default()
        }
    }

    /// Derives the display line and resolves the source file.
    ///
    /// The reader calls this once when the frame is closed; `is_top` selects
    /// the "at" verb of the innermost frame instead of "by".
    pub fn close(&mut self, is_top: bool) {
        let verb = if is_top { "at" } else { "by" };
        self.display = match (&self.function, &self.file, self.line, &self.obj) {
            (Some(function), Some(file), Some(line), _) => {
                format!("{verb} {function} in {file}:{line}")
            }
            (Some(function), Some(file), None, _) => format!("{verb} {function} in {file}"),
            (Some(function), None, _, Some(obj)) => format!("{verb} {function} in {obj}"),
            (Some(function), None, _, None) => format!("Address {} by {function}", self.ip),
            (None, _, _, Some(obj)) => format!("Address {} in {obj}", self.ip),
            (None, _, _, None) => format!("Address {}", self.ip),
        };
        self.path_printed = false;
        self.resolved = None;
        self.readable = false;
        self.writable = false;
        if let Some(path) = self.source_path() {
            if let Some((resolved, readable, writable)) = resolve(&path) {
                self.resolved = Some(resolved);
                self.readable = readable;
                self.writable = writable;
            }
        }
    }

    /// The one line description derived by [close()](Frame::close).
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Source path as reported by the log, if both directory and file are known.
    pub fn source_path(&self) -> Option<PathBuf> {
        match (&self.dir, &self.file) {
            (Some(dir), Some(file)) => Some(Path::new(dir).join(file)),
            _ => None,
        }
    }

    /// Absolute path of the source file, if it exists as a regular file.
    pub fn resolved_path(&self) -> Option<&Path> {
        self.resolved.as_deref()
    }

    pub fn is_readable(&self) -> bool {
        self.readable
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Line to jump to when opening the source file.
    ///
    /// A resolved file without a line number opens at line 0.
    pub fn target_line(&self) -> Option<u32> {
        match (self.line, &self.resolved) {
            (Some(line), _) => Some(line),
            (None, Some(_)) => Some(0),
            (None, None) => None,
        }
    }

    /// Replaces the bare file name in the display line with the resolved absolute path.
    ///
    /// Only the first call has an effect.
    pub fn print_path(&mut self) {
        if self.path_printed {
            return;
        }
        let (Some(file), Some(resolved)) = (&self.file, &self.resolved) else {
            return;
        };
        let needle = format!(" in {file}");
        if let Some(pos) = self.display.find(&needle) {
            let start = pos + " in ".len();
            let end = start + file.len();
            let absolute = resolved.display().to_string();
            self.display.replace_range(start..end, &absolute);
            self.path_printed = true;
        }
    }
}

fn resolve(path: &Path) -> Option<(PathBuf, bool, bool)> {
    // symlink_metadata does not follow links, so links never count as files
    let meta = std::fs::symlink_metadata(path).ok()?;
    if !meta.file_type().is_file() {
        return None;
    }
    let absolute = std::fs::canonicalize(path).ok()?;
    let readable = File::open(path).is_ok();
    let writable = !meta.permissions().readonly();
    Some((absolute, readable, writable))
}

impl Stack {
    pub fn new() -> Stack {
        Stack::default()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.first()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
