/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod frame;
pub mod kind;
mod vgerror;

use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

pub use frame::Frame;
pub use frame::Stack;
pub use vgerror::VgError;

/// Banner lines printed by the tool at startup.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Preamble {
    pub lines: Vec<String>,
    closed: bool,
}

impl Preamble {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }
}

/// Pid value of a log which did not report one.
pub const UNSET_PID: i64 = -1;

/// Process and invocation details of the analysed program.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Info {
    pub pid: i64,
    pub ppid: i64,
    pub tool: String,
    pub protocol_tool: Option<String>,
    /// Client executable.
    pub exe: String,
    /// Client arguments, without the executable.
    pub args: Vec<String>,
    pub valgrind_exe: String,
    pub valgrind_args: Vec<String>,
    display: String,
}

impl Default for Info {
    fn default() -> Self {
        Info {
            pid: UNSET_PID,
            ppid: UNSET_PID,
            tool: String::new(),
            protocol_tool: None,
            exe: String::new(),
            args: Vec::new(),
            valgrind_exe: String::new(),
            valgrind_args: Vec::new(),
            display: String::new(),
        }
    }
}

impl Info {
    pub(crate) fn derive_display(&mut self) {
        self.display = if self.pid == UNSET_PID {
            self.tool.clone()
        } else {
            format!("{} [pid {}]", self.tool, self.pid)
        };
    }

    /// One line description, derived when the tool name is read.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Client command line as a single string.
    pub fn command_line(&self) -> String {
        let mut line = self.exe.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Run state reported by the `<status>` blocks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum RunState {
    #[default]
    Unknown,
    Running,
    Finished,
}

impl RunState {
    pub fn from_name(name: &str) -> Option<RunState> {
        match name {
            "RUNNING" => Some(RunState::Running),
            "FINISHED" => Some(RunState::Finished),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RunState::Unknown => "UNKNOWN",
            RunState::Running => "RUNNING",
            RunState::Finished => "FINISHED",
        }
    }
}

/// Aggregate view of a log, updated while the log streams in.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopStatus {
    pub state: RunState,
    /// File name of the client executable.
    pub binary: String,
    pub errors: u64,
    pub leaked_bytes: u64,
    pub leaked_blocks: u64,
    pub suppressed: u64,
    /// Last elapsed time reported by the tool.
    pub time: Option<String>,
}

impl TopStatus {
    pub(crate) fn set_binary(&mut self, exe: &str) {
        self.binary = Path::new(exe)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
    }
}

impl Display for TopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Status: {}  Binary: {}  Errors: {}  Leaked: {} bytes in {} blocks",
            self.state.name(),
            self.binary,
            self.errors,
            self.leaked_bytes,
            self.leaked_blocks
        )
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CountsKind {
    /// Keyed by error unique ids.
    Errors,
    /// Keyed by suppression names.
    Suppressions,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CountPair {
    pub key: String,
    pub count: u64,
}

/// An `<errorcounts>` or `<suppcounts>` block.
///
/// Keys are unique, setting an existing key updates its count in place.
/// Pairs keep their log order and are looked up through a key index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Counts {
    pub kind: CountsKind,
    pairs: Vec<CountPair>,
    index: HashMap<String, usize>,
    closed: bool,
}

impl Counts {
    pub fn new(kind: CountsKind) -> Counts {
        Counts {
            kind,
            pairs: Vec::new(),
            index: HashMap::new(),
            closed: false,
        }
    }

    pub fn pairs(&self) -> &[CountPair] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<CountPair> {
        self.pairs
    }

    pub fn set(&mut self, key: &str, count: u64) {
        match self.index.get(key) {
            Some(&pos) => self.pairs[pos].count = count,
            None => {
                self.index.insert(key.to_string(), self.pairs.len());
                self.pairs.push(CountPair {
                    key: key.to_string(),
                    count,
                });
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<u64> {
        self.index.get(key).map(|&pos| self.pairs[pos].count)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut u64> {
        let pos = *self.index.get(key)?;
        Some(&mut self.pairs[pos].count)
    }

    /// Removes a pair, the later pairs move up to keep the order.
    pub fn remove(&mut self, key: &str) -> Option<u64> {
        let pos = self.index.remove(key)?;
        let pair = self.pairs.remove(pos);
        for (i, later) in self.pairs.iter().enumerate().skip(pos) {
            if let Some(slot) = self.index.get_mut(&later.key) {
                *slot = i;
            }
        }
        Some(pair.count)
    }

    pub fn total(&self) -> u64 {
        self.pairs
            .iter()
            .fold(0u64, |total, pair| total.saturating_add(pair.count))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn set_closed(&mut self, closed: bool) {
        self.closed = closed;
    }
}

impl Display for Counts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CountsKind::Errors => write!(
                f,
                "ERROR SUMMARY: {} errors from {} contexts",
                self.total(),
                self.len()
            ),
            CountsKind::Suppressions => write!(
                f,
                "SUPPRESSED: {} errors from {} suppressions",
                self.total(),
                self.len()
            ),
        }
    }
}

/// Tool which produced a log.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ToolKind {
    Memcheck,
    Helgrind,
    Drd,
    PtrCheck,
    #[default]
    Other,
}

impl ToolKind {
    pub fn from_name(name: &str) -> ToolKind {
        match name {
            "memcheck" => ToolKind::Memcheck,
            "helgrind" => ToolKind::Helgrind,
            "drd" => ToolKind::Drd,
            "exp-ptrcheck" | "exp-sgcheck" => ToolKind::PtrCheck,
            _ => ToolKind::Other,
        }
    }
}

/// Everything read from one log.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Log {
    pub protocol_version: Option<u32>,
    pub preamble: Preamble,
    pub info: Info,
    pub status: TopStatus,
    pub error_counts: Option<Counts>,
    pub supp_counts: Option<Counts>,
    /// Errors in log order, leak reports included.
    pub errors: Vec<VgError>,
    pub tool_kind: ToolKind,
}

impl Log {
    pub fn new() -> Log {
        Log::default()
    }

    pub fn error(&self, unique: &str) -> Option<&VgError> {
        self.errors.iter().find(|error| error.unique == unique)
    }

    pub fn leak_errors(&self) -> impl Iterator<Item = &VgError> {
        self.errors.iter().filter(|error| error.is_leak())
    }

    pub fn ordinary_errors(&self) -> impl Iterator<Item = &VgError> {
        self.errors.iter().filter(|error| !error.is_leak())
    }

    /// Recomputes the status totals from the counts and leak reports.
    pub fn refresh_status(&mut self) {
        self.status.errors = self.error_counts.as_ref().map_or(0, Counts::total);
        self.status.suppressed = self.supp_counts.as_ref().map_or(0, Counts::total);
        self.status.leaked_bytes = 0;
        self.status.leaked_blocks = 0;
        for error in &self.errors {
            self.status.leaked_bytes = self
                .status
                .leaked_bytes
                .saturating_add(error.leaked_bytes.unwrap_or(0));
            self.status.leaked_blocks = self
                .status
                .leaked_blocks
                .saturating_add(error.leaked_blocks.unwrap_or(0));
        }
    }
}
