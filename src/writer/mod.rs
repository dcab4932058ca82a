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
use std::fmt::Formatter;
use std::fmt::Result;

use crate::entities::Escaped;
use crate::model::Counts;
use crate::model::CountsKind;
use crate::model::Frame;
use crate::model::Log;
use crate::model::RunState;
use crate::model::Stack;
use crate::model::UNSET_PID;
use crate::model::VgError;
use crate::tags::Tag;

/// Writes the log in the Valgrind XML format, see [Log::xml()].
pub struct XmlLog<'a>(&'a Log);

/// Writes the log as a Valgrind style text report, see [Log::text()].
pub struct TextLog<'a>(&'a Log);

impl Log {
    /// Serializes the log back into XML.
    ///
    /// Reading the output again gives an equal log.
    ///
    /// ```
    /// use vglog::Log;
    ///
    /// let log: Log = "<valgrindoutput><tool>memcheck</tool></valgrindoutput>".parse().unwrap();
    /// let again: Log = log.xml().to_string().parse().unwrap();
    /// assert_eq!(log, again);
    /// ```
    pub fn xml(&self) -> XmlLog<'_> {
        XmlLog(self)
    }

    /// Formats the log the way the tool prints it on the terminal.
    pub fn text(&self) -> TextLog<'_> {
        TextLog(self)
    }
}

fn element(f: &mut Formatter<'_>, indent: usize, tag: Tag, value: &str) -> Result {
    writeln!(
        f,
        "{:indent$}<{name}>{}</{name}>",
        "",
        Escaped(value),
        name = tag.name()
    )
}

fn open(f: &mut Formatter<'_>, indent: usize, tag: Tag) -> Result {
    writeln!(f, "{:indent$}<{}>", "", tag.name())
}

fn close(f: &mut Formatter<'_>, indent: usize, tag: Tag) -> Result {
    writeln!(f, "{:indent$}</{}>", "", tag.name())
}

fn xml_command(f: &mut Formatter<'_>, tag: Tag, exe: &str, args: &[String]) -> Result {
    if exe.is_empty() && args.is_empty() {
        return Ok(());
    }
    open(f, 2, tag)?;
    element(f, 4, Tag::Exe, exe)?;
    for arg in args {
        element(f, 4, Tag::Arg, arg)?;
    }
    close(f, 2, tag)
}

fn xml_frame(f: &mut Formatter<'_>, frame: &Frame) -> Result {
    open(f, 4, Tag::Frame)?;
    element(f, 6, Tag::Ip, &frame.ip)?;
    let fields = [
        (Tag::Obj, &frame.obj),
        (Tag::Function, &frame.function),
        (Tag::Dir, &frame.dir),
        (Tag::File, &frame.file),
    ];
    for (tag, value) in fields {
        if let Some(value) = value {
            element(f, 6, tag, value)?;
        }
    }
    if let Some(line) = frame.line {
        element(f, 6, Tag::Line, &line.to_string())?;
    }
    close(f, 4, Tag::Frame)
}

fn xml_stack(f: &mut Formatter<'_>, stack: &Stack) -> Result {
    open(f, 2, Tag::Stack)?;
    for frame in &stack.frames {
        xml_frame(f, frame)?;
    }
    close(f, 2, Tag::Stack)
}

fn xml_error(f: &mut Formatter<'_>, error: &VgError) -> Result {
    open(f, 0, Tag::Error)?;
    element(f, 2, Tag::Unique, &error.unique)?;
    if let Some(tid) = error.tid {
        element(f, 2, Tag::Tid, &tid.to_string())?;
    }
    if let Some(name) = &error.thread_name {
        element(f, 2, Tag::ThreadName, name)?;
    }
    if !error.kind.is_empty() {
        element(f, 2, Tag::Kind, &error.kind)?;
    }
    if error.leaked_bytes.is_some() || error.leaked_blocks.is_some() {
        open(f, 2, Tag::XWhat)?;
        element(f, 4, Tag::Text, &error.what)?;
        if let Some(bytes) = error.leaked_bytes {
            element(f, 4, Tag::LeakedBytes, &bytes.to_string())?;
        }
        if let Some(blocks) = error.leaked_blocks {
            element(f, 4, Tag::LeakedBlocks, &blocks.to_string())?;
        }
        close(f, 2, Tag::XWhat)?;
    } else {
        element(f, 2, Tag::What, &error.what)?;
    }
    // an auxiliary description introduces the auxiliary stack
    let mut aux_what = error.aux_what.iter();
    for (index, stack) in error.stacks.iter().enumerate() {
        if index > 0 {
            if let Some(text) = aux_what.next() {
                element(f, 2, Tag::AuxWhat, text)?;
            }
        }
        xml_stack(f, stack)?;
    }
    for text in aux_what {
        element(f, 2, Tag::AuxWhat, text)?;
    }
    close(f, 0, Tag::Error)?;
    writeln!(f)
}

fn xml_counts(f: &mut Formatter<'_>, counts: &Counts) -> Result {
    let (tag, key_tag) = match counts.kind {
        CountsKind::Errors => (Tag::ErrorCounts, Tag::Unique),
        CountsKind::Suppressions => (Tag::SuppCounts, Tag::Name),
    };
    open(f, 0, tag)?;
    for pair in counts.pairs() {
        open(f, 2, Tag::Pair)?;
        element(f, 4, Tag::Count, &pair.count.to_string())?;
        element(f, 4, key_tag, &pair.key)?;
        close(f, 2, Tag::Pair)?;
    }
    close(f, 0, tag)?;
    writeln!(f)
}

impl Display for XmlLog<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let log = self.0;
        let info = &log.info;
        writeln!(f, "<?xml version=\"1.0\"?>\n")?;
        open(f, 0, Tag::ValgrindOutput)?;
        writeln!(f)?;
        if let Some(version) = log.protocol_version {
            element(f, 0, Tag::ProtocolVersion, &version.to_string())?;
        }
        if let Some(tool) = &info.protocol_tool {
            element(f, 0, Tag::ProtocolTool, tool)?;
        }
        writeln!(f)?;

        if log.preamble.is_closed() || !log.preamble.lines.is_empty() {
            open(f, 0, Tag::Preamble)?;
            for line in &log.preamble.lines {
                element(f, 2, Tag::Line, line)?;
            }
            close(f, 0, Tag::Preamble)?;
            writeln!(f)?;
        }

        if info.pid != UNSET_PID {
            element(f, 0, Tag::Pid, &info.pid.to_string())?;
        }
        if info.ppid != UNSET_PID {
            element(f, 0, Tag::Ppid, &info.ppid.to_string())?;
        }
        if !info.tool.is_empty() {
            element(f, 0, Tag::Tool, &info.tool)?;
        }
        writeln!(f)?;

        open(f, 0, Tag::Args)?;
        xml_command(f, Tag::Vargv, &info.valgrind_exe, &info.valgrind_args)?;
        xml_command(f, Tag::Argv, &info.exe, &info.args)?;
        close(f, 0, Tag::Args)?;
        writeln!(f)?;

        open(f, 0, Tag::Status)?;
        if log.status.state != RunState::Unknown {
            element(f, 2, Tag::State, log.status.state.name())?;
        }
        if let Some(time) = &log.status.time {
            element(f, 2, Tag::Time, time)?;
        }
        close(f, 0, Tag::Status)?;
        writeln!(f)?;

        for error in &log.errors {
            xml_error(f, error)?;
        }
        if let Some(counts) = &log.error_counts {
            xml_counts(f, counts)?;
        }
        if let Some(counts) = &log.supp_counts {
            xml_counts(f, counts)?;
        }
        close(f, 0, Tag::ValgrindOutput)
    }
}

struct Prefix(i64);

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        if self.0 == UNSET_PID {
            write!(f, "==?==")
        } else {
            write!(f, "=={}==", self.0)
        }
    }
}

fn text_stack(f: &mut Formatter<'_>, prefix: &Prefix, stack: &Stack) -> Result {
    for (index, frame) in stack.frames.iter().enumerate() {
        let verb = if index == 0 { "at" } else { "by" };
        let function = frame.function.as_deref().unwrap_or("???");
        write!(f, "{prefix}    {verb} {}: {function}", frame.ip)?;
        match (&frame.file, frame.line, &frame.obj) {
            (Some(file), Some(line), _) => write!(f, " ({file}:{line})")?,
            (Some(file), None, _) => write!(f, " ({file})")?,
            (None, _, Some(obj)) => write!(f, " (in {obj})")?,
            (None, _, None) => (),
        }
        writeln!(f)?;
    }
    Ok(())
}

impl Display for TextLog<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        let log = self.0;
        let prefix = Prefix(log.info.pid);
        for line in &log.preamble.lines {
            writeln!(f, "{prefix} {line}")?;
        }
        if !log.info.exe.is_empty() {
            writeln!(f, "{prefix} Command: {}", log.info.command_line())?;
        }
        writeln!(f, "{prefix}")?;

        for error in &log.errors {
            writeln!(f, "{prefix} {}", error.what)?;
            let mut aux_what = error.aux_what.iter();
            for (index, stack) in error.stacks.iter().enumerate() {
                if index > 0 {
                    if let Some(text) = aux_what.next() {
                        writeln!(f, "{prefix}  {text}")?;
                    }
                }
                text_stack(f, &prefix, stack)?;
            }
            for text in aux_what {
                writeln!(f, "{prefix}  {text}")?;
            }
            writeln!(f, "{prefix}")?;
        }

        let status = &log.status;
        if status.leaked_bytes > 0 || log.leak_errors().next().is_some() {
            writeln!(f, "{prefix} LEAK SUMMARY:")?;
            writeln!(
                f,
                "{prefix}    leaked: {} bytes in {} blocks",
                status.leaked_bytes, status.leaked_blocks
            )?;
            writeln!(f, "{prefix}")?;
        }
        let contexts = log.error_counts.as_ref().map_or(0, Counts::len);
        let suppressions = log.supp_counts.as_ref().map_or(0, Counts::len);
        writeln!(
            f,
            "{prefix} ERROR SUMMARY: {} errors from {} contexts (suppressed: {} from {})",
            status.errors, contexts, status.suppressed, suppressions
        )
    }
}
