/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

/// Closed vocabulary of the Valgrind XML log format.
///
/// Some names are reused in several contexts, e.g. `<line>` is both a
/// preamble line and a frame line number, and `<obj>` appears inside
/// frames and suppression frames. The reader decides by context.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Tag {
    ValgrindOutput,
    ProtocolVersion,
    ProtocolTool,
    Preamble,
    Line,
    Pid,
    Ppid,
    Tool,
    LogFileQualifier,
    Var,
    Value,
    UserComment,
    Args,
    Vargv,
    Argv,
    Exe,
    Arg,
    Status,
    State,
    Time,
    Error,
    Unique,
    Tid,
    ThreadName,
    Kind,
    What,
    AuxWhat,
    XWhat,
    XAuxWhat,
    Text,
    LeakedBytes,
    LeakedBlocks,
    Stack,
    Frame,
    Ip,
    Obj,
    Function,
    Dir,
    File,
    Suppression,
    SuppName,
    SuppKind,
    SuppAux,
    SuppFrame,
    Fun,
    RawText,
    ErrorCounts,
    SuppCounts,
    Pair,
    Count,
    Name,
    // thread announcements, client messages and fatal signals
    AnnounceThread,
    HThreadId,
    IsRootThread,
    ClientMsg,
    FatalSignal,
    SigNo,
    SigName,
    SiCode,
    SiAddr,
    Event,
    // drd error details
    FirstObservedAt,
    Address,
    OtherSegmentStart,
    OtherSegmentEnd,
    /// Anything outside of the vocabulary.
    Unknown,
}

impl Tag {
    /// Classifies a tag name.
    pub fn from_name(name: &str) -> Tag {
        match name {
            "valgrindoutput" => Tag::ValgrindOutput,
            "protocolversion" => Tag::ProtocolVersion,
            "protocoltool" => Tag::ProtocolTool,
            "preamble" => Tag::Preamble,
            "line" => Tag::Line,
            "pid" => Tag::Pid,
            "ppid" => Tag::Ppid,
            "tool" => Tag::Tool,
            "logfilequalifier" => Tag::LogFileQualifier,
            "var" => Tag::Var,
            "value" => Tag::Value,
            "usercomment" => Tag::UserComment,
            "args" => Tag::Args,
            "vargv" => Tag::Vargv,
            "argv" => Tag::Argv,
            "exe" => Tag::Exe,
            "arg" => Tag::Arg,
            "status" => Tag::Status,
            "state" => Tag::State,
            "time" => Tag::Time,
            "error" => Tag::Error,
            "unique" => Tag::Unique,
            "tid" => Tag::Tid,
            "threadname" => Tag::ThreadName,
            "kind" => Tag::Kind,
            "what" => Tag::What,
            "auxwhat" => Tag::AuxWhat,
            "xwhat" => Tag::XWhat,
            "xauxwhat" => Tag::XAuxWhat,
            "text" => Tag::Text,
            "leakedbytes" => Tag::LeakedBytes,
            "leakedblocks" => Tag::LeakedBlocks,
            "stack" => Tag::Stack,
            "frame" => Tag::Frame,
            "ip" => Tag::Ip,
            "obj" => Tag::Obj,
            "fn" => Tag::Function,
            "dir" => Tag::Dir,
            "file" => Tag::File,
            "suppression" => Tag::Suppression,
            "sname" => Tag::SuppName,
            "skind" => Tag::SuppKind,
            "skaux" => Tag::SuppAux,
            "sframe" => Tag::SuppFrame,
            "fun" => Tag::Fun,
            "rawtext" => Tag::RawText,
            "errorcounts" => Tag::ErrorCounts,
            "suppcounts" => Tag::SuppCounts,
            "pair" => Tag::Pair,
            "count" => Tag::Count,
            "name" => Tag::Name,
            "announcethread" => Tag::AnnounceThread,
            "hthreadid" => Tag::HThreadId,
            "isrootthread" => Tag::IsRootThread,
            "clientmsg" => Tag::ClientMsg,
            "fatal_signal" => Tag::FatalSignal,
            "signo" => Tag::SigNo,
            "signame" => Tag::SigName,
            "sicode" => Tag::SiCode,
            "siaddr" => Tag::SiAddr,
            "event" => Tag::Event,
            "first_observed_at" => Tag::FirstObservedAt,
            "address" => Tag::Address,
            "other_segment_start" => Tag::OtherSegmentStart,
            "other_segment_end" => Tag::OtherSegmentEnd,
            _ => Tag::Unknown,
        }
    }

    /// The name used in the log, empty for [Tag::Unknown].
    pub fn name(self) -> &'static str {
        match self {
            Tag::ValgrindOutput => "valgrindoutput",
            Tag::ProtocolVersion => "protocolversion",
            Tag::ProtocolTool => "protocoltool",
            Tag::Preamble => "preamble",
            Tag::Line => "line",
            Tag::Pid => "pid",
            Tag::Ppid => "ppid",
            Tag::Tool => "tool",
            Tag::LogFileQualifier => "logfilequalifier",
            Tag::Var => "var",
            Tag::Value => "value",
            Tag::UserComment => "usercomment",
            Tag::Args => "args",
            Tag::Vargv => "vargv",
            Tag::Argv => "argv",
            Tag::Exe => "exe",
            Tag::Arg => "arg",
            Tag::Status => "status",
            Tag::State => "state",
            Tag::Time => "time",
            Tag::Error => "error",
            Tag::Unique => "unique",
            Tag::Tid => "tid",
            Tag::ThreadName => "threadname",
            Tag::Kind => "kind",
            Tag::What => "what",
            Tag::AuxWhat => "auxwhat",
            Tag::XWhat => "xwhat",
            Tag::XAuxWhat => "xauxwhat",
            Tag::Text => "text",
            Tag::LeakedBytes => "leakedbytes",
            Tag::LeakedBlocks => "leakedblocks",
            Tag::Stack => "stack",
            Tag::Frame => "frame",
            Tag::Ip => "ip",
            Tag::Obj => "obj",
            Tag::Function => "fn",
            Tag::Dir => "dir",
            Tag::File => "file",
            Tag::Suppression => "suppression",
            Tag::SuppName => "sname",
            Tag::SuppKind => "skind",
            Tag::SuppAux => "skaux",
            Tag::SuppFrame => "sframe",
            Tag::Fun => "fun",
            Tag::RawText => "rawtext",
            Tag::ErrorCounts => "errorcounts",
            Tag::SuppCounts => "suppcounts",
            Tag::Pair => "pair",
            Tag::Count => "count",
            Tag::Name => "name",
            Tag::AnnounceThread => "announcethread",
            Tag::HThreadId => "hthreadid",
            Tag::IsRootThread => "isrootthread",
            Tag::ClientMsg => "clientmsg",
            Tag::FatalSignal => "fatal_signal",
            Tag::SigNo => "signo",
            Tag::SigName => "signame",
            Tag::SiCode => "sicode",
            Tag::SiAddr => "siaddr",
            Tag::Event => "event",
            Tag::FirstObservedAt => "first_observed_at",
            Tag::Address => "address",
            Tag::OtherSegmentStart => "other_segment_start",
            Tag::OtherSegmentEnd => "other_segment_end",
            Tag::Unknown => "",
        }
    }
}
