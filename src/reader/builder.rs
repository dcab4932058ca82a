/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use std::collections::HashMap;
use std::str::FromStr;

use tracing::debug;
use tracing::warn;

use crate::SaxElement;
use crate::SaxError;
use crate::SaxHandler;
use crate::model::Counts;
use crate::model::CountsKind;
use crate::model::Frame;
use crate::model::Log;
use crate::model::Preamble;
use crate::model::RunState;
use crate::model::Stack;
use crate::model::ToolKind;
use crate::model::VgError;
use crate::tags::Tag;

use super::KindPolicy;
use super::LogListener;
use super::ReaderConfig;
use super::Record;

/// Handler level failure, the reader adds the location.
#[derive(Debug)]
pub(super) enum Fault {
    UnknownTag(String),
    UnknownKind(String),
    ProtocolVersion(String),
}

#[derive(Default)]
struct Context {
    preamble: bool,
    status: bool,
    argv: bool,
    vargv: bool,
    error: bool,
    stack: bool,
    frame: bool,
    xwhat: bool,
    xauxwhat: bool,
    error_counts: bool,
    supp_counts: bool,
    pair: bool,
    // depth of blocks whose fields do not belong to the current error
    aside: usize,
}

#[derive(Default)]
struct PendingPair {
    key: Option<String>,
    count: Option<u64>,
}

/// Builds a [Log] from the parser events.
pub(super) struct LogBuilder {
    pub(super) log: Log,
    pub(super) config: ReaderConfig,
    pub(super) finished: bool,
    pub(super) fault: Option<Fault>,
    ctx: Context,
    content: String,
    pair: PendingPair,
    // records held back until the first status block, popped in reverse
    deferred: Vec<Record>,
    status_closes: usize,
    uniques: HashMap<String, usize>,
}

/// Pairs the builder with the caller's listener for one parse call.
pub(super) struct Dispatch<'a, L: LogListener + ?Sized> {
    pub(super) builder: &'a mut LogBuilder,
    pub(super) listener: &'a mut L,
}

impl<L: LogListener + ?Sized> SaxHandler for Dispatch<'_, L> {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        match element {
            SaxElement::StartTag(name) => self.builder.start_tag(name),
            SaxElement::Attribute(_, _) => Ok(()),
            SaxElement::CData(text) => {
                self.builder.text(text);
                Ok(())
            }
            SaxElement::EndTag(name) => self.builder.end_tag(name, &mut *self.listener),
        }
    }
}

fn parse_number<T: FromStr>(tag: Tag, content: &str) -> Option<T> {
    match content.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            debug!(tag = tag.name(), content, "malformed number dropped");
            None
        }
    }
}

impl LogBuilder {
    pub(super) fn new(config: ReaderConfig) -> LogBuilder {
        LogBuilder {
            log: Log::new(),
            config,
            finished: false,
            fault: None,
            ctx: Context::default(),
            content: String::new(),
            pair: PendingPair::default(),
            deferred: Vec::new(),
            status_closes: 0,
            uniques: HashMap::new(),
        }
    }

    fn fail(&mut self, fault: Fault) -> Result<(), SaxError> {
        self.fault = Some(fault);
        Err(SaxError::HandlerAbort)
    }

    fn text(&mut self, text: &str) {
        self.content.push_str(text);
    }

    fn take_content(&mut self) -> String {
        let content = std::mem::take(&mut self.content);
        let trimmed = content.trim();
        if trimmed.len() == content.len() {
            content
        } else {
            trimmed.to_string()
        }
    }

    fn current_error(&mut self) -> Option<&mut VgError> {
        if self.ctx.error && self.ctx.aside == 0 {
            self.log.errors.last_mut()
        } else {
            None
        }
    }

    fn current_stack(&mut self) -> Option<&mut Stack> {
        if self.ctx.stack {
            self.current_error()?.stacks.last_mut()
        } else {
            None
        }
    }

    fn current_frame(&mut self) -> Option<&mut Frame> {
        if self.ctx.frame {
            self.current_stack()?.frames.last_mut()
        } else {
            None
        }
    }

    fn emit<L: LogListener + ?Sized>(&mut self, listener: &mut L, record: Record) {
        listener.record_ready(&self.log, record);
    }

    fn defer<L: LogListener + ?Sized>(&mut self, listener: &mut L, record: Record) {
        if self.status_closes == 0 {
            self.deferred.push(record);
        } else {
            self.emit(listener, record);
        }
    }

    fn start_tag(&mut self, name: &str) -> Result<(), SaxError> {
        let tag = Tag::from_name(name);
        self.content.clear();
        match tag {
            Tag::Unknown => return self.fail(Fault::UnknownTag(name.to_string())),
            Tag::Preamble => {
                self.ctx.preamble = true;
                self.log.preamble = Preamble::default();
            }
            Tag::Status => self.ctx.status = true,
            Tag::Argv => self.ctx.argv = true,
            Tag::Vargv => self.ctx.vargv = true,
            Tag::Error => {
                if self.ctx.error {
                    debug!("nested <error> ignored");
                } else {
                    self.ctx.error = true;
                    self.log.errors.push(VgError::default());
                }
            }
            Tag::XWhat => self.ctx.xwhat = self.ctx.error,
            Tag::XAuxWhat => self.ctx.xauxwhat = self.ctx.error,
            Tag::AnnounceThread
            | Tag::ClientMsg
            | Tag::FatalSignal
            | Tag::FirstObservedAt
            | Tag::OtherSegmentStart
            | Tag::OtherSegmentEnd => self.ctx.aside += 1,
            Tag::Stack => {
                if self.ctx.error && self.ctx.aside == 0 && !self.ctx.stack {
                    self.ctx.stack = true;
                    if let Some(error) = self.current_error() {
                        error.stacks.push(Stack::new());
                    }
                } else {
                    debug!("<stack> outside of an error ignored");
                }
            }
            Tag::Frame => {
                if self.ctx.stack && !self.ctx.frame {
                    self.ctx.frame = true;
                    if let Some(stack) = self.current_stack() {
                        stack.frames.push(Frame::default());
                    }
                }
            }
            Tag::ErrorCounts => {
                self.ctx.error_counts = true;
                self.log
                    .error_counts
                    .get_or_insert_with(|| Counts::new(CountsKind::Errors))
                    .set_closed(false);
            }
            Tag::SuppCounts => {
                self.ctx.supp_counts = true;
                self.log
                    .supp_counts
                    .get_or_insert_with(|| Counts::new(CountsKind::Suppressions))
                    .set_closed(false);
            }
            Tag::Pair => {
                if self.ctx.error_counts || self.ctx.supp_counts {
                    self.ctx.pair = true;
                    self.pair = PendingPair::default();
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn end_tag<L: LogListener + ?Sized>(
        &mut self,
        name: &str,
        listener: &mut L,
    ) -> Result<(), SaxError> {
        let tag = Tag::from_name(name);
        let content = self.take_content();
        match tag {
            Tag::Unknown => return self.fail(Fault::UnknownTag(name.to_string())),
            Tag::ValgrindOutput => self.finished = true,
            Tag::ProtocolVersion => match content.parse::<u32>() {
                Ok(version) if self.config.accepts_protocol(version) => {
                    self.log.protocol_version = Some(version);
                }
                _ => return self.fail(Fault::ProtocolVersion(content)),
            },
            Tag::ProtocolTool => self.log.info.protocol_tool = Some(content),
            Tag::Line => {
                if self.ctx.frame {
                    let line = parse_number(tag, &content);
                    if let Some(frame) = self.current_frame() {
                        frame.line = line;
                    }
                } else if self.ctx.preamble {
                    self.log.preamble.lines.push(content);
                }
            }
            Tag::Preamble => {
                self.ctx.preamble = false;
                self.log.preamble.close();
                self.defer(listener, Record::Preamble);
            }
            Tag::Pid => {
                if let Some(pid) = parse_number(tag, &content) {
                    self.log.info.pid = pid;
                }
            }
            Tag::Ppid => {
                if let Some(ppid) = parse_number(tag, &content) {
                    self.log.info.ppid = ppid;
                }
            }
            Tag::Tool => {
                self.log.tool_kind = ToolKind::from_name(&content);
                self.log.info.tool = content;
                self.log.info.derive_display();
                self.defer(listener, Record::Info);
            }
            Tag::Exe => {
                if self.ctx.argv {
                    self.log.status.set_binary(&content);
                    self.log.info.exe = content;
                } else if self.ctx.vargv {
                    self.log.info.valgrind_exe = content;
                }
            }
            Tag::Arg => {
                if self.ctx.argv {
                    self.log.info.args.push(content);
                } else if self.ctx.vargv {
                    self.log.info.valgrind_args.push(content);
                }
            }
            Tag::Argv => self.ctx.argv = false,
            Tag::Vargv => self.ctx.vargv = false,
            Tag::State => {
                if self.ctx.status {
                    match RunState::from_name(&content) {
                        Some(state) => self.log.status.state = state,
                        None => debug!(state = content, "unknown run state dropped"),
                    }
                }
            }
            Tag::Time => {
                if self.ctx.status {
                    self.log.status.time = Some(content);
                }
            }
            Tag::Status => {
                if let Some(state) = RunState::from_name(&content) {
                    self.log.status.state = state;
                }
                self.ctx.status = false;
                self.close_status(listener);
            }
            Tag::Unique => {
                if self.ctx.pair {
                    self.pair.key = Some(content);
                } else if self.ctx.error && self.ctx.aside == 0 && !self.ctx.stack {
                    let index = self.log.errors.len().saturating_sub(1);
                    self.uniques.insert(content.clone(), index);
                    if let Some(error) = self.current_error() {
                        error.unique = content;
                    }
                }
            }
            Tag::Tid => {
                let tid = parse_number(tag, &content);
                if let Some(error) = self.current_error() {
                    error.tid = tid;
                }
            }
            Tag::ThreadName => {
                if let Some(error) = self.current_error() {
                    error.thread_name = Some(content);
                }
            }
            Tag::Kind => {
                let policy = self.config.kind_policy;
                if let Some(error) = self.current_error() {
                    if !error.set_kind(&content) {
                        match policy {
                            KindPolicy::Strict => return self.fail(Fault::UnknownKind(content)),
                            KindPolicy::Lenient => warn!(kind = content, "unknown error kind"),
                        }
                    }
                }
            }
            Tag::What => {
                if let Some(error) = self.current_error() {
                    error.what = content;
                }
            }
            Tag::AuxWhat => {
                if let Some(error) = self.current_error() {
                    error.aux_what.push(content);
                }
            }
            Tag::Text => {
                let (xwhat, xauxwhat) = (self.ctx.xwhat, self.ctx.xauxwhat);
                if let Some(error) = self.current_error() {
                    if xwhat {
                        error.what = content;
                    } else if xauxwhat {
                        error.aux_what.push(content);
                    }
                }
            }
            Tag::AnnounceThread
            | Tag::ClientMsg
            | Tag::FatalSignal
            | Tag::FirstObservedAt
            | Tag::OtherSegmentStart
            | Tag::OtherSegmentEnd => {
                self.ctx.aside = self.ctx.aside.saturating_sub(1);
                debug!(tag = tag.name(), "detail block skipped");
            }
            Tag::XWhat => self.ctx.xwhat = false,
            Tag::XAuxWhat => self.ctx.xauxwhat = false,
            Tag::LeakedBytes => {
                let Some(bytes) = parse_number::<u64>(tag, &content) else {
                    return Ok(());
                };
                if let Some(error) = self.current_error() {
                    error.leaked_bytes = Some(bytes);
                    let status = &mut self.log.status;
                    status.leaked_bytes = status.leaked_bytes.saturating_add(bytes);
                    listener.status_updated(&self.log.status);
                }
            }
            Tag::LeakedBlocks => {
                let Some(blocks) = parse_number::<u64>(tag, &content) else {
                    return Ok(());
                };
                if let Some(error) = self.current_error() {
                    error.leaked_blocks = Some(blocks);
                    let status = &mut self.log.status;
                    status.leaked_blocks = status.leaked_blocks.saturating_add(blocks);
                    listener.status_updated(&self.log.status);
                }
            }
            Tag::Ip => {
                if let Some(frame) = self.current_frame() {
                    frame.ip = content;
                }
            }
            Tag::Obj => {
                if let Some(frame) = self.current_frame() {
                    frame.obj = Some(content);
                }
            }
            Tag::Function => {
                if let Some(frame) = self.current_frame() {
                    frame.function = Some(content);
                }
            }
            Tag::Dir => {
                if let Some(frame) = self.current_frame() {
                    frame.dir = Some(content);
                }
            }
            Tag::File => {
                if let Some(frame) = self.current_frame() {
                    frame.file = Some(content);
                }
            }
            Tag::Frame => {
                if self.ctx.frame {
                    self.close_frame();
                    self.ctx.frame = false;
                }
            }
            Tag::Stack => {
                if self.ctx.stack {
                    self.ctx.stack = false;
                }
            }
            Tag::Error => {
                if self.ctx.error {
                    self.ctx.error = false;
                    self.ctx.xwhat = false;
                    self.ctx.xauxwhat = false;
                    let index = self.log.errors.len() - 1;
                    self.emit(listener, Record::Error(index));
                }
            }
            Tag::Count => {
                if self.ctx.pair {
                    self.pair.count = parse_number(tag, &content);
                }
            }
            Tag::Name => {
                if self.ctx.pair {
                    self.pair.key = Some(content);
                }
            }
            Tag::Pair => {
                if self.ctx.pair {
                    self.ctx.pair = false;
                    self.close_pair();
                }
            }
            Tag::ErrorCounts => {
                if self.ctx.error_counts {
                    self.ctx.error_counts = false;
                    if let Some(counts) = self.log.error_counts.as_mut() {
                        counts.set_closed(true);
                        self.log.status.errors = counts.total();
                    }
                    self.emit(listener, Record::ErrorCounts);
                }
            }
            Tag::SuppCounts => {
                if self.ctx.supp_counts {
                    self.ctx.supp_counts = false;
                    if let Some(counts) = self.log.supp_counts.as_mut() {
                        counts.set_closed(true);
                        self.log.status.suppressed = counts.total();
                    }
                    self.emit(listener, Record::SuppCounts);
                }
            }
            _ => (),
        }
        Ok(())
    }

    fn close_frame(&mut self) {
        let Some(stack) = self.current_stack() else {
            return;
        };
        let is_top = stack.frames.len() == 1;
        let Some(frame) = stack.frames.last_mut() else {
            return;
        };
        if frame.ip.is_empty() {
            debug!("frame without an instruction pointer dropped");
            stack.frames.pop();
            return;
        }
        frame.close(is_top);
    }

    fn close_pair(&mut self) {
        let pair = std::mem::take(&mut self.pair);
        let (Some(key), Some(count)) = (pair.key, pair.count) else {
            debug!("incomplete counts pair dropped");
            return;
        };
        if self.ctx.error_counts {
            if let Some(index) = self.uniques.get(&key) {
                if let Some(error) = self.log.errors.get_mut(*index) {
                    error.count = Some(count);
                }
            }
            if let Some(counts) = self.log.error_counts.as_mut() {
                counts.set(&key, count);
            }
        } else if self.ctx.supp_counts {
            if let Some(counts) = self.log.supp_counts.as_mut() {
                counts.set(&key, count);
            }
        }
    }

    fn close_status<L: LogListener + ?Sized>(&mut self, listener: &mut L) {
        self.status_closes += 1;
        if self.status_closes == 1 {
            self.emit(listener, Record::Status);
            while let Some(record) = self.deferred.pop() {
                self.emit(listener, record);
            }
        } else {
            listener.status_updated(&self.log.status);
        }
    }
}
