/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod entities;
mod feed;
mod merge;
pub mod model;
mod parser;
mod reader;
mod tags;
mod writer;

pub use parser::Location;
pub use parser::SaxElement;
pub use parser::SaxError;
pub use parser::SaxHandler;
pub use parser::SaxParser;

pub use tags::Tag;

pub use model::Counts;
pub use model::Frame;
pub use model::Info;
pub use model::Log;
pub use model::RunState;
pub use model::Stack;
pub use model::TopStatus;
pub use model::VgError;

pub use reader::DEFAULT_PROTOCOL_VERSION;
pub use reader::KindPolicy;
pub use reader::LogListener;
pub use reader::LogReader;
pub use reader::ReadError;
pub use reader::ReaderConfig;
pub use reader::Record;
pub use reader::parse_log;

pub use merge::MATCH_FRAMES;
pub use merge::MergeError;
pub use merge::MergeProblem;
pub use merge::MergeReport;
pub use merge::errors_match;
pub use merge::frames_match;
pub use merge::merge;
pub use merge::merge_all;

pub use writer::TextLog;
pub use writer::XmlLog;

pub use feed::FeedError;
pub use feed::LogFeed;
pub use feed::load_log;
