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

/// Type of the error which happened during the XML SAX parsing.
///
/// These categories are designed to be as few as possible and correspond to the distinct
/// actions the caller might take based on the problem. The location of the problem is
/// available via [location()](super::SaxParser::location).
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum SaxError {
    /// Parser could not allocate the memory needed for parsing buffers.
    #[error("not enough memory")]
    NoMemory,

    /// A syntax error is encountered in the XML input.
    ///
    /// The argument describes the actual syntax issue.
    #[error("invalid xml syntax: {0}")]
    BadXml(&'static str),

    /// Element handler function returned this error.
    ///
    /// This is intended for caller's handler to be able to abort the processing while
    /// signalling to the caller that the interruption is not caused by the parser itself.
    /// The handler is expected to keep the actual reason around.
    #[error("aborted by the sax handler")]
    HandlerAbort,
}

pub(super) mod description {
    pub(in super::super) const PARSER_REUSE_WITHOUT_RESET: &str =
        "cannot continue after an error without a reset";
    pub(in super::super) const UTF8_INVALID_CONT_BYTE: &str = "Invalid UTF8 continuation byte";
    pub(in super::super) const UTF8_OVERLONG_SEQUENCE: &str = "Overlong UTF8 sequence";
    pub(in super::super) const UTF8_INVALID_PREFIX_BYTE: &str = "Invalid UTF8 prefix byte";
    pub(in super::super) const CHAR_INVALID: &str = "Invalid XML character";
    pub(in super::super) const DOC_NO_CONTENT: &str = "Document has no root tag";
    pub(in super::super) const DOC_OPEN_TAGS: &str = "Document has unclosed tags";
    pub(in super::super) const DOC_OPEN_MARKUP: &str =
        "Document ends inside a tag, PI, comment or character data section";
    pub(in super::super) const DOC_CDATA_WITHOUT_PARENT: &str =
        "Character data not allowed outside of the root tag";
    pub(in super::super) const TAG_CLOSE_WITHOUT_OPEN: &str = "Close tag without open";
    pub(in super::super) const TAG_MISMATCH: &str = "Start and end tags have different names";
    pub(in super::super) const TAG_WHITESPACE_START: &str = "Tag cannot start with whitespace";
    pub(in super::super) const TAG_OUTSIDE_ROOT: &str = "Tags cannot be outside of the root tag";
    pub(in super::super) const TAG_EMPTY_NAME: &str = "Tag has no name";
    pub(in super::super) const TAG_DOUBLE_END: &str = "End tag has standalone ending too";
    pub(in super::super) const TAG_END_TAG_ATTRIBUTES: &str = "End tag cannot have attributes";
    pub(in super::super) const TAG_EMPTY_TAG_MISSING_END: &str =
        "Empty element tags must end after the '/'";
    pub(in super::super) const TAG_ATTRIBUTE_WITHOUT_EQUAL: &str =
        "Tag attributes must have '=' before the value";
    pub(in super::super) const TAG_ATTRIBUTE_WITHOUT_QUOTE: &str =
        "Tag attribute value must be double or single quotes";
    pub(in super::super) const TAG_ATTRIBUTE_BAD_NAME: &str =
        "Tag attribute names cannot have '/', '<' or '>'";
    pub(in super::super) const TAG_ATTRIBUTE_BAD_VALUE: &str =
        "Tag value cannot have '<' character without a reference";
    pub(in super::super) const REFERENCE_INVALID_DECIMAL: &str =
        "Non digit in decimal character reference";
    pub(in super::super) const REFERENCE_INVALID_HEX: &str =
        "Non hex digit in hexadecimal character reference";
    pub(in super::super) const REFERENCE_TOO_LARGE: &str =
        "Character reference is out of the unicode range";
    pub(in super::super) const REFERENCE_CUSTOM_ENTITY: &str =
        "Non-predefined entity references are not supported";
    pub(in super::super) const COMMENT_MISSING_DASH: &str =
        "Comment tag should start with double dash";
    pub(in super::super) const COMMENT_MISSING_END: &str =
        "Comment tag should end after double dash";
    pub(in super::super) const MARKUP_CDATA_SECTION_BAD_START: &str =
        "Character data sections must start with '[CDATA['";
    pub(in super::super) const MARKUP_CDATA_SECTION_OUTSIDE_ROOT: &str =
        "Character data sections cannot be outside of the root tag";
    pub(in super::super) const MARKUP_UNRECOGNIZED: &str =
        "Markup is not a comment or character data section, DTDs are not used in logs";
}
