/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

mod error;
mod location;

pub use error::SaxError;
use error::description;
pub use location::Location;

/// An XML element returned from the parser.
#[derive(Debug, Eq, PartialEq)]
pub enum SaxElement<'a> {
    /// A start tag or empty element tag.
    ///
    /// The argument is the full name of the tag. This element is sent to the handler as soon as
    /// the name is parsed, before any of its attributes.
    StartTag(&'a str),

    /// A tag attribute for the last StartTag.
    ///
    /// First argument is the attribute name and the second argument is the attribute value.
    /// All references in the attribute value are replaced with the actual characters.
    Attribute(&'a str, &'a str),

    /// An end tag element.
    ///
    /// Empty element tags like `<fn/>` produce a StartTag immediately followed by an
    /// EndTag with the same name, so handlers never need to special case them.
    EndTag(&'a str),

    /// A character data element.
    ///
    /// The argument is a complete run of text between two tags, with all references
    /// already substituted. Text is held back until the run is terminated by a tag, so a
    /// run split over several [parse_bytes()](SaxParser::parse_bytes) calls is still
    /// delivered in one piece.
    CData(&'a str),
}

pub trait SaxHandler {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError>;
}

/// SAX (Simple API for XML) based incremental XML parser.
///
/// This struct implements a push parser which processes the incoming
/// bytes and invokes a handler function for each encountered
/// XML element. Input can be given in arbitrarily sized blocks, an
/// incomplete construct at the end of a block is kept in the parser
/// until the rest of it arrives with a following call.
///
/// # Examples
///
/// ```
/// use vglog::{SaxElement, SaxError, SaxHandler, SaxParser};
///
/// struct Handler { tags: usize }
/// impl SaxHandler for Handler {
///     fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
///         if let SaxElement::StartTag(_) = element {
///             self.tags += 1;
///         }
///         Ok(())
///     }
/// }
/// let mut handler = Handler { tags: 0 };
///
/// let mut parser = SaxParser::new();
/// parser.parse_bytes(&mut handler, b"<valgrindoutput><pid>4").unwrap();
/// parser.parse_bytes(&mut handler, b"2</pid></valgrind").unwrap();
/// parser.parse_bytes(&mut handler, b"output>").unwrap();
/// // This is to check if there is any incomplete XML construct at the end
/// parser.parse_finish().unwrap();
/// assert_eq!(handler.tags, 2);
/// ```
pub struct SaxParser {
    state: State,
    uni_len: u32,
    uni_left: u32,
    uni_char: u32,
    is_end_tag: bool,
    is_apos_value: bool,
    is_value_ref: bool,
    seen_root: bool,
    failed: bool,
    value_pos: usize,
    name: Vec<u8>,
    attribute: Vec<u8>,
    text: Vec<u8>,
    ref_buffer: Vec<u8>,
    char_ref_value: u32,
    cdata_start_pos: usize,
    open_tags: Vec<String>,
    location: Location,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum State {
    Prolog,
    TagStart,
    PI,
    PIEnd,
    Markup,
    CDataSectionStart,
    CDataSectionBody,
    CDataSectionMaybeEnd,
    CDataSectionMaybeEnd2,
    CommentStart,
    CommentBody,
    CommentMaybeEnd,
    CommentEnd,
    TagName,
    EndTagWhitespace,
    EmptyTagEnd,
    AttributeWhitespace,
    AttributeName,
    AttributeEq,
    AttributeValueStart,
    AttributeValue,
    CData,
    Reference,
    Entity,
    CharReference,
    CharReferenceBody,
    HexCharReference,
    Epilog,
}

const INITIAL_BUFFER_CAPACITY: usize = 128;

const REF_BUFFER_SIZE: usize = 8;

const CDATA_SECTION_START: &[u8] = b"CDATA[";

const MAX_CHAR_VALUE: u32 = 0x10ffff;

macro_rules! whitespace {
    () => {
        b' ' | b'\t' | b'\r' | b'\n'
    };
}

macro_rules! xml_error {
    ($a:ident) => {
        return Err(SaxError::BadXml(description::$a))
    };
}

fn is_valid_xml_char(c: u32) -> bool {
    matches!(c, 0x09 | 0x0a | 0x0d | 0x20..=0xd7ff | 0xe000..=0xfffd | 0x10000..=MAX_CHAR_VALUE)
}

fn append(buffer: &mut Vec<u8>, bytes: &[u8]) -> Result<(), SaxError> {
    if buffer.try_reserve(bytes.len()).is_err() {
        return Err(SaxError::NoMemory);
    }
    buffer.extend_from_slice(bytes);
    Ok(())
}

impl SaxParser {
    /// Creates a new SAX parser instance.
    ///
    /// The instance can be reused for multiple documents with the [reset()](SaxParser::reset) method.
    pub fn new() -> SaxParser {
        SaxParser {
            state: State::Prolog,
            uni_len: 0,
            uni_left: 0,
            uni_char: 0,
            is_end_tag: false,
            is_apos_value: false,
            is_value_ref: false,
            seen_root: false,
            failed: false,
            value_pos: 0,
            name: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            attribute: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            text: Vec::with_capacity(INITIAL_BUFFER_CAPACITY),
            ref_buffer: Vec::with_capacity(REF_BUFFER_SIZE),
            char_ref_value: 0,
            cdata_start_pos: 0,
            open_tags: Vec::new(),
            location: Location::new(),
        }
    }

    /// Resets the parser into a clean state.
    pub fn reset(&mut self) {
        self.state = State::Prolog;
        self.uni_len = 0;
        self.uni_left = 0;
        self.uni_char = 0;
        self.is_end_tag = false;
        self.is_apos_value = false;
        self.is_value_ref = false;
        self.seen_root = false;
        self.failed = false;
        self.value_pos = 0;
        self.name.clear();
        self.attribute.clear();
        self.text.clear();
        self.ref_buffer.clear();
        self.char_ref_value = 0;
        self.cdata_start_pos = 0;
        self.open_tags.clear();
        self.location = Location::new();
    }

    /// Position of the last consumed byte.
    ///
    /// After an error this points at the offending byte.
    pub fn location(&self) -> Location {
        self.location
    }

    /// Number of currently open tags.
    pub fn depth(&self) -> usize {
        self.open_tags.len()
    }

    /// Returns true once the root tag has been closed.
    pub fn is_complete(&self) -> bool {
        self.seen_root && self.open_tags.is_empty()
    }

    /// Checks if the document is complete.
    ///
    /// A completed document should have a root tag and should not have any
    /// unfinished XML constructs, such as open comments and markup.
    pub fn parse_finish(&mut self) -> Result<(), SaxError> {
        if self.failed {
            xml_error!(PARSER_REUSE_WITHOUT_RESET);
        }
        if !self.seen_root {
            xml_error!(DOC_NO_CONTENT);
        }
        if !self.open_tags.is_empty() {
            xml_error!(DOC_OPEN_TAGS);
        }
        if self.state != State::Epilog {
            xml_error!(DOC_OPEN_MARKUP);
        }
        Ok(())
    }

    /// Parses given XML bytes and checks if the document is complete.
    ///
    /// This is a convenience function which calls [parse_bytes()](SaxParser::parse_bytes)
    /// and [parse_finish()](SaxParser::parse_finish) methods for you.
    pub fn parse_bytes_finish(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
    ) -> Result<(), SaxError> {
        self.parse_bytes(handler, bytes)?;
        self.parse_finish()
    }

    /// Parses given XML bytes.
    ///
    /// Once an error is returned the parser refuses any further input until
    /// [reset()](SaxParser::reset) is called.
    pub fn parse_bytes(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
    ) -> Result<(), SaxError> {
        if self.failed {
            xml_error!(PARSER_REUSE_WITHOUT_RESET);
        }
        let result = self.parse_block(handler, bytes);
        if result.is_err() {
            self.failed = true;
        }
        result
    }

    fn parse_block(&mut self, handler: &mut impl SaxHandler, bytes: &[u8]) -> Result<(), SaxError> {
        let mut pos: usize = 0;
        let mut back: usize = 0;

        while pos < bytes.len() {
            let c = bytes[pos];
            self.check_utf8(c)?;
            // A state may hand the same byte over to the next state.
            while !self.step(handler, bytes, pos, &mut back)? {}
            pos += 1;
            self.location.advance(c);
        }

        if back < pos {
            match self.state {
                State::TagName => append(&mut self.name, &bytes[back..pos])?,
                State::AttributeName | State::AttributeValue => {
                    append(&mut self.attribute, &bytes[back..pos])?
                }
                State::CData | State::CDataSectionBody => {
                    append(&mut self.text, &bytes[back..pos])?
                }
                _ => (),
            }
        }

        Ok(())
    }

    fn check_utf8(&mut self, c: u8) -> Result<(), SaxError> {
        if self.uni_left > 0 {
            if c & 0xc0 != 0x80 {
                xml_error!(UTF8_INVALID_CONT_BYTE);
            }
            self.uni_char <<= 6;
            self.uni_char += c as u32 & 0x3f;
            self.uni_left -= 1;
            if self.uni_left == 0 {
                // Sequences longer than the actual character codepoint
                // size are security hazards.
                if (self.uni_len == 2 && self.uni_char <= 0x7f)
                    || (self.uni_len == 3 && self.uni_char <= 0x7ff)
                    || (self.uni_len == 4 && self.uni_char <= 0xffff)
                {
                    xml_error!(UTF8_OVERLONG_SEQUENCE);
                }
                if !is_valid_xml_char(self.uni_char) {
                    xml_error!(CHAR_INVALID);
                }
            }
        } else if c & 0x80 == 0x80 {
            if c & 0x60 == 0x40 {
                self.uni_len = 2;
                self.uni_left = 1;
                self.uni_char = c as u32 & 0x1f;
            } else if c & 0x70 == 0x60 {
                self.uni_len = 3;
                self.uni_left = 2;
                self.uni_char = c as u32 & 0x0f;
            } else if c & 0x78 == 0x70 {
                self.uni_len = 4;
                self.uni_left = 3;
                self.uni_char = c as u32 & 0x07;
            } else {
                xml_error!(UTF8_INVALID_PREFIX_BYTE);
            }
        } else if c < 0x20 && (c != 0x09 && c != 0x0a && c != 0x0d) {
            xml_error!(CHAR_INVALID);
        }
        Ok(())
    }

    /// Processes one byte. Returns false if the byte must be fed again to the new state.
    fn step(
        &mut self,
        handler: &mut impl SaxHandler,
        bytes: &[u8],
        pos: usize,
        back: &mut usize,
    ) -> Result<bool, SaxError> {
        let c = bytes[pos];

        match self.state {
            State::Prolog | State::Epilog => match c {
                b'<' => self.state = State::TagStart,
                whitespace!() => (),
                _ => xml_error!(DOC_CDATA_WITHOUT_PARENT),
            },

            State::TagStart => match c {
                b'!' => self.state = State::Markup,
                b'?' => {
                    self.flush_text(handler)?;
                    self.state = State::PI;
                }
                b'/' => {
                    if self.open_tags.is_empty() {
                        xml_error!(TAG_CLOSE_WITHOUT_OPEN);
                    }
                    self.flush_text(handler)?;
                    *back = pos + 1;
                    self.is_end_tag = true;
                    self.state = State::TagName;
                }
                whitespace!() => xml_error!(TAG_WHITESPACE_START),
                b'>' => xml_error!(TAG_EMPTY_NAME),
                _ => {
                    if self.open_tags.is_empty() && self.seen_root {
                        xml_error!(TAG_OUTSIDE_ROOT);
                    }
                    self.flush_text(handler)?;
                    *back = pos;
                    self.is_end_tag = false;
                    self.state = State::TagName;
                }
            },

            State::Markup => match c {
                b'-' => {
                    self.flush_text(handler)?;
                    self.state = State::CommentStart;
                }
                b'[' => {
                    if self.open_tags.is_empty() {
                        xml_error!(MARKUP_CDATA_SECTION_OUTSIDE_ROOT);
                    }
                    self.cdata_start_pos = 0;
                    self.state = State::CDataSectionStart;
                }
                _ => xml_error!(MARKUP_UNRECOGNIZED),
            },

            State::CDataSectionStart => {
                if CDATA_SECTION_START.get(self.cdata_start_pos) != Some(&c) {
                    xml_error!(MARKUP_CDATA_SECTION_BAD_START);
                }
                self.cdata_start_pos += 1;
                if self.cdata_start_pos == CDATA_SECTION_START.len() {
                    *back = pos + 1;
                    self.state = State::CDataSectionBody;
                }
            }

            // section text joins the surrounding text of the element
            State::CDataSectionBody => {
                if c == b']' {
                    append(&mut self.text, &bytes[*back..pos])?;
                    self.state = State::CDataSectionMaybeEnd;
                }
            }

            State::CDataSectionMaybeEnd => match c {
                b']' => self.state = State::CDataSectionMaybeEnd2,
                _ => {
                    append(&mut self.text, b"]")?;
                    *back = pos;
                    self.state = State::CDataSectionBody;
                }
            },

            State::CDataSectionMaybeEnd2 => match c {
                b'>' => {
                    *back = pos + 1;
                    self.state = State::CData;
                }
                b']' => append(&mut self.text, b"]")?,
                _ => {
                    append(&mut self.text, b"]]")?;
                    *back = pos;
                    self.state = State::CDataSectionBody;
                }
            },

            State::CommentStart => {
                if c != b'-' {
                    xml_error!(COMMENT_MISSING_DASH);
                }
                self.state = State::CommentBody;
            }

            State::CommentBody => {
                if c == b'-' {
                    self.state = State::CommentMaybeEnd;
                }
            }

            State::CommentMaybeEnd => match c {
                b'-' => self.state = State::CommentEnd,
                _ => self.state = State::CommentBody,
            },

            State::CommentEnd => {
                if c != b'>' {
                    xml_error!(COMMENT_MISSING_END);
                }
                self.resume_content(pos, back);
            }

            State::PI => {
                if c == b'?' {
                    self.state = State::PIEnd;
                }
            }

            State::PIEnd => match c {
                b'>' => self.resume_content(pos, back),
                b'?' => (),
                _ => self.state = State::PI,
            },

            State::TagName => match c {
                b'/' | b'>' | whitespace!() => {
                    append(&mut self.name, &bytes[*back..pos])?;
                    if self.name.is_empty() {
                        xml_error!(TAG_EMPTY_NAME);
                    }
                    if self.is_end_tag {
                        if c == b'/' {
                            xml_error!(TAG_DOUBLE_END);
                        }
                        self.close_tag(handler)?;
                        if c == b'>' {
                            self.resume_content(pos, back);
                        } else {
                            self.state = State::EndTagWhitespace;
                        }
                    } else {
                        self.open_tag(handler)?;
                        match c {
                            b'/' => self.state = State::EmptyTagEnd,
                            b'>' => {
                                *back = pos + 1;
                                self.state = State::CData;
                            }
                            _ => self.state = State::AttributeWhitespace,
                        }
                    }
                }
                _ => (),
            },

            State::EmptyTagEnd => match c {
                b'>' => {
                    self.close_empty_tag(handler)?;
                    self.resume_content(pos, back);
                }
                _ => xml_error!(TAG_EMPTY_TAG_MISSING_END),
            },

            State::EndTagWhitespace => match c {
                b'>' => self.resume_content(pos, back),
                whitespace!() => (),
                _ => xml_error!(TAG_END_TAG_ATTRIBUTES),
            },

            State::AttributeWhitespace => match c {
                whitespace!() => (),
                b'/' => self.state = State::EmptyTagEnd,
                b'>' => {
                    *back = pos + 1;
                    self.state = State::CData;
                }
                _ => {
                    *back = pos;
                    self.state = State::AttributeName;
                    return Ok(false);
                }
            },

            State::AttributeName => match c {
                b'=' | whitespace!() => {
                    append(&mut self.attribute, &bytes[*back..pos])?;
                    if c == b'=' {
                        self.state = State::AttributeValueStart;
                    } else {
                        self.state = State::AttributeEq;
                    }
                }
                b'/' | b'>' | b'<' => xml_error!(TAG_ATTRIBUTE_BAD_NAME),
                _ => (),
            },

            State::AttributeEq => match c {
                b'=' => self.state = State::AttributeValueStart,
                whitespace!() => (),
                _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_EQUAL),
            },

            State::AttributeValueStart => match c {
                b'"' | b'\'' => {
                    self.is_apos_value = c == b'\'';
                    self.value_pos = self.attribute.len();
                    *back = pos + 1;
                    self.state = State::AttributeValue;
                }
                whitespace!() => (),
                _ => xml_error!(TAG_ATTRIBUTE_WITHOUT_QUOTE),
            },

            State::AttributeValue => {
                if (self.is_apos_value && c == b'\'') || (!self.is_apos_value && c == b'"') {
                    append(&mut self.attribute, &bytes[*back..pos])?;
                    self.send_attribute(handler)?;
                    self.state = State::AttributeWhitespace;
                } else if c == b'&' {
                    append(&mut self.attribute, &bytes[*back..pos])?;
                    self.ref_buffer.clear();
                    self.is_value_ref = true;
                    self.state = State::Reference;
                } else if c == b'<' {
                    xml_error!(TAG_ATTRIBUTE_BAD_VALUE);
                }
            }

            State::CData => match c {
                b'<' => {
                    // flushed once the markup turns out not to be a CDATA section
                    append(&mut self.text, &bytes[*back..pos])?;
                    self.state = State::TagStart;
                }
                b'&' => {
                    append(&mut self.text, &bytes[*back..pos])?;
                    self.ref_buffer.clear();
                    self.is_value_ref = false;
                    self.state = State::Reference;
                }
                _ => (),
            },

            State::Reference => match c {
                b'#' => {
                    self.char_ref_value = 0;
                    self.state = State::CharReference;
                }
                b';' => xml_error!(REFERENCE_CUSTOM_ENTITY),
                _ => {
                    self.ref_buffer.push(c);
                    self.state = State::Entity;
                }
            },

            State::Entity => match c {
                b';' => {
                    let ent = match self.ref_buffer.as_slice() {
                        b"amp" => '&',
                        b"lt" => '<',
                        b"gt" => '>',
                        b"quot" => '"',
                        b"apos" => '\'',
                        _ => xml_error!(REFERENCE_CUSTOM_ENTITY),
                    };
                    self.push_reference(ent)?;
                    *back = pos + 1;
                }
                _ => {
                    if self.ref_buffer.len() >= REF_BUFFER_SIZE {
                        xml_error!(REFERENCE_CUSTOM_ENTITY);
                    }
                    self.ref_buffer.push(c);
                }
            },

            State::CharReference => match c {
                b'x' => self.state = State::HexCharReference,
                b'0'..=b'9' => {
                    self.char_ref_value = u32::from(c - b'0');
                    self.state = State::CharReferenceBody;
                }
                _ => xml_error!(REFERENCE_INVALID_DECIMAL),
            },

            State::CharReferenceBody => match c {
                b';' => {
                    self.push_char_reference()?;
                    *back = pos + 1;
                }
                b'0'..=b'9' => {
                    self.char_ref_value = self.char_ref_value * 10 + u32::from(c - b'0');
                    if self.char_ref_value > MAX_CHAR_VALUE {
                        xml_error!(REFERENCE_TOO_LARGE);
                    }
                }
                _ => xml_error!(REFERENCE_INVALID_DECIMAL),
            },

            State::HexCharReference => match c {
                b';' => {
                    self.push_char_reference()?;
                    *back = pos + 1;
                }
                _ => match char::from(c).to_digit(16) {
                    Some(digit) => {
                        self.char_ref_value = self.char_ref_value * 16 + digit;
                        if self.char_ref_value > MAX_CHAR_VALUE {
                            xml_error!(REFERENCE_TOO_LARGE);
                        }
                    }
                    None => xml_error!(REFERENCE_INVALID_HEX),
                },
            },
        }

        Ok(true)
    }

    fn resume_content(&mut self, pos: usize, back: &mut usize) {
        if !self.open_tags.is_empty() {
            *back = pos + 1;
            self.state = State::CData;
        } else if self.seen_root {
            self.state = State::Epilog;
        } else {
            self.state = State::Prolog;
        }
    }

    fn open_tag(&mut self, handler: &mut impl SaxHandler) -> Result<(), SaxError> {
        let name = match String::from_utf8(std::mem::take(&mut self.name)) {
            Ok(name) => name,
            Err(_) => xml_error!(UTF8_INVALID_CONT_BYTE),
        };
        if self.open_tags.try_reserve(1).is_err() {
            return Err(SaxError::NoMemory);
        }
        self.open_tags.push(name);
        self.seen_root = true;
        match self.open_tags.last() {
            Some(name) => handler.handle_element(&SaxElement::StartTag(name)),
            None => Ok(()),
        }
    }

    fn close_tag(&mut self, handler: &mut impl SaxHandler) -> Result<(), SaxError> {
        let open = match self.open_tags.pop() {
            Some(open) => open,
            None => xml_error!(TAG_CLOSE_WITHOUT_OPEN),
        };
        if open.as_bytes() != self.name.as_slice() {
            xml_error!(TAG_MISMATCH);
        }
        self.name.clear();
        handler.handle_element(&SaxElement::EndTag(&open))
    }

    fn close_empty_tag(&mut self, handler: &mut impl SaxHandler) -> Result<(), SaxError> {
        match self.open_tags.pop() {
            Some(open) => handler.handle_element(&SaxElement::EndTag(&open)),
            None => xml_error!(TAG_CLOSE_WITHOUT_OPEN),
        }
    }

    fn send_attribute(&mut self, handler: &mut impl SaxHandler) -> Result<(), SaxError> {
        let result = {
            let (name, value) = self.attribute.split_at(self.value_pos);
            match (std::str::from_utf8(name), std::str::from_utf8(value)) {
                (Ok(name), Ok(value)) => handler.handle_element(&SaxElement::Attribute(name, value)),
                _ => Err(SaxError::BadXml(description::UTF8_INVALID_CONT_BYTE)),
            }
        };
        self.attribute.clear();
        result
    }

    fn flush_text(&mut self, handler: &mut impl SaxHandler) -> Result<(), SaxError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let result = match std::str::from_utf8(&self.text) {
            Ok(text) => handler.handle_element(&SaxElement::CData(text)),
            Err(_) => Err(SaxError::BadXml(description::UTF8_INVALID_CONT_BYTE)),
        };
        self.text.clear();
        result
    }

    fn push_char_reference(&mut self) -> Result<(), SaxError> {
        if !is_valid_xml_char(self.char_ref_value) {
            xml_error!(CHAR_INVALID);
        }
        match char::from_u32(self.char_ref_value) {
            Some(ch) => self.push_reference(ch),
            None => xml_error!(CHAR_INVALID),
        }
    }

    fn push_reference(&mut self, ch: char) -> Result<(), SaxError> {
        let mut buf = [0u8; 4];
        let encoded = ch.encode_utf8(&mut buf).as_bytes();
        if self.is_value_ref {
            append(&mut self.attribute, encoded)?;
            self.state = State::AttributeValue;
        } else {
            append(&mut self.text, encoded)?;
            self.state = State::CData;
        }
        Ok(())
    }
}

impl Default for SaxParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
