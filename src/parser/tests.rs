/*
** This file is a part of Vglog (Valgrind XML log reader and merger)
** Copyright (C) 2000-2025 Gurer Ozen
**
** Vglog is free software: you can redistribute it and/or modify it
** under the terms of the GNU Lesser General Public License as
** published by the Free Software Foundation, either version 3 of
** the License, or (at your option) any later version.
*/

use super::*;

#[derive(Debug, Eq, PartialEq)]
enum Owned {
    Start(String),
    Attr(String, String),
    End(String),
    Text(String),
}

#[derive(Default)]
struct Recorder {
    events: Vec<Owned>,
}

impl SaxHandler for Recorder {
    fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
        self.events.push(match element {
            SaxElement::StartTag(name) => Owned::Start(name.to_string()),
            SaxElement::Attribute(name, value) => Owned::Attr(name.to_string(), value.to_string()),
            SaxElement::EndTag(name) => Owned::End(name.to_string()),
            SaxElement::CData(text) => Owned::Text(text.to_string()),
        });
        Ok(())
    }
}

struct Tester<'a> {
    expected: &'a [SaxElement<'a>],
}

impl<'a> Tester<'a> {
    fn new(expected: &'a [SaxElement]) -> Tester<'a> {
        Tester { expected }
    }

    fn owned(&self) -> Vec<Owned> {
        let mut recorder = Recorder::default();
        for element in self.expected {
            recorder.handle_element(element).unwrap();
        }
        recorder.events
    }

    fn check(&self, s: &str) {
        let nr_lines = s.matches('\n').count() + 1;

        let mut recorder = Recorder::default();
        let mut parser = SaxParser::new();
        assert!(parser.parse_bytes_finish(&mut recorder, s.as_bytes()).is_ok());
        assert_eq!(recorder.events, self.owned());
        assert_eq!(parser.location().line, nr_lines);
        assert_eq!(parser.location().bytes, s.len());

        // now try byte by byte
        parser.reset();
        let mut recorder = Recorder::default();
        for i in 0..s.len() {
            assert!(parser.parse_bytes(&mut recorder, &s.as_bytes()[i..i + 1]).is_ok());
        }
        assert!(parser.parse_finish().is_ok());
        assert_eq!(recorder.events, self.owned());
        assert_eq!(parser.location().bytes, s.len());
    }
}

struct BadTester {
    bad_byte: usize,
}

impl BadTester {
    fn new(bad_byte: usize) -> BadTester {
        BadTester { bad_byte }
    }

    fn check(&self, s: &str, description: &'static str) {
        self.check_bytes(s.as_bytes(), description)
    }

    fn check_bytes(&self, bytes: &[u8], description: &'static str) {
        let mut parser = SaxParser::new();
        assert_eq!(
            parser.parse_bytes_finish(&mut Recorder::default(), bytes),
            Err(SaxError::BadXml(description))
        );
        assert_eq!(parser.location().bytes, self.bad_byte);
    }
}

#[test]
fn tags() {
    Tester::new(&[SaxElement::StartTag("lonely"), SaxElement::EndTag("lonely")])
        .check("<lonely/>");

    Tester::new(&[SaxElement::StartTag("lonely"), SaxElement::EndTag("lonely")])
        .check("   <lonely/>    ");

    Tester::new(&[
        SaxElement::StartTag("valgrindoutput"),
        SaxElement::StartTag("frame"),
        SaxElement::StartTag("fn"),
        SaxElement::EndTag("fn"),
        SaxElement::EndTag("frame"),
        SaxElement::CData("\n"),
        SaxElement::EndTag("valgrindoutput"),
    ])
    .check("<?xml version=\"1.0\"?>\n<valgrindoutput><frame><fn /></frame>\n</valgrindoutput>\n");

    Tester::new(&[
        SaxElement::StartTag("parent"),
        SaxElement::StartTag("b"),
        SaxElement::CData("lala"),
        SaxElement::EndTag("b"),
        SaxElement::EndTag("parent"),
    ])
    .check("<parent  ><b>lala</b \n></parent>");
}

#[test]
fn attributes() {
    Tester::new(&[
        SaxElement::StartTag("mytag"),
        SaxElement::Attribute("abc", "123"),
        SaxElement::Attribute("id", "XC72"),
        SaxElement::EndTag("mytag"),
    ])
    .check("<mytag abc='123' id=\"XC72\"></mytag>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::StartTag("b"),
        SaxElement::Attribute("x1", "la&la"),
        SaxElement::EndTag("b"),
        SaxElement::StartTag("c"),
        SaxElement::Attribute("x2", "12\"34"),
        SaxElement::EndTag("c"),
        SaxElement::EndTag("a"),
    ])
    .check("<a><b x1 ='la&amp;la'/><c x2\t= \t'12\"34'/></a>");
}

#[test]
fn comments_and_pi() {
    Tester::new(&[
        SaxElement::StartTag("what"),
        SaxElement::CData("Invalid read"),
        SaxElement::EndTag("what"),
    ])
    .check("<!-- head --><what><!-- a - b -->Invalid read</what><!-- tail -->");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::CData("bibi"),
        SaxElement::EndTag("a"),
    ])
    .check("<?xml version='1.0' ? ?><a><?pi x?>bibi</a><?trailer?>");
}

#[test]
fn entities() {
    Tester::new(&[
        SaxElement::StartTag("fn"),
        SaxElement::CData("std::vector<int>::operator[](unsigned long) & 'x' \"y\""),
        SaxElement::EndTag("fn"),
    ])
    .check("<fn>std::vector&lt;int&gt;::operator[](unsigned long) &amp; &apos;x&apos; &quot;y&quot;</fn>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::CData(";AB;"),
        SaxElement::EndTag("a"),
    ])
    .check("<a>&#x3B;&#65;&#x42;&#x3b;</a>");

    Tester::new(&[
        SaxElement::StartTag("a"),
        SaxElement::CData(" \u{90} \u{900} \u{10abc} "),
        SaxElement::EndTag("a"),
    ])
    .check("<a> &#x90; &#x900; &#x10abc; </a>");
}

#[test]
fn cdata_sections() {
    Tester::new(&[
        SaxElement::StartTag("usercomment"),
        SaxElement::CData("run <1> & ]] ]]done"),
        SaxElement::EndTag("usercomment"),
    ])
    .check("<usercomment>run <![CDATA[<1> & ]] ]]]]>done</usercomment>");

    Tester::new(&[
        SaxElement::StartTag("r"),
        SaxElement::StartTag("a"),
        SaxElement::CData("x]y"),
        SaxElement::EndTag("a"),
        SaxElement::StartTag("b"),
        SaxElement::EndTag("b"),
        SaxElement::EndTag("r"),
    ])
    .check("<r><a><![CDATA[]]><![CDATA[x]y]]></a><b><![CDATA[]]></b></r>");
}

#[test]
fn utf8() {
    Tester::new(&[
        SaxElement::StartTag("file"),
        SaxElement::CData("Чингис хан.c"),
        SaxElement::EndTag("file"),
    ])
    .check("<file>Чингис хан.c</file>");
}

#[test]
fn text_is_delivered_whole() {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    parser.parse_bytes(&mut recorder, b"<what>Invalid re").unwrap();
    assert_eq!(recorder.events, vec![Owned::Start("what".into())]);
    assert_eq!(parser.depth(), 1);
    parser.parse_bytes(&mut recorder, b"ad of size 4</wh").unwrap();
    assert_eq!(
        recorder.events,
        vec![
            Owned::Start("what".into()),
            Owned::Text("Invalid read of size 4".into())
        ]
    );
    parser.parse_bytes(&mut recorder, b"at>").unwrap();
    assert_eq!(parser.depth(), 0);
    assert!(parser.is_complete());
    parser.parse_finish().unwrap();
}

#[test]
fn bad_docs() {
    BadTester::new(0).check("lala", description::DOC_CDATA_WITHOUT_PARENT);
    BadTester::new(1).check("< a/>", description::TAG_WHITESPACE_START);
    BadTester::new(6).check("<a></b>", description::TAG_MISMATCH);
    BadTester::new(8).check("<a></a><b/>", description::TAG_OUTSIDE_ROOT);
    BadTester::new(8).check("<a></a> x", description::DOC_CDATA_WITHOUT_PARENT);
    BadTester::new(4).check("<a b></a>", description::TAG_ATTRIBUTE_BAD_NAME);
    BadTester::new(5).check("<a b=1></a>", description::TAG_ATTRIBUTE_WITHOUT_QUOTE);
    BadTester::new(7).check("<a>&foo;</a>", description::REFERENCE_CUSTOM_ENTITY);
    BadTester::new(5).check("<a>&#z;</a>", description::REFERENCE_INVALID_DECIMAL);
    BadTester::new(6).check("<a>&#xg;</a>", description::REFERENCE_INVALID_HEX);
    BadTester::new(6).check("<a>&#0;</a>", description::CHAR_INVALID);
    BadTester::new(2).check("<![CDATA[x]]><a/>", description::MARKUP_CDATA_SECTION_OUTSIDE_ROOT);
    BadTester::new(9).check("<a><![CDAX[x]]></a>", description::MARKUP_CDATA_SECTION_BAD_START);
    BadTester::new(5).check("<a><!DOCTYPE a></a>", description::MARKUP_UNRECOGNIZED);
    BadTester::new(19).check("<a><![CDATA[x]]</a>", description::DOC_OPEN_TAGS);
    BadTester::new(3).check("<a>", description::DOC_OPEN_TAGS);
    BadTester::new(0).check("", description::DOC_NO_CONTENT);
    BadTester::new(8).check("<a/><!--", description::DOC_OPEN_MARKUP);
    BadTester::new(4).check_bytes(b"<a>\xc0\x80</a>", description::UTF8_OVERLONG_SEQUENCE);
    BadTester::new(3).check_bytes(b"<a>\xff</a>", description::UTF8_INVALID_PREFIX_BYTE);
}

#[test]
fn no_reuse_after_error() {
    let mut recorder = Recorder::default();
    let mut parser = SaxParser::new();
    assert!(parser.parse_bytes(&mut recorder, b"<a></b>").is_err());
    assert_eq!(
        parser.parse_bytes(&mut recorder, b"<c/>"),
        Err(SaxError::BadXml(description::PARSER_REUSE_WITHOUT_RESET))
    );
    parser.reset();
    assert!(parser.parse_bytes_finish(&mut recorder, b"<c/>").is_ok());
}

#[test]
fn handler_abort() {
    struct Aborter;
    impl SaxHandler for Aborter {
        fn handle_element(&mut self, element: &SaxElement) -> Result<(), SaxError> {
            match element {
                SaxElement::StartTag("stop") => Err(SaxError::HandlerAbort),
                _ => Ok(()),
            }
        }
    }
    let mut parser = SaxParser::new();
    assert_eq!(
        parser.parse_bytes(&mut Aborter, b"<a><b/><stop/></a>"),
        Err(SaxError::HandlerAbort)
    );
    assert_eq!(parser.location().bytes, 12);
}
