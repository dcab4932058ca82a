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

type Site<'a> = (&'a str, &'a str, u32);

const FOO: &[Site<'static>] = &[("foo", "x.c", 10), ("main", "main.c", 3)];
const BAR: &[Site<'static>] = &[("bar", "y.c", 20), ("main", "main.c", 4)];
const ALLOC: &[Site<'static>] = &[("malloc", "vg_replace_malloc.c", 299), ("main", "main.c", 7)];

fn frames_xml(sites: &[Site]) -> String {
    sites
        .iter()
        .map(|(function, file, line)| {
            format!(
                "<frame><ip>0x{line:X}</ip><obj>/bin/demo</obj><fn>{function}</fn>\
                 <dir>/nonexistent</dir><file>{file}</file><line>{line}</line></frame>"
            )
        })
        .collect()
}

fn error_xml(unique: &str, kind: &str, what: &str, sites: &[Site]) -> String {
    format!(
        "<error><unique>{unique}</unique><tid>1</tid><kind>{kind}</kind><what>{what}</what>\
         <stack>{}</stack></error>",
        frames_xml(sites)
    )
}

fn leak_xml(unique: &str, what: &str, bytes: u64, blocks: u64, sites: &[Site]) -> String {
    format!(
        "<error><unique>{unique}</unique><tid>1</tid><kind>Leak_DefinitelyLost</kind>\
         <xwhat><text>{what}</text><leakedbytes>{bytes}</leakedbytes>\
         <leakedblocks>{blocks}</leakedblocks></xwhat><stack>{}</stack></error>",
        frames_xml(sites)
    )
}

fn counts_xml(pairs: &[(&str, u64)]) -> String {
    let pairs: String = pairs
        .iter()
        .map(|(unique, count)| format!("<pair><count>{count}</count><unique>{unique}</unique></pair>"))
        .collect();
    format!("<errorcounts>{pairs}</errorcounts>")
}

fn supp_xml(pairs: &[(&str, u64)]) -> String {
    let pairs: String = pairs
        .iter()
        .map(|(name, count)| format!("<pair><count>{count}</count><name>{name}</name></pair>"))
        .collect();
    format!("<suppcounts>{pairs}</suppcounts>")
}

fn log_of(tool: &str, exe: &str, body: &str) -> Log {
    format!(
        "<valgrindoutput><protocolversion>1</protocolversion><tool>{tool}</tool>\
         <args><argv><exe>{exe}</exe></argv></args>\
         <status><state>FINISHED</state></status>{body}</valgrindoutput>"
    )
    .parse()
    .unwrap()
}

fn log(body: &str) -> Log {
    log_of("memcheck", "/bin/demo", body)
}

#[test]
fn identical_errors_add_counts() {
    let mut master = log(&format!(
        "{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x1", 3)])
    ));
    let slave = log(&format!(
        "{}{}",
        error_xml("0x7", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x7", 2)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.appended, 0);
    assert!(report.problems.is_empty());
    assert_eq!(master.errors.len(), 1);
    assert_eq!(master.errors[0].to_string(), "IVR [5]: Invalid read of size 4");
    let counts = master.error_counts.as_ref().unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("0x1"), Some(5));
    assert_eq!(master.status.errors, 5);
}

#[test]
fn only_the_innermost_frames_are_compared() {
    let deep: &[Site] = &[
        ("memcpy", "vg_replace_strmem.c", 1033),
        ("copy", "copy.c", 12),
        ("load", "load.c", 40),
        ("run", "run.c", 7),
        ("main", "main.c", 3),
    ];
    let other_caller: &[Site] = &[
        ("memcpy", "vg_replace_strmem.c", 1033),
        ("copy", "copy.c", 12),
        ("load", "load.c", 40),
        ("run", "run.c", 7),
        ("start", "start.c", 90),
        ("main", "main.c", 8),
    ];
    let other_fourth: &[Site] = &[
        ("memcpy", "vg_replace_strmem.c", 1033),
        ("copy", "copy.c", 12),
        ("load", "load.c", 40),
        ("reload", "run.c", 19),
        ("main", "main.c", 3),
    ];
    let what = "Source and destination overlap in memcpy(0x1, 0x2, 8)";
    let mut master = log(&format!(
        "{}{}",
        error_xml("0x1", "Overlap", what, deep),
        counts_xml(&[("0x1", 2)])
    ));
    let slave = log(&format!(
        "{}{}{}",
        error_xml("0x1", "Overlap", what, other_caller),
        error_xml("0x2", "Overlap", what, other_fourth),
        counts_xml(&[("0x1", 5), ("0x2", 1)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(report.appended, 1);
    assert_eq!(master.errors.len(), 2);
    assert_eq!(master.errors[0].count, Some(7));
    assert_eq!(master.errors[0].primary_stack().unwrap().len(), 5);
    let counts = master.error_counts.as_ref().unwrap();
    assert_eq!(counts.get("0x1"), Some(7));
    assert_eq!(counts.get("0x2"), Some(1));
    assert_eq!(master.status.errors, 8);
}

#[test]
fn kinds_must_be_identical() {
    let mut master = log(&format!(
        "{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x1", 1)])
    ));
    let slave = log(&format!(
        "{}{}",
        error_xml("0x2", "InvalidWrite", "Invalid write of size 4", FOO),
        counts_xml(&[("0x2", 1)])
    ));
    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.matched, 0);
    assert_eq!(report.appended, 1);
    assert_eq!(master.errors.len(), 2);
    assert_eq!(master.status.errors, 2);
}

#[test]
fn append_into_empty_master() {
    let mut master = log("");
    assert!(master.error_counts.is_none());
    let slave = log(&format!(
        "{}{}",
        error_xml("0x1", "InvalidFree", "Invalid free() / delete / delete[]", FOO),
        counts_xml(&[("0x1", 4)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.appended, 1);
    assert_eq!(master.errors.len(), 1);
    let counts = master.error_counts.as_ref().unwrap();
    assert!(counts.is_closed());
    assert_eq!(counts.len(), 1);
    assert_eq!(counts.get("0x1"), Some(4));
    assert_eq!(master.errors[0].count, Some(4));
}

#[test]
fn incompatible_logs_leave_master_alone() {
    let body = format!(
        "{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x1", 3)])
    );
    let mut master = log(&body);
    let before = master.clone();

    let err = merge(&mut master, log_of("helgrind", "/bin/demo", &body)).unwrap_err();
    assert!(matches!(err, MergeError::ToolMismatch { .. }));
    assert_eq!(master, before);

    let err = merge(&mut master, log_of("memcheck", "/bin/other", &body)).unwrap_err();
    assert_eq!(
        err,
        MergeError::ExeMismatch {
            master: "/bin/demo".to_string(),
            slave: "/bin/other".to_string(),
        }
    );
    assert_eq!(master, before);
}

#[test]
fn colliding_uniques_are_renumbered() {
    let mut master = log(&format!(
        "{}{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        error_xml("0x3", "InvalidRead", "Invalid read of size 8", ALLOC),
        counts_xml(&[("0x1", 1), ("0x3", 1)])
    ));
    let slave = log(&format!(
        "{}{}",
        error_xml("0x3", "InvalidRead", "Invalid read of size 2", BAR),
        counts_xml(&[("0x3", 6)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.renumbered, 1);
    let appended = &master.errors[2];
    assert_eq!(appended.unique, "0x4");
    assert_eq!(appended.what, "Invalid read of size 2");
    let counts = master.error_counts.as_ref().unwrap();
    assert_eq!(counts.get("0x3"), Some(1));
    assert_eq!(counts.get("0x4"), Some(6));
    assert_eq!(master.status.errors, 8);
}

#[test]
fn renumbering_past_the_largest_hex_id() {
    let mut master = log(&format!(
        "{}{}",
        error_xml("0xffffffffffffffff", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0xffffffffffffffff", 1)])
    ));
    let slave = log(&format!(
        "{}{}{}",
        error_xml("0xffffffffffffffff", "InvalidWrite", "Invalid write of size 4", BAR),
        error_xml("0x1", "InvalidWrite", "Invalid write of size 1", ALLOC),
        counts_xml(&[("0xffffffffffffffff", 2), ("0x1", 3)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.appended, 2);
    assert_eq!(report.renumbered, 1);
    let uniques: Vec<&str> = master.errors.iter().map(|e| e.unique.as_str()).collect();
    assert_eq!(uniques, vec!["0xffffffffffffffff", "0xffffffffffffffff-1", "0x1"]);
    let counts = master.error_counts.as_ref().unwrap();
    assert_eq!(counts.get("0xffffffffffffffff-1"), Some(2));
    assert_eq!(master.status.errors, 6);
}

#[test]
fn appended_errors_come_before_leaks() {
    let mut master = log(&format!(
        "{}{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x1", 1)]),
        leak_xml("0x2", "8 bytes in 1 blocks are definitely lost in loss record 1 of 1", 8, 1, ALLOC)
    ));
    let slave = log(&format!(
        "{}{}",
        error_xml("0x1", "UninitCondition", "Conditional jump or move depends on uninitialised value(s)", BAR),
        counts_xml(&[("0x1", 2)])
    ));

    merge(&mut master, slave).unwrap();
    let acronyms: Vec<&str> = master.errors.iter().map(|e| e.acronym()).collect();
    assert_eq!(acronyms, vec!["IVR", "UNC", "LDL"]);
}

#[test]
fn suppression_counts() {
    let mut master = log(&supp_xml(&[("dl-hack3-cond-1", 1)]));
    let slave = log(&supp_xml(&[("dl-hack3-cond-1", 2), ("libc-strlen", 5)]));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.suppressions_matched, 1);
    assert_eq!(report.suppressions_appended, 1);
    let counts = master.supp_counts.as_ref().unwrap();
    assert_eq!(counts.get("dl-hack3-cond-1"), Some(3));
    assert_eq!(counts.get("libc-strlen"), Some(5));
    assert_eq!(master.status.suppressed, 8);
}

#[test]
fn leak_reports_are_summed() {
    let mut master = log(&leak_xml(
        "0x1",
        "16 bytes in 1 blocks are definitely lost in loss record 1 of 2",
        16,
        1,
        ALLOC,
    ));
    let slave = log(&leak_xml(
        "0x9",
        "1,000 bytes in 3 blocks are definitely lost in loss record 2 of 5",
        1000,
        3,
        ALLOC,
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.leaks_matched, 1);
    assert!(report.problems.is_empty());
    let leak = &master.errors[0];
    assert_eq!(leak.leaked_bytes, Some(1016));
    assert_eq!(leak.leaked_blocks, Some(4));
    assert_eq!(
        leak.what,
        "1,016 bytes in 4 blocks are definitely lost in loss record 1 of 2"
    );
    assert_eq!(master.status.leaked_bytes, 1016);
    assert_eq!(master.status.leaked_blocks, 4);
}

#[test]
fn leak_reports_with_indirect_bytes() {
    let what = "48 (16 direct, 32 indirect) bytes in 1 blocks are definitely lost in loss record 3 of 3";
    let mut master = log(&leak_xml("0x1", what, 48, 1, ALLOC));
    let slave = log(&leak_xml("0x1", what, 48, 1, ALLOC));

    merge(&mut master, slave).unwrap();
    assert_eq!(
        master.errors[0].what,
        "96 (32 direct, 64 indirect) bytes in 2 blocks are definitely lost in loss record 3 of 3"
    );
}

#[test]
fn unparsable_leak_description() {
    let mut master = log(&leak_xml("0x1", "some memory was lost", 16, 1, ALLOC));
    let slave = log(&leak_xml(
        "0x2",
        "16 bytes in 1 blocks are definitely lost in loss record 1 of 1",
        16,
        1,
        ALLOC,
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(
        report.problems,
        vec![MergeProblem::UnparsableWhat {
            unique: "0x1".to_string(),
            what: "some memory was lost".to_string(),
        }]
    );
    assert_eq!(master.errors[0].what, "some memory was lost");
    assert_eq!(master.errors[0].leaked_bytes, Some(32));
}

#[test]
fn unmatched_leaks_are_appended() {
    let mut master = log(&leak_xml(
        "0x1",
        "16 bytes in 1 blocks are definitely lost in loss record 1 of 1",
        16,
        1,
        ALLOC,
    ));
    let slave = log(&leak_xml(
        "0x1",
        "8 bytes in 1 blocks are definitely lost in loss record 1 of 1",
        8,
        1,
        FOO,
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.leaks_appended, 1);
    assert!(report.problems.is_empty());
    assert_eq!(master.errors.len(), 2);
    assert_eq!(master.errors[1].unique, "0x2");
    assert_eq!(master.status.leaked_bytes, 24);
}

#[test]
fn count_overflow_is_reported() {
    let mut master = log(&format!(
        "{}{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        error_xml("0x2", "InvalidWrite", "Invalid write of size 4", BAR),
        counts_xml(&[("0x1", u64::MAX), ("0x2", 1)])
    ));
    let slave = log(&format!(
        "{}{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        error_xml("0x2", "InvalidWrite", "Invalid write of size 4", BAR),
        counts_xml(&[("0x1", 1), ("0x2", 1)])
    ));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(
        report.problems,
        vec![MergeProblem::CountOverflow {
            unique: "0x1".to_string()
        }]
    );
    let counts = master.error_counts.as_ref().unwrap();
    assert_eq!(counts.get("0x1"), Some(u64::MAX));
    assert_eq!(counts.get("0x2"), Some(2));
}

#[test]
fn missing_pair_is_reported() {
    let mut master = log(&format!(
        "{}{}",
        error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO),
        counts_xml(&[("0x1", 1)])
    ));
    let slave = log(&error_xml("0x1", "InvalidRead", "Invalid read of size 4", FOO));

    let report = merge(&mut master, slave).unwrap();
    assert_eq!(report.matched, 1);
    assert_eq!(
        report.problems,
        vec![MergeProblem::MissingPair {
            unique: "0x1".to_string()
        }]
    );
    assert_eq!(master.error_counts.as_ref().unwrap().get("0x1"), Some(1));
}

fn frame(ip: &str, function: Option<&str>, dir: Option<&str>, file: Option<&str>, line: Option<u32>) -> Frame {
    let mut frame = Frame::new(ip);
    frame.function = function.map(str::to_string);
    frame.dir = dir.map(str::to_string);
    frame.file = file.map(str::to_string);
    frame.line = line;
    frame
}

#[test]
fn frame_rules() {
    // directory, file and line decide first
    let a = frame("0x1", Some("foo"), Some("/a"), Some("x.c"), Some(1));
    let b = frame("0x2", Some("bar"), Some("/a"), Some("x.c"), Some(1));
    assert!(frames_match(&a, &b));
    let c = frame("0x1", Some("foo"), Some("/b"), Some("x.c"), Some(1));
    assert!(!frames_match(&a, &c));

    // file and line when a directory is missing
    let d = frame("0x3", Some("baz"), None, Some("x.c"), Some(1));
    assert!(frames_match(&a, &d));
    let e = frame("0x1", Some("foo"), None, Some("x.c"), Some(2));
    assert!(!frames_match(&a, &e));

    // function and address
    let f = frame("0x10", Some("foo"), None, None, None);
    let g = frame("0x10", Some("foo"), None, Some("x.c"), None);
    assert!(frames_match(&f, &g));
    let h = frame("0x11", Some("foo"), None, None, None);
    assert!(!frames_match(&f, &h));

    // address alone
    let i = frame("0x10", None, None, None, None);
    assert!(frames_match(&f, &i));
    assert!(!frames_match(&h, &i));
}

fn error_with_stack(ips: &[&str]) -> VgError {
    let mut error = VgError::new("0x1");
    error.set_kind("InvalidRead");
    error.stacks.push(Stack {
        frames: ips
            .iter()
            .map(|ip| frame(ip, None, None, None, None))
            .collect(),
    });
    error
}

#[test]
fn stack_depth_rules() {
    let short = error_with_stack(&["0x1", "0x2", "0x3"]);
    let long = error_with_stack(&["0x1", "0x2", "0x3", "0x4"]);
    assert!(!errors_match(&short, &long));
    assert!(errors_match(&short, &short.clone()));

    let deep = error_with_stack(&["0x1", "0x2", "0x3", "0x4", "0x5", "0x6"]);
    let deeper = error_with_stack(&["0x1", "0x2", "0x3", "0x4", "0x9"]);
    assert!(errors_match(&long, &deep));
    assert!(errors_match(&deep, &deeper));

    let other = error_with_stack(&["0x1", "0x2", "0x3", "0x8", "0x5"]);
    assert!(!errors_match(&deep, &other));
}

#[test]
fn merge_many_logs() {
    let body = |unique: &str, count: u64| {
        format!(
            "{}{}",
            error_xml(unique, "InvalidRead", "Invalid read of size 4", FOO),
            counts_xml(&[(unique, count)])
        )
    };
    let logs = vec![
        log(&body("0x1", 1)),
        log(&body("0x2", 2)),
        log_of("memcheck", "/bin/other", &body("0x3", 100)),
        log(&body("0x4", 4)),
    ];

    let (master, report) = merge_all(logs).unwrap();
    assert_eq!(report.matched, 2);
    assert_eq!(report.problems.len(), 1);
    assert!(matches!(
        report.problems[0],
        MergeProblem::Skipped {
            index: 2,
            reason: MergeError::ExeMismatch { .. }
        }
    ));
    assert_eq!(master.error_counts.as_ref().unwrap().get("0x1"), Some(7));

    assert_eq!(merge_all(Vec::new()).unwrap_err(), MergeError::NoLogs);
}
