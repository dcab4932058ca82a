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
mod leak;

use std::collections::HashMap;
use std::collections::HashSet;

use tracing::info;
use tracing::warn;

use crate::model::Counts;
use crate::model::CountsKind;
use crate::model::Frame;
use crate::model::Log;
use crate::model::Stack;
use crate::model::VgError;

pub use error::MergeError;
pub use error::MergeProblem;
use leak::LeakWhat;

/// Number of innermost frames compared when matching two errors.
pub const MATCH_FRAMES: usize = 4;

/// Outcome of a successful merge.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MergeReport {
    /// Slave errors folded into an existing master error.
    pub matched: usize,
    /// Slave errors appended to the master.
    pub appended: usize,
    /// Appended errors which got a new unique id.
    pub renumbered: usize,
    pub suppressions_matched: usize,
    pub suppressions_appended: usize,
    pub leaks_matched: usize,
    pub leaks_appended: usize,
    pub problems: Vec<MergeProblem>,
}

impl MergeReport {
    fn problem(&mut self, problem: MergeProblem) {
        warn!(%problem, "merge problem");
        self.problems.push(problem);
    }

    fn absorb(&mut self, other: MergeReport) {
        self.matched += other.matched;
        self.appended += other.appended;
        self.renumbered += other.renumbered;
        self.suppressions_matched += other.suppressions_matched;
        self.suppressions_appended += other.suppressions_appended;
        self.leaks_matched += other.leaks_matched;
        self.leaks_appended += other.leaks_appended;
        self.problems.extend(other.problems);
    }
}

/// Checks whether two frames are the same code location.
///
/// The first rule both frames have the data for decides: source directory,
/// file and line; then file and line; then function and address; and
/// finally the address alone.
pub fn frames_match(a: &Frame, b: &Frame) -> bool {
    if let (Some(dir1), Some(file1), Some(line1), Some(dir2), Some(file2), Some(line2)) =
        (&a.dir, &a.file, a.line, &b.dir, &b.file, b.line)
    {
        return dir1 == dir2 && file1 == file2 && line1 == line2;
    }
    if let (Some(file1), Some(line1), Some(file2), Some(line2)) = (&a.file, a.line, &b.file, b.line)
    {
        return file1 == file2 && line1 == line2;
    }
    if let (Some(fn1), Some(fn2)) = (&a.function, &b.function) {
        return fn1 == fn2 && a.ip == b.ip;
    }
    a.ip == b.ip
}

fn stacks_match(a: &Stack, b: &Stack) -> bool {
    if (a.len() < MATCH_FRAMES || b.len() < MATCH_FRAMES) && a.len() != b.len() {
        return false;
    }
    a.frames
        .iter()
        .zip(&b.frames)
        .take(MATCH_FRAMES)
        .all(|(x, y)| frames_match(x, y))
}

/// Checks whether two errors from different runs are the same error.
///
/// Kinds must be identical and the primary stacks must match on their
/// innermost [MATCH_FRAMES] frames.
pub fn errors_match(a: &VgError, b: &VgError) -> bool {
    let empty = Stack::new();
    a.kind == b.kind
        && stacks_match(
            a.primary_stack().unwrap_or(&empty),
            b.primary_stack().unwrap_or(&empty),
        )
}

fn parse_unique(unique: &str) -> Option<u64> {
    let digits = unique
        .strip_prefix("0x")
        .or_else(|| unique.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

/// Hands out unique ids which are not used in the master log.
struct Uniques {
    used: HashSet<String>,
    /// Next hex id to try, `None` once the hex ids are used up.
    next: Option<u64>,
}

impl Uniques {
    fn new(log: &Log) -> Uniques {
        let mut used: HashSet<String> = log.errors.iter().map(|e| e.unique.clone()).collect();
        if let Some(counts) = &log.error_counts {
            used.extend(counts.pairs().iter().map(|pair| pair.key.clone()));
        }
        let next = used
            .iter()
            .filter_map(|unique| parse_unique(unique))
            .max()
            .map_or(Some(1), |max| max.checked_add(1));
        Uniques { used, next }
    }

    /// Returns the id to use for an appended error, and whether it changed.
    fn claim(&mut self, unique: &str) -> (String, bool) {
        if self.used.insert(unique.to_string()) {
            return (unique.to_string(), false);
        }
        while let Some(next) = self.next {
            self.next = next.checked_add(1);
            let candidate = format!("0x{next:x}");
            if self.used.insert(candidate.clone()) {
                return (candidate, true);
            }
        }
        // no hex id is left above the largest one, number the old id instead
        let mut suffix: u64 = 1;
        loop {
            let candidate = format!("{unique}-{suffix}");
            if self.used.insert(candidate.clone()) {
                return (candidate, true);
            }
            suffix += 1;
        }
    }
}

fn error_counts_mut(log: &mut Log) -> &mut Counts {
    log.error_counts.get_or_insert_with(|| {
        let mut counts = Counts::new(CountsKind::Errors);
        counts.set_closed(true);
        counts
    })
}

/// Adds optional totals, a missing side counts as nothing.
fn add_optional(a: Option<u64>, b: Option<u64>) -> Option<Option<u64>> {
    match (a, b) {
        (Some(a), Some(b)) => a.checked_add(b).map(Some),
        (a, None) => Some(a),
        (None, b) => Some(b),
    }
}

/// Folds the slave log into the master log.
///
/// Matching errors have their counts added, the other slave errors are
/// appended. Suppression counts are added by name, and matching leak reports
/// have their leaked totals and description updated. Parts which cannot be
/// merged are listed in the report and skipped.
///
/// Logs of different tools or executables are refused without modifying
/// the master.
pub fn merge(master: &mut Log, slave: Log) -> Result<MergeReport, MergeError> {
    if master.info.tool != slave.info.tool {
        return Err(MergeError::ToolMismatch {
            master: master.info.tool.clone(),
            slave: slave.info.tool.clone(),
        });
    }
    if master.info.exe != slave.info.exe {
        return Err(MergeError::ExeMismatch {
            master: master.info.exe.clone(),
            slave: slave.info.exe.clone(),
        });
    }

    let mut report = MergeReport::default();
    let mut uniques = Uniques::new(master);
    let Log {
        errors: slave_errors,
        error_counts: slave_counts,
        supp_counts: slave_supp_counts,
        ..
    } = slave;
    let mut slave_counts: HashMap<String, u64> = slave_counts
        .map(|counts| {
            counts
                .into_pairs()
                .into_iter()
                .map(|pair| (pair.key, pair.count))
                .collect()
        })
        .unwrap_or_default();
    let (slave_leaks, slave_ordinary): (Vec<VgError>, Vec<VgError>) =
        slave_errors.into_iter().partition(VgError::is_leak);

    merge_ordinary(
        master,
        slave_ordinary,
        &mut slave_counts,
        &mut uniques,
        &mut report,
    );
    if let Some(slave_supp_counts) = slave_supp_counts {
        merge_suppressions(master, slave_supp_counts, &mut report);
    }
    merge_leaks(master, slave_leaks, &mut slave_counts, &mut uniques, &mut report);

    master.refresh_status();
    info!(
        matched = report.matched,
        appended = report.appended,
        leaks_matched = report.leaks_matched,
        leaks_appended = report.leaks_appended,
        problems = report.problems.len(),
        "logs merged"
    );
    Ok(report)
}

fn merge_ordinary(
    master: &mut Log,
    mut slave_errors: Vec<VgError>,
    slave_counts: &mut HashMap<String, u64>,
    uniques: &mut Uniques,
    report: &mut MergeReport,
) {
    for index in 0..master.errors.len() {
        if master.errors[index].is_leak() {
            continue;
        }
        let Some(pos) = slave_errors
            .iter()
            .position(|slave| errors_match(&master.errors[index], slave))
        else {
            continue;
        };
        let slave = slave_errors.remove(pos);
        report.matched += 1;
        let unique = master.errors[index].unique.clone();
        let Some(slave_count) = slave_counts.remove(&slave.unique) else {
            report.problem(MergeProblem::MissingPair {
                unique: slave.unique,
            });
            continue;
        };
        let pair = master
            .error_counts
            .as_mut()
            .and_then(|counts| counts.get_mut(&unique));
        let Some(count) = pair else {
            report.problem(MergeProblem::MissingPair { unique });
            continue;
        };
        match count.checked_add(slave_count) {
            Some(sum) => {
                *count = sum;
                master.errors[index].count = Some(sum);
            }
            None => report.problem(MergeProblem::CountOverflow { unique }),
        }
    }

    let mut insert_at = master
        .errors
        .iter()
        .rposition(|error| !error.is_leak())
        .map_or(0, |pos| pos + 1);
    for slave in slave_errors {
        let error = append_error(master, slave, slave_counts, uniques, report);
        master.errors.insert(insert_at, error);
        insert_at += 1;
        report.appended += 1;
    }
}

/// Prepares a slave error for the master log, moving its counts pair along.
fn append_error(
    master: &mut Log,
    mut error: VgError,
    slave_counts: &mut HashMap<String, u64>,
    uniques: &mut Uniques,
    report: &mut MergeReport,
) -> VgError {
    let old_unique = error.unique.clone();
    let (unique, renumbered) = uniques.claim(&old_unique);
    if renumbered {
        report.renumbered += 1;
        error.unique = unique.clone();
    }
    match slave_counts.remove(&old_unique) {
        Some(count) => {
            error_counts_mut(master).set(&unique, count);
            error.count = Some(count);
        }
        None if !error.is_leak() => {
            report.problem(MergeProblem::MissingPair { unique: old_unique });
        }
        None => (),
    }
    error
}

fn merge_suppressions(master: &mut Log, slave_counts: Counts, report: &mut MergeReport) {
    let counts = master.supp_counts.get_or_insert_with(|| {
        let mut counts = Counts::new(CountsKind::Suppressions);
        counts.set_closed(true);
        counts
    });
    for pair in slave_counts.into_pairs() {
        match counts.get_mut(&pair.key) {
            Some(count) => match count.checked_add(pair.count) {
                Some(sum) => {
                    *count = sum;
                    report.suppressions_matched += 1;
                }
                None => report.problem(MergeProblem::SuppressionOverflow { name: pair.key }),
            },
            None => {
                counts.set(&pair.key, pair.count);
                report.suppressions_appended += 1;
            }
        }
    }
}

fn merge_leaks(
    master: &mut Log,
    mut slave_leaks: Vec<VgError>,
    slave_counts: &mut HashMap<String, u64>,
    uniques: &mut Uniques,
    report: &mut MergeReport,
) {
    for index in 0..master.errors.len() {
        if !master.errors[index].is_leak() {
            continue;
        }
        let Some(pos) = slave_leaks
            .iter()
            .position(|slave| errors_match(&master.errors[index], slave))
        else {
            continue;
        };
        let slave = slave_leaks.remove(pos);
        report.leaks_matched += 1;
        merge_leak(&mut master.errors[index], &slave, report);
    }

    for slave in slave_leaks {
        let error = append_error(master, slave, slave_counts, uniques, report);
        master.errors.push(error);
        report.leaks_appended += 1;
    }
}

fn merge_leak(master: &mut VgError, slave: &VgError, report: &mut MergeReport) {
    let totals = add_optional(master.leaked_bytes, slave.leaked_bytes)
        .zip(add_optional(master.leaked_blocks, slave.leaked_blocks));
    let Some((bytes, blocks)) = totals else {
        report.problem(MergeProblem::LeakOverflow {
            unique: master.unique.clone(),
        });
        return;
    };
    master.leaked_bytes = bytes;
    master.leaked_blocks = blocks;

    let Some(master_what) = LeakWhat::parse(&master.what) else {
        report.problem(MergeProblem::UnparsableWhat {
            unique: master.unique.clone(),
            what: master.what.clone(),
        });
        return;
    };
    let Some(slave_what) = LeakWhat::parse(&slave.what) else {
        report.problem(MergeProblem::UnparsableWhat {
            unique: slave.unique.clone(),
            what: slave.what.clone(),
        });
        return;
    };
    match master_what.checked_add(&slave_what) {
        Some(merged) => master.what = merged.to_string(),
        None => report.problem(MergeProblem::LeakOverflow {
            unique: master.unique.clone(),
        }),
    }
}

/// Merges every log into the first one.
///
/// Logs which cannot be merged into the first are skipped and listed as
/// problems of the report.
pub fn merge_all<I>(logs: I) -> Result<(Log, MergeReport), MergeError>
where
    I: IntoIterator<Item = Log>,
{
    let mut logs = logs.into_iter();
    let mut master = logs.next().ok_or(MergeError::NoLogs)?;
    let mut report = MergeReport::default();
    for (index, slave) in logs.enumerate() {
        match merge(&mut master, slave) {
            Ok(one) => report.absorb(one),
            Err(reason) => report.problem(MergeProblem::Skipped {
                index: index + 1,
                reason,
            }),
        }
    }
    Ok((master, report))
}

#[cfg(test)]
mod tests;
