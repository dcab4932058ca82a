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

/// Structured form of a leak description.
///
/// Two layouts are produced by memcheck:
///
/// ```text
/// 16 bytes in 1 blocks are definitely lost in loss record 1 of 2
/// 1,048 (24 direct, 1,024 indirect) bytes in 1 blocks are definitely lost in loss record 3 of 3
/// ```
#[derive(Clone, Debug, Eq, PartialEq)]
pub(super) struct LeakWhat {
    pub(super) bytes: u64,
    /// Direct and indirect bytes.
    pub(super) split: Option<(u64, u64)>,
    pub(super) blocks: u64,
    pub(super) tail: String,
}

fn number(text: &str) -> Option<u64> {
    let digits: String = text.trim().chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

fn grouped(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

impl LeakWhat {
    pub(super) fn parse(what: &str) -> Option<LeakWhat> {
        let (head, tail) = what.split_once(" blocks")?;
        let (amount, blocks) = head.rsplit_once(" bytes in ")?;
        let blocks = number(blocks)?;
        let (bytes, split) = match amount.split_once(" (") {
            None => (number(amount)?, None),
            Some((total, split)) => {
                let (direct, indirect) = split.strip_suffix(')')?.split_once(", ")?;
                let direct = number(direct.strip_suffix(" direct")?)?;
                let indirect = number(indirect.strip_suffix(" indirect")?)?;
                (number(total)?, Some((direct, indirect)))
            }
        };
        Some(LeakWhat {
            bytes,
            split,
            blocks,
            tail: tail.trim().to_string(),
        })
    }

    /// Adds the amounts of another leak, keeping this one's wording.
    ///
    /// The direct and indirect split survives only if both sides have it.
    pub(super) fn checked_add(&self, other: &LeakWhat) -> Option<LeakWhat> {
        let split = match (self.split, other.split) {
            (Some((d1, i1)), Some((d2, i2))) => Some((d1.checked_add(d2)?, i1.checked_add(i2)?)),
            _ => None,
        };
        Some(LeakWhat {
            bytes: self.bytes.checked_add(other.bytes)?,
            split,
            blocks: self.blocks.checked_add(other.blocks)?,
            tail: self.tail.clone(),
        })
    }
}

impl Display for LeakWhat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", grouped(self.bytes))?;
        if let Some((direct, indirect)) = self.split {
            write!(
                f,
                " ({} direct, {} indirect)",
                grouped(direct),
                grouped(indirect)
            )?;
        }
        write!(f, " bytes in {} blocks", grouped(self.blocks))?;
        if !self.tail.is_empty() {
            write!(f, " {}", self.tail)?;
        }
        Ok(())
    }
}
