//! Unified diff rendering for canonical link sequences
//!
//! Both inputs are sorted and free of duplicates, so the longest common
//! subsequence is exactly their intersection and a single merge pass yields
//! the edit script.

use std::cmp::Ordering;

/// Default number of unchanged lines shown around each change
pub const DEFAULT_CONTEXT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tag {
    Equal,
    Replace,
    Delete,
    Insert,
}

/// One edit: `old[i1..i2]` becomes `new[j1..j2]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Opcode {
    pub tag: Tag,
    pub i1: usize,
    pub i2: usize,
    pub j1: usize,
    pub j2: usize,
}

impl Opcode {
    fn new(tag: Tag, i1: usize, i2: usize, j1: usize, j2: usize) -> Self {
        Self { tag, i1, i2, j1, j2 }
    }
}

/// A file label and timestamp for one side of the header
#[derive(Debug, Clone, Copy)]
pub struct DiffSide<'a> {
    pub label: &'a str,
    pub timestamp: &'a str,
    pub lines: &'a [String],
}

/// Computes the edit script between two sorted, deduplicated sequences
pub(crate) fn opcodes(old: &[String], new: &[String]) -> Vec<Opcode> {
    let mut codes = Vec::new();
    let (mut i, mut j) = (0, 0);

    while i < old.len() || j < new.len() {
        // Gap: everything before the next common element
        let (gap_i, gap_j) = (i, j);
        while i < old.len() && j < new.len() {
            match old[i].cmp(&new[j]) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => break,
            }
        }
        if i == old.len() || j == new.len() {
            i = old.len();
            j = new.len();
        }
        push_change(&mut codes, gap_i, i, gap_j, j);

        // Run of common elements
        let (run_i, run_j) = (i, j);
        while i < old.len() && j < new.len() && old[i] == new[j] {
            i += 1;
            j += 1;
        }
        if i > run_i {
            codes.push(Opcode::new(Tag::Equal, run_i, i, run_j, j));
        }
    }

    codes
}

fn push_change(codes: &mut Vec<Opcode>, i1: usize, i2: usize, j1: usize, j2: usize) {
    let tag = match (i2 > i1, j2 > j1) {
        (true, true) => Tag::Replace,
        (true, false) => Tag::Delete,
        (false, true) => Tag::Insert,
        (false, false) => return,
    };
    codes.push(Opcode::new(tag, i1, i2, j1, j2));
}

/// Splits an edit script into hunks with at most `context` lines of context
pub(crate) fn grouped_opcodes(mut codes: Vec<Opcode>, context: usize) -> Vec<Vec<Opcode>> {
    if codes.is_empty() {
        codes.push(Opcode::new(Tag::Equal, 0, 1, 0, 1));
    }

    if let Some(first) = codes.first_mut() {
        if first.tag == Tag::Equal {
            first.i1 = first.i1.max(first.i2.saturating_sub(context));
            first.j1 = first.j1.max(first.j2.saturating_sub(context));
        }
    }
    if let Some(last) = codes.last_mut() {
        if last.tag == Tag::Equal {
            last.i2 = last.i2.min(last.i1 + context);
            last.j2 = last.j2.min(last.j1 + context);
        }
    }

    let mut groups = Vec::new();
    let mut group = Vec::new();
    for mut code in codes {
        if code.tag == Tag::Equal && code.i2 - code.i1 > 2 * context {
            group.push(Opcode::new(
                Tag::Equal,
                code.i1,
                code.i2.min(code.i1 + context),
                code.j1,
                code.j2.min(code.j1 + context),
            ));
            groups.push(std::mem::take(&mut group));
            code.i1 = code.i1.max(code.i2.saturating_sub(context));
            code.j1 = code.j1.max(code.j2.saturating_sub(context));
        }
        group.push(code);
    }
    if !(group.is_empty() || (group.len() == 1 && group[0].tag == Tag::Equal)) {
        groups.push(group);
    }

    groups
}

/// Formats a hunk range as `start,length` with 1-based line numbers
pub(crate) fn format_range(start: usize, stop: usize) -> String {
    let mut beginning = start + 1;
    let length = stop - start;
    if length == 1 {
        return beginning.to_string();
    }
    if length == 0 {
        // Empty ranges point at the line before the gap
        beginning -= 1;
    }
    format!("{},{}", beginning, length)
}

/// Renders a unified diff between two sorted, deduplicated sequences
///
/// Headers are always present. The result ends with exactly one newline.
pub fn unified_diff(old: DiffSide<'_>, new: DiffSide<'_>, context: usize) -> String {
    let mut lines = vec![
        format!("--- {}\t{}", old.label, old.timestamp),
        format!("+++ {}\t{}", new.label, new.timestamp),
    ];

    for group in grouped_opcodes(opcodes(old.lines, new.lines), context) {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        lines.push(format!(
            "@@ -{} +{} @@",
            format_range(first.i1, last.i2),
            format_range(first.j1, last.j2)
        ));

        for code in &group {
            if code.tag == Tag::Equal {
                lines.extend(old.lines[code.i1..code.i2].iter().map(|l| format!(" {}", l)));
                continue;
            }
            if matches!(code.tag, Tag::Replace | Tag::Delete) {
                lines.extend(old.lines[code.i1..code.i2].iter().map(|l| format!("-{}", l)));
            }
            if matches!(code.tag, Tag::Replace | Tag::Insert) {
                lines.extend(new.lines[code.j1..code.j2].iter().map(|l| format!("+{}", l)));
            }
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
