// src/patch/hunk.rs

//! Character-level hunks
//!
//! A hunk body is a run of lines whose first character is the operation
//! (`' '` keep, `'-'` delete, `'+'` insert) and whose remainder is
//! percent-encoded text, so a single line can carry newlines (`%0A`).

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

static HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@ -(\d+),?(\d*) \+(\d+),?(\d*) @@$").unwrap());

/// One step of a hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Keep(String),
    Delete(String),
    Insert(String),
}

/// A located edit: the text around `start2` must read `old_text()` and
/// becomes `new_text()`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    /// Zero-based character offset in the original text
    pub start1: usize,
    pub length1: usize,
    /// Zero-based character offset in the patched text
    pub start2: usize,
    pub length2: usize,
    pub ops: Vec<Op>,
}

impl Hunk {
    /// Context plus deleted text
    pub fn old_text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Keep(t) | Op::Delete(t) => Some(t.as_str()),
                Op::Insert(_) => None,
            })
            .collect()
    }

    /// Context plus inserted text
    pub fn new_text(&self) -> String {
        self.ops
            .iter()
            .filter_map(|op| match op {
                Op::Keep(t) | Op::Insert(t) => Some(t.as_str()),
                Op::Delete(_) => None,
            })
            .collect()
    }
}

/// `start,length` pair from a hunk header; an omitted length means 1 and a
/// zero length means the start is not 1-based
fn parse_range(start: &str, length: &str) -> Result<(usize, usize)> {
    let start: usize = start
        .parse()
        .map_err(|_| Error::PatchParse(format!("bad hunk start '{}'", start)))?;
    match length {
        "" => Ok((start.saturating_sub(1), 1)),
        "0" => Ok((start, 0)),
        n => {
            let length = n
                .parse()
                .map_err(|_| Error::PatchParse(format!("bad hunk length '{}'", n)))?;
            Ok((start.saturating_sub(1), length))
        }
    }
}

fn decode(text: &str) -> Result<String> {
    urlencoding::decode(text)
        .map(|s| s.into_owned())
        .map_err(|e| Error::PatchParse(format!("bad escape in '{}': {}", text, e)))
}

/// Parse the hunks of one file-scoped patch body
pub fn parse_hunks(body: &str) -> Result<Vec<Hunk>> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for raw in body.split('\n') {
        // Patch files saved with CRLF line endings; literal CRs in content are escaped
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            continue;
        }

        if let Some(caps) = HEADER_RE.captures(line) {
            let (start1, length1) = parse_range(&caps[1], &caps[2])?;
            let (start2, length2) = parse_range(&caps[3], &caps[4])?;
            hunks.push(Hunk {
                start1,
                length1,
                start2,
                length2,
                ops: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            return Err(Error::PatchParse(format!(
                "text before the first hunk header: '{}'",
                line
            )));
        };

        let mut chars = line.chars();
        let sign = chars.next();
        let text = decode(chars.as_str())?;
        match sign {
            Some(' ') => hunk.ops.push(Op::Keep(text)),
            Some('-') => hunk.ops.push(Op::Delete(text)),
            Some('+') => hunk.ops.push(Op::Insert(text)),
            _ => {
                return Err(Error::PatchParse(format!("invalid hunk line '{}'", line)));
            }
        }
    }

    Ok(hunks)
}

fn char_to_byte(text: &str, index: usize) -> usize {
    text.char_indices()
        .nth(index)
        .map(|(byte, _)| byte)
        .unwrap_or(text.len())
}

/// Apply hunks in order, returning the 1-based number of the first hunk
/// whose old text does not occur in the text
///
/// When the old text occurs several times, the occurrence closest to where
/// the hunk expects it is replaced. The expectation is shifted by how far
/// earlier hunks landed from their own expected positions.
pub fn apply_hunks(text: &str, hunks: &[Hunk]) -> std::result::Result<String, usize> {
    let mut current = text.to_string();
    let mut delta: isize = 0;

    for (index, hunk) in hunks.iter().enumerate() {
        let old = hunk.old_text();
        let new = hunk.new_text();
        let expected_char = (hunk.start2 as isize + delta).max(0) as usize;
        let expected = char_to_byte(&current, expected_char);

        let found = if old.is_empty() {
            Some(expected)
        } else {
            current
                .match_indices(old.as_str())
                .map(|(pos, _)| pos)
                .min_by_key(|pos| pos.abs_diff(expected))
        };

        let Some(pos) = found else {
            return Err(index + 1);
        };

        let actual_char = current[..pos].chars().count();
        delta += actual_char as isize - expected_char as isize;
        current.replace_range(pos..pos + old.len(), &new);
    }

    Ok(current)
}
