//! AMR bank files.
//!
//! A bank is a sequence of entries separated by blank lines. Each entry has
//! `#` comment lines, some of which carry `::key value` metadata (several
//! fields may share one line), followed by the AMR s-expression.
//!
//! ```text
//! # ::id bolt12_64556_5627.1 ::date 2012-12-04T17:55:20 ::annotator SDL-AMR-09
//! # ::tok The boy wants to go
//! # ::alignments 1-2|0.0 2-3|0 4-5|0.1
//! (w / want-01
//!    :ARG0 (b / boy)
//!    :ARG1 (g / go-01
//!       :ARG0 b))
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while1},
    character::complete::{char as pchar, space0},
    combinator::rest,
    multi::many0,
    sequence::{preceded, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("line {line}: unparsable header comment `{text}`")]
    Header { line: usize, text: String },
}

/// One bank entry: metadata plus the raw AMR text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmrEntry {
    /// 1-based line on which the entry starts.
    pub line: usize,
    /// Metadata fields in file order.
    pub metadata: Vec<(String, String)>,
    /// The AMR s-expression (possibly empty).
    pub amr: String,
}

impl AmrEntry {
    /// First value recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").filter(|id| !id.is_empty())
    }

    /// Whitespace tokens from `::tok`, falling back to `::snt`.
    pub fn tokens(&self) -> Vec<String> {
        self.get("tok")
            .or_else(|| self.get("snt"))
            .map(|text| text.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn alignments(&self) -> Option<&str> {
        self.get("alignments").filter(|a| !a.is_empty())
    }

    pub fn has_amr(&self) -> bool {
        !self.amr.trim().is_empty()
    }
}

fn metadata_field(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = tuple((space0, tag("::")))(input)?;
    let (input, key) = take_while1(|c: char| !c.is_whitespace())(input)?;
    let (input, value) = alt((take_until(" ::"), rest))(input)?;
    Ok((input, (key, value.trim())))
}

fn metadata_line(input: &str) -> IResult<&str, Vec<(&str, &str)>> {
    preceded(pchar('#'), many0(metadata_field))(input)
}

/// Parse the metadata of one `#` line.
///
/// Plain comments yield no fields. A line that starts out as free text but
/// then carries `::` fields is rejected.
pub fn parse_comment(line_no: usize, line: &str) -> Result<Vec<(String, String)>, BankError> {
    let header_error = || BankError::Header {
        line: line_no,
        text: line.to_string(),
    };
    let (remaining, fields) = metadata_line(line.trim_end()).map_err(|_| header_error())?;
    if !remaining.trim().is_empty() && remaining.contains("::") {
        return Err(header_error());
    }
    Ok(fields
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect())
}

struct Block<'a> {
    line: usize,
    lines: Vec<(usize, &'a str)>,
}

fn split_blocks(text: &str) -> Vec<Block<'_>> {
    let mut blocks = Vec::new();
    let mut current: Option<Block<'_>> = None;
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                line: line_no,
                lines: Vec::new(),
            })
            .lines
            .push((line_no, line));
    }
    blocks.extend(current);
    blocks
}

fn parse_block(block: Block<'_>) -> Result<AmrEntry, BankError> {
    let mut metadata = Vec::new();
    let mut amr_lines = Vec::new();
    for (line_no, line) in block.lines {
        if line.trim_start().starts_with('#') {
            metadata.extend(parse_comment(line_no, line.trim_start())?);
        } else {
            amr_lines.push(line);
        }
    }
    Ok(AmrEntry {
        line: block.line,
        metadata,
        amr: amr_lines.join("\n"),
    })
}

/// Split a bank into entries. Each entry is parsed independently, so one
/// bad header does not affect its neighbours.
pub fn read_bank(text: &str) -> Vec<Result<AmrEntry, BankError>> {
    split_blocks(text).into_iter().map(parse_block).collect()
}
