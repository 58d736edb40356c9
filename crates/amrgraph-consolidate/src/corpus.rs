//! Parsing a whole bank.
//!
//! Entries are independent, so they are parsed on the rayon pool. A bad
//! entry is logged and recorded in [`Corpus::skipped`]; it never stops the
//! rest of the bank.

use amrgraph_dsl::{read_bank, AmrEntry, AmrSentence, BankError, ParseOptions, SentenceError};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A bank entry that did not make it into the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    pub line: usize,
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub sentences: Vec<AmrSentence>,
    pub skipped: Vec<SkippedEntry>,
}

enum Outcome {
    Parsed { line: usize, sentence: Box<AmrSentence> },
    Skipped(SkippedEntry),
}

fn parse_entry(entry: Result<AmrEntry, BankError>, options: &ParseOptions) -> Outcome {
    let entry = match entry {
        Ok(entry) => entry,
        Err(err) => {
            let line = match &err {
                BankError::Header { line, .. } => *line,
            };
            return Outcome::Skipped(SkippedEntry {
                line,
                id: None,
                reason: err.to_string(),
            });
        }
    };
    match AmrSentence::from_entry(&entry, options) {
        Ok(sentence) => Outcome::Parsed {
            line: entry.line,
            sentence: Box::new(sentence),
        },
        Err(err) => Outcome::Skipped(SkippedEntry {
            line: entry.line,
            id: entry.id().map(str::to_string),
            reason: match &err {
                SentenceError::MissingAmr { .. } => "no AMR".to_string(),
                SentenceError::Parse { .. } => err.to_string(),
            },
        }),
    }
}

/// Parse every entry of a bank, in bank order.
pub fn parse_corpus(text: &str, options: &ParseOptions, parallel: bool) -> Corpus {
    let entries = read_bank(text);
    let outcomes: Vec<Outcome> = if parallel {
        entries
            .into_par_iter()
            .map(|entry| parse_entry(entry, options))
            .collect()
    } else {
        entries
            .into_iter()
            .map(|entry| parse_entry(entry, options))
            .collect()
    };

    let mut corpus = Corpus::default();
    let mut seen = BTreeSet::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Parsed { line, sentence } => {
                if seen.insert(sentence.id.clone()) {
                    corpus.sentences.push(*sentence);
                } else {
                    corpus.skipped.push(SkippedEntry {
                        line,
                        id: Some(sentence.id.clone()),
                        reason: "duplicate sentence id".to_string(),
                    });
                }
            }
            Outcome::Skipped(skipped) => corpus.skipped.push(skipped),
        }
    }

    for skipped in &corpus.skipped {
        tracing::warn!(
            line = skipped.line,
            id = skipped.id.as_deref().unwrap_or("-"),
            reason = %skipped.reason,
            "skipping AMR bank entry"
        );
    }
    tracing::debug!(
        parsed = corpus.sentences.len(),
        skipped = corpus.skipped.len(),
        "parsed AMR bank"
    );
    corpus
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANK: &str = "\
# ::id a
# ::tok the boy
(b / boy~e.1)

# ::id b
# ::tok broken
(b / boy

# ::id c
# ::tok none

# ::id a
# ::tok again
(x / again~e.0)
";

    #[test]
    fn failures_are_isolated() {
        for parallel in [false, true] {
            let corpus = parse_corpus(BANK, &ParseOptions::default(), parallel);
            let ids: Vec<_> = corpus.sentences.iter().map(|s| s.id.as_str()).collect();
            assert_eq!(ids, vec!["a"]);
            let skipped: Vec<_> = corpus.skipped.iter().map(|s| s.id.as_deref()).collect();
            assert_eq!(skipped, vec![Some("b"), Some("c"), Some("a")]);
            assert!(corpus.skipped[0].reason.contains("parse error"));
        }
    }
}
