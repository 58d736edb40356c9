//! A parsed bank entry with its resolved alignments.

use crate::actions::Alignments;
use crate::alignment::{head_vertex, resolve_alignments, AlignmentSource};
use crate::amr_v1::{parse_amr, AmrParseError, ParseOptions, ParsedAmr};
use crate::bank::AmrEntry;
use crate::graph::{SemanticGraph, VertexId};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SentenceError {
    #[error("entry at line {line} has no AMR")]
    MissingAmr { line: usize },

    #[error("sentence {id}: {source}")]
    Parse {
        id: String,
        #[source]
        source: AmrParseError,
    },
}

/// Per-token annotations supplied by an external tagger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAnnotations {
    pub lemmas: Vec<String>,
    pub pos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmrSentence {
    pub id: String,
    pub tokens: Vec<String>,
    pub parsed: ParsedAmr,
    pub alignments: Alignments,
    pub alignment_source: AlignmentSource,
    pub annotations: Option<TokenAnnotations>,
}

impl AmrSentence {
    /// Parse one AMR with its tokens and optional `::alignments` header value.
    pub fn parse(
        id: &str,
        tokens: Vec<String>,
        amr: &str,
        alignment_header: Option<&str>,
        options: &ParseOptions,
    ) -> Result<Self, SentenceError> {
        let parsed = parse_amr(id, amr, options).map_err(|source| SentenceError::Parse {
            id: id.to_string(),
            source,
        })?;
        let resolved = resolve_alignments(id, &parsed.built, alignment_header);
        Ok(Self {
            id: id.to_string(),
            tokens,
            parsed,
            alignments: resolved.alignments,
            alignment_source: resolved.source,
            annotations: None,
        })
    }

    /// Build a sentence from a bank entry. Entries without `::id` are named
    /// after their starting line.
    pub fn from_entry(entry: &AmrEntry, options: &ParseOptions) -> Result<Self, SentenceError> {
        if !entry.has_amr() {
            return Err(SentenceError::MissingAmr { line: entry.line });
        }
        let id = entry
            .id()
            .map(str::to_string)
            .unwrap_or_else(|| format!("line{}", entry.line));
        Self::parse(&id, entry.tokens(), &entry.amr, entry.alignments(), options)
    }

    pub fn with_annotations(mut self, annotations: TokenAnnotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn graph(&self) -> &SemanticGraph {
        &self.parsed.built.graph
    }

    pub fn head_vertex(&self, span: Range<usize>) -> Option<VertexId> {
        if span.end > self.tokens.len() {
            return None;
        }
        head_vertex(self.graph(), &self.alignments, span)
    }

    fn joined(&self, span: Range<usize>, values: &[String]) -> Option<String> {
        self.head_vertex(span.clone())?;
        values.get(span).map(|values| values.join(" "))
    }

    /// Surface text of a headed span.
    pub fn surface(&self, span: Range<usize>) -> Option<String> {
        self.joined(span, &self.tokens)
    }

    pub fn lemma(&self, span: Range<usize>) -> Option<String> {
        let annotations = self.annotations.as_ref()?;
        self.joined(span, &annotations.lemmas)
    }

    pub fn pos(&self, span: Range<usize>) -> Option<String> {
        let annotations = self.annotations.as_ref()?;
        self.joined(span, &annotations.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::read_bank;

    fn tokens(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn span_accessors_require_a_head() {
        let sentence = AmrSentence::parse(
            "s",
            tokens("boy wants to go"),
            "(w / want-01~e.1 :ARG0 (b / boy~e.0) :ARG1 (g / go-01~e.3 :ARG0 b))",
            None,
            &ParseOptions::default(),
        )
        .unwrap()
        .with_annotations(TokenAnnotations {
            lemmas: tokens("boy want to go"),
            pos: tokens("NN VBZ TO VB"),
        });

        assert_eq!(sentence.surface(1..2).as_deref(), Some("wants"));
        assert_eq!(sentence.lemma(1..2).as_deref(), Some("want"));
        assert_eq!(sentence.pos(3..4).as_deref(), Some("VB"));
        assert_eq!(sentence.surface(0..2).as_deref(), Some("boy wants"));
        // token 2 is unaligned
        assert_eq!(sentence.surface(2..4), None);
        assert_eq!(sentence.surface(3..9), None);
    }

    #[test]
    fn entry_without_amr_is_rejected() {
        let entries = read_bank("# ::id a\n# ::tok x\n");
        let entry = entries[0].as_ref().unwrap();
        assert_eq!(
            AmrSentence::from_entry(entry, &ParseOptions::default()),
            Err(SentenceError::MissingAmr { line: 1 })
        );
    }

    #[test]
    fn entry_uses_header_alignments() {
        let entries = read_bank(
            "# ::id a\n# ::tok the boy\n# ::alignments 1-2|0 ::annotator JAMR\n(b / boy)\n",
        );
        let entry = entries[0].as_ref().unwrap();
        let sentence = AmrSentence::from_entry(entry, &ParseOptions::default()).unwrap();
        assert_eq!(sentence.alignment_source, AlignmentSource::Format2);
        assert_eq!(sentence.head_vertex(1..2), sentence.graph().vertex("b"));
    }
}
