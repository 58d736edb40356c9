//! AMR bank surface syntax.
//!
//! This crate turns AMR bank text into per-sentence semantic graphs:
//!
//! - `packrat`: generic memoizing parser primitives
//! - `amr_v1`: the AMR grammar, written against `packrat`
//! - `actions`: graph-building actions run as grammar rules match
//! - `graph`: the arena-backed graph the actions populate
//! - `alignment`: inline and header token alignments, span heads
//! - `bank` / `sentence`: bank entries and their parsed form

pub mod actions;
pub mod alignment;
pub mod amr_v1;
pub mod bank;
pub mod graph;
pub mod node;
pub mod packrat;
pub mod sentence;

pub use actions::{Alignments, BuiltGraph};
pub use amr_v1::{parse_amr, AmrParseError, ParseOptions, ParsedAmr};
pub use bank::{read_bank, AmrEntry, BankError};
pub use graph::{Edge, EdgeId, GraphError, SemanticGraph, VertexId, VertexKind, INSTANCE_ROLE};
pub use sentence::{AmrSentence, SentenceError, TokenAnnotations};
