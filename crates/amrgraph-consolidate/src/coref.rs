//! Coreference chains supplied by an external resolver.

use amrgraph_dsl::{Alignments, SemanticGraph};
use serde::{Deserialize, Serialize};

/// A vertex of one sentence graph, named by its AMR variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainMember {
    pub sentence: String,
    pub variable: String,
}

impl ChainMember {
    pub fn new(sentence: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            variable: variable.into(),
        }
    }
}

/// Vertices that refer to the same entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorefChain {
    pub members: Vec<ChainMember>,
}

impl CorefChain {
    pub fn new(members: Vec<ChainMember>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// What a resolver gets to see of each parsed sentence.
#[derive(Debug, Clone, Copy)]
pub struct SentenceRef<'a> {
    pub id: &'a str,
    pub tokens: &'a [String],
    pub graph: &'a SemanticGraph,
    pub alignments: &'a Alignments,
}

pub trait CoreferenceResolver {
    fn chains(&self, sentences: &[SentenceRef<'_>]) -> Vec<CorefChain>;
}

/// Resolver that finds no coreference.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCoreference;

impl CoreferenceResolver for NoCoreference {
    fn chains(&self, _sentences: &[SentenceRef<'_>]) -> Vec<CorefChain> {
        Vec::new()
    }
}

/// Precomputed chains, e.g. loaded from an annotation file.
impl CoreferenceResolver for Vec<CorefChain> {
    fn chains(&self, _sentences: &[SentenceRef<'_>]) -> Vec<CorefChain> {
        self.clone()
    }
}
