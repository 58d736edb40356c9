//! Parse tree nodes produced by the packrat engine and the AMR actions.
//!
//! Nodes only live for the duration of one parse call: the grammar builds
//! them bottom-up, the graph-building actions turn the interesting ones into
//! [`LabelNode`]s, and the final tree is dropped once the sentence graph has
//! been extracted.

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// A node in the (transient) parse tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<'src> {
    /// Produced by an optional rule that did not match.
    Empty,
    /// A matched slice of the input.
    Terminal { text: &'src str, span: Range<usize> },
    /// The children of a repetition.
    Sequence(Vec<Node<'src>>),
    /// A variable binding (`(v / concept ...)`) or a bare variable reference.
    Label(LabelNode),
    /// The `/ concept` part of an ancestor.
    Concept(ConceptNode),
    /// A `~e.N` marker; `None` when absent.
    Alignment(Option<usize>),
    /// `:relation [alignment] node`.
    Descendant(DescendantNode),
    /// A string, number or named constant in target position.
    Literal(LiteralNode),
}

impl<'src> Node<'src> {
    /// Text of a terminal node, `None` for every other variant.
    pub fn text(&self) -> Option<&'src str> {
        match self {
            Node::Terminal { text, .. } => Some(*text),
            _ => None,
        }
    }
}

/// Result of a matched `ancestor` (or a variable reference).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelNode {
    pub variable: String,
    /// The variable was already bound when this node was reached.
    pub reentrant: bool,
    /// Vertex ids in the order they were visited while building this subtree
    /// (self, concept, then each descendant subtree).
    pub visited: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub label: String,
    pub alignment: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DescendantNode {
    /// Relation label as written, including the leading `:`.
    pub relation: String,
    pub relation_alignment: Option<usize>,
    /// The relation carries the inverse `-of` suffix.
    pub inverse: bool,
    pub target: DescendantTarget,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DescendantTarget {
    Label(LabelNode),
    Literal(LiteralNode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiteralKind {
    String,
    Number,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralNode {
    pub kind: LiteralKind,
    pub text: String,
    pub alignment: Option<usize>,
}
