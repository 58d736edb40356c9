//! Graph-building actions run by the AMR grammar as its rules match.
//!
//! Variables are bound pre-order (as soon as the `(v` prefix of an ancestor
//! has matched), so binding a variable a second time marks that ancestor
//! re-entrant. Bare references never bind: a reference written before its
//! `(v / ...)` definition leaves the definition as the tree occurrence.
//! Edges are added once the whole ancestor has matched, by which time every
//! child vertex exists.

use crate::amr_v1::ParseOptions;
use crate::graph::{EdgeId, GraphError, SemanticGraph, VertexId, VertexKind, INSTANCE_ROLE};
use crate::node::{ConceptNode, DescendantNode, DescendantTarget, LabelNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Vertex -> aligned token indices.
pub type Alignments = BTreeMap<VertexId, BTreeSet<usize>>;

/// Roles that end in `-of` without being inverses.
const NON_INVERSE_OF_ROLES: &[&str] = &[":consist-of", ":prep-out-of", ":prep-on-behalf-of"];

/// An alignment that was written on a relation and kept there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationAlignment {
    pub edge: EdgeId,
    pub token: usize,
}

/// A syntactic (tree) child as written in the AMR, before inverse normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxChild {
    pub vertex: VertexId,
    pub edge: EdgeId,
    pub reentrant: bool,
}

/// Whether `relation` is written as an inverse (`:ARG0-of`).
pub fn is_inverse_role(relation: &str) -> bool {
    relation.ends_with("-of") && !NON_INVERSE_OF_ROLES.contains(&relation)
}

/// Resolve the inverse-relation policy for one relation; `inverse` is the
/// flag the grammar computed with [`is_inverse_role`].
///
/// Returns the role to store and whether the edge runs child -> parent.
pub fn normalize_role(relation: &str, inverse: bool, preserve_inverse: bool) -> (String, bool) {
    if preserve_inverse {
        return (relation.to_string(), false);
    }
    match relation {
        ":mod" => return (":domain".to_string(), true),
        ":mod-of" => return (":domain".to_string(), false),
        _ => {}
    }
    if inverse {
        if let Some(base) = relation.strip_suffix("-of") {
            return (base.to_string(), true);
        }
    }
    (relation.to_string(), false)
}

/// Accumulates the sentence graph while the grammar runs.
#[derive(Debug)]
pub struct GraphBuilder {
    source_id: String,
    options: ParseOptions,
    graph: Option<SemanticGraph>,
    alignments: Alignments,
    relation_alignments: Vec<RelationAlignment>,
    reentrant_edges: BTreeSet<EdgeId>,
    children: BTreeMap<VertexId, Vec<SyntaxChild>>,
    bound: BTreeSet<String>,
    literal_count: usize,
    error: Option<GraphError>,
}

/// Everything the actions produced for one sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltGraph {
    pub graph: SemanticGraph,
    pub alignments: Alignments,
    pub relation_alignments: Vec<RelationAlignment>,
    pub reentrant_edges: BTreeSet<EdgeId>,
    pub children: BTreeMap<VertexId, Vec<SyntaxChild>>,
    /// Pre-order visitation of the root label, as vertex ids.
    pub visit_order: Vec<VertexId>,
}

impl GraphBuilder {
    pub fn new(source_id: &str, options: ParseOptions) -> Self {
        Self {
            source_id: source_id.to_string(),
            options,
            graph: None,
            alignments: Alignments::new(),
            relation_alignments: Vec::new(),
            reentrant_edges: BTreeSet::new(),
            children: BTreeMap::new(),
            bound: BTreeSet::new(),
            literal_count: 0,
            error: None,
        }
    }

    pub fn take_error(&mut self) -> Option<GraphError> {
        self.error.take()
    }

    fn graph_mut(&mut self, first_variable: &str) -> &mut SemanticGraph {
        let source_id = &self.source_id;
        self.graph
            .get_or_insert_with(|| SemanticGraph::new(source_id.as_str(), first_variable))
    }

    fn align(&mut self, vertex: VertexId, token: Option<usize>) {
        if let Some(token) = token {
            self.alignments.entry(vertex).or_default().insert(token);
        }
    }

    fn fail(&mut self, error: GraphError) {
        if self.error.is_none() {
            tracing::debug!(source = %self.source_id, %error, "rejected edge while parsing");
            self.error = Some(error);
        }
    }

    /// Bind the variable of an ancestor; returns whether it was already bound.
    pub fn bind(&mut self, variable: &str) -> bool {
        self.graph_mut(variable).add_vertex(variable, VertexKind::Variable);
        !self.bound.insert(variable.to_string())
    }

    /// A bare variable in target position.
    pub fn reference(&mut self, variable: &str, alignment: Option<usize>) -> LabelNode {
        let id = self
            .graph_mut(variable)
            .add_vertex(variable, VertexKind::Variable);
        self.align(id, alignment);
        LabelNode {
            variable: variable.to_string(),
            reentrant: true,
            visited: vec![variable.to_string()],
        }
    }

    /// Complete an ancestor once all of its descendants have matched.
    ///
    /// Returns `None` (and records the error) when an edge is rejected.
    pub fn ancestor(
        &mut self,
        variable: &str,
        reentrant: bool,
        concept: Option<ConceptNode>,
        descendants: Vec<DescendantNode>,
    ) -> Option<LabelNode> {
        let preserve_inverse = self.options.preserve_inverse;
        let push_alignments = self.options.push_relation_alignments;

        let parent = self.graph_mut(variable).add_vertex(variable, VertexKind::Variable);
        let mut visited = vec![variable.to_string()];

        if let Some(concept) = concept {
            let concept_id = format!("{variable}/{}", concept.label);
            let graph = self.graph_mut(variable);
            let concept_vertex = graph.add_vertex(
                &concept_id,
                VertexKind::Concept {
                    label: concept.label.clone(),
                },
            );
            if let Err(error) = graph.add_edge(parent, INSTANCE_ROLE, concept_vertex) {
                self.fail(error);
                return None;
            }
            self.align(parent, concept.alignment);
            visited.push(concept_id);
        }

        for descendant in descendants {
            let (child, child_reentrant, child_visited, child_aligned) = match descendant.target {
                DescendantTarget::Label(label) => {
                    let id = self.graph_mut(variable).add_vertex(&label.variable, VertexKind::Variable);
                    (id, label.reentrant, label.visited, self.alignments.contains_key(&id))
                }
                DescendantTarget::Literal(literal) => {
                    let name = format!("{variable}.{}", self.literal_count);
                    self.literal_count += 1;
                    let id = self.graph_mut(variable).add_vertex(
                        &name,
                        VertexKind::Literal {
                            literal: literal.kind,
                            text: literal.text.clone(),
                        },
                    );
                    self.align(id, literal.alignment);
                    let aligned = literal.alignment.is_some();
                    (id, false, vec![name], aligned)
                }
            };

            let (role, flipped) = normalize_role(&descendant.relation, descendant.inverse, preserve_inverse);
            let (source, target) = if flipped { (child, parent) } else { (parent, child) };
            let edge = match self.graph_mut(variable).add_edge(source, &role, target) {
                Ok(edge) => edge,
                Err(error) => {
                    self.fail(error);
                    return None;
                }
            };

            if let Some(token) = descendant.relation_alignment {
                if push_alignments && !child_aligned {
                    self.align(child, Some(token));
                } else {
                    self.relation_alignments.push(RelationAlignment { edge, token });
                }
            }

            if child_reentrant {
                self.reentrant_edges.insert(edge);
            }
            self.children.entry(parent).or_default().push(SyntaxChild {
                vertex: child,
                edge,
                reentrant: child_reentrant,
            });
            visited.extend(child_visited);
        }

        Some(LabelNode {
            variable: variable.to_string(),
            reentrant,
            visited,
        })
    }

    /// Hand over the finished graph; `None` if nothing was ever bound.
    pub fn finish(self, root: &LabelNode) -> Option<BuiltGraph> {
        let graph = self.graph?;
        let mut visit_order = Vec::with_capacity(root.visited.len());
        for name in &root.visited {
            if let Some(id) = graph.vertex(name) {
                visit_order.push(id);
            }
        }
        Some(BuiltGraph {
            graph,
            alignments: self.alignments,
            relation_alignments: self.relation_alignments,
            reentrant_edges: self.reentrant_edges,
            children: self.children,
            visit_order,
        })
    }
}
