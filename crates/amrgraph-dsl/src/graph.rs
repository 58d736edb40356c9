//! Sentence-level semantic graph.
//!
//! An arena-backed directed multigraph: vertices are addressed by opaque
//! [`VertexId`] handles (with a string name that is unique among live
//! vertices), edges by [`EdgeId`] and carry a role label such as `:ARG0`.
//!
//! Removal leaves tombstones behind, so ids stay stable for the lifetime of
//! the graph. Traversal helpers hand out snapshots (`Vec`s) rather than
//! iterators over the adjacency lists, which keeps contraction free of
//! invalidated iterators.

use crate::node::LiteralKind;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;

/// Role of the edge from a variable to its concept vertex.
pub const INSTANCE_ROLE: &str = ":instance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VertexId(u32);

impl VertexId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(transparent)]
pub struct EdgeId(u32);

impl EdgeId {
    pub const fn raw(self) -> u32 {
        self.0
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a vertex stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VertexKind {
    Variable,
    Concept { label: String },
    Literal { literal: LiteralKind, text: String },
}

impl VertexKind {
    pub fn is_concept(&self) -> bool {
        matches!(self, VertexKind::Concept { .. })
    }

    /// Concept label or literal text; `None` for variables.
    pub fn label(&self) -> Option<&str> {
        match self {
            VertexKind::Variable => None,
            VertexKind::Concept { label } => Some(label),
            VertexKind::Literal { text, .. } => Some(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: VertexId,
    pub target: VertexId,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VertexSlot {
    name: String,
    kind: VertexKind,
    live: bool,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("unknown or removed vertex {vertex}")]
    UnknownVertex { vertex: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticGraph {
    source_id: String,
    root: Option<VertexId>,
    vertices: Vec<VertexSlot>,
    edges: Vec<Option<Edge>>,
    by_name: AHashMap<String, VertexId>,
}

impl SemanticGraph {
    /// A graph whose root is a fresh variable vertex `root`.
    pub fn new(source_id: impl Into<String>, root: &str) -> Self {
        let mut graph = Self::without_root(source_id);
        let id = graph.add_vertex(root, VertexKind::Variable);
        graph.root = Some(id);
        graph
    }

    /// An empty graph with no designated root (used for corpus-level unions).
    pub fn without_root(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            root: None,
            vertices: Vec::new(),
            edges: Vec::new(),
            by_name: AHashMap::new(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// The root vertex, as long as it is still live.
    pub fn root(&self) -> Option<VertexId> {
        self.root.filter(|&id| self.is_live(id))
    }

    // ========================================================================
    // Vertices
    // ========================================================================

    /// Add a vertex, or return the live vertex that already has this name.
    pub fn add_vertex(&mut self, name: &str, kind: VertexKind) -> VertexId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(VertexSlot {
            name: name.to_string(),
            kind,
            live: true,
            outgoing: Vec::new(),
            incoming: Vec::new(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn vertex(&self, name: &str) -> Option<VertexId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn is_live(&self, id: VertexId) -> bool {
        self.vertices.get(id.index()).is_some_and(|slot| slot.live)
    }

    /// Name of a vertex (also answers for removed vertices).
    pub fn name(&self, id: VertexId) -> &str {
        self.vertices
            .get(id.index())
            .map_or("", |slot| slot.name.as_str())
    }

    pub fn kind(&self, id: VertexId) -> Option<&VertexKind> {
        self.vertices.get(id.index()).map(|slot| &slot.kind)
    }

    /// Live vertices in insertion order.
    pub fn vertices(&self) -> Vec<VertexId> {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.live)
            .map(|(i, _)| VertexId(i as u32))
            .collect()
    }

    pub fn vertex_count(&self) -> usize {
        self.by_name.len()
    }

    /// Remove a vertex together with every incident edge.
    pub fn remove_vertex(&mut self, id: VertexId) -> bool {
        if !self.is_live(id) {
            return false;
        }
        let slot = &self.vertices[id.index()];
        let incident: Vec<EdgeId> = slot
            .outgoing
            .iter()
            .chain(slot.incoming.iter())
            .copied()
            .collect();
        for edge in incident {
            self.remove_edge(edge);
        }
        let slot = &mut self.vertices[id.index()];
        slot.live = false;
        self.by_name.remove(&slot.name);
        true
    }

    // ========================================================================
    // Edges
    // ========================================================================

    /// Add `source --role--> target`. Both endpoints must be live.
    pub fn add_edge(
        &mut self,
        source: VertexId,
        role: &str,
        target: VertexId,
    ) -> Result<EdgeId, GraphError> {
        for id in [source, target] {
            if !self.is_live(id) {
                return Err(GraphError::UnknownVertex {
                    vertex: self.name(id).to_string(),
                });
            }
        }
        Ok(self.insert_edge(Edge {
            source,
            target,
            role: role.to_string(),
        }))
    }

    fn insert_edge(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.vertices[edge.source.index()].outgoing.push(id);
        self.vertices[edge.target.index()].incoming.push(id);
        self.edges.push(Some(edge));
        id
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<Edge> {
        let edge = self.edges.get_mut(id.index())?.take()?;
        self.vertices[edge.source.index()]
            .outgoing
            .retain(|&e| e != id);
        self.vertices[edge.target.index()]
            .incoming
            .retain(|&e| e != id);
        Some(edge)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(id.index()).and_then(Option::as_ref)
    }

    /// Live edges in insertion order.
    pub fn edges(&self) -> Vec<(EdgeId, &Edge)> {
        self.edges
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.as_ref().map(|e| (EdgeId(i as u32), e)))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.iter().filter(|e| e.is_some()).count()
    }

    pub fn outgoing(&self, id: VertexId) -> Vec<(EdgeId, &Edge)> {
        self.incident(id, true)
    }

    pub fn incoming(&self, id: VertexId) -> Vec<(EdgeId, &Edge)> {
        self.incident(id, false)
    }

    fn incident(&self, id: VertexId, outgoing: bool) -> Vec<(EdgeId, &Edge)> {
        let Some(slot) = self.vertices.get(id.index()).filter(|s| s.live) else {
            return Vec::new();
        };
        let side = if outgoing { &slot.outgoing } else { &slot.incoming };
        side.iter()
            .filter_map(|&e| self.edge(e).map(|edge| (e, edge)))
            .collect()
    }

    pub fn has_edge(&self, source: VertexId, role: &str, target: VertexId) -> bool {
        self.outgoing(source)
            .iter()
            .any(|(_, e)| e.target == target && e.role == role)
    }

    /// Vertices reachable from `id` (excluding `id` itself unless on a cycle),
    /// in breadth-first order, ignoring edges whose role matches `skip`.
    pub fn descendants_where(&self, id: VertexId, skip: impl Fn(&Edge) -> bool) -> Vec<VertexId> {
        let mut seen = AHashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(current) = queue.pop_front() {
            for (_, edge) in self.outgoing(current) {
                if skip(edge) || !seen.insert(edge.target) {
                    continue;
                }
                order.push(edge.target);
                queue.push_back(edge.target);
            }
        }
        order
    }

    /// Descendants over every edge except `:instance`.
    pub fn descendants(&self, id: VertexId) -> Vec<VertexId> {
        self.descendants_where(id, |e| e.role == INSTANCE_ROLE)
    }

    // ========================================================================
    // Rewriting
    // ========================================================================

    /// Merge every vertex in `absorbed` into `survivor`.
    ///
    /// Incident edges are redirected to `survivor`; an edge that would become
    /// a self-loop on `survivor` is dropped. Parallel edges are kept. Returns
    /// the vertices that were removed.
    pub fn contract(
        &mut self,
        survivor: VertexId,
        absorbed: &[VertexId],
    ) -> Result<Vec<VertexId>, GraphError> {
        if !self.is_live(survivor) {
            return Err(GraphError::UnknownVertex {
                vertex: self.name(survivor).to_string(),
            });
        }

        let mut removed = Vec::new();
        for &victim in absorbed {
            if victim == survivor || !self.is_live(victim) {
                continue;
            }
            let slot = &self.vertices[victim.index()];
            let incident: BTreeSet<EdgeId> = slot
                .outgoing
                .iter()
                .chain(slot.incoming.iter())
                .copied()
                .collect();

            for edge_id in incident {
                let Some(mut edge) = self.remove_edge(edge_id) else {
                    continue;
                };
                if edge.source == victim {
                    edge.source = survivor;
                }
                if edge.target == victim {
                    edge.target = survivor;
                }
                if edge.source == edge.target {
                    continue;
                }
                self.insert_edge(edge);
            }

            self.remove_vertex(victim);
            removed.push(victim);
        }
        Ok(removed)
    }

    /// Prefix every vertex name (used to make names unique across a corpus).
    pub fn rename_with_prefix(&mut self, prefix: &str) {
        self.by_name.clear();
        for (i, slot) in self.vertices.iter_mut().enumerate() {
            slot.name = format!("{prefix}{}", slot.name);
            if slot.live {
                self.by_name.insert(slot.name.clone(), VertexId(i as u32));
            }
        }
    }

    /// Copy every live vertex and edge of `other` into `self`.
    ///
    /// Vertex names must not collide with names already present; colliding
    /// vertices are shared. Returns the id mapping `other -> self`.
    pub fn absorb_disjoint(&mut self, other: &SemanticGraph) -> AHashMap<VertexId, VertexId> {
        let mut mapping = AHashMap::new();
        for id in other.vertices() {
            let slot = &other.vertices[id.index()];
            let new_id = self.add_vertex(&slot.name, slot.kind.clone());
            mapping.insert(id, new_id);
        }
        for (_, edge) in other.edges() {
            if let (Some(&source), Some(&target)) = (mapping.get(&edge.source), mapping.get(&edge.target)) {
                self.insert_edge(Edge {
                    source,
                    target,
                    role: edge.role.clone(),
                });
            }
        }
        mapping
    }

    /// Weakly connected components, each sorted, ordered by smallest member.
    pub fn connected_components(&self) -> Vec<Vec<VertexId>> {
        let mut seen = AHashSet::new();
        let mut components = Vec::new();
        for start in self.vertices() {
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![start];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                let neighbours = self
                    .outgoing(current)
                    .into_iter()
                    .map(|(_, e)| e.target)
                    .chain(self.incoming(current).into_iter().map(|(_, e)| e.source))
                    .collect::<Vec<_>>();
                for next in neighbours {
                    if seen.insert(next) {
                        component.push(next);
                        queue.push_back(next);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(graph: &mut SemanticGraph, name: &str) -> VertexId {
        graph.add_vertex(name, VertexKind::Variable)
    }

    #[test]
    fn add_vertex_is_idempotent() {
        let mut g = SemanticGraph::new("s1", "w");
        let a = var(&mut g, "b");
        let b = var(&mut g, "b");
        assert_eq!(a, b);
        assert_eq!(g.vertex_count(), 2);
        assert_eq!(g.root(), g.vertex("w"));
    }

    #[test]
    fn rejects_edges_to_removed_vertices() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let b = var(&mut g, "b");
        g.remove_vertex(b);
        let err = g.add_edge(w, ":ARG0", b).expect_err("b was removed");
        assert_eq!(
            err,
            GraphError::UnknownVertex {
                vertex: "b".to_string()
            }
        );
    }

    #[test]
    fn removing_a_vertex_drops_incident_edges() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let b = var(&mut g, "b");
        g.add_edge(w, ":ARG0", b).unwrap();
        assert!(g.remove_vertex(b));
        assert_eq!(g.edge_count(), 0);
        assert!(g.outgoing(w).is_empty());
        assert!(!g.contains("b"));
    }

    #[test]
    fn contraction_redirects_edges_and_drops_self_loops() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let b = var(&mut g, "b");
        let c = var(&mut g, "c");
        let d = var(&mut g, "d");
        g.add_edge(w, ":ARG0", b).unwrap();
        g.add_edge(b, ":mod", c).unwrap();
        g.add_edge(c, ":ARG1", d).unwrap();
        g.add_edge(d, ":ARG2", b).unwrap();

        let removed = g.contract(b, &[c, d]).unwrap();
        assert_eq!(removed, vec![c, d]);
        assert!(!g.is_live(c) && !g.is_live(d));
        for (_, edge) in g.edges() {
            assert!(g.is_live(edge.source) && g.is_live(edge.target));
            assert_ne!(edge.source, edge.target);
        }
        assert!(g.has_edge(w, ":ARG0", b));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn contraction_keeps_parallel_edges() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let b = var(&mut g, "b");
        let c = var(&mut g, "c");
        g.add_edge(w, ":ARG0", b).unwrap();
        g.add_edge(w, ":ARG0", c).unwrap();
        g.contract(b, &[c]).unwrap();
        assert_eq!(g.edge_count(), 2);
        assert!(g.outgoing(w).iter().all(|(_, e)| e.role == ":ARG0" && e.target == b));
    }

    #[test]
    fn rename_keeps_ids_and_root() {
        let mut g = SemanticGraph::new("s1", "w");
        let b = var(&mut g, "b");
        g.rename_with_prefix("s1.");
        assert_eq!(g.vertex("s1.b"), Some(b));
        assert_eq!(g.name(g.root().unwrap()), "s1.w");
        assert!(!g.contains("b"));
    }

    #[test]
    fn components_split_on_missing_edges() {
        let mut g = SemanticGraph::without_root("global");
        let a = var(&mut g, "a");
        let b = var(&mut g, "b");
        let c = var(&mut g, "c");
        g.add_edge(b, ":ARG0", a).unwrap();
        assert_eq!(g.connected_components(), vec![vec![a, b], vec![c]]);
    }

    #[test]
    fn descendants_skip_instance_edges() {
        let mut g = SemanticGraph::new("s1", "w");
        let w = g.vertex("w").unwrap();
        let concept = g.add_vertex(
            "w/want-01",
            VertexKind::Concept {
                label: "want-01".to_string(),
            },
        );
        let b = var(&mut g, "b");
        g.add_edge(w, INSTANCE_ROLE, concept).unwrap();
        g.add_edge(w, ":ARG0", b).unwrap();
        assert_eq!(g.descendants(w), vec![b]);
    }
}
