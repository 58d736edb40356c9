//! Graphs carrying per-vertex consolidation notes.
//!
//! [`AnnotatedGraph`] wraps one sentence graph while passes 1-4 run;
//! [`GlobalGraph`] is the corpus-level union built by pass 5. Both contract
//! vertices the same way: the graph rewires edges, the notes of absorbed
//! vertices are folded into the survivor, and a forwarding entry is left
//! behind so later lookups of an absorbed vertex land on its survivor.

use crate::candidates::{Candidate, Mention};
use amrgraph_dsl::{AmrSentence, Alignments, GraphError, SemanticGraph, VertexId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VertexNote {
    pub mentions: Vec<Mention>,
    pub candidates: Vec<Candidate>,
    pub chosen: Option<Candidate>,
    /// Concept labels stripped from beneath the vertex.
    pub types: BTreeSet<String>,
}

impl VertexNote {
    pub fn chosen_weight(&self) -> Option<f64> {
        self.chosen.as_ref().map(|c| c.weight)
    }

    pub fn max_candidate_weight(&self) -> Option<f64> {
        self.candidates.iter().map(|c| c.weight).reduce(f64::max)
    }

    /// Fold `other` into `self`: union mentions and types, keep our meaning
    /// if we have one.
    pub fn absorb(&mut self, other: VertexNote) {
        for mention in other.mentions {
            if !self.mentions.contains(&mention) {
                self.mentions.push(mention);
            }
        }
        self.candidates.extend(other.candidates);
        self.types.extend(other.types);
        if self.chosen.is_none() {
            self.chosen = other.chosen;
        }
    }
}

fn forwarded(forward: &BTreeMap<VertexId, VertexId>, mut id: VertexId) -> VertexId {
    while let Some(&next) = forward.get(&id) {
        id = next;
    }
    id
}

fn contract_noted(
    graph: &mut SemanticGraph,
    notes: &mut BTreeMap<VertexId, VertexNote>,
    forward: &mut BTreeMap<VertexId, VertexId>,
    survivor: VertexId,
    absorbed: &[VertexId],
) -> Result<Vec<VertexId>, GraphError> {
    let removed = graph.contract(survivor, absorbed)?;
    for &victim in &removed {
        if let Some(note) = notes.remove(&victim) {
            notes.entry(survivor).or_default().absorb(note);
        }
        forward.insert(victim, survivor);
    }
    Ok(removed)
}

// ============================================================================
// Sentence graphs
// ============================================================================

#[derive(Debug, Clone)]
pub struct AnnotatedGraph {
    pub id: String,
    pub graph: SemanticGraph,
    pub alignments: Alignments,
    notes: BTreeMap<VertexId, VertexNote>,
    forward: BTreeMap<VertexId, VertexId>,
    /// Every name the graph ever had, including removed vertices.
    names: AHashMap<String, VertexId>,
}

impl AnnotatedGraph {
    /// Wrap a sentence graph; the sentence id is the graph's source id.
    pub fn new(graph: SemanticGraph, alignments: Alignments) -> Self {
        let names = graph
            .vertices()
            .into_iter()
            .map(|v| (graph.name(v).to_string(), v))
            .collect();
        Self {
            id: graph.source_id().to_string(),
            graph,
            alignments,
            notes: BTreeMap::new(),
            forward: BTreeMap::new(),
            names,
        }
    }

    pub fn from_sentence(sentence: &AmrSentence) -> Self {
        Self::new(sentence.graph().clone(), sentence.alignments.clone())
    }

    pub fn note(&self, id: VertexId) -> Option<&VertexNote> {
        self.notes.get(&id)
    }

    pub fn note_mut(&mut self, id: VertexId) -> &mut VertexNote {
        self.notes.entry(id).or_default()
    }

    /// Notes of live vertices, by vertex id.
    pub fn notes(&self) -> impl Iterator<Item = (VertexId, &VertexNote)> + '_ {
        self.notes
            .iter()
            .filter(|(id, _)| self.graph.is_live(**id))
            .map(|(&id, note)| (id, note))
    }

    pub fn note_ids(&self) -> Vec<VertexId> {
        self.notes().map(|(id, _)| id).collect()
    }

    /// Remove vertices together with their notes and alignments.
    pub fn remove_vertices(&mut self, ids: &BTreeSet<VertexId>) -> usize {
        let mut removed = 0;
        for &id in ids {
            if self.graph.remove_vertex(id) {
                self.notes.remove(&id);
                self.alignments.remove(&id);
                removed += 1;
            }
        }
        removed
    }

    /// Live vertices aligned to at least one token of `span`.
    pub fn covered(&self, span: Range<usize>) -> Vec<VertexId> {
        self.alignments
            .iter()
            .filter(|(id, tokens)| self.graph.is_live(**id) && tokens.iter().any(|t| span.contains(t)))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn contract(&mut self, survivor: VertexId, absorbed: &[VertexId]) -> Result<Vec<VertexId>, GraphError> {
        let removed = contract_noted(
            &mut self.graph,
            &mut self.notes,
            &mut self.forward,
            survivor,
            absorbed,
        )?;
        for victim in &removed {
            if let Some(tokens) = self.alignments.remove(victim) {
                self.alignments.entry(survivor).or_default().extend(tokens);
            }
        }
        Ok(removed)
    }

    /// The live vertex that a variable ended up in, following contractions.
    pub fn resolve(&self, variable: &str) -> Option<VertexId> {
        let id = forwarded(&self.forward, *self.names.get(variable)?);
        self.graph.is_live(id).then_some(id)
    }
}

// ============================================================================
// Corpus graph
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalGraph {
    pub graph: SemanticGraph,
    notes: BTreeMap<VertexId, VertexNote>,
    /// Sentence each vertex came from.
    sources: BTreeMap<VertexId, String>,
    forward: BTreeMap<VertexId, VertexId>,
    names: AHashMap<String, VertexId>,
}

impl Default for GlobalGraph {
    fn default() -> Self {
        Self {
            graph: SemanticGraph::without_root("corpus"),
            notes: BTreeMap::new(),
            sources: BTreeMap::new(),
            forward: BTreeMap::new(),
            names: AHashMap::new(),
        }
    }
}

impl GlobalGraph {
    /// Copy a sentence graph in, prefixing its vertex names with `<id>.`.
    pub fn add_sentence(&mut self, sentence: &AnnotatedGraph) {
        let mut copy = sentence.graph.clone();
        copy.rename_with_prefix(&format!("{}.", sentence.id));
        let mapping = self.graph.absorb_disjoint(&copy);
        for (old, new) in mapping {
            if let Some(note) = sentence.notes.get(&old) {
                self.notes.insert(new, note.clone());
            }
            self.sources.insert(new, sentence.id.clone());
            self.names.insert(self.graph.name(new).to_string(), new);
        }
    }

    /// The live vertex a sentence variable ended up in after the merge.
    pub fn vertex(&self, sentence: &str, variable: &str) -> Option<VertexId> {
        self.forwarded(*self.names.get(&format!("{sentence}.{variable}"))?)
    }

    pub fn note(&self, id: VertexId) -> Option<&VertexNote> {
        self.notes.get(&id)
    }

    pub fn source(&self, id: VertexId) -> Option<&str> {
        self.sources.get(&id).map(String::as_str)
    }

    /// Live vertices in id order.
    pub fn vertices(&self) -> Vec<VertexId> {
        self.graph.vertices()
    }

    pub fn contract(&mut self, survivor: VertexId, absorbed: &[VertexId]) -> Result<Vec<VertexId>, GraphError> {
        let removed = contract_noted(
            &mut self.graph,
            &mut self.notes,
            &mut self.forward,
            survivor,
            absorbed,
        )?;
        for victim in &removed {
            self.sources.remove(victim);
        }
        Ok(removed)
    }

    /// Follow the forwarding table from a (possibly absorbed) vertex.
    pub fn forwarded(&self, id: VertexId) -> Option<VertexId> {
        let id = forwarded(&self.forward, id);
        self.graph.is_live(id).then_some(id)
    }
}
