//! The five consolidation passes.
//!
//! Passes 1-4 rewrite one sentence graph at a time; pass 5 folds all of them
//! into the corpus graph. Every pass returns its counters instead of logging
//! into shared state.

use crate::annotated::{AnnotatedGraph, GlobalGraph};
use crate::candidates::pick_candidate;
use crate::coref::CorefChain;
use amrgraph_dsl::{GraphError, VertexId, VertexKind, INSTANCE_ROLE};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

pub const NAME_ROLE: &str = ":name";
pub const OP_ROLE_PREFIX: &str = ":op";

fn is_op_role(role: &str) -> bool {
    role.strip_prefix(OP_ROLE_PREFIX)
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
}

// ============================================================================
// Pass 1: names
// ============================================================================

/// Remove `:name` structures: the `:op*` children of every name vertex, and
/// the name vertex itself when it has nothing but `:instance`/`:op*` edges.
pub fn remove_names(graph: &mut AnnotatedGraph) -> usize {
    let g = &graph.graph;
    let mut doomed = BTreeSet::new();
    for (_, edge) in g.edges() {
        if edge.role != NAME_ROLE {
            continue;
        }
        let name = edge.target;
        let outgoing = g.outgoing(name);
        doomed.extend(
            outgoing
                .iter()
                .filter(|(_, e)| is_op_role(&e.role))
                .map(|(_, e)| e.target),
        );
        if outgoing
            .iter()
            .all(|(_, e)| e.role == INSTANCE_ROLE || is_op_role(&e.role))
        {
            doomed.insert(name);
        }
    }
    graph.remove_vertices(&doomed)
}

// ============================================================================
// Pass 2: concepts
// ============================================================================

/// Record each concept label as a type tag on its variable, then drop every
/// concept vertex.
pub fn remove_concepts(graph: &mut AnnotatedGraph) -> usize {
    let mut tags = Vec::new();
    for (_, edge) in graph.graph.edges() {
        if edge.role != INSTANCE_ROLE {
            continue;
        }
        if let Some(VertexKind::Concept { label }) = graph.graph.kind(edge.target) {
            tags.push((edge.source, label.clone()));
        }
    }
    for (vertex, label) in tags {
        graph.note_mut(vertex).types.insert(label);
    }

    let concepts: BTreeSet<VertexId> = graph
        .graph
        .vertices()
        .into_iter()
        .filter(|&v| graph.graph.kind(v).is_some_and(VertexKind::is_concept))
        .collect();
    graph.remove_vertices(&concepts)
}

// ============================================================================
// Pass 3: disambiguation
// ============================================================================

/// Choose one candidate per vertex. Returns the number of vertices that got
/// a meaning.
pub fn disambiguate(graph: &mut AnnotatedGraph) -> usize {
    let mut chosen = 0;
    for id in graph.note_ids() {
        let note = graph.note_mut(id);
        note.chosen = pick_candidate(&note.candidates).cloned();
        if note.chosen.is_some() {
            chosen += 1;
        }
    }
    chosen
}

// ============================================================================
// Pass 4: multiwords
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollapseStats {
    /// Subsumers initially queued.
    pub worklist: usize,
    /// Subsumers whose span was collapsed.
    pub collapsed: usize,
    /// Vertices absorbed by those collapses.
    pub absorbed: usize,
}

/// Vertices whose chosen mention is multiword and which have a descendant
/// aligned inside that mention.
pub fn subsumers(graph: &AnnotatedGraph) -> Vec<VertexId> {
    let mut out = Vec::new();
    for (id, note) in graph.notes() {
        let Some(chosen) = &note.chosen else {
            continue;
        };
        if !chosen.mention.is_multiword() {
            continue;
        }
        let span = chosen.mention.span();
        let aligned_inside = graph.graph.descendants(id).into_iter().any(|d| {
            d != id
                && graph
                    .alignments
                    .get(&d)
                    .is_some_and(|tokens| tokens.iter().any(|t| span.contains(t)))
        });
        if aligned_inside {
            out.push(id);
        }
    }
    out
}

/// Contract multiword spans into their subsumer when the subsumer's meaning
/// outweighs every competing candidate inside the span.
pub fn collapse_multiwords(graph: &mut AnnotatedGraph) -> Result<CollapseStats, GraphError> {
    let mut queue: VecDeque<VertexId> = subsumers(graph).into();
    let mut stats = CollapseStats {
        worklist: queue.len(),
        ..CollapseStats::default()
    };

    while let Some(v) = queue.pop_front() {
        if !graph.graph.is_live(v) {
            continue;
        }
        let Some(chosen) = graph.note(v).and_then(|n| n.chosen.clone()) else {
            continue;
        };
        let covered: Vec<VertexId> = graph
            .covered(chosen.mention.span())
            .into_iter()
            .filter(|&c| c != v)
            .collect();
        if covered.is_empty() {
            continue;
        }

        let s_max = covered
            .iter()
            .filter_map(|&c| graph.note(c).and_then(|n| n.max_candidate_weight()))
            .fold(f64::NEG_INFINITY, f64::max);
        tracing::trace!(
            sentence = %graph.id,
            vertex = %graph.graph.name(v),
            v_value = chosen.weight,
            s_max,
            "multiword subsumer"
        );
        if chosen.weight < s_max {
            continue;
        }

        let removed = graph.contract(v, &covered)?;
        for entry in queue.iter_mut() {
            if removed.contains(entry) {
                *entry = v;
            }
        }
        stats.collapsed += 1;
        stats.absorbed += removed.len();
    }
    Ok(stats)
}

// ============================================================================
// Pass 5: global merge
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    /// Chains with more than one live member that were contracted.
    pub chains_merged: usize,
    pub coref_absorbed: usize,
    /// Chain members that no longer exist (removed by earlier passes).
    pub unresolved_members: usize,
    pub entity_groups_merged: usize,
    pub entity_absorbed: usize,
}

/// Union all sentence graphs, then contract coreference chains and
/// vertices sharing a named-entity meaning.
pub fn merge(
    sentences: &[AnnotatedGraph],
    chains: &[CorefChain],
) -> Result<(GlobalGraph, MergeStats), GraphError> {
    let mut global = GlobalGraph::default();
    for sentence in sentences {
        global.add_sentence(sentence);
    }
    let by_id: BTreeMap<&str, &AnnotatedGraph> = sentences.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut stats = MergeStats::default();
    for chain in chains {
        let mut members = BTreeSet::new();
        for member in &chain.members {
            let resolved = by_id
                .get(member.sentence.as_str())
                .and_then(|s| s.resolve(&member.variable))
                .and_then(|local| {
                    let sentence = by_id.get(member.sentence.as_str())?;
                    global.vertex(&member.sentence, sentence.graph.name(local))
                });
            match resolved {
                Some(id) => {
                    members.insert(id);
                }
                None => {
                    tracing::warn!(
                        sentence = %member.sentence,
                        variable = %member.variable,
                        "coreference member no longer in the graph"
                    );
                    stats.unresolved_members += 1;
                }
            }
        }
        if members.len() < 2 {
            continue;
        }

        // highest chosen weight wins; members iterate in id order so ties
        // keep the smallest id
        let mut survivor = None;
        let mut best = f64::NEG_INFINITY;
        for &id in &members {
            let weight = global.note(id).and_then(|n| n.chosen_weight()).unwrap_or(f64::NEG_INFINITY);
            if survivor.is_none() || weight > best {
                survivor = Some(id);
                best = weight;
            }
        }
        let Some(survivor) = survivor else {
            continue;
        };
        let absorbed: Vec<VertexId> = members.into_iter().filter(|&id| id != survivor).collect();
        stats.coref_absorbed += global.contract(survivor, &absorbed)?.len();
        stats.chains_merged += 1;
    }

    let mut groups: BTreeMap<String, Vec<VertexId>> = BTreeMap::new();
    for id in global.vertices() {
        if let Some(chosen) = global.note(id).and_then(|n| n.chosen.as_ref()) {
            if chosen.meaning.named_entity {
                groups.entry(chosen.meaning.reference.clone()).or_default().push(id);
            }
        }
    }
    for (_, group) in groups {
        if let [survivor, rest @ ..] = group.as_slice() {
            if rest.is_empty() {
                continue;
            }
            stats.entity_absorbed += global.contract(*survivor, rest)?.len();
            stats.entity_groups_merged += 1;
        }
    }

    Ok((global, stats))
}
