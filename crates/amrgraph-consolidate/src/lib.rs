//! Corpus-level consolidation of AMR sentence graphs.
//!
//! [`consolidate`] takes parsed sentences and runs, in order:
//!
//! 1. name removal
//! 2. concept removal (concept labels become type tags)
//! 3. candidate disambiguation
//! 4. multiword collapsing
//! 5. global merge (coreference chains, then shared named entities)
//!
//! Candidate meanings and coreference chains come from the caller through
//! [`CandidateLookup`] and [`CoreferenceResolver`].

pub mod annotated;
pub mod candidates;
pub mod config;
pub mod coref;
pub mod corpus;
pub mod export;
pub mod passes;

pub use annotated::{AnnotatedGraph, GlobalGraph, VertexNote};
pub use candidates::{Candidate, CandidateLookup, Meaning, Mention, NoCandidates};
pub use config::ConsolidationConfig;
pub use coref::{ChainMember, CorefChain, CoreferenceResolver, NoCoreference, SentenceRef};
pub use corpus::{parse_corpus, Corpus, SkippedEntry};
pub use export::GraphExport;
pub use passes::{CollapseStats, MergeStats};

use amrgraph_dsl::AmrSentence;
use anyhow::Context;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// Report
// ============================================================================

/// Counters gathered while consolidating a corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub sentences: usize,
    pub skipped: Vec<SkippedEntry>,
    pub mentions: usize,
    pub names_removed: usize,
    pub concepts_removed: usize,
    pub meanings_chosen: usize,
    pub multiwords: CollapseStats,
    pub merge: MergeStats,
    pub vertices: usize,
    pub edges: usize,
}

#[derive(Debug, Clone)]
pub struct Consolidation {
    pub graph: GlobalGraph,
    pub report: ConsolidationReport,
}

impl Consolidation {
    pub fn export(&self) -> GraphExport {
        GraphExport::from_global(&self.graph)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Wrap a sentence and attach its mentions and their candidates.
fn annotate(sentence: &AmrSentence, lookup: &impl CandidateLookup, max_tokens: usize) -> (AnnotatedGraph, usize) {
    let mut graph = AnnotatedGraph::from_sentence(sentence);
    let mentions = candidates::collect_mentions(sentence, max_tokens);
    let count = mentions.len();
    for (head, mention) in mentions {
        let found = lookup.candidates(&mention);
        let note = graph.note_mut(head);
        for (meaning, weight) in found {
            note.candidates.push(Candidate {
                mention: mention.clone(),
                meaning,
                weight,
            });
        }
        note.mentions.push(mention);
    }
    (graph, count)
}

/// Run a per-graph pass over every sentence and sum its counter.
fn per_graph(graphs: &mut [AnnotatedGraph], parallel: bool, pass: fn(&mut AnnotatedGraph) -> usize) -> usize {
    if parallel {
        graphs.par_iter_mut().map(pass).sum()
    } else {
        graphs.iter_mut().map(pass).sum()
    }
}

/// Consolidate parsed sentences into one corpus graph.
pub fn consolidate(
    sentences: &[AmrSentence],
    lookup: &impl CandidateLookup,
    coref: &impl CoreferenceResolver,
    config: &ConsolidationConfig,
) -> anyhow::Result<Consolidation> {
    let mut report = ConsolidationReport {
        sentences: sentences.len(),
        ..ConsolidationReport::default()
    };

    let refs: Vec<SentenceRef<'_>> = sentences
        .iter()
        .map(|s| SentenceRef {
            id: &s.id,
            tokens: &s.tokens,
            graph: s.graph(),
            alignments: &s.alignments,
        })
        .collect();
    let chains = coref.chains(&refs);

    let max_tokens = config.max_mention_tokens.max(1);
    let annotated: Vec<(AnnotatedGraph, usize)> = if config.parallel {
        sentences
            .par_iter()
            .map(|s| annotate(s, lookup, max_tokens))
            .collect()
    } else {
        sentences
            .iter()
            .map(|s| annotate(s, lookup, max_tokens))
            .collect()
    };
    let mut graphs = Vec::with_capacity(annotated.len());
    for (graph, mentions) in annotated {
        report.mentions += mentions;
        graphs.push(graph);
    }

    report.names_removed = per_graph(&mut graphs, config.parallel, passes::remove_names);
    tracing::debug!(removed = report.names_removed, "name removal");

    report.concepts_removed = per_graph(&mut graphs, config.parallel, passes::remove_concepts);
    tracing::debug!(removed = report.concepts_removed, "concept removal");

    report.meanings_chosen = per_graph(&mut graphs, config.parallel, passes::disambiguate);
    tracing::debug!(chosen = report.meanings_chosen, "disambiguation");

    for graph in &mut graphs {
        let stats = passes::collapse_multiwords(graph)
            .with_context(|| format!("multiword collapse failed in sentence {}", graph.id))?;
        report.multiwords.worklist += stats.worklist;
        report.multiwords.collapsed += stats.collapsed;
        report.multiwords.absorbed += stats.absorbed;
    }
    tracing::debug!(
        worklist = report.multiwords.worklist,
        collapsed = report.multiwords.collapsed,
        "multiword collapse"
    );

    let (global, merge) = passes::merge(&graphs, &chains).context("global merge failed")?;
    report.merge = merge;
    report.vertices = global.graph.vertex_count();
    report.edges = global.graph.edge_count();
    tracing::debug!(
        chains = merge.chains_merged,
        entities = merge.entity_groups_merged,
        vertices = report.vertices,
        edges = report.edges,
        "global merge"
    );

    Ok(Consolidation {
        graph: global,
        report,
    })
}

/// Parse a bank and consolidate every entry that parsed.
pub fn consolidate_bank(
    text: &str,
    lookup: &impl CandidateLookup,
    coref: &impl CoreferenceResolver,
    config: &ConsolidationConfig,
) -> anyhow::Result<Consolidation> {
    let corpus = parse_corpus(text, &config.parse, config.parallel);
    let mut consolidation = consolidate(&corpus.sentences, lookup, coref, config)?;
    consolidation.report.skipped = corpus.skipped;
    Ok(consolidation)
}
