//! Token alignments.
//!
//! Inline `~e.N` markers captured while parsing are authoritative. When a
//! sentence has none, the `# ::alignments` header is consulted. Two legacy
//! encodings exist and each has its own parser:
//!
//! - Format 1: `tok-path` pairs, e.g. `0-0.0 1-0 3-0.1.r`
//! - Format 2: `start-end|addr[+addr...]` groups, e.g. `0-1|0.0 1-2|0`
//!
//! Addresses are dotted Gorn paths: the first segment names the root, each
//! further segment `k` picks the `k`-th (0-based) syntactic child. `r`
//! stands for 0.

use crate::actions::{Alignments, BuiltGraph};
use crate::graph::{SemanticGraph, VertexId, INSTANCE_ROLE};
use ahash::AHashMap;
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char as pchar, digit1, space0, space1},
    combinator::{all_consuming, map, map_res, value},
    multi::separated_list1,
    sequence::{separated_pair, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::Range;

// ============================================================================
// Gorn addresses
// ============================================================================

/// A dotted tree address; `segments[0]` is the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GornAddress {
    pub segments: Vec<usize>,
}

impl GornAddress {
    pub fn parse(text: &str) -> Option<Self> {
        all_consuming(gorn_address)(text).ok().map(|(_, address)| address)
    }

    /// Child indices below the root.
    pub fn steps(&self) -> &[usize] {
        self.segments.get(1..).unwrap_or(&[])
    }
}

impl std::fmt::Display for GornAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(usize::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

fn number(input: &str) -> IResult<&str, usize> {
    map_res(digit1, str::parse::<usize>)(input)
}

fn gorn_segment(input: &str) -> IResult<&str, usize> {
    alt((number, value(0, pchar('r'))))(input)
}

fn gorn_address(input: &str) -> IResult<&str, GornAddress> {
    map(separated_list1(pchar('.'), gorn_segment), |segments| GornAddress { segments })(input)
}

// ============================================================================
// Header formats
// ============================================================================

/// Which source produced a sentence's alignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentSource {
    Inline,
    Format1,
    Format2,
    None,
}

/// One `start-end|addresses` group of Format 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanAlignment {
    pub span: Range<usize>,
    pub addresses: Vec<GornAddress>,
}

/// Drop trailing `::annotator`, `::date`, ... fields from a header value.
fn header_payload(header: &str) -> &str {
    let header = header.trim();
    let header = header.strip_prefix("::alignments").unwrap_or(header);
    match header.find("::") {
        Some(end) => header[..end].trim(),
        None => header.trim(),
    }
}

/// Parse Format 1 (`tok-path` pairs). Empty on any mismatch.
pub fn parse_format1(header: &str) -> Vec<(usize, GornAddress)> {
    fn pair(input: &str) -> IResult<&str, (usize, GornAddress)> {
        separated_pair(number, pchar('-'), gorn_address)(input)
    }

    fn parser(input: &str) -> IResult<&str, Vec<(usize, GornAddress)>> {
        terminated(separated_list1(space1, pair), space0)(input)
    }

    all_consuming(parser)(header_payload(header))
        .map(|(_, pairs)| pairs)
        .unwrap_or_default()
}

/// Parse Format 2 (`start-end|addr+addr` groups). Empty on any mismatch.
pub fn parse_format2(header: &str) -> Vec<SpanAlignment> {
    fn group(input: &str) -> IResult<&str, SpanAlignment> {
        let (input, start) = number(input)?;
        let (input, _) = pchar('-')(input)?;
        let (input, end) = number(input)?;
        let (input, _) = tag("|")(input)?;
        let (input, addresses) = separated_list1(pchar('+'), gorn_address)(input)?;
        Ok((
            input,
            SpanAlignment {
                span: start..end,
                addresses,
            },
        ))
    }

    fn parser(input: &str) -> IResult<&str, Vec<SpanAlignment>> {
        terminated(separated_list1(space1, group), space0)(input)
    }

    all_consuming(parser)(header_payload(header))
        .map(|(_, groups)| groups)
        .unwrap_or_default()
}

/// Spread the addresses of a Format 2 group over its tokens.
///
/// With `n` addresses over `w` tokens and `n > w`, the first `n - w`
/// addresses govern the whole span and the last `w` go one per token.
/// Otherwise every address is attached to every token.
pub fn distribute_span(group: &SpanAlignment) -> Vec<(usize, GornAddress)> {
    let width = group.span.len();
    let n = group.addresses.len();
    let mut out = Vec::new();
    if width > 0 && n > width {
        let (governing, per_token) = group.addresses.split_at(n - width);
        for (offset, token) in group.span.clone().enumerate() {
            for address in governing {
                out.push((token, address.clone()));
            }
            out.push((token, per_token[offset].clone()));
        }
    } else {
        for token in group.span.clone() {
            for address in &group.addresses {
                out.push((token, address.clone()));
            }
        }
    }
    out
}

// ============================================================================
// Address walk
// ============================================================================

/// Walks Gorn addresses over the syntactic children recorded during parsing.
pub struct GornWalker<'a> {
    built: &'a BuiltGraph,
    position: AHashMap<VertexId, usize>,
}

impl<'a> GornWalker<'a> {
    pub fn new(built: &'a BuiltGraph) -> Self {
        let mut position = AHashMap::new();
        for (i, &vertex) in built.visit_order.iter().enumerate() {
            position.entry(vertex).or_insert(i);
        }
        Self { built, position }
    }

    /// Tree children of `vertex` in pre-order; `:instance` and re-entrant
    /// edges are not part of the tree.
    fn tree_children(&self, vertex: VertexId) -> Vec<VertexId> {
        let graph = &self.built.graph;
        let mut children: Vec<VertexId> = self
            .built
            .children
            .get(&vertex)
            .map(|children| {
                children
                    .iter()
                    .filter(|child| !child.reentrant)
                    .filter(|child| graph.edge(child.edge).is_some_and(|e| e.role != INSTANCE_ROLE))
                    .map(|child| child.vertex)
                    .collect()
            })
            .unwrap_or_default();
        children.sort_by_key(|child| self.position.get(child).copied().unwrap_or(usize::MAX));
        children
    }

    pub fn resolve(&self, address: &GornAddress) -> Option<VertexId> {
        let mut current = self.built.graph.root()?;
        for &step in address.steps() {
            current = *self.tree_children(current).get(step)?;
        }
        Some(current)
    }
}

// ============================================================================
// Resolution
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAlignments {
    pub alignments: Alignments,
    pub source: AlignmentSource,
    /// Header entries whose address could not be walked.
    pub dropped: usize,
}

/// Build the vertex -> token map for one sentence.
pub fn resolve_alignments(source_id: &str, built: &BuiltGraph, header: Option<&str>) -> ResolvedAlignments {
    if !built.alignments.is_empty() || !built.relation_alignments.is_empty() {
        return ResolvedAlignments {
            alignments: built.alignments.clone(),
            source: AlignmentSource::Inline,
            dropped: 0,
        };
    }

    let Some(header) = header else {
        return ResolvedAlignments {
            alignments: Alignments::new(),
            source: AlignmentSource::None,
            dropped: 0,
        };
    };

    let (pairs, source) = {
        let format1 = parse_format1(header);
        if !format1.is_empty() {
            (format1, AlignmentSource::Format1)
        } else {
            let format2: Vec<_> = parse_format2(header).iter().flat_map(distribute_span).collect();
            if format2.is_empty() {
                (format2, AlignmentSource::None)
            } else {
                (format2, AlignmentSource::Format2)
            }
        }
    };

    let walker = GornWalker::new(built);
    let mut alignments = Alignments::new();
    let mut dropped = 0;
    for (token, address) in pairs {
        match walker.resolve(&address) {
            Some(vertex) => {
                alignments.entry(vertex).or_default().insert(token);
            }
            None => {
                tracing::warn!(
                    source = %source_id,
                    address = %address,
                    token,
                    "dropping alignment with unresolvable address"
                );
                dropped += 1;
            }
        }
    }

    ResolvedAlignments {
        alignments,
        source,
        dropped,
    }
}

// ============================================================================
// Spans
// ============================================================================

/// The head vertex of a token span.
///
/// Covered vertices are those aligned to a token inside `span`. The head is
/// the single source of the covered vertices' induced subgraph (ignoring
/// `:instance`), it must reach every other covered vertex, and the covered
/// alignments must hit every token of the span.
pub fn head_vertex(graph: &SemanticGraph, alignments: &Alignments, span: Range<usize>) -> Option<VertexId> {
    if span.is_empty() {
        return None;
    }

    let mut covered = BTreeSet::new();
    let mut hit = BTreeSet::new();
    for (&vertex, tokens) in alignments {
        if !graph.is_live(vertex) {
            continue;
        }
        let inside: Vec<usize> = tokens.iter().copied().filter(|t| span.contains(t)).collect();
        if !inside.is_empty() {
            covered.insert(vertex);
            hit.extend(inside);
        }
    }
    if hit.len() != span.len() {
        return None;
    }

    let has_covered_parent = |vertex: VertexId| {
        graph
            .incoming(vertex)
            .iter()
            .any(|(_, e)| e.role != INSTANCE_ROLE && e.source != vertex && covered.contains(&e.source))
    };
    let sources: Vec<VertexId> = covered.iter().copied().filter(|&v| !has_covered_parent(v)).collect();
    let [head] = sources.as_slice() else {
        return None;
    };

    let reachable: BTreeSet<VertexId> = graph
        .descendants_where(*head, |e| e.role == INSTANCE_ROLE || !covered.contains(&e.target))
        .into_iter()
        .collect();
    covered
        .iter()
        .all(|v| v == head || reachable.contains(v))
        .then_some(*head)
}
