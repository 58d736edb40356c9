//! Mentions, candidate meanings and the disambiguation rule.

use amrgraph_dsl::{AmrSentence, VertexId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Range;

/// A token span `[start, end)` of one sentence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Mention {
    pub sentence: String,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Mention {
    pub fn new(sentence: impl Into<String>, span: Range<usize>, text: impl Into<String>) -> Self {
        Self {
            sentence: sentence.into(),
            start: span.start,
            end: span.end,
            text: text.into(),
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_multiword(&self) -> bool {
        self.len() > 1
    }
}

/// A dictionary entry a mention may refer to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Meaning {
    /// Stable identifier of the entry (e.g. a knowledge-base id).
    pub reference: String,
    pub named_entity: bool,
}

impl Meaning {
    pub fn concept(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            named_entity: false,
        }
    }

    pub fn entity(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            named_entity: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub mention: Mention,
    pub meaning: Meaning,
    pub weight: f64,
}

/// Source of candidate meanings for a mention.
pub trait CandidateLookup: Sync {
    fn candidates(&self, mention: &Mention) -> Vec<(Meaning, f64)>;
}

impl<F> CandidateLookup for F
where
    F: Fn(&Mention) -> Vec<(Meaning, f64)> + Sync,
{
    fn candidates(&self, mention: &Mention) -> Vec<(Meaning, f64)> {
        self(mention)
    }
}

/// Lookup that never proposes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCandidates;

impl CandidateLookup for NoCandidates {
    fn candidates(&self, _mention: &Mention) -> Vec<(Meaning, f64)> {
        Vec::new()
    }
}

// ============================================================================
// Mention collection
// ============================================================================

/// Every span of up to `max_tokens` tokens that has a head vertex, paired
/// with that head. Spans are enumerated by start, then by length.
pub fn collect_mentions(sentence: &AmrSentence, max_tokens: usize) -> Vec<(VertexId, Mention)> {
    let n = sentence.tokens.len();
    let mut mentions = Vec::new();
    for start in 0..n {
        for end in (start + 1)..=(start + max_tokens).min(n) {
            let Some(head) = sentence.head_vertex(start..end) else {
                continue;
            };
            let Some(text) = sentence.surface(start..end) else {
                continue;
            };
            mentions.push((head, Mention::new(sentence.id.as_str(), start..end, text)));
        }
    }
    mentions
}

// ============================================================================
// Disambiguation
// ============================================================================

pub fn mean_weight(candidates: &[Candidate]) -> Option<f64> {
    if candidates.is_empty() {
        return None;
    }
    Some(candidates.iter().map(|c| c.weight).sum::<f64>() / candidates.len() as f64)
}

/// Higher weight first, then smaller meaning reference, then earlier mention.
fn rank(candidates: &[Candidate], a: usize, b: usize) -> Ordering {
    let (x, y) = (&candidates[a], &candidates[b]);
    y.weight
        .total_cmp(&x.weight)
        .then_with(|| x.meaning.reference.cmp(&y.meaning.reference))
        .then_with(|| a.cmp(&b))
}

fn best_of(candidates: &[Candidate], indices: impl Iterator<Item = usize>) -> Option<usize> {
    indices.min_by(|&a, &b| rank(candidates, a, b))
}

/// Pick the best candidate, preferring a multiword candidate whose weight
/// is at least `threshold`.
pub fn pick_candidate_with_threshold(candidates: &[Candidate], threshold: f64) -> Option<&Candidate> {
    let multiword = best_of(
        candidates,
        (0..candidates.len()).filter(|&i| {
            candidates[i].mention.is_multiword() && candidates[i].weight >= threshold
        }),
    );
    multiword
        .or_else(|| best_of(candidates, 0..candidates.len()))
        .map(|i| &candidates[i])
}

/// Pick the best candidate using the mean weight as the multiword threshold.
pub fn pick_candidate(candidates: &[Candidate]) -> Option<&Candidate> {
    let mean = mean_weight(candidates)?;
    pick_candidate_with_threshold(candidates, mean)
}
