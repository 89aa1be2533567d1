//! Immutable weighted inverted index over tool descriptors.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use serde::Serialize;
use toolbelt_primitives::{Descriptor, ToolId};

use crate::config::{Bm25Params, RankerConfig};
use crate::distance::bounded_levenshtein;
use crate::tokenize::tokenize;

/// Descriptor fields that contribute to ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Curated keywords.
    Keywords,
    /// Classification tags.
    Tags,
    /// Free-text description.
    Description,
    /// Example requests.
    Examples,
}

impl Field {
    /// Every indexed field, in weight order.
    pub const ALL: [Self; 4] = [Self::Keywords, Self::Tags, Self::Description, Self::Examples];

    const fn slot(self) -> usize {
        self as usize
    }

    fn texts(self, descriptor: &Descriptor) -> Vec<&str> {
        match self {
            Self::Keywords => descriptor.keywords().iter().map(String::as_str).collect(),
            Self::Tags => descriptor.tags().iter().map(String::as_str).collect(),
            Self::Description => vec![descriptor.description()],
            Self::Examples => descriptor.examples().iter().map(String::as_str).collect(),
        }
    }
}

/// How a query token matched an indexed term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// Token equals the term.
    Exact,
    /// Token is a strict prefix of the term.
    Prefix,
    /// Token is within the fuzzy edit-distance budget of the term.
    Fuzzy,
}

/// A ranked tool together with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTool {
    /// Identifier of the ranked tool.
    pub id: ToolId,
    /// Accumulated relevance score; always positive.
    pub score: f64,
}

#[derive(Debug, Clone, Copy)]
struct Posting {
    doc: usize,
    field: Field,
    tf: u32,
}

#[derive(Debug, Default)]
struct TermEntry {
    doc_freq: usize,
    postings: Vec<Posting>,
}

/// Read-only index built from a catalog snapshot.
///
/// An index is never mutated after construction; callers rebuild a new one
/// and swap it in.
#[derive(Debug)]
pub struct ToolIndex {
    revision: u64,
    docs: Vec<ToolId>,
    field_lengths: Vec<[u32; 4]>,
    avg_field_lengths: [f64; 4],
    vocabulary: BTreeMap<String, TermEntry>,
    config: RankerConfig,
}

impl ToolIndex {
    /// Builds an index over `descriptors`.
    ///
    /// Iteration order defines document order, which breaks score ties.
    /// `revision` records the catalog revision the snapshot was taken at.
    #[must_use]
    pub fn build<'a, I>(revision: u64, descriptors: I, config: RankerConfig) -> Self
    where
        I: IntoIterator<Item = &'a Descriptor>,
    {
        let mut docs = Vec::new();
        let mut field_lengths = Vec::new();
        let mut vocabulary: BTreeMap<String, TermEntry> = BTreeMap::new();
        let mut totals = [0_u64; 4];

        for descriptor in descriptors {
            let doc = docs.len();
            docs.push(descriptor.id().clone());
            let mut lengths = [0_u32; 4];

            for field in Field::ALL {
                let mut counts: BTreeMap<String, u32> = BTreeMap::new();
                let mut length = 0_u32;
                for text in field.texts(descriptor) {
                    for token in tokenize(text) {
                        length = length.saturating_add(1);
                        *counts.entry(token).or_default() += 1;
                    }
                }

                lengths[field.slot()] = length;
                totals[field.slot()] += u64::from(length);

                for (term, tf) in counts {
                    let entry = vocabulary.entry(term).or_default();
                    if entry.postings.last().is_none_or(|p| p.doc != doc) {
                        entry.doc_freq += 1;
                    }
                    entry.postings.push(Posting { doc, field, tf });
                }
            }

            field_lengths.push(lengths);
        }

        let mut avg_field_lengths = [0.0; 4];
        if !docs.is_empty() {
            #[allow(clippy::cast_precision_loss)]
            let count = docs.len() as f64;
            for (avg, total) in avg_field_lengths.iter_mut().zip(totals) {
                #[allow(clippy::cast_precision_loss)]
                let total = total as f64;
                *avg = total / count;
            }
        }

        Self {
            revision,
            docs,
            field_lengths,
            avg_field_lengths,
            vocabulary,
            config,
        }
    }

    /// Catalog revision this index was built from.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of indexed descriptors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    /// Returns `true` when no descriptors are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Number of distinct indexed terms.
    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Returns `true` if the identifier is part of this index.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.docs.iter().any(|doc| doc.as_str() == id)
    }

    /// Configuration the index scores with.
    #[must_use]
    pub const fn config(&self) -> &RankerConfig {
        &self.config
    }

    /// Scores `text` against the index and returns at most `limit` tools by
    /// descending score. Ties keep document order. Descriptors that match
    /// nothing are omitted.
    #[must_use]
    pub fn search(&self, text: &str, limit: usize) -> Vec<ScoredTool> {
        if limit == 0 || self.docs.is_empty() {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let mut tokens = tokenize(text);
        tokens.retain(|token| seen.insert(token.clone()));

        let mut scores = vec![0.0_f64; self.docs.len()];
        for token in &tokens {
            for (entry, kind) in self.matches(token) {
                let idf = self.idf(entry.doc_freq);
                let credit = self.config.credits.credit(kind);
                for posting in &entry.postings {
                    let weight = self.config.weights.weight(posting.field);
                    scores[posting.doc] += idf * self.saturated_tf(posting) * weight * credit;
                }
            }
        }

        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .enumerate()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);

        ranked
            .into_iter()
            .map(|(doc, score)| ScoredTool {
                id: self.docs[doc].clone(),
                score,
            })
            .collect()
    }

    /// Every vocabulary term matched by `token`, each with its best match kind.
    fn matches(&self, token: &str) -> Vec<(&TermEntry, MatchKind)> {
        let mut found = Vec::new();

        if let Some(entry) = self.vocabulary.get(token) {
            found.push((entry, MatchKind::Exact));
        }

        let extensions = self
            .vocabulary
            .range::<str, _>((Bound::Excluded(token), Bound::Unbounded))
            .take_while(|(term, _)| term.starts_with(token));
        for (_, entry) in extensions {
            found.push((entry, MatchKind::Prefix));
        }

        let budget = self.config.fuzzy_budget(token.chars().count());
        if budget > 0 {
            for (term, entry) in &self.vocabulary {
                if term.starts_with(token) {
                    continue;
                }
                if bounded_levenshtein(token, term, budget).is_some() {
                    found.push((entry, MatchKind::Fuzzy));
                }
            }
        }

        found
    }

    fn idf(&self, doc_freq: usize) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let (n, df) = (self.docs.len() as f64, doc_freq as f64);
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    fn saturated_tf(&self, posting: &Posting) -> f64 {
        let slot = posting.field.slot();
        let tf = f64::from(posting.tf);
        let avg = self.avg_field_lengths[slot];
        let norm = if avg > 0.0 {
            f64::from(self.field_lengths[posting.doc][slot]) / avg
        } else {
            1.0
        };
        let Bm25Params { k1, b } = self.config.bm25;
        tf * (k1 + 1.0) / (tf + k1 * (1.0 - b + b * norm))
    }
}
