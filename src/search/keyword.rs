//! Keyword retrieval with field-boosted BM25 ranking.

use crate::catalog::ToolMetadata;
use crate::search::normalize::{sort_descending, ScoredId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// BM25 parameters
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation (default: 1.2)
    pub k1: f64,
    /// Document length normalization (default: 0.75)
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

/// Searchable fields of a tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    /// Tool name
    Name,
    /// Tool description
    Description,
    /// Joined keywords
    Keywords,
    /// Joined categories
    Categories,
}

impl SearchField {
    /// All fields in storage order
    pub const ALL: [SearchField; 4] = [
        SearchField::Name,
        SearchField::Description,
        SearchField::Keywords,
        SearchField::Categories,
    ];

    fn slot(self) -> usize {
        match self {
            SearchField::Name => 0,
            SearchField::Description => 1,
            SearchField::Keywords => 2,
            SearchField::Categories => 3,
        }
    }
}

/// Per-field score multipliers applied during keyword scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBoosts {
    /// Multiplier for name matches
    #[serde(default = "default_name_boost")]
    pub name: f64,
    /// Multiplier for description matches
    #[serde(default = "default_unit_boost")]
    pub description: f64,
    /// Multiplier for keyword matches
    #[serde(default = "default_keywords_boost")]
    pub keywords: f64,
    /// Multiplier for category matches
    #[serde(default = "default_unit_boost")]
    pub categories: f64,
}

fn default_name_boost() -> f64 {
    3.0
}

fn default_keywords_boost() -> f64 {
    2.0
}

fn default_unit_boost() -> f64 {
    1.0
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            name: default_name_boost(),
            description: default_unit_boost(),
            keywords: default_keywords_boost(),
            categories: default_unit_boost(),
        }
    }
}

impl FieldBoosts {
    /// Boost for one field
    pub fn for_field(&self, field: SearchField) -> f64 {
        match field {
            SearchField::Name => self.name,
            SearchField::Description => self.description,
            SearchField::Keywords => self.keywords,
            SearchField::Categories => self.categories,
        }
    }
}

/// Flattened text fields of one tool
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordDocument {
    /// Tool id
    pub id: String,
    /// Tool name
    pub name: String,
    /// Tool description
    pub description: String,
    /// Keywords joined by spaces
    pub keywords: String,
    /// Categories joined by spaces
    pub categories: String,
}

impl KeywordDocument {
    /// Flattens a tool's metadata into searchable text
    pub fn from_metadata(metadata: &ToolMetadata) -> Self {
        Self {
            id: metadata.id.clone(),
            name: metadata.name.clone(),
            description: metadata.description.clone(),
            keywords: metadata.keywords.join(" "),
            categories: metadata.categories.join(" "),
        }
    }

    fn text(&self, field: SearchField) -> &str {
        match field {
            SearchField::Name => &self.name,
            SearchField::Description => &self.description,
            SearchField::Keywords => &self.keywords,
            SearchField::Categories => &self.categories,
        }
    }
}

/// A keyword retrieval structure rebuilt on every index
pub trait KeywordIndex: Send + Sync {
    /// Replaces the indexed documents
    fn build(&mut self, documents: Vec<KeywordDocument>, boosts: FieldBoosts);

    /// Returns up to `limit` documents with positive raw scores, best first
    fn search(&self, query: &str, limit: usize) -> Vec<ScoredId>;

    /// Number of indexed documents
    fn len(&self) -> usize;

    /// Returns true if nothing is indexed
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default)]
struct FieldTerms {
    term_freq: HashMap<String, usize>,
    len: usize,
}

#[derive(Debug, Clone)]
struct IndexedDocument {
    id: String,
    fields: [FieldTerms; 4],
}

/// In-memory BM25 index scoring each field separately and summing the
/// boosted field scores
#[derive(Debug, Clone, Default)]
pub struct Bm25Index {
    params: Bm25Params,
    boosts: FieldBoosts,
    documents: Vec<IndexedDocument>,
    /// Inverted index: term -> document indices
    postings: HashMap<String, Vec<usize>>,
    /// Per-field document frequency of each term
    doc_freq: [HashMap<String, usize>; 4],
    /// Per-field average length in tokens
    avg_len: [f64; 4],
}

impl Bm25Index {
    /// Creates an empty index with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index with custom BM25 parameters
    pub fn with_params(params: Bm25Params) -> Self {
        Self {
            params,
            ..Self::default()
        }
    }

    fn idf(&self, slot: usize, term: &str) -> f64 {
        let n = self.documents.len() as f64;
        let df = self.doc_freq[slot].get(term).copied().unwrap_or(0) as f64;

        if df == 0.0 {
            0.0
        } else {
            ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
        }
    }

    fn bm25(&self, tf: f64, len: f64, avg_len: f64, idf: f64) -> f64 {
        let k1 = self.params.k1;
        let b = self.params.b;
        let avg_len = if avg_len > 0.0 { avg_len } else { 1.0 };

        let numerator = tf * (k1 + 1.0);
        let denominator = tf + k1 * (1.0 - b + b * len / avg_len);

        idf * numerator / denominator
    }
}

impl KeywordIndex for Bm25Index {
    fn build(&mut self, documents: Vec<KeywordDocument>, boosts: FieldBoosts) {
        self.boosts = boosts;
        self.documents.clear();
        self.postings.clear();
        self.doc_freq = Default::default();

        let mut total_len = [0usize; 4];

        for (doc_idx, document) in documents.iter().enumerate() {
            let mut fields: [FieldTerms; 4] = Default::default();
            let mut seen: HashSet<String> = HashSet::new();

            for field in SearchField::ALL {
                let slot = field.slot();
                let tokens = tokenize(document.text(field));
                total_len[slot] += tokens.len();
                fields[slot].len = tokens.len();

                for token in tokens {
                    *fields[slot].term_freq.entry(token.clone()).or_default() += 1;
                    if seen.insert(token.clone()) {
                        self.postings.entry(token).or_default().push(doc_idx);
                    }
                }
                for term in fields[slot].term_freq.keys() {
                    *self.doc_freq[slot].entry(term.clone()).or_default() += 1;
                }
            }

            self.documents.push(IndexedDocument {
                id: document.id.clone(),
                fields,
            });
        }

        let count = self.documents.len().max(1) as f64;
        for slot in 0..4 {
            self.avg_len[slot] = total_len[slot] as f64 / count;
        }
    }

    fn search(&self, query: &str, limit: usize) -> Vec<ScoredId> {
        let mut query_terms = tokenize(query);
        let mut unique = HashSet::new();
        query_terms.retain(|term| unique.insert(term.clone()));

        let mut scores: HashMap<usize, f64> = HashMap::new();
        for term in &query_terms {
            let Some(doc_indices) = self.postings.get(term) else {
                continue;
            };

            for &doc_idx in doc_indices {
                let document = &self.documents[doc_idx];
                let mut score = 0.0;
                for field in SearchField::ALL {
                    let slot = field.slot();
                    let terms = &document.fields[slot];
                    let tf = terms.term_freq.get(term).copied().unwrap_or(0) as f64;
                    if tf == 0.0 {
                        continue;
                    }
                    let idf = self.idf(slot, term);
                    score += self.boosts.for_field(field)
                        * self.bm25(tf, terms.len as f64, self.avg_len[slot], idf);
                }
                *scores.entry(doc_idx).or_default() += score;
            }
        }

        // Index order first, so equal scores rank deterministically
        let mut ranked: Vec<(usize, f64)> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .collect();
        ranked.sort_by_key(|(doc_idx, _)| *doc_idx);

        let mut results: Vec<ScoredId> = ranked
            .into_iter()
            .map(|(doc_idx, score)| ScoredId::new(self.documents[doc_idx].id.clone(), score))
            .collect();
        sort_descending(&mut results);
        results.truncate(limit);
        results
    }

    fn len(&self) -> usize {
        self.documents.len()
    }
}

/// Splits text into lowercase search terms.
///
/// Splits on non-alphanumerics and on camelCase / snake_case boundaries,
/// drops one-character tokens and common stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '_' {
            current.push(ch);
        } else if !current.is_empty() {
            tokens.extend(split_identifier(&current));
            current.clear();
        }
    }

    if !current.is_empty() {
        tokens.extend(split_identifier(&current));
    }

    tokens
        .into_iter()
        .map(|t| t.to_lowercase())
        .filter(|t| t.chars().count() >= 2)
        .filter(|t| !is_stop_word(t))
        .collect()
}

/// Split identifiers by camelCase, PascalCase, and snake_case
fn split_identifier(ident: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();

    let chars: Vec<char> = ident.chars().collect();

    for (i, &ch) in chars.iter().enumerate() {
        let prev_lower = i > 0 && chars[i - 1].is_lowercase();
        let next_lower = i + 1 < chars.len() && chars[i + 1].is_lowercase();

        if ch == '_' {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            continue;
        }

        if ch.is_uppercase() && (prev_lower || next_lower) && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }

        current.push(ch);
    }

    if !current.is_empty() {
        parts.push(current);
    }

    // Compound identifiers also match as a whole
    if parts.len() > 1 {
        parts.push(ident.replace('_', ""));
    }

    parts
}

fn is_stop_word(token: &str) -> bool {
    const STOP_WORDS: &[&str] = &[
        "the", "a", "an", "is", "are", "was", "were", "be", "been", "to", "of", "in", "for", "on",
        "with", "at", "by", "from", "and", "or", "it", "this", "that", "me", "my", "some", "any",
    ];
    STOP_WORDS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, name: &str, description: &str, keywords: &str) -> KeywordDocument {
        KeywordDocument {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            keywords: keywords.to_string(),
            categories: String::new(),
        }
    }

    #[test]
    fn test_tokenize_splits_identifiers() {
        let tokens = tokenize("getWeatherForecast send_email the");
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"weather".to_string()));
        assert!(tokens.contains(&"forecast".to_string()));
        assert!(tokens.contains(&"getweatherforecast".to_string()));
        assert!(tokens.contains(&"send".to_string()));
        assert!(tokens.contains(&"email".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
    }

    #[test]
    fn test_name_matches_outrank_description_matches() {
        let mut index = Bm25Index::new();
        index.build(
            vec![
                doc("a", "weather", "Get the forecast for a city", ""),
                doc("b", "calendar", "Shows weather-aware events", ""),
                doc("c", "calculator", "Evaluate arithmetic", "math"),
            ],
            FieldBoosts::default(),
        );

        let results = index.search("weather", 10);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_keywords_are_searchable_and_limit_applies() {
        let mut index = Bm25Index::new();
        index.build(
            vec![
                doc("calc", "calculator", "Evaluate expressions", "math arithmetic"),
                doc("stats", "statistics", "Mean and median", "math"),
                doc("mail", "email", "Send mail", "smtp"),
            ],
            FieldBoosts::default(),
        );

        let results = index.search("math", 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].id == "calc" || results[0].id == "stats");
        assert!(index.search("nothing matches", 5).is_empty());
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_rebuild_replaces_documents() {
        let mut index = Bm25Index::new();
        index.build(vec![doc("a", "alpha", "first", "")], FieldBoosts::default());
        index.build(vec![doc("b", "beta", "second", "")], FieldBoosts::default());

        assert_eq!(index.len(), 1);
        assert!(index.search("alpha", 5).is_empty());
        assert_eq!(index.search("beta", 5)[0].id, "b");
    }
}
