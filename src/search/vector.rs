//! Nearest-neighbor retrieval over tool embeddings.

use crate::search::embedding::cosine_similarity;
use crate::search::normalize::{similarity_to_unit, sort_descending, ScoredId};

/// A vector retrieval structure rebuilt on every index
pub trait VectorIndex: Send + Sync {
    /// Replaces the indexed vectors
    fn build(&mut self, entries: Vec<(String, Vec<f32>)>);

    /// Returns up to `limit` nearest ids with scores approximately in [0, 1]
    fn search(&self, query: &[f32], limit: usize) -> Vec<ScoredId>;

    /// Number of indexed vectors
    fn len(&self) -> usize;

    /// Returns true if nothing is indexed
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exhaustive cosine-similarity search.
///
/// Similarities are rescaled from [-1, 1] to [0, 1].
#[derive(Debug, Clone, Default)]
pub struct FlatVectorIndex {
    entries: Vec<(String, Vec<f32>)>,
}

impl FlatVectorIndex {
    /// Creates an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored vector for an id
    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|(entry_id, _)| entry_id == id)
            .map(|(_, vector)| vector.as_slice())
    }
}

impl VectorIndex for FlatVectorIndex {
    fn build(&mut self, entries: Vec<(String, Vec<f32>)>) {
        self.entries = entries;
    }

    fn search(&self, query: &[f32], limit: usize) -> Vec<ScoredId> {
        let mut results: Vec<ScoredId> = self
            .entries
            .iter()
            .map(|(id, vector)| {
                let similarity = cosine_similarity(query, vector) as f64;
                ScoredId::new(id.clone(), similarity_to_unit(similarity))
            })
            .collect();

        sort_descending(&mut results);
        results.truncate(limit);
        results
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
