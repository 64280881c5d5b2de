//! In-memory vector index with brute-force cosine similarity search.
//!
//! This provides a simple but correct stand-in for an external vector
//! database. All operations are O(n) for search, which is acceptable for a
//! curated knowledge base of moderate size.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use uuid::Uuid;

use mentor_core::error::MentorError;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The ID of the matching vector entry.
    pub id: Uuid,
    /// Cosine similarity score (higher is closer).
    pub score: f64,
    /// Metadata associated with the entry.
    pub metadata: Value,
}

/// An entry stored in the vector index.
#[derive(Debug, Clone)]
struct VectorEntry {
    embedding: Vec<f32>,
    metadata: Value,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<Uuid, VectorEntry>>>,
}

impl VectorIndex {
    /// Create a new empty vector index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a vector with associated metadata into the index.
    ///
    /// Overwrites any existing entry with the same ID.
    pub fn insert(&self, id: Uuid, embedding: Vec<f32>, metadata: Value) -> Result<(), MentorError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| MentorError::IndexUnavailable(format!("Lock poisoned: {}", e)))?;
        entries.insert(id, VectorEntry { embedding, metadata });
        Ok(())
    }

    /// Search for the k nearest neighbors to the query vector by cosine
    /// similarity, considering only entries whose metadata passes `filter`.
    ///
    /// Returns results sorted by descending similarity score.
    pub fn search<F>(&self, query: &[f32], k: usize, filter: F) -> Result<Vec<SearchHit>, MentorError>
    where
        F: Fn(&Value) -> bool,
    {
        let entries = self
            .entries
            .read()
            .map_err(|e| MentorError::IndexUnavailable(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .filter(|(_, entry)| filter(&entry.metadata))
            .map(|(id, entry)| SearchHit {
                id: *id,
                score: cosine_similarity(query, &entry.embedding),
                metadata: entry.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored)
    }

    /// Delete an entry from the index by ID.
    ///
    /// Returns Ok(()) regardless of whether the entry existed.
    pub fn delete(&self, id: Uuid) -> Result<(), MentorError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| MentorError::IndexUnavailable(format!("Lock poisoned: {}", e)))?;
        entries.remove(&id);
        Ok(())
    }

    /// Return the number of vectors currently stored in the index.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Return true if the index contains no vectors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if the lengths differ or either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
