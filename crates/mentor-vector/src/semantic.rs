//! The semantic index adapter: embed, upsert, query, delete.
//!
//! Composes an embedding service with the vector index and enforces the
//! dimensionality contract: an embedding that does not match the configured
//! dimension is rejected before it reaches the index.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use mentor_core::error::MentorError;
use mentor_core::types::Hint;

use crate::embedding::EmbeddingService;
use crate::index::{SearchHit, VectorIndex};

/// How much entry text is kept in vector metadata for reference.
const METADATA_CONTENT_LIMIT: usize = 1000;

/// Semantic search over knowledge entries.
///
/// `update` is defined as `delete` then `upsert`; if the upsert half fails
/// after a successful delete, the entry is transiently unsearchable by
/// vector but still present in the relational store. That asymmetry is the
/// accepted cost of the two-store design.
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingService>,
    index: VectorIndex,
    dimensions: usize,
}

impl SemanticIndex {
    /// Create an adapter around the given embedder, with the index
    /// configured for `dimensions`-sized vectors.
    pub fn new(embedder: Arc<dyn EmbeddingService>, dimensions: usize) -> Self {
        Self {
            embedder,
            index: VectorIndex::new(),
            dimensions,
        }
    }

    /// Create an adapter whose index dimension follows the embedder.
    pub fn for_embedder(embedder: Arc<dyn EmbeddingService>) -> Self {
        let dimensions = embedder.dimensions();
        Self::new(embedder, dimensions)
    }

    /// Embed `text` and store it under `id`, replacing any prior vector.
    ///
    /// A truncated copy of the text is kept in the metadata for reference.
    pub async fn upsert(&self, id: Uuid, text: &str, metadata: Value) -> Result<(), MentorError> {
        let embedding = self.embedder.embed(text).await?;
        if embedding.len() != self.dimensions {
            return Err(MentorError::DimensionMismatch {
                expected: self.dimensions,
                actual: embedding.len(),
            });
        }

        let mut metadata = metadata;
        if let Value::Object(ref mut map) = metadata {
            let snippet: String = text.chars().take(METADATA_CONTENT_LIMIT).collect();
            map.insert("content".to_string(), Value::String(snippet));
        }

        self.index.insert(id, embedding, metadata)?;
        debug!(id = %id, "Vector upserted");
        Ok(())
    }

    /// Query the index with a text probe, optionally filtered by the
    /// grade/subject hint. Returns hits by descending cosine similarity.
    pub async fn query(
        &self,
        text: &str,
        top_k: usize,
        hint: &Hint,
    ) -> Result<Vec<SearchHit>, MentorError> {
        let probe = self.embedder.embed(text).await?;
        self.index.search(&probe, top_k, |metadata| hint_matches(hint, metadata))
    }

    /// Remove an entry's vector. Idempotent.
    pub fn delete(&self, id: Uuid) -> Result<(), MentorError> {
        self.index.delete(id)
    }

    /// Replace an entry's vector and metadata: delete then upsert.
    pub async fn update(&self, id: Uuid, text: &str, metadata: Value) -> Result<(), MentorError> {
        self.delete(id)?;
        self.upsert(id, text, metadata).await
    }

    /// Number of vectors currently indexed.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// True if no vectors are indexed.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Equality filter over vector metadata for the optional retrieval hint.
fn hint_matches(hint: &Hint, metadata: &Value) -> bool {
    if let Some(ref grade) = hint.grade_level {
        if metadata["grade_level"] != Value::String(grade.clone()) {
            return false;
        }
    }
    if let Some(ref subject) = hint.subject {
        if metadata["subject"] != Value::String(subject.clone()) {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{FailingEmbedding, MockEmbedding};

    fn make_index() -> SemanticIndex {
        SemanticIndex::for_embedder(Arc::new(MockEmbedding::new()))
    }

    fn math_metadata() -> Value {
        serde_json::json!({
            "subject": "Mathematics",
            "grade_level": "Elementary",
        })
    }

    #[tokio::test]
    async fn test_upsert_and_query() {
        let index = make_index();
        let id = Uuid::new_v4();
        index
            .upsert(id, "What is 2 + 2? 2 + 2 = 4", math_metadata())
            .await
            .unwrap();

        let hits = index
            .query("What is 2 + 2?", 5, &Hint::default())
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, id);
    }

    #[tokio::test]
    async fn test_query_hint_filters() {
        let index = make_index();
        let math = Uuid::new_v4();
        let science = Uuid::new_v4();
        index.upsert(math, "adding numbers", math_metadata()).await.unwrap();
        index
            .upsert(
                science,
                "photosynthesis",
                serde_json::json!({"subject": "Science", "grade_level": "Elementary"}),
            )
            .await
            .unwrap();

        let hint = Hint::new(None, Some("Mathematics".to_string()));
        let hits = index.query("numbers", 5, &hint).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, math);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_stops_write() {
        // Index configured for 1536 dimensions; the mock produces 384.
        let index = SemanticIndex::new(Arc::new(MockEmbedding::new()), 1536);
        let result = index.upsert(Uuid::new_v4(), "text", math_metadata()).await;
        assert!(matches!(
            result,
            Err(MentorError::DimensionMismatch {
                expected: 1536,
                actual: 384
            })
        ));
        // The write never reached the index.
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_update_is_idempotent() {
        let index = make_index();
        let id = Uuid::new_v4();

        index.update(id, "fractions", math_metadata()).await.unwrap();
        let first = index.query("fractions", 3, &Hint::default()).await.unwrap();

        index.update(id, "fractions", math_metadata()).await.unwrap();
        let second = index.query("fractions", 3, &Hint::default()).await.unwrap();

        // Identical queryable state: same ids and scores, no duplicates.
        assert_eq!(index.len(), 1);
        assert_eq!(first.len(), second.len());
        assert_eq!(first[0].id, second[0].id);
        assert_eq!(first[0].score, second[0].score);
    }

    #[tokio::test]
    async fn test_update_replaces_content() {
        let index = make_index();
        let id = Uuid::new_v4();
        index.upsert(id, "old text", math_metadata()).await.unwrap();
        index
            .update(id, "new text", serde_json::json!({"subject": "Science"}))
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.query("new text", 1, &Hint::default()).await.unwrap();
        assert_eq!(hits[0].metadata["subject"], "Science");
    }

    #[tokio::test]
    async fn test_delete_idempotent() {
        let index = make_index();
        let id = Uuid::new_v4();
        index.upsert(id, "to delete", math_metadata()).await.unwrap();

        index.delete(id).unwrap();
        index.delete(id).unwrap();
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_metadata_keeps_truncated_content() {
        let index = make_index();
        let id = Uuid::new_v4();
        let long_text = "x".repeat(2000);
        index.upsert(id, &long_text, math_metadata()).await.unwrap();

        let hits = index.query(&long_text, 1, &Hint::default()).await.unwrap();
        let content = hits[0].metadata["content"].as_str().unwrap();
        assert_eq!(content.len(), METADATA_CONTENT_LIMIT);
    }

    #[tokio::test]
    async fn test_embedding_failure_surfaces_index_unavailable() {
        let index = SemanticIndex::for_embedder(Arc::new(FailingEmbedding));
        let result = index.query("anything", 5, &Hint::default()).await;
        assert!(matches!(result, Err(MentorError::IndexUnavailable(_))));
    }
}
