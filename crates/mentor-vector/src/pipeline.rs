//! Knowledge indexing pipeline.
//!
//! Pairs every knowledge-base mutation across the relational store and the
//! vector index: the store write happens first (it is authoritative), the
//! vector write follows. `reindex_all` rebuilds the whole vector projection
//! from the relational rows.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use mentor_core::error::MentorError;
use mentor_core::types::{Hint, KnowledgeDraft, KnowledgeEntry};
use mentor_storage::KnowledgeRepository;

use crate::semantic::SemanticIndex;

/// Coordinates knowledge writes across both stores.
pub struct KnowledgePipeline {
    store: Arc<KnowledgeRepository>,
    semantic: Arc<SemanticIndex>,
}

impl KnowledgePipeline {
    pub fn new(store: Arc<KnowledgeRepository>, semantic: Arc<SemanticIndex>) -> Self {
        Self { store, semantic }
    }

    /// Create an entry in the relational store, then index its vector.
    pub async fn add(&self, draft: &KnowledgeDraft) -> Result<KnowledgeEntry, MentorError> {
        let entry = self.store.add(draft)?;
        self.semantic
            .upsert(entry.id, &entry.search_text(), vector_metadata(&entry))
            .await?;
        info!(id = %entry.id, title = %entry.title, "Knowledge entry added");
        Ok(entry)
    }

    /// Update an entry in the relational store, then re-index its vector.
    ///
    /// Returns `None` when no entry with the given ID exists.
    pub async fn update(
        &self,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> Result<Option<KnowledgeEntry>, MentorError> {
        let Some(entry) = self.store.update(id, draft)? else {
            return Ok(None);
        };
        self.semantic
            .update(entry.id, &entry.search_text(), vector_metadata(&entry))
            .await?;
        info!(id = %entry.id, "Knowledge entry updated");
        Ok(Some(entry))
    }

    /// Delete an entry from both stores. Returns true if the relational
    /// row existed.
    pub async fn delete(&self, id: Uuid) -> Result<bool, MentorError> {
        let removed = self.store.delete(id)?;
        self.semantic.delete(id)?;
        if removed {
            info!(id = %id, "Knowledge entry deleted");
        }
        Ok(removed)
    }

    /// Rebuild the vector projection from every relational row.
    ///
    /// This is the one-time migration utility; it is also safe to re-run,
    /// since upserts replace prior vectors. Entries that fail to embed are
    /// skipped with a warning rather than aborting the sweep.
    pub async fn reindex_all(&self) -> Result<usize, MentorError> {
        let entries = self.store.list(&Hint::default())?;
        let total = entries.len();
        let mut indexed = 0usize;

        for entry in entries {
            match self
                .semantic
                .upsert(entry.id, &entry.search_text(), vector_metadata(&entry))
                .await
            {
                Ok(()) => indexed += 1,
                Err(e) => warn!(id = %entry.id, error = %e, "Reindex skipped entry"),
            }
        }

        info!(indexed, total, "Vector reindex complete");
        Ok(indexed)
    }
}

/// Metadata attached to an entry's vector, used for filtered queries and
/// for inspecting hits without a store round-trip.
fn vector_metadata(entry: &KnowledgeEntry) -> Value {
    serde_json::json!({
        "title": entry.title,
        "question": entry.question,
        "subject": entry.subject,
        "grade_level": entry.grade_level,
        "difficulty": entry.difficulty,
        "category": entry.category,
        "priority": entry.priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::MockEmbedding;
    use mentor_storage::Database;

    fn make_pipeline() -> (KnowledgePipeline, Arc<KnowledgeRepository>, Arc<SemanticIndex>) {
        let db = Arc::new(Database::in_memory().unwrap());
        let store = Arc::new(KnowledgeRepository::new(db));
        let semantic = Arc::new(SemanticIndex::for_embedder(Arc::new(MockEmbedding::new())));
        (
            KnowledgePipeline::new(Arc::clone(&store), Arc::clone(&semantic)),
            store,
            semantic,
        )
    }

    fn make_draft(title: &str) -> KnowledgeDraft {
        KnowledgeDraft {
            title: title.to_string(),
            question: "What is 2 + 2?".to_string(),
            answer_markdown: "2 + 2 = 4".to_string(),
            subject: Some("Mathematics".to_string()),
            grade_level: Some("Elementary".to_string()),
            ..KnowledgeDraft::default()
        }
    }

    #[tokio::test]
    async fn test_add_writes_both_stores() {
        let (pipeline, store, semantic) = make_pipeline();

        let entry = pipeline.add(&make_draft("Addition")).await.unwrap();

        assert!(store.find_by_id(entry.id).unwrap().is_some());
        assert_eq!(semantic.len(), 1);
    }

    #[tokio::test]
    async fn test_add_invalid_draft_touches_nothing() {
        let (pipeline, store, semantic) = make_pipeline();

        let draft = KnowledgeDraft {
            title: "No body".to_string(),
            ..KnowledgeDraft::default()
        };
        assert!(pipeline.add(&draft).await.is_err());
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(semantic.len(), 0);
    }

    #[tokio::test]
    async fn test_update_reindexes() {
        let (pipeline, _store, semantic) = make_pipeline();
        let entry = pipeline.add(&make_draft("Before")).await.unwrap();

        let mut draft = make_draft("After");
        draft.subject = Some("Science".to_string());
        let updated = pipeline.update(entry.id, &draft).await.unwrap().unwrap();
        assert_eq!(updated.title, "After");
        assert_eq!(semantic.len(), 1);

        // The vector metadata follows the update.
        let hint = Hint::new(None, Some("Science".to_string()));
        let hits = semantic.query("After", 5, &hint).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let (pipeline, _store, semantic) = make_pipeline();
        let result = pipeline
            .update(Uuid::new_v4(), &make_draft("Ghost"))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(semantic.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_from_both() {
        let (pipeline, store, semantic) = make_pipeline();
        let entry = pipeline.add(&make_draft("Doomed")).await.unwrap();

        assert!(pipeline.delete(entry.id).await.unwrap());
        assert!(store.find_by_id(entry.id).unwrap().is_none());
        assert_eq!(semantic.len(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_id() {
        let (pipeline, _store, _semantic) = make_pipeline();
        assert!(!pipeline.delete(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_reindex_all_rebuilds_projection() {
        let (pipeline, store, semantic) = make_pipeline();
        store.add(&make_draft("One")).unwrap();
        store.add(&make_draft("Two")).unwrap();
        store.add(&make_draft("Three")).unwrap();
        assert_eq!(semantic.len(), 0);

        let indexed = pipeline.reindex_all().await.unwrap();
        assert_eq!(indexed, 3);
        assert_eq!(semantic.len(), 3);
    }

    #[tokio::test]
    async fn test_reindex_all_is_rerunnable() {
        let (pipeline, _store, semantic) = make_pipeline();
        pipeline.add(&make_draft("One")).await.unwrap();

        pipeline.reindex_all().await.unwrap();
        pipeline.reindex_all().await.unwrap();
        assert_eq!(semantic.len(), 1);
    }
}
