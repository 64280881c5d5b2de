//! Retrieval coordination: merge keyword and semantic search into one
//! ranked, de-duplicated context set.
//!
//! Keyword results are authoritative and rank first (priority desc,
//! created_at desc, as ordered by the store); vector hits whose id is not
//! already present are appended by descending similarity. The two score
//! scales are never normalized against each other — rank position, not
//! score magnitude, is the contract downstream consumers read.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use mentor_core::types::{Hint, KnowledgeEntry, MatchKind, RetrievalHit};
use mentor_storage::KnowledgeRepository;
use mentor_vector::index::SearchHit;
use mentor_vector::SemanticIndex;

/// Merges the keyword and vector retrieval paths.
///
/// Either path failing (or timing out) degrades to zero results from that
/// path; retrieval itself never fails.
pub struct RetrievalCoordinator {
    store: Arc<KnowledgeRepository>,
    semantic: Arc<SemanticIndex>,
    max_context_entries: usize,
    vector_top_k: usize,
    call_timeout: Duration,
}

impl RetrievalCoordinator {
    pub fn new(
        store: Arc<KnowledgeRepository>,
        semantic: Arc<SemanticIndex>,
        max_context_entries: usize,
        vector_top_k: usize,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            semantic,
            max_context_entries,
            vector_top_k,
            call_timeout,
        }
    }

    /// Produce the ranked context set for a query and optional hint.
    ///
    /// An empty (after trimming) query returns an empty context immediately,
    /// with no adapter calls.
    pub async fn retrieve(&self, query: &str, hint: &Hint) -> Vec<RetrievalHit> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        // The two paths are independent; run them concurrently.
        let (keyword, vector) = tokio::join!(
            self.keyword_path(query, hint),
            self.vector_path(query, hint)
        );

        self.merge(keyword, vector)
    }

    /// Keyword search against the relational store. Failure means no
    /// results from this path, never a failed turn.
    async fn keyword_path(&self, query: &str, hint: &Hint) -> Vec<KnowledgeEntry> {
        let result = timeout(self.call_timeout, async {
            self.store.search(query, hint, self.max_context_entries)
        })
        .await;

        match result {
            Ok(Ok(entries)) => entries,
            Ok(Err(e)) => {
                warn!(error = %e, "Keyword search failed; continuing without it");
                Vec::new()
            }
            Err(_) => {
                warn!("Keyword search timed out; continuing without it");
                Vec::new()
            }
        }
    }

    /// Semantic search against the vector index. Failure means no results
    /// from this path.
    async fn vector_path(&self, query: &str, hint: &Hint) -> Vec<SearchHit> {
        let result = timeout(
            self.call_timeout,
            self.semantic.query(query, self.vector_top_k, hint),
        )
        .await;

        match result {
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) => {
                warn!(error = %e, "Vector search failed; continuing without it");
                Vec::new()
            }
            Err(_) => {
                warn!("Vector search timed out; continuing without it");
                Vec::new()
            }
        }
    }

    /// Merge per the keyword-first contract and truncate.
    fn merge(&self, keyword: Vec<KnowledgeEntry>, vector: Vec<SearchHit>) -> Vec<RetrievalHit> {
        let mut seen: Vec<uuid::Uuid> = keyword.iter().map(|e| e.id).collect();

        let mut hits: Vec<RetrievalHit> = keyword
            .into_iter()
            .map(|entry| RetrievalHit {
                score: entry.priority as f64,
                match_kind: MatchKind::Keyword,
                entry,
            })
            .collect();

        // Vector hits arrive sorted by descending similarity. Each novel id
        // is resolved back to its authoritative relational row; hits the
        // store cannot resolve are dropped.
        for hit in vector {
            if hits.len() >= self.max_context_entries {
                break;
            }
            if seen.contains(&hit.id) {
                continue;
            }
            match self.store.find_by_id(hit.id) {
                Ok(Some(entry)) => {
                    seen.push(hit.id);
                    hits.push(RetrievalHit {
                        entry,
                        score: hit.score,
                        match_kind: MatchKind::Vector,
                    });
                }
                Ok(None) => {
                    debug!(id = %hit.id, "Vector hit has no relational row; dropped");
                }
                Err(e) => {
                    warn!(id = %hit.id, error = %e, "Failed to resolve vector hit; dropped");
                }
            }
        }

        hits.truncate(self.max_context_entries);
        hits
    }
}
