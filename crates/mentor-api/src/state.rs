//! Application state shared across all route handlers.
//!
//! AppState holds references to the pipelines and shared resources.
//! It is passed to handlers via axum's State extractor.

use std::sync::Arc;
use std::time::Instant;

use mentor_chat::ChatPipeline;
use mentor_core::config::MentorConfig;
use mentor_storage::{Database, KnowledgeRepository};
use mentor_vector::{KnowledgePipeline, SemanticIndex};

/// Shared application state.
///
/// All fields use `Arc` for cheap cloning across handler tasks. The
/// collaborators are stateless apart from configuration; mutable state
/// lives in the stores.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<MentorConfig>,
    /// SQLite database for persistent storage.
    pub database: Arc<Database>,
    /// Knowledge entry repository (keyword retrieval and listing).
    pub knowledge_store: Arc<KnowledgeRepository>,
    /// Semantic index adapter (vector retrieval).
    pub semantic: Arc<SemanticIndex>,
    /// Paired relational + vector knowledge writes.
    pub knowledge: Arc<KnowledgePipeline>,
    /// The per-message chat pipeline.
    pub chat: Arc<ChatPipeline>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    /// Create a new AppState with the given components.
    pub fn new(
        config: MentorConfig,
        database: Arc<Database>,
        knowledge_store: Arc<KnowledgeRepository>,
        semantic: Arc<SemanticIndex>,
        knowledge: KnowledgePipeline,
        chat: ChatPipeline,
    ) -> Self {
        Self {
            config: Arc::new(config),
            database,
            knowledge_store,
            semantic,
            knowledge: Arc::new(knowledge),
            chat: Arc::new(chat),
            start_time: Instant::now(),
        }
    }
}
