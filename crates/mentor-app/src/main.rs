//! Mentor application binary - composition root.
//!
//! Ties together all Mentor crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Initialize storage (SQLite) and the in-memory vector index
//! 3. Wire the embedding and generation backends (real clients when an API
//!    key is configured, deterministic mocks otherwise)
//! 4. Rebuild the vector projection from the relational store
//! 5. Start the axum REST API server

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use mentor_api::routes;
use mentor_api::state::AppState;
use mentor_chat::{
    AnswerComposer, ChatPipeline, ConversationLedger, RetrievalCoordinator, TitleComposer,
};
use mentor_core::config::MentorConfig;
use mentor_llm::{MockGenerator, OpenAiCompatClient, TextGenerator};
use mentor_storage::{Database, KnowledgeRepository};
use mentor_vector::{
    EmbeddingService, KnowledgePipeline, MockEmbedding, OpenAiEmbedding, SemanticIndex,
};

mod cli;
use cli::CliArgs;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration and apply CLI/env overrides.
    let config_path = args.resolve_config_path();
    let mut config = MentorConfig::load_or_default(&config_path);
    config.general.port = args.resolve_port(config.general.port);
    if let Some(data_dir) = args.resolve_data_dir() {
        config.general.data_dir = data_dir;
    }
    if let Some(level) = args.resolve_log_level() {
        config.general.log_level = level;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!(port = config.general.port, "Mentor starting");

    // Storage.
    let data_dir = expand_home(&config.general.data_dir);
    let db = Arc::new(Database::new(&data_dir.join("mentor.db"))?);
    let store = Arc::new(KnowledgeRepository::new(Arc::clone(&db)));

    // Embedding and generation backends. Without an API key, deterministic
    // mocks keep the server usable for local development.
    let api_key = std::env::var(&config.generation.api_key_env).ok();

    let semantic: Arc<SemanticIndex> = match &api_key {
        Some(key) => {
            let embedder: Arc<dyn EmbeddingService> = Arc::new(OpenAiEmbedding::new(
                &config.generation.base_url,
                key,
                &config.embedding.model,
                config.embedding.dimensions,
            ));
            Arc::new(SemanticIndex::new(embedder, config.embedding.dimensions))
        }
        None => {
            tracing::warn!(
                env = %config.generation.api_key_env,
                "No API key configured; using mock embedding backend"
            );
            Arc::new(SemanticIndex::for_embedder(Arc::new(MockEmbedding::new())))
        }
    };

    let generator: Arc<dyn TextGenerator> = match &api_key {
        Some(key) => Arc::new(OpenAiCompatClient::new(
            &config.generation.base_url,
            key,
            &config.generation.model,
        )),
        None => {
            tracing::warn!(
                env = %config.generation.api_key_env,
                "No API key configured; using mock generation backend"
            );
            Arc::new(MockGenerator::default())
        }
    };

    let knowledge = KnowledgePipeline::new(Arc::clone(&store), Arc::clone(&semantic));

    // The vector index lives in memory; rebuild its projection from the
    // authoritative relational rows. With --reindex, do only that and exit.
    let indexed = knowledge.reindex_all().await?;
    tracing::info!(indexed, "Vector projection rebuilt from the relational store");
    if args.reindex {
        return Ok(());
    }

    // The chat pipeline.
    let retrieval_timeout = Duration::from_secs(config.retrieval.call_timeout_secs);
    let generation_timeout = Duration::from_secs(config.generation.request_timeout_secs);

    let chat = ChatPipeline::new(
        RetrievalCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&semantic),
            config.retrieval.max_context_entries,
            config.retrieval.vector_top_k,
            retrieval_timeout,
        ),
        TitleComposer::new(
            Arc::clone(&generator),
            config.generation.title_max_output_tokens,
            config.generation.temperature,
            generation_timeout,
        ),
        AnswerComposer::new(
            Arc::clone(&generator),
            config.generation.answer_max_output_tokens,
            config.generation.temperature,
            generation_timeout,
        ),
        ConversationLedger::new(Arc::clone(&db)),
    );

    let state = AppState::new(config, db, store, semantic, knowledge, chat);

    routes::start_server(state).await?;

    Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").ok();
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").ok();

        if let Some(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
