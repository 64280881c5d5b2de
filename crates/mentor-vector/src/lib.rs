//! Mentor Vector crate - embedding service, in-memory cosine index, the
//! semantic index adapter, and the knowledge indexing pipeline.
//!
//! The relational store is authoritative; everything held here is a derived
//! projection that can be rebuilt from it (`KnowledgePipeline::reindex_all`).

pub mod embedding;
pub mod index;
pub mod pipeline;
pub mod semantic;

pub use embedding::{EmbeddingService, FailingEmbedding, MockEmbedding, OpenAiEmbedding};
pub use index::{SearchHit, VectorIndex};
pub use pipeline::KnowledgePipeline;
pub use semantic::SemanticIndex;
