//! Mentor Storage crate - SQLite persistence for the knowledge base and
//! conversation threads.
//!
//! Provides a WAL-mode SQLite database with migrations and repository
//! implementations for knowledge entries, chat threads, and chat messages.

pub mod db;
pub mod migrations;
pub mod repository;

pub use db::Database;
pub use repository::{KnowledgeRepository, MessageRepository, ThreadRepository};
