//! Database schema migrations.
//!
//! Applies the initial schema: knowledge_entries, chat_threads,
//! chat_messages, and the schema_migrations tracking table.

use rusqlite::Connection;
use tracing::info;

use mentor_core::error::MentorError;

/// Run all pending database migrations.
///
/// Currently implements the initial schema (version 1). Future migrations
/// can be added by checking the current version and applying incremental changes.
pub fn run_migrations(conn: &Connection) -> Result<(), MentorError> {
    // Create the migrations tracking table first.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| {
        MentorError::StoreUnavailable(format!("Failed to create migrations table: {}", e))
    })?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| {
            MentorError::StoreUnavailable(format!("Failed to query migration version: {}", e))
        })?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: initial_schema");
    }

    Ok(())
}

/// Version 1: Initial schema.
fn apply_v1(conn: &Connection) -> Result<(), MentorError> {
    conn.execute_batch(
        "
        -- Curated Q&A entries. The relational record is authoritative;
        -- the vector projection is derived and rebuildable.
        CREATE TABLE IF NOT EXISTS knowledge_entries (
            id                TEXT PRIMARY KEY NOT NULL,
            title             TEXT NOT NULL,
            question          TEXT NOT NULL DEFAULT '',
            answer_markdown   TEXT NOT NULL DEFAULT '',
            content_markdown  TEXT NOT NULL DEFAULT '',
            subject           TEXT,
            grade_level       TEXT,
            difficulty        TEXT,
            category          TEXT NOT NULL DEFAULT 'Concept',
            tags              TEXT NOT NULL DEFAULT '[]',
            priority          INTEGER NOT NULL DEFAULT 1,
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_grade_subject
            ON knowledge_entries (grade_level, subject);

        CREATE INDEX IF NOT EXISTS idx_knowledge_priority
            ON knowledge_entries (priority DESC, created_at DESC);

        -- Conversation threads.
        CREATE TABLE IF NOT EXISTS chat_threads (
            id          TEXT PRIMARY KEY NOT NULL,
            title       TEXT NOT NULL,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_threads_updated
            ON chat_threads (updated_at DESC);

        -- Messages, owned by their thread (cascade delete).
        CREATE TABLE IF NOT EXISTS chat_messages (
            id          TEXT PRIMARY KEY NOT NULL,
            thread_id   TEXT NOT NULL,
            sender      TEXT NOT NULL
                        CHECK (sender IN ('user', 'assistant')),
            content     TEXT NOT NULL,
            sources     TEXT,
            timestamp   INTEGER NOT NULL,
            FOREIGN KEY (thread_id) REFERENCES chat_threads(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_messages_thread
            ON chat_messages (thread_id, timestamp ASC);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'initial_schema');
        ",
    )
    .map_err(|e| MentorError::StoreUnavailable(format!("Failed to apply migration v1: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_migrations_create_tables() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master
                 WHERE type = 'table'
                 AND name IN ('knowledge_entries', 'chat_threads', 'chat_messages')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }

    #[test]
    fn test_migrations_record_version() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_message_sender_check_constraint() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO chat_threads (id, title, created_at, updated_at)
             VALUES ('t1', 'Test', 0, 0)",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO chat_messages (id, thread_id, sender, content, timestamp)
             VALUES ('m1', 't1', 'system', 'nope', 0)",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_cascade_delete_messages() {
        let conn = open_conn();
        run_migrations(&conn).unwrap();

        conn.execute(
            "INSERT INTO chat_threads (id, title, created_at, updated_at)
             VALUES ('t1', 'Test', 0, 0)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO chat_messages (id, thread_id, sender, content, timestamp)
             VALUES ('m1', 't1', 'user', 'hello', 0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM chat_threads WHERE id = 't1'", [])
            .unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
