//! Repository implementations for SQLite-backed persistence.
//!
//! Provides KnowledgeRepository, ThreadRepository, and MessageRepository
//! that operate on the Database struct using raw SQL.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::OptionalExtension;
use uuid::Uuid;

use mentor_core::error::MentorError;
use mentor_core::types::{
    Hint, KnowledgeDraft, KnowledgeEntry, Message, Sender, SourceRef, Thread,
};

use crate::db::Database;

const ENTRY_COLUMNS: &str = "id, title, question, answer_markdown, content_markdown, subject, \
     grade_level, difficulty, category, tags, priority, created_at, updated_at";

/// Repository for curated knowledge entries.
///
/// This is the keyword half of retrieval: `search` matches the query as a
/// case-insensitive substring against the question/answer/content columns or
/// as an exact tag membership test, bounded and ordered by priority.
pub struct KnowledgeRepository {
    db: Arc<Database>,
}

impl KnowledgeRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Keyword search with optional grade/subject equality filters.
    ///
    /// Results are ordered by `priority` descending, ties broken by
    /// `created_at` descending, and truncated to `limit`.
    pub fn search(
        &self,
        query: &str,
        hint: &Hint,
        limit: usize,
    ) -> Result<Vec<KnowledgeEntry>, MentorError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM knowledge_entries
                 WHERE (?2 IS NULL OR grade_level = ?2)
                   AND (?3 IS NULL OR subject = ?3)
                   AND (
                       question LIKE '%' || ?1 || '%'
                       OR answer_markdown LIKE '%' || ?1 || '%'
                       OR content_markdown LIKE '%' || ?1 || '%'
                       OR EXISTS (SELECT 1 FROM json_each(tags) WHERE json_each.value = ?1)
                   )
                 ORDER BY priority DESC, created_at DESC
                 LIMIT ?4"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![query, hint.grade_level, hint.subject, limit as i64],
                    row_to_entry,
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;

            collect_rows(rows)
        })
    }

    /// List entries with optional filters, newest and highest-priority first.
    pub fn list(&self, hint: &Hint) -> Result<Vec<KnowledgeEntry>, MentorError> {
        self.db.with_conn(|conn| {
            let sql = format!(
                "SELECT {ENTRY_COLUMNS} FROM knowledge_entries
                 WHERE (?1 IS NULL OR grade_level = ?1)
                   AND (?2 IS NULL OR subject = ?2)
                 ORDER BY priority DESC, created_at DESC"
            );
            let mut stmt = conn
                .prepare(&sql)
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;

            let rows = stmt
                .query_map(
                    rusqlite::params![hint.grade_level, hint.subject],
                    row_to_entry,
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;

            collect_rows(rows)
        })
    }

    /// Find an entry by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<KnowledgeEntry>, MentorError> {
        self.db.with_conn(|conn| {
            let sql = format!("SELECT {ENTRY_COLUMNS} FROM knowledge_entries WHERE id = ?1");
            conn.query_row(&sql, rusqlite::params![id.to_string()], row_to_entry)
                .optional()
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))
        })
    }

    /// Insert a new entry from a validated draft and return the stored row.
    pub fn add(&self, draft: &KnowledgeDraft) -> Result<KnowledgeEntry, MentorError> {
        draft.validate()?;

        let entry = KnowledgeEntry {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            question: draft.question.clone(),
            answer_markdown: draft.answer_markdown.clone(),
            content_markdown: draft.content_markdown.clone(),
            subject: draft.subject.clone(),
            grade_level: draft.grade_level.clone(),
            difficulty: draft.difficulty.clone(),
            category: draft
                .category
                .clone()
                .unwrap_or_else(|| "Concept".to_string()),
            tags: draft.tags.clone(),
            priority: draft.priority.unwrap_or(1),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO knowledge_entries
                 (id, title, question, answer_markdown, content_markdown, subject,
                  grade_level, difficulty, category, tags, priority, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                rusqlite::params![
                    entry.id.to_string(),
                    entry.title,
                    entry.question,
                    entry.answer_markdown,
                    entry.content_markdown,
                    entry.subject,
                    entry.grade_level,
                    entry.difficulty,
                    entry.category,
                    serde_json::to_string(&entry.tags)?,
                    entry.priority,
                    entry.created_at.timestamp_millis(),
                    entry.updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| MentorError::StoreUnavailable(format!("Failed to add entry: {}", e)))?;
            Ok(())
        })?;

        Ok(entry)
    }

    /// Overwrite an existing entry from a validated draft.
    ///
    /// Returns `None` if no entry with the given ID exists.
    pub fn update(
        &self,
        id: Uuid,
        draft: &KnowledgeDraft,
    ) -> Result<Option<KnowledgeEntry>, MentorError> {
        draft.validate()?;

        let updated_at = Utc::now();
        let changed = self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE knowledge_entries SET
                     title = ?2, question = ?3, answer_markdown = ?4,
                     content_markdown = ?5, subject = ?6, grade_level = ?7,
                     difficulty = ?8, category = ?9, tags = ?10, priority = ?11,
                     updated_at = ?12
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    draft.title,
                    draft.question,
                    draft.answer_markdown,
                    draft.content_markdown,
                    draft.subject,
                    draft.grade_level,
                    draft.difficulty,
                    draft
                        .category
                        .clone()
                        .unwrap_or_else(|| "Concept".to_string()),
                    serde_json::to_string(&draft.tags)?,
                    draft.priority.unwrap_or(1),
                    updated_at.timestamp_millis(),
                ],
            )
            .map_err(|e| MentorError::StoreUnavailable(format!("Failed to update entry: {}", e)))
        })?;

        if changed == 0 {
            return Ok(None);
        }
        self.find_by_id(id)
    }

    /// Delete an entry by ID. Returns true if a row was removed.
    pub fn delete(&self, id: Uuid) -> Result<bool, MentorError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM knowledge_entries WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| {
                    MentorError::StoreUnavailable(format!("Failed to delete entry: {}", e))
                })?;
            Ok(changed > 0)
        })
    }

    /// Distinct grade levels present in the knowledge base.
    pub fn distinct_grades(&self) -> Result<Vec<String>, MentorError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT grade_level FROM knowledge_entries
                     WHERE grade_level IS NOT NULL
                     ORDER BY grade_level",
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))
        })
    }

    /// Distinct subjects taught at the given grade level.
    pub fn distinct_subjects(&self, grade: &str) -> Result<Vec<String>, MentorError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT DISTINCT subject FROM knowledge_entries
                     WHERE grade_level = ?1 AND subject IS NOT NULL
                     ORDER BY subject",
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![grade], |row| row.get::<_, String>(0))
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            rows.collect::<Result<Vec<_>, _>>()
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))
        })
    }

    /// Count all entries.
    pub fn count(&self) -> Result<u64, MentorError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM knowledge_entries", [], |row| {
                    row.get(0)
                })
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

/// Repository for conversation threads.
pub struct ThreadRepository {
    db: Arc<Database>,
}

impl ThreadRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a new thread with the given ID and title.
    pub fn insert(&self, id: Uuid, title: &str) -> Result<Thread, MentorError> {
        let now = Utc::now();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_threads (id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![
                    id.to_string(),
                    title,
                    now.timestamp_millis(),
                    now.timestamp_millis()
                ],
            )
            .map_err(|e| MentorError::StoreUnavailable(format!("Failed to create thread: {}", e)))?;
            Ok(())
        })?;

        Ok(Thread {
            id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Find a thread by ID.
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Thread>, MentorError> {
        self.db.with_conn(|conn| {
            conn.query_row(
                "SELECT id, title, created_at, updated_at FROM chat_threads WHERE id = ?1",
                rusqlite::params![id.to_string()],
                row_to_thread,
            )
            .optional()
            .map_err(|e| MentorError::StoreUnavailable(e.to_string()))
        })
    }

    /// List all threads, most recently active first.
    pub fn list(&self) -> Result<Vec<Thread>, MentorError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, title, created_at, updated_at FROM chat_threads
                     ORDER BY updated_at DESC",
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            let rows = stmt
                .query_map([], row_to_thread)
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            collect_rows(rows)
        })
    }

    /// Advance a thread's `updated_at` to now.
    pub fn touch(&self, id: Uuid) -> Result<(), MentorError> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_threads SET updated_at = ?2 WHERE id = ?1",
                rusqlite::params![id.to_string(), Utc::now().timestamp_millis()],
            )
            .map_err(|e| MentorError::StoreUnavailable(format!("Failed to touch thread: {}", e)))?;
            Ok(())
        })
    }

    /// Delete a thread by ID; its messages cascade. Returns true if removed.
    pub fn delete(&self, id: Uuid) -> Result<bool, MentorError> {
        self.db.with_conn(|conn| {
            let changed = conn
                .execute(
                    "DELETE FROM chat_threads WHERE id = ?1",
                    rusqlite::params![id.to_string()],
                )
                .map_err(|e| {
                    MentorError::StoreUnavailable(format!("Failed to delete thread: {}", e))
                })?;
            Ok(changed > 0)
        })
    }
}

/// Repository for thread messages.
pub struct MessageRepository {
    db: Arc<Database>,
}

impl MessageRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Append a message to a thread, timestamped at write time.
    pub fn append(
        &self,
        thread_id: Uuid,
        sender: Sender,
        content: &str,
        sources: Option<&[SourceRef]>,
    ) -> Result<Message, MentorError> {
        let message = Message {
            id: Uuid::new_v4(),
            thread_id,
            sender,
            content: content.to_string(),
            sources: sources.map(|s| s.to_vec()),
            timestamp: Utc::now(),
        };

        let sources_json = match &message.sources {
            Some(s) => Some(serde_json::to_string(s)?),
            None => None,
        };

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, thread_id, sender, content, sources, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    message.id.to_string(),
                    message.thread_id.to_string(),
                    message.sender.as_str(),
                    message.content,
                    sources_json,
                    message.timestamp.timestamp_millis(),
                ],
            )
            .map_err(|e| MentorError::StoreUnavailable(format!("Failed to append message: {}", e)))?;
            Ok(())
        })?;

        Ok(message)
    }

    /// List a thread's messages in timestamp order.
    pub fn list_for_thread(&self, thread_id: Uuid) -> Result<Vec<Message>, MentorError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, thread_id, sender, content, sources, timestamp
                     FROM chat_messages
                     WHERE thread_id = ?1
                     ORDER BY timestamp ASC",
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            let rows = stmt
                .query_map(rusqlite::params![thread_id.to_string()], row_to_message)
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            collect_rows(rows)
        })
    }

    /// Count messages in a thread.
    pub fn count_for_thread(&self, thread_id: Uuid) -> Result<u64, MentorError> {
        self.db.with_conn(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE thread_id = ?1",
                    rusqlite::params![thread_id.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| MentorError::StoreUnavailable(e.to_string()))?;
            Ok(count as u64)
        })
    }
}

// ============================================================================
// Helper functions for row-to-entity conversion.
// ============================================================================

fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>, MentorError> {
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(|e| MentorError::StoreUnavailable(e.to_string()))
}

fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<KnowledgeEntry> {
    let id_str: String = row.get(0)?;
    let tags_json: String = row.get(9)?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(KnowledgeEntry {
        id: parse_uuid(0, &id_str)?,
        title: row.get(1)?,
        question: row.get(2)?,
        answer_markdown: row.get(3)?,
        content_markdown: row.get(4)?,
        subject: row.get(5)?,
        grade_level: row.get(6)?,
        difficulty: row.get(7)?,
        category: row.get(8)?,
        tags,
        priority: row.get(10)?,
        created_at: millis_to_datetime(row.get(11)?),
        updated_at: millis_to_datetime(row.get(12)?),
    })
}

fn row_to_thread(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thread> {
    let id_str: String = row.get(0)?;
    Ok(Thread {
        id: parse_uuid(0, &id_str)?,
        title: row.get(1)?,
        created_at: millis_to_datetime(row.get(2)?),
        updated_at: millis_to_datetime(row.get(3)?),
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let thread_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let sender = Sender::parse(&sender_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown sender: {}", sender_str).into(),
        )
    })?;
    let sources_json: Option<String> = row.get(4)?;
    let sources = match sources_json {
        Some(json) => Some(serde_json::from_str(&json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?),
        None => None,
    };

    Ok(Message {
        id: parse_uuid(0, &id_str)?,
        thread_id: parse_uuid(1, &thread_str)?,
        sender,
        content: row.get(3)?,
        sources,
        timestamp: millis_to_datetime(row.get(5)?),
    })
}
