//! Conversation ledger: thread and message lifecycle.
//!
//! Owns ordering guarantees for a thread's messages and the thread's
//! activity timestamp. A thread is never created without a message
//! eventually attached; if message persistence fails after thread creation
//! the thread remains as an accepted orphan rather than being rolled back
//! across stores.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use mentor_core::error::MentorError;
use mentor_core::types::{Message, Sender, SourceRef, Thread};
use mentor_storage::{MessageRepository, ThreadRepository};

use crate::title::fallback_title;

/// Thread/message lifecycle over the relational store.
pub struct ConversationLedger {
    threads: ThreadRepository,
    messages: MessageRepository,
}

impl ConversationLedger {
    pub fn new(db: Arc<mentor_storage::Database>) -> Self {
        Self {
            threads: ThreadRepository::new(Arc::clone(&db)),
            messages: MessageRepository::new(db),
        }
    }

    /// Resolve an existing thread or create one for a new conversation.
    ///
    /// A supplied id that resolves to an existing thread is returned as-is
    /// (no second thread is ever created for it). A missing or unknown id
    /// starts a new conversation; an unknown id is reused so the caller's
    /// reference stays valid. The composed title is used when present,
    /// otherwise the deterministic fallback derived from the first message.
    pub fn resolve_or_create(
        &self,
        requested: Option<Uuid>,
        first_message: &str,
        composed_title: Option<String>,
        subject: Option<&str>,
    ) -> Result<Uuid, MentorError> {
        if let Some(id) = requested {
            if self.threads.find_by_id(id)?.is_some() {
                return Ok(id);
            }
        }

        let id = requested.unwrap_or_else(Uuid::new_v4);
        let title =
            composed_title.unwrap_or_else(|| fallback_title(first_message, subject));
        self.threads.insert(id, &title)?;
        info!(thread_id = %id, title = %title, "Thread created");
        Ok(id)
    }

    /// Append a message, timestamped at write time.
    pub fn append_message(
        &self,
        thread_id: Uuid,
        sender: Sender,
        content: &str,
        sources: Option<&[SourceRef]>,
    ) -> Result<Message, MentorError> {
        self.messages.append(thread_id, sender, content, sources)
    }

    /// Advance the thread's `updated_at`.
    pub fn touch_thread(&self, thread_id: Uuid) -> Result<(), MentorError> {
        self.threads.touch(thread_id)
    }

    /// Look up a thread by id.
    pub fn find_thread(&self, thread_id: Uuid) -> Result<Option<Thread>, MentorError> {
        self.threads.find_by_id(thread_id)
    }

    /// All threads, most recently active first.
    pub fn list_threads(&self) -> Result<Vec<Thread>, MentorError> {
        self.threads.list()
    }

    /// A thread's messages in chronological order, or `None` when the
    /// thread does not exist.
    pub fn thread_messages(&self, thread_id: Uuid) -> Result<Option<Vec<Message>>, MentorError> {
        if self.threads.find_by_id(thread_id)?.is_none() {
            return Ok(None);
        }
        Ok(Some(self.messages.list_for_thread(thread_id)?))
    }

    /// Delete a thread; its messages cascade. Returns true if it existed.
    pub fn delete_thread(&self, thread_id: Uuid) -> Result<bool, MentorError> {
        self.threads.delete(thread_id)
    }
}
