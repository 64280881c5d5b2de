//! The per-message chat pipeline.
//!
//! Control flow per incoming message: validate, then retrieve context and
//! (for new conversations) compose a title concurrently, resolve or create
//! the thread, generate the answer from the merged context, and persist the
//! exchange. Retrieval and title composition have no data dependency on
//! each other; both complete before answer generation runs.

use chrono::Utc;
use tracing::{info, warn};

use mentor_core::types::{Sender, SourceRef};

use crate::answer::AnswerComposer;
use crate::error::ChatError;
use crate::ledger::ConversationLedger;
use crate::retrieval::RetrievalCoordinator;
use crate::title::TitleComposer;
use crate::types::{ChatRequest, ChatTurn};

/// Maximum message length in characters.
const MAX_MESSAGE_LENGTH: usize = 2000;

/// Stateless coordinator for one chat turn.
///
/// Holds only configuration-bearing collaborators; all mutable state lives
/// in the external stores, so concurrent requests share nothing else.
pub struct ChatPipeline {
    retrieval: RetrievalCoordinator,
    titles: TitleComposer,
    answers: AnswerComposer,
    ledger: ConversationLedger,
}

impl ChatPipeline {
    pub fn new(
        retrieval: RetrievalCoordinator,
        titles: TitleComposer,
        answers: AnswerComposer,
        ledger: ConversationLedger,
    ) -> Self {
        Self {
            retrieval,
            titles,
            answers,
            ledger,
        }
    }

    /// Handle one incoming message and return the response turn.
    ///
    /// Validation is the only failure before side effects. Generation
    /// failure does not error the turn: the student still receives a
    /// response (the fixed apology) and `generation_failed` is set, with no
    /// assistant message persisted for it.
    pub async fn handle(&self, request: ChatRequest) -> Result<ChatTurn, ChatError> {
        let message = request.message.trim().to_string();
        if message.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let hint = request.hint();
        let needs_title = request.thread_id.is_none();

        info!(
            new_thread = needs_title,
            grade = hint.grade_level.as_deref().unwrap_or("-"),
            subject = hint.subject.as_deref().unwrap_or("-"),
            "Handling chat message"
        );

        // Retrieval and title composition are independent; run them together.
        let (context, composed_title) = tokio::join!(
            self.retrieval.retrieve(&message, &hint),
            async {
                if needs_title {
                    Some(self.titles.compose(&message, &hint).await)
                } else {
                    None
                }
            }
        );

        let thread_id = self.ledger.resolve_or_create(
            request.thread_id,
            &message,
            composed_title,
            hint.subject.as_deref(),
        )?;

        let answer = self.answers.compose(&message, &context, &hint).await;

        let sources: Vec<SourceRef> = context
            .iter()
            .map(|hit| SourceRef {
                title: hit.entry.title.clone(),
                excerpt: hit.entry.question.clone(),
            })
            .collect();

        // Persist the exchange. The user message is recorded even when
        // generation failed; the assistant message only on success, so a
        // backend outage is never stored as a fabricated answer. Message
        // persistence failures leave the thread as an accepted orphan.
        if let Err(e) = self
            .ledger
            .append_message(thread_id, Sender::User, &message, None)
        {
            warn!(thread_id = %thread_id, error = %e, "Failed to persist user message");
        }
        if !answer.generation_failed {
            let attached = if sources.is_empty() {
                None
            } else {
                Some(sources.as_slice())
            };
            if let Err(e) =
                self.ledger
                    .append_message(thread_id, Sender::Assistant, &answer.text, attached)
            {
                warn!(thread_id = %thread_id, error = %e, "Failed to persist assistant message");
            }
        }
        if let Err(e) = self.ledger.touch_thread(thread_id) {
            warn!(thread_id = %thread_id, error = %e, "Failed to touch thread");
        }

        Ok(ChatTurn {
            response: answer.text,
            thread_id,
            sources,
            timestamp: Utc::now(),
            generation_failed: answer.generation_failed,
        })
    }

    /// The conversation ledger, for thread listing and deletion surfaces.
    pub fn ledger(&self) -> &ConversationLedger {
        &self.ledger
    }
}
