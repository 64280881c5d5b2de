//! Conversation title composition.
//!
//! New threads (no thread id on the incoming message) get a short generated
//! title; existing threads pass through untouched. Generation failure falls
//! back to a deterministic title derived from the raw message — the
//! fallback is pure and total, and never calls out to the network.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use mentor_core::types::Hint;
use mentor_llm::{GenerationRequest, PromptMessage, TextGenerator};

/// Longest prefix of the raw message used by the fallback title.
const FALLBACK_TITLE_CHARS: usize = 40;

/// Composes titles for new conversations.
pub struct TitleComposer {
    generator: Arc<dyn TextGenerator>,
    max_output_tokens: u32,
    temperature: f64,
    call_timeout: Duration,
}

impl TitleComposer {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        max_output_tokens: u32,
        temperature: f64,
        call_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            max_output_tokens,
            temperature,
            call_timeout,
        }
    }

    /// Generate a title for the first message of a conversation.
    ///
    /// Never fails: any generation error (including timeout, or an empty
    /// result after cleanup) falls back to [`fallback_title`].
    pub async fn compose(&self, message: &str, hint: &Hint) -> String {
        let request = GenerationRequest {
            messages: vec![
                PromptMessage::system(title_prompt(hint)),
                PromptMessage::user(format!(
                    "Generate a title for this message: \"{}\"",
                    message
                )),
            ],
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        let generated = match timeout(self.call_timeout, self.generator.generate(request)).await {
            Ok(Ok(raw)) => clean_title(&raw),
            Ok(Err(e)) => {
                warn!(error = %e, "Title generation failed; using fallback");
                String::new()
            }
            Err(_) => {
                warn!("Title generation timed out; using fallback");
                String::new()
            }
        };

        if generated.is_empty() {
            fallback_title(message, hint.subject.as_deref())
        } else {
            generated
        }
    }
}

/// System prompt for title generation.
fn title_prompt(hint: &Hint) -> String {
    let grade = hint.grade_level.as_deref().unwrap_or("General");
    let subject = hint.subject.as_deref().unwrap_or("General Education");

    format!(
        "You are a specialized title generator for educational conversations. \
         Create a concise, descriptive title (max 8 words) based on the user's first message.\n\
         \n\
         CONTEXT:\n\
         - Grade Level: {grade}\n\
         - Subject: {subject}\n\
         \n\
         TITLE REQUIREMENTS:\n\
         - Clear and specific to the topic\n\
         - Educational and academic in nature\n\
         - Professional but friendly tone\n\
         - Include a subject prefix when relevant (e.g., \"Math:\", \"Science:\")\n\
         \n\
         EXAMPLES:\n\
         - \"Math: Solving Quadratic Equations\"\n\
         - \"Science: Photosynthesis Process\"\n\
         - \"History: Ancient Egypt Pyramids\"\n\
         \n\
         Generate only the title, nothing else. No quotes, no extra text."
    )
}

/// Strip whitespace and surrounding quote characters from generated output.
fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

/// Deterministic, network-free title derived from the raw message.
///
/// Takes the first 40 characters (ellipsis-truncated when longer),
/// capitalizes the first character, and prepends the first word of the
/// subject when one was supplied. Total: returns a non-empty title for any
/// input, including empty-after-trim.
pub fn fallback_title(message: &str, subject: Option<&str>) -> String {
    let trimmed = message.trim();

    let base = if trimmed.is_empty() {
        "New conversation".to_string()
    } else {
        let char_count = trimmed.chars().count();
        let mut title: String = trimmed.chars().take(FALLBACK_TITLE_CHARS).collect();
        if char_count > FALLBACK_TITLE_CHARS {
            title.push_str("...");
        }

        let mut chars = title.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => title,
        }
    };

    match subject.and_then(|s| s.split_whitespace().next()) {
        Some(first_word) => format!("{}: {}", first_word, base),
        None => base,
    }
}
