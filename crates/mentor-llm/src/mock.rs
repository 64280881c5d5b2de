//! Deterministic mock generator for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use mentor_core::error::MentorError;

use crate::{GenerationRequest, TextGenerator};

/// Mock text generator with a scripted reply queue.
///
/// Replies are returned in FIFO order; once the queue is empty a fixed
/// default reply is returned. A failing mode exercises the
/// `GenerationFailed` paths. The last request is recorded so tests can
/// assert on the composed prompt.
#[derive(Default)]
pub struct MockGenerator {
    replies: Mutex<VecDeque<String>>,
    fail: bool,
    last_request: Mutex<Option<GenerationRequest>>,
}

impl MockGenerator {
    /// A generator that answers every request with `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        let generator = Self::default();
        generator.push_reply(reply);
        generator
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Queue one scripted reply.
    pub fn push_reply(&self, reply: impl Into<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply.into());
        }
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.last_request.lock().ok().and_then(|r| r.clone())
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, MentorError> {
        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(request);
        }

        if self.fail {
            return Err(MentorError::GenerationFailed(
                "mock backend down".to_string(),
            ));
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|mut r| r.pop_front())
            .unwrap_or_else(|| "mock reply".to_string());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PromptMessage;

    fn make_request(content: &str) -> GenerationRequest {
        GenerationRequest {
            messages: vec![PromptMessage::user(content)],
            max_output_tokens: 30,
            temperature: 0.7,
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let gen = MockGenerator::default();
        gen.push_reply("first");
        gen.push_reply("second");

        assert_eq!(gen.generate(make_request("a")).await.unwrap(), "first");
        assert_eq!(gen.generate(make_request("b")).await.unwrap(), "second");
        // Queue exhausted: default reply.
        assert_eq!(gen.generate(make_request("c")).await.unwrap(), "mock reply");
    }

    #[tokio::test]
    async fn test_failing_mode() {
        let gen = MockGenerator::failing();
        let result = gen.generate(make_request("a")).await;
        assert!(matches!(result, Err(MentorError::GenerationFailed(_))));
    }

    #[tokio::test]
    async fn test_records_last_request() {
        let gen = MockGenerator::with_reply("ok");
        gen.generate(make_request("remember me")).await.unwrap();

        let last = gen.last_request().unwrap();
        assert_eq!(last.messages[0].content, "remember me");
        assert_eq!(last.max_output_tokens, 30);
    }
}
