//! Answer composition: build a grounded system instruction from retrieved
//! context and produce the final answer.
//!
//! Backend failure yields a fixed apologetic message plus an explicit
//! failure flag, so callers can tell "the model had nothing useful to say"
//! apart from "the model could not be reached".

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use mentor_core::types::{Hint, RetrievalHit};
use mentor_llm::{GenerationRequest, PromptMessage, TextGenerator};

/// Fixed response returned when the generation backend cannot be reached.
pub const APOLOGY: &str = "I apologize, but I encountered an error while \
processing your request. Please try again.";

/// A composed answer and whether generation actually succeeded.
#[derive(Debug, Clone)]
pub struct ComposedAnswer {
    pub text: String,
    pub generation_failed: bool,
}

/// Composes grounded answers from retrieved context.
pub struct AnswerComposer {
    generator: Arc<dyn TextGenerator>,
    max_output_tokens: u32,
    temperature: f64,
    call_timeout: Duration,
}

impl AnswerComposer {
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

    /// Generate an answer for `message` grounded in `context`.
    pub async fn compose(
        &self,
        message: &str,
        context: &[RetrievalHit],
        hint: &Hint,
    ) -> ComposedAnswer {
        let request = GenerationRequest {
            messages: vec![
                PromptMessage::system(build_system_instruction(hint, context)),
                PromptMessage::user(message),
            ],
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };

        match timeout(self.call_timeout, self.generator.generate(request)).await {
            Ok(Ok(text)) => ComposedAnswer {
                text,
                generation_failed: false,
            },
            Ok(Err(e)) => {
                warn!(error = %e, "Answer generation failed");
                ComposedAnswer {
                    text: APOLOGY.to_string(),
                    generation_failed: true,
                }
            }
            Err(_) => {
                warn!("Answer generation timed out");
                ComposedAnswer {
                    text: APOLOGY.to_string(),
                    generation_failed: true,
                }
            }
        }
    }
}

/// Build the tutor system instruction: persona, grade/subject framing, and
/// the retrieved context rendered as Question/Answer blocks.
pub fn build_system_instruction(hint: &Hint, context: &[RetrievalHit]) -> String {
    let grade = hint.grade_level.as_deref().unwrap_or("students");

    let mut instruction = format!(
        "You are Mentor, a friendly and encouraging AI tutor for {}. ",
        grade
    );

    if let Some(ref subject) = hint.subject {
        instruction.push_str(&format!("You specialize in {}. ", subject));
    }

    instruction.push_str(
        "\n\nPERSONALITY & BEHAVIOR RULES:\n\
         - You are enthusiastic, patient, and encouraging\n\
         - Use simple, clear language appropriate for the student's grade level\n\
         - Give step-by-step explanations when possible\n\
         - Use examples and analogies to make concepts easier to understand\n\
         - If a student is struggling, offer encouragement and break down the problem\n\
         - Ask follow-up questions to check understanding\n\
         \n\
         RESPONSE FORMAT:\n\
         - Keep responses concise but thorough\n\
         - Use bullet points or numbered lists for complex explanations\n\
         - End with a question or suggestion to keep the conversation going\n\
         - Always be positive and supportive",
    );

    if context.is_empty() {
        instruction.push_str(
            "\n\nKNOWLEDGE BASE:\n\
             No specific context found for this question. Provide helpful \
             general guidance and encourage the student to ask more specific \
             questions.",
        );
    } else {
        instruction.push_str(
            "\n\nKNOWLEDGE BASE CONTEXT:\n\
             Use the following information to answer the student's question \
             accurately:\n",
        );
        let blocks: Vec<String> = context
            .iter()
            .map(|hit| {
                format!(
                    "Question: {}\nAnswer: {}",
                    hit.entry.question,
                    hit.entry.context_answer()
                )
            })
            .collect();
        instruction.push_str(&blocks.join("\n\n"));
        instruction.push_str(
            "\n\nBase your response on this context. If the context doesn't \
             contain enough information, say so politely and provide general \
             guidance while encouraging the student to ask more specific \
             questions.",
        );
    }

    instruction
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mentor_core::types::{KnowledgeEntry, MatchKind};
    use mentor_llm::MockGenerator;
    use uuid::Uuid;

    fn make_composer(generator: Arc<MockGenerator>) -> AnswerComposer {
        AnswerComposer::new(generator, 1000, 0.7, Duration::from_secs(10))
    }

    fn make_hit(question: &str, answer: &str) -> RetrievalHit {
        RetrievalHit {
            entry: KnowledgeEntry {
                id: Uuid::new_v4(),
                title: "Addition basics".to_string(),
                question: question.to_string(),
                answer_markdown: answer.to_string(),
                content_markdown: String::new(),
                subject: Some("Mathematics".to_string()),
                grade_level: Some("Elementary".to_string()),
                difficulty: None,
                category: "Concept".to_string(),
                tags: vec![],
                priority: 1,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            score: 1.0,
            match_kind: MatchKind::Keyword,
        }
    }

    fn math_hint() -> Hint {
        Hint::new(Some("Elementary".to_string()), Some("Mathematics".to_string()))
    }

    // ---- Successful generation ----

    #[tokio::test]
    async fn test_compose_success() {
        let generator = Arc::new(MockGenerator::with_reply("2 + 2 equals 4. Great question!"));
        let composer = make_composer(generator);

        let answer = composer
            .compose("What is 2+2?", &[make_hit("What is 2 + 2?", "4")], &math_hint())
            .await;
        assert!(!answer.generation_failed);
        assert_eq!(answer.text, "2 + 2 equals 4. Great question!");
    }

    #[tokio::test]
    async fn test_compose_sends_context_blocks() {
        let generator = Arc::new(MockGenerator::with_reply("ok"));
        let composer = make_composer(generator.clone());

        composer
            .compose(
                "What is 2+2?",
                &[make_hit("What is 2 + 2?", "2 + 2 = 4")],
                &math_hint(),
            )
            .await;

        let request = generator.last_request().unwrap();
        let system = &request.messages[0].content;
        assert!(system.contains("Question: What is 2 + 2?"));
        assert!(system.contains("Answer: 2 + 2 = 4"));
        assert_eq!(request.messages[1].content, "What is 2+2?");
        assert_eq!(request.max_output_tokens, 1000);
    }

    // ---- Failure path ----

    #[tokio::test]
    async fn test_compose_failure_returns_apology_and_flag() {
        let composer = make_composer(Arc::new(MockGenerator::failing()));
        let answer = composer.compose("What is 2+2?", &[], &math_hint()).await;
        assert!(answer.generation_failed);
        assert_eq!(answer.text, APOLOGY);
    }

    // ---- System instruction ----

    #[test]
    fn test_instruction_persona_and_framing() {
        let instruction = build_system_instruction(&math_hint(), &[]);
        assert!(instruction.contains("friendly and encouraging AI tutor for Elementary"));
        assert!(instruction.contains("You specialize in Mathematics."));
    }

    #[test]
    fn test_instruction_defaults_without_hint() {
        let instruction = build_system_instruction(&Hint::default(), &[]);
        assert!(instruction.contains("AI tutor for students"));
        assert!(!instruction.contains("You specialize in"));
    }

    #[test]
    fn test_instruction_no_context_framing() {
        let instruction = build_system_instruction(&Hint::default(), &[]);
        assert!(instruction.contains("No specific context found"));
        assert!(!instruction.contains("KNOWLEDGE BASE CONTEXT"));
    }

    #[test]
    fn test_instruction_renders_each_context_block() {
        let hits = vec![
            make_hit("What is 2 + 2?", "4"),
            make_hit("What is 3 + 3?", "6"),
        ];
        let instruction = build_system_instruction(&Hint::default(), &hits);
        assert!(instruction.contains("Question: What is 2 + 2?\nAnswer: 4"));
        assert!(instruction.contains("Question: What is 3 + 3?\nAnswer: 6"));
        assert!(!instruction.contains("No specific context found"));
    }

    #[test]
    fn test_instruction_prefers_answer_falls_back_to_content() {
        let mut hit = make_hit("What is a fraction?", "");
        hit.entry.content_markdown = "A fraction is part of a whole.".to_string();
        let instruction = build_system_instruction(&Hint::default(), &[hit]);
        assert!(instruction.contains("Answer: A fraction is part of a whole."));
    }
}
