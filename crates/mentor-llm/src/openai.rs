//! OpenAI-compatible text-generation client.
//!
//! Works with any backend exposing a `/chat/completions` endpoint:
//! OpenAI, OpenRouter, Ollama, vLLM, and the like.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mentor_core::error::MentorError;

use crate::{GenerationRequest, TextGenerator};

/// An OpenAI-compatible chat-completions client.
pub struct OpenAiCompatClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        }
    }

    /// Convert boundary messages to the wire format.
    fn to_api_messages(request: &GenerationRequest) -> Vec<ApiMessage> {
        request
            .messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl TextGenerator for OpenAiCompatClient {
    async fn generate(&self, request: GenerationRequest) -> Result<String, MentorError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": Self::to_api_messages(&request),
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
            "stream": false,
        });

        debug!(model = %self.model, max_tokens = request.max_output_tokens, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| MentorError::GenerationFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %error_body, "Generation backend returned error");
            return Err(MentorError::GenerationFailed(format!(
                "backend returned {}: {}",
                status, error_body
            )));
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            MentorError::GenerationFailed(format!("Failed to parse response: {}", e))
        })?;

        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if content.is_empty() {
            return Err(MentorError::GenerationFailed(
                "No completion in response".to_string(),
            ));
        }

        Ok(content)
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
