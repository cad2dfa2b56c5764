//! Client for a locally hosted Ollama API.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};
use crate::history::Exchange;

// Local models can take minutes on consumer hardware.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Role of a message in the chat endpoint's conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Message from the human user
    User,
    /// Message from the model
    Assistant,
    /// Persona prompt or instructions
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: Vec<String>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Seam over the chat endpoint so turn logic can run against a scripted
/// model in tests.
pub trait ChatModel: Send + Sync {
    /// Generate a reply to `prompt`, with prior exchanges as ordered context.
    fn chat(
        &self,
        prompt: &str,
        context: &[Exchange],
    ) -> impl Future<Output = Result<String>> + Send;
}

pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    system_prompt: Option<String>,
}

impl OllamaClient {
    pub fn new(base_url: &str, model: &str, system_prompt: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            system_prompt: system_prompt.map(str::to_string),
        })
    }

    /// Send a prompt and its context to `/api/chat` and return the reply text.
    pub async fn chat(&self, prompt: &str, context: &[Exchange]) -> Result<String> {
        let messages = build_messages(self.system_prompt.as_deref(), context, prompt);
        debug!(
            "Sending chat request to Ollama with {} messages",
            messages.len()
        );

        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::OllamaApi { status, message });
        }

        let api_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| BotError::OllamaResponse(e.to_string()))?;

        debug!("Received chat response from Ollama");
        Ok(api_response.message.content)
    }

    /// Send a prompt and a base64-encoded image to `/api/generate` and return
    /// the reply text. The call is single-shot; no conversation context.
    pub async fn generate_with_image(&self, prompt: &str, image_base64: String) -> Result<String> {
        debug!(
            "Sending generate request to Ollama ({} base64 characters)",
            image_base64.len()
        );

        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images: vec![image_base64],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::OllamaApi { status, message });
        }

        let api_response: GenerateResponse = response
            .json()
            .await
            .map_err(|e| BotError::OllamaResponse(e.to_string()))?;

        debug!("Received generate response from Ollama");
        Ok(api_response.response)
    }
}

impl ChatModel for OllamaClient {
    async fn chat(&self, prompt: &str, context: &[Exchange]) -> Result<String> {
        OllamaClient::chat(self, prompt, context).await
    }
}

/// Build the role-tagged message sequence for a chat call: persona first,
/// then a user/assistant pair per prior exchange, then the new prompt.
fn build_messages(
    system_prompt: Option<&str>,
    context: &[Exchange],
    prompt: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() * 2 + 2);

    if let Some(system) = system_prompt {
        messages.push(ChatMessage {
            role: MessageRole::System,
            content: system.to_string(),
        });
    }

    for exchange in context {
        messages.push(ChatMessage {
            role: MessageRole::User,
            content: exchange.prompt.clone(),
        });
        messages.push(ChatMessage {
            role: MessageRole::Assistant,
            content: exchange.response.clone(),
        });
    }

    messages.push(ChatMessage {
        role: MessageRole::User,
        content: prompt.to_string(),
    });

    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_context_yields_system_and_user() {
        let messages = build_messages(
            Some("persona"),
            &[],
            "How do I reverse a string in a list?",
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[0].content, "persona");
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[1].content, "How do I reverse a string in a list?");
    }

    #[test]
    fn context_is_replayed_in_order() {
        let context = vec![
            Exchange::new(None, "first question", "first answer"),
            Exchange::new(None, "second question", "second answer"),
        ];
        let messages = build_messages(Some("persona"), &context, "third question");

        assert_eq!(messages.len(), 6);
        let expected = [
            (MessageRole::System, "persona"),
            (MessageRole::User, "first question"),
            (MessageRole::Assistant, "first answer"),
            (MessageRole::User, "second question"),
            (MessageRole::Assistant, "second answer"),
            (MessageRole::User, "third question"),
        ];
        for (message, (role, content)) in messages.iter().zip(expected) {
            assert_eq!(message.role, role);
            assert_eq!(message.content, content);
        }
    }

    #[test]
    fn no_system_prompt_starts_with_user() {
        let messages = build_messages(None, &[], "hi");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[test]
    fn chat_request_serializes_to_wire_shape() {
        let request = ChatRequest {
            model: "dolphin-llama3:8b",
            messages: build_messages(Some("persona"), &[], "hi"),
            stream: false,
        };
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["model"], "dolphin-llama3:8b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["role"], "user");
        assert_eq!(value["messages"][1]["content"], "hi");
    }

    #[test]
    fn generate_request_serializes_to_wire_shape() {
        let request = GenerateRequest {
            model: "llava-llama3:latest",
            prompt: "What is in the image?",
            images: vec!["aGVsbG8=".to_string()],
            stream: false,
        };
        let value = serde_json::to_value(&request).expect("serialize");

        assert_eq!(value["model"], "llava-llama3:latest");
        assert_eq!(value["prompt"], "What is in the image?");
        assert_eq!(value["images"][0], "aGVsbG8=");
        assert_eq!(value["stream"], false);
    }
}
