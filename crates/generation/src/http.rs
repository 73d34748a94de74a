//! OpenAI-compatible chat-completions generator.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::brief::GenerationBrief;
use crate::content::{GeneratedContent, GenerationError};
use crate::generator::ContentGenerator;

const SYSTEM_PROMPT: &str = "You write short, accurate language-learning material. \
Always answer with a single JSON object.";

/// Connection settings for [`HttpContentGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpGeneratorConfig {
    /// Base URL, e.g. `https://api.openai.com/v1`.
    pub endpoint: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for HttpGeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Generator backed by an OpenAI-compatible HTTP API (OpenAI, Groq, Ollama, ...).
#[derive(Debug, Clone)]
pub struct HttpContentGenerator {
    config: HttpGeneratorConfig,
    client: Client,
}

impl HttpContentGenerator {
    pub fn new(config: HttpGeneratorConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    pub fn config(&self) -> &HttpGeneratorConfig {
        &self.config
    }

    fn url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }
}

#[async_trait]
impl ContentGenerator for HttpContentGenerator {
    async fn generate(&self, brief: &GenerationBrief) -> Result<GeneratedContent, GenerationError> {
        let user_prompt = format!(
            "[mode: {}] [language: {}]\n{}",
            brief.mode, brief.language_hint, brief.brief
        );
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &user_prompt,
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        debug!(model = %self.config.model, mode = %brief.mode, "calling content generator");

        let mut req = self.client.post(self.url()).json(&request);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GenerationError::Failed(format!("HTTP {status}: {body}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("empty completion".to_string()))?;

        parse_completion(&text)
    }
}

/// Parse the completion text, tolerating a fenced ```json block around the object.
fn parse_completion(text: &str) -> Result<GeneratedContent, GenerationError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: serde_json::Value = serde_json::from_str(unfenced.trim())
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
    GeneratedContent::from_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json_completion() {
        let content =
            parse_completion(r#"{"title":"Café","description":"Ordering coffee"}"#).unwrap();
        assert_eq!(content.title, "Café");
    }

    #[test]
    fn parses_fenced_json_completion() {
        let text = "```json\n{\"title\":\"T\",\"description\":\"D\",\"words\":[]}\n```";
        let content = parse_completion(text).unwrap();
        assert_eq!(content.description, "D");
        assert_eq!(content.body, serde_json::json!({ "words": [] }));
    }

    #[test]
    fn rejects_prose_completion() {
        let err = parse_completion("Sure! Here is your lesson.").unwrap_err();
        assert!(matches!(err, GenerationError::InvalidResponse(_)));
    }

    #[test]
    fn url_joins_without_double_slash() {
        let generator = HttpContentGenerator::new(HttpGeneratorConfig {
            endpoint: "https://api.example.com/v1/".to_string(),
            ..Default::default()
        });
        assert_eq!(generator.url(), "https://api.example.com/v1/chat/completions");
    }
}
