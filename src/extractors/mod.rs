use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmSettings;
use crate::core::{EntityExtractor, RawMention};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionChoice {
    message: ChatMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

/// Mention extractor backed by an OpenAI-compatible chat-completions server.
/// The model is prompted to return mentions as a JSON array; entries it gets
/// wrong are dropped rather than failing the whole extraction.
pub struct LlmEntityExtractor {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmEntityExtractor {
    pub fn new(settings: LlmSettings) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        if let Some(key) = &settings.api_key {
            headers.insert(
                reqwest::header::AUTHORIZATION,
                reqwest::header::HeaderValue::from_str(&format!("Bearer {}", key))?,
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        })
    }

    pub async fn check_health(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn generate_structured(&self, prompt: &str, system_prompt: &str) -> Result<Value> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .context("Failed to send request to LLM server")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, error_text);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse completion response")?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No choices in response"))?;

        let content = strip_markdown_fences(choice.message.content.trim());
        serde_json::from_str(content)
            .with_context(|| format!("Failed to parse JSON response: {}", content))
    }
}

/// LLMs routinely wrap JSON answers in markdown code fences.
fn strip_markdown_fences(content: &str) -> &str {
    if let Some(inner) = content
        .strip_prefix("```json")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        inner.trim()
    } else if let Some(inner) = content
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
    {
        inner.trim()
    } else {
        content
    }
}

/// Pull the mention array out of the response, whether the model returned a
/// bare array or wrapped it in a `mentions`/`entities` object.
fn decode_mentions(response: &Value) -> Vec<RawMention> {
    let entries = if let Some(entries) = response.as_array() {
        entries
    } else if let Some(entries) = response
        .get("mentions")
        .or_else(|| response.get("entities"))
        .and_then(Value::as_array)
    {
        entries
    } else {
        return Vec::new();
    };

    let mut mentions = Vec::new();
    for entry in entries {
        match serde_json::from_value::<RawMention>(entry.clone()) {
            Ok(mention) if !mention.mention.trim().is_empty() => mentions.push(mention),
            Ok(_) => debug!("Dropping mention entry with empty span: {}", entry),
            Err(err) => warn!("Dropping undecodable mention entry: {} ({})", entry, err),
        }
    }
    mentions
}

fn build_mention_prompt(text: &str) -> String {
    let mut prompt = String::new();

    prompt.push_str("## Text\n");
    // Truncate to stay within the model's context window.
    let truncated = match text.char_indices().nth(8000) {
        Some((idx, _)) => &text[..idx],
        None => text,
    };
    prompt.push_str(truncated);
    prompt.push_str("\n\n## Instructions\n");
    prompt.push_str(
        r#"List every real-world entity mentioned in the text above.

Return a JSON array where each element has:
- "mention": the exact text span referring to the entity (required)
- "label": a clean display name for the entity
- "type": a short category tag such as human, country, organization, city, work

Do not invent entities that are not in the text. Return JSON only, no
markdown formatting or explanation.

Example:
[
  {"mention": "Alan Turing", "label": "Alan Turing", "type": "human"},
  {"mention": "the United Kingdom", "label": "United Kingdom", "type": "country"}
]
"#,
    );

    prompt
}

const SYSTEM_PROMPT: &str = "You are a named-entity recognition system. You identify mentions of \
real-world entities in text and return them as structured JSON. You are precise: you never list \
entities that do not appear in the text, and you always answer with valid JSON.";

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str) -> Result<Vec<RawMention>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .generate_structured(&build_mention_prompt(text), SYSTEM_PROMPT)
            .await?;

        let mentions = decode_mentions(&response);
        debug!("Extracted {} mentions", mentions.len());
        Ok(mentions)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings_for(server: &mockito::Server) -> LlmSettings {
        LlmSettings {
            base_url: server.url(),
            api_key: None,
            model: "test-model".to_string(),
            temperature: 0.2,
            max_tokens: 512,
            timeout_seconds: 5,
        }
    }

    fn completion_body(content: &str) -> String {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
        .to_string()
    }

    #[test]
    fn test_strip_markdown_fences() {
        assert_eq!(strip_markdown_fences("```json\n[]\n```"), "[]");
        assert_eq!(strip_markdown_fences("```\n[]\n```"), "[]");
        assert_eq!(strip_markdown_fences("[]"), "[]");
    }

    #[test]
    fn test_decode_mentions_is_lenient() {
        let response = json!([
            {"mention": "Alan Turing", "label": "Alan Turing", "type": "human"},
            {"mention": "   "},
            {"label": "no mention field"},
            {"mention": "United Kingdom", "type": "country"}
        ]);

        let mentions = decode_mentions(&response);
        assert_eq!(mentions.len(), 2);
        assert_eq!(mentions[0].mention, "Alan Turing");
        assert_eq!(mentions[1].mention, "United Kingdom");
        assert!(mentions[1].label.is_none());
    }

    #[test]
    fn test_decode_mentions_unwraps_object_envelope() {
        let response = json!({"mentions": [{"mention": "Paris", "type": "city"}]});
        assert_eq!(decode_mentions(&response).len(), 1);

        let response = json!({"entities": [{"mention": "Paris"}]});
        assert_eq!(decode_mentions(&response).len(), 1);

        let response = json!({"unexpected": true});
        assert!(decode_mentions(&response).is_empty());
    }

    #[tokio::test]
    async fn test_extract_parses_fenced_json_response() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_body(completion_body(
                "```json\n[{\"mention\": \"Alan Turing\", \"type\": \"human\"}]\n```",
            ))
            .create_async()
            .await;

        let extractor = LlmEntityExtractor::new(settings_for(&server)).unwrap();
        let mentions = extractor.extract("Alan Turing was born in London.").await.unwrap();

        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].mention, "Alan Turing");
        assert_eq!(mentions[0].entity_type.as_deref(), Some("human"));
    }

    #[tokio::test]
    async fn test_extract_empty_text_skips_the_server() {
        let server = mockito::Server::new_async().await;
        let extractor = LlmEntityExtractor::new(settings_for(&server)).unwrap();

        assert!(extractor.extract("   ").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_extract_surfaces_server_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let extractor = LlmEntityExtractor::new(settings_for(&server)).unwrap();
        assert!(extractor.extract("some text").await.is_err());
    }

    #[tokio::test]
    async fn test_check_health() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/health").create_async().await;

        let extractor = LlmEntityExtractor::new(settings_for(&server)).unwrap();
        assert!(extractor.check_health().await.unwrap());
    }
}
