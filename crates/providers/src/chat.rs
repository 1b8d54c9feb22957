use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use wayfarer_agent::{ChatMessage, CompletionRequest, LlmClient};
use wayfarer_core::config::LlmConfig;

/// Chat-completions client for any OpenAI-compatible endpoint (OpenAI
/// itself, or a local Ollama serving `/v1/chat/completions`).
pub struct OpenAiCompatibleClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

#[derive(Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build chat http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/v1/chat/completions", config.effective_base_url()),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatBody {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.context("chat completion request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat backend error {status}: {error_text}"));
        }

        let parsed: ChatResponse =
            response.json().await.context("chat completion response was not valid JSON")?;
        let content = first_content(parsed).ok_or_else(|| anyhow!("chat backend returned no choices"))?;
        debug!(event_name = "llm.completed", model = %self.model, chars = content.len());
        Ok(content)
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response.choices.into_iter().next().map(|choice| choice.message.content.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use wayfarer_agent::{ChatMessage, CompletionRequest, GenerationSettings};
    use wayfarer_core::config::{LlmConfig, LlmProvider};

    use super::{first_content, ChatBody, ChatResponse, OpenAiCompatibleClient};

    fn config(provider: LlmProvider, base_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: None,
            base_url: base_url.map(str::to_owned),
            model: "llama3.1".to_owned(),
            timeout_secs: 5,
            max_retries: 2,
        }
    }

    #[test]
    fn endpoint_follows_provider_defaults() {
        let ollama = OpenAiCompatibleClient::from_config(&config(LlmProvider::Ollama, None))
            .expect("client");
        assert_eq!(ollama.endpoint(), "http://localhost:11434/v1/chat/completions");

        let custom = OpenAiCompatibleClient::from_config(&config(
            LlmProvider::OpenAi,
            Some("https://llm.internal/"),
        ))
        .expect("client");
        assert_eq!(custom.endpoint(), "https://llm.internal/v1/chat/completions");
    }

    #[test]
    fn request_body_uses_lowercase_roles() {
        let request = CompletionRequest::new(
            vec![ChatMessage::system("rules"), ChatMessage::user("hi")],
            GenerationSettings::new(0.0, 220),
        );
        let body = ChatBody {
            model: "m",
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["max_tokens"], 220);
    }

    #[test]
    fn first_choice_content_is_returned() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"needs\":[]}"}}]}"#,
        )
        .expect("parse");
        assert_eq!(first_content(response).as_deref(), Some("{\"needs\":[]}"));

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert_eq!(first_content(empty), None);
    }
}
