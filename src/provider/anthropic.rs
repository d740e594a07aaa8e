use serde::{Deserialize, Serialize};

use super::{transport_error, status_error, ChatBackend, Provider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;
const TIMEOUT_SECS: u64 = 300;

/// Anthropic messages backend.
///
/// The messages API takes system instructions as a dedicated top-level
/// field rather than a message role.
pub struct AnthropicChat {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl AnthropicChat {
    pub fn new(model: &str, api_key: &str) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, model, api_key)
    }

    pub fn with_base_url(base_url: &str, model: &str, api_key: &str) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            client,
        }
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

impl ChatBackend for AnthropicChat {
    fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system,
            messages: vec![Message {
                role: "user",
                content: user,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .map_err(|e| transport_error(Provider::Anthropic, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(Provider::Anthropic, status, body));
        }

        let parsed: MessagesResponse = response.json().map_err(|e| ProviderError::Backend {
            provider: Provider::Anthropic,
            message: format!("response parsing failed: {e}"),
        })?;

        parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::Backend {
                provider: Provider::Anthropic,
                message: "response contained no content blocks".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_top_level_system_field() {
        let body = MessagesRequest {
            model: "claude-sonnet-4-5",
            max_tokens: MAX_TOKENS,
            system: "be terse",
            messages: vec![Message {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "be terse");
        assert_eq!(json["max_tokens"], 4096);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn response_parses_first_content_block() {
        let raw = r#"{"content": [{"type": "text", "text": "{\"ok\": true}"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.content[0].text, "{\"ok\": true}");
    }

    #[test]
    fn unreachable_endpoint_returns_backend_error() {
        let backend =
            AnthropicChat::with_base_url("http://127.0.0.1:9", "claude-sonnet-4-5", "key");
        let err = backend.chat("system", "user").unwrap_err();
        assert!(
            err.to_string().starts_with("Error with Anthropic: "),
            "{err}"
        );
    }
}
