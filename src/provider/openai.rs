use serde::{Deserialize, Serialize};

use super::{transport_error, status_error, ChatBackend, Provider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const TIMEOUT_SECS: u64 = 300;

/// OpenAI chat completions backend.
///
/// Requests `response_format: json_object` so the service constrains output
/// to machine-parseable JSON. Best-effort only — the sanitizer still runs on
/// whatever comes back.
pub struct OpenAiChat {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl OpenAiChat {
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
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    response_format: ResponseFormat<'a>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl ChatBackend for OpenAiChat {
    fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = CompletionRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: system,
                },
                Message {
                    role: "user",
                    content: user,
                },
            ],
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| transport_error(Provider::OpenAi, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(Provider::OpenAi, status, body));
        }

        let parsed: CompletionResponse = response.json().map_err(|e| ProviderError::Backend {
            provider: Provider::OpenAi,
            message: format!("response parsing failed: {e}"),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProviderError::Backend {
                provider: Provider::OpenAi,
                message: "response contained no choices".into(),
            })
    }
}
