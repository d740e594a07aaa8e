use serde::{Deserialize, Serialize};

use super::{transport_error, status_error, ChatBackend, Provider, ProviderError};

/// Local Ollama backend over `/api/chat`.
///
/// Ollama supports distinct system/user roles, so instructions and content
/// go out as separate messages. No credential is involved.
pub struct OllamaChat {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaChat {
    pub fn new(base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        }
    }

    /// Default Ollama instance at localhost:11434 with 5-minute timeout.
    pub fn default_local(model: &str) -> Self {
        Self::new("http://localhost:11434", model, 300)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

impl ChatBackend for OllamaChat {
    fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .map_err(|e| transport_error(Provider::Ollama, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(Provider::Ollama, status, body));
        }

        let parsed: ChatResponse = response.json().map_err(|e| ProviderError::Backend {
            provider: Provider::Ollama,
            message: format!("response parsing failed: {e}"),
        })?;

        Ok(parsed.message.content)
    }
}
