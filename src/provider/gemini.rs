use serde::{Deserialize, Serialize};

use super::{transport_error, status_error, ChatBackend, Provider, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const TIMEOUT_SECS: u64 = 300;

/// Separator label used when folding system instructions and user content
/// into Gemini's single-prompt shape.
const USER_INPUT_MARKER: &str = "USER INPUT:";

/// Google Gemini backend over `generateContent`.
///
/// Gemini favors a single combined prompt, so system instructions and user
/// content are concatenated with a `USER INPUT:` marker instead of being
/// sent as separate roles.
pub struct GeminiChat {
    base_url: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

impl GeminiChat {
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

/// Fold system instructions and user content into one prompt.
fn combine_prompt(system: &str, user: &str) -> String {
    format!("{system}\n\n{USER_INPUT_MARKER} {user}")
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl ChatBackend for GeminiChat {
    fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: combine_prompt(system, user),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| transport_error(Provider::Gemini, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(Provider::Gemini, status, body));
        }

        let parsed: GenerateResponse = response.json().map_err(|e| ProviderError::Backend {
            provider: Provider::Gemini,
            message: format!("response parsing failed: {e}"),
        })?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| ProviderError::Backend {
                provider: Provider::Gemini,
                message: "response contained no candidates".into(),
            })
    }
}
