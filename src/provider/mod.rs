//! Provider-agnostic text generation.
//!
//! Every structuring/reasoning call goes through the [`ChatBackend`] trait:
//! one implementation per supported provider, resolved from a [`Provider`]
//! identifier by [`Provider::backend`]. Calling stages never branch on the
//! provider name themselves.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use anthropic::AnthropicChat;
pub use gemini::GeminiChat;
pub use ollama::OllamaChat;
pub use openai::OpenAiChat;

#[derive(Error, Debug)]
pub enum ProviderError {
    /// The caller named a provider outside the supported set.
    #[error("Error with {provider}: Unsupported provider")]
    Unsupported { provider: String },

    /// Transport, authentication, rate-limit, or backend-side failure.
    /// The message text keeps the `Error with <provider>:` prefix so logs
    /// and API payloads read the same as the adapter's sentinel strings.
    #[error("Error with {provider}: {message}")]
    Backend { provider: Provider, message: String },
}

/// The fixed set of supported text-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provider {
    /// Local Ollama instance. No credential.
    Ollama,
    /// OpenAI chat completions.
    OpenAi,
    /// Google Gemini.
    Gemini,
    /// Anthropic messages API.
    Anthropic,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Ollama => "Ollama",
            Provider::OpenAi => "OpenAI",
            Provider::Gemini => "Gemini",
            Provider::Anthropic => "Anthropic",
        };
        f.write_str(name)
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Provider::Ollama),
            "openai" => Ok(Provider::OpenAi),
            "gemini" => Ok(Provider::Gemini),
            "anthropic" => Ok(Provider::Anthropic),
            _ => Err(ProviderError::Unsupported {
                provider: s.to_string(),
            }),
        }
    }
}

impl Provider {
    /// Build the backend for this provider.
    ///
    /// The credential is ignored for Ollama. For cloud providers it is
    /// passed through unvalidated — a missing or wrong key surfaces as an
    /// authentication error from the remote service on the first call.
    pub fn backend(self, model: &str, api_key: Option<&str>) -> Box<dyn ChatBackend> {
        let key = api_key.unwrap_or_default();
        match self {
            Provider::Ollama => Box::new(OllamaChat::default_local(model)),
            Provider::OpenAi => Box::new(OpenAiChat::new(model, key)),
            Provider::Gemini => Box::new(GeminiChat::new(model, key)),
            Provider::Anthropic => Box::new(AnthropicChat::new(model, key)),
        }
    }
}

/// A text-generation backend: system instructions + user content in,
/// generated text out, verbatim.
pub trait ChatBackend: Send + Sync {
    fn chat(&self, system: &str, user: &str) -> Result<String, ProviderError>;
}

/// Resolve a provider by name and run a single generation call.
///
/// Success returns the backend's text untouched — no trimming, no schema
/// validation. Every expected failure mode comes back as a
/// [`ProviderError`]; this function does not panic on bad input or
/// unreachable backends.
pub fn invoke(
    provider: &str,
    model: &str,
    api_key: Option<&str>,
    system: &str,
    user: &str,
) -> Result<String, ProviderError> {
    let provider: Provider = provider.parse()?;
    tracing::debug!(%provider, model, "dispatching generation call");
    provider.backend(model, api_key).chat(system, user)
}

/// Map a reqwest transport failure to a backend error with a readable cause.
pub(crate) fn transport_error(provider: Provider, e: reqwest::Error) -> ProviderError {
    let message = if e.is_connect() {
        format!("connection failed: {e}")
    } else if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    ProviderError::Backend { provider, message }
}

/// Map a non-success HTTP status (auth failure, rate limit, server error)
/// to a backend error carrying the response body.
pub(crate) fn status_error(
    provider: Provider,
    status: reqwest::StatusCode,
    body: String,
) -> ProviderError {
    ProviderError::Backend {
        provider,
        message: format!("HTTP {}: {}", status.as_u16(), body),
    }
}

/// Mock backend for testing — returns a configured response or error.
pub struct MockChatBackend {
    response: Result<String, (Provider, String)>,
}

impl MockChatBackend {
    pub fn replying(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(provider: Provider, message: &str) -> Self {
        Self {
            response: Err((provider, message.to_string())),
        }
    }
}

impl ChatBackend for MockChatBackend {
    fn chat(&self, _system: &str, _user: &str) -> Result<String, ProviderError> {
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err((provider, message)) => Err(ProviderError::Backend {
                provider: *provider,
                message: message.clone(),
            }),
        }
    }
}
