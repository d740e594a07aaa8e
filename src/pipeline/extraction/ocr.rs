//! Local OCR via Ollama vision chat.
//!
//! OCR is pinned to one specialized local model (`deepseek-ocr`) no matter
//! which provider the caller selected for structuring: general-purpose chat
//! models transcribe dense tabular medical layouts poorly, while the
//! structuring phase is a pure text-to-text task any backend can serve.

use std::path::Path;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use super::types::OcrEngine;
use super::ExtractionError;

/// The dedicated local transcription model.
pub const DEFAULT_OCR_MODEL: &str = "deepseek-ocr";

/// Verbatim-transcription instruction sent with each page image.
const OCR_PROMPT: &str = "Transcribe this medical document text exactly.";

/// Vision OCR engine backed by a local Ollama instance.
pub struct OllamaOcr {
    base_url: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OllamaOcr {
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

    /// Default local instance with the pinned OCR model and 5-minute timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", DEFAULT_OCR_MODEL, 300)
    }
}

/// Request body for Ollama `/api/chat` with image attachments.
#[derive(Serialize)]
struct VisionChatRequest<'a> {
    model: &'a str,
    messages: Vec<VisionChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct VisionChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    /// Base64-encoded images.
    images: Vec<String>,
}

#[derive(Deserialize)]
struct VisionChatResponse {
    message: VisionResponseMessage,
}

#[derive(Deserialize)]
struct VisionResponseMessage {
    content: String,
}

impl OcrEngine for OllamaOcr {
    fn transcribe(&self, image_path: &Path) -> Result<String, ExtractionError> {
        let start = std::time::Instant::now();

        let image_bytes = std::fs::read(image_path)
            .map_err(|e| ExtractionError::Ocr(format!("cannot read page image: {e}")))?;
        let base64_image = base64::engine::general_purpose::STANDARD.encode(&image_bytes);

        let url = format!("{}/api/chat", self.base_url);
        let body = VisionChatRequest {
            model: &self.model,
            messages: vec![VisionChatMessage {
                role: "user",
                content: OCR_PROMPT,
                images: vec![base64_image],
            }],
            stream: false,
        };

        let response = self.client.post(&url).json(&body).send().map_err(|e| {
            if e.is_connect() {
                ExtractionError::Ocr(format!("Ollama is not running at {}", self.base_url))
            } else if e.is_timeout() {
                ExtractionError::Ocr("transcription timed out".into())
            } else {
                ExtractionError::Ocr(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(ExtractionError::Ocr(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let parsed: VisionChatResponse = response
            .json()
            .map_err(|e| ExtractionError::Ocr(format!("response parsing failed: {e}")))?;

        tracing::info!(
            model = %self.model,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = parsed.message.content.len(),
            "OCR transcription complete"
        );

        Ok(parsed.message.content)
    }
}

/// Mock OCR engine for testing — returns configured text or an error.
pub struct MockOcr {
    response: Result<String, String>,
    calls: std::sync::atomic::AtomicUsize,
}

impl MockOcr {
    pub fn transcribing(text: &str) -> Self {
        Self {
            response: Ok(text.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            response: Err(message.to_string()),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of transcribe calls seen so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcr {
    fn transcribe(&self, _image_path: &Path) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        match &self.response {
            Ok(text) => Ok(text.clone()),
            Err(message) => Err(ExtractionError::Ocr(message.clone())),
        }
    }
}
