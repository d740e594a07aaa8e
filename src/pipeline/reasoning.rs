//! Clinical reasoning over the current visit vs. stored history.
//!
//! This stage degrades gracefully: a backend failure or unparseable reply
//! yields a fixed "Analysis failed" result instead of an error, so the
//! extracted record can still be reviewed and saved without insights.

use serde::{Deserialize, Serialize};

use super::extraction::StructuredRecord;
use super::prompts::REASONING_PROMPT;
use super::sanitize::isolate_json;
use crate::provider::ChatBackend;

/// Marker embedded in the prompt context when no prior visit exists, so the
/// model does not mistake an empty object for meaningful history.
const NO_HISTORY_MARKER: &str = "None (New Patient)";

/// Alerts, vital trends, and a summary for the current visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub alerts: Vec<String>,
    #[serde(default)]
    pub trends: Vec<Trend>,
    #[serde(default)]
    pub summary: String,
}

/// One vital's direction between visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    #[serde(default)]
    pub metric: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: String,
}

impl AnalysisResult {
    /// The fixed fallback for any reasoning failure.
    pub fn failed() -> Self {
        Self {
            alerts: Vec::new(),
            trends: Vec::new(),
            summary: "Analysis failed".to_string(),
        }
    }
}

/// Build the comparison context handed to the model.
fn build_context(current: &StructuredRecord, past: Option<&StructuredRecord>) -> Option<String> {
    let current_json = serde_json::to_string(current).ok()?;
    let past_part = match past {
        Some(record) => serde_json::to_string(record).ok()?,
        None => NO_HISTORY_MARKER.to_string(),
    };
    Some(format!(
        "CURRENT_DATA: {current_json}\nPAST_DATA: {past_part}"
    ))
}

/// Compare the current visit against prior history (if any).
///
/// Never returns an error: adapter failures and malformed replies collapse
/// to [`AnalysisResult::failed`].
pub fn analyze(
    backend: &dyn ChatBackend,
    current: &StructuredRecord,
    past: Option<&StructuredRecord>,
) -> AnalysisResult {
    let Some(context) = build_context(current, past) else {
        return AnalysisResult::failed();
    };

    let response = match backend.chat(REASONING_PROMPT, &context) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "reasoning call failed");
            return AnalysisResult::failed();
        }
    };

    match serde_json::from_str(&isolate_json(&response)) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "reasoning reply was not valid JSON");
            AnalysisResult::failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::provider::{MockChatBackend, Provider, ProviderError};

    /// Backend that records the user content it was handed.
    struct CapturingBackend {
        seen: Mutex<Option<String>>,
        reply: String,
    }

    impl CapturingBackend {
        fn new(reply: &str) -> Self {
            Self {
                seen: Mutex::new(None),
                reply: reply.to_string(),
            }
        }
    }

    impl ChatBackend for CapturingBackend {
        fn chat(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            *self.seen.lock().unwrap() = Some(user.to_string());
            Ok(self.reply.clone())
        }
    }

    fn record_with_bp(bp: &str) -> StructuredRecord {
        let raw = format!(
            r#"{{"patient": {{"mrn": "MRN-1"}}, "clinical": {{"vitals": {{"bp": "{bp}"}}}}}}"#
        );
        serde_json::from_str(&raw).unwrap()
    }

    const ANALYSIS_REPLY: &str = r#"```json
{
  "alerts": ["BP trending up"],
  "trends": [{"metric": "BP", "status": "Worsening", "details": "120/80 -> 140/90"}],
  "summary": "Blood pressure has worsened since the last visit."
}
```"#;

    #[test]
    fn new_patient_context_carries_no_history_marker() {
        let backend = CapturingBackend::new(ANALYSIS_REPLY);
        analyze(&backend, &record_with_bp("120/80"), None);

        let seen = backend.seen.lock().unwrap().clone().unwrap();
        assert!(seen.contains("PAST_DATA: None (New Patient)"), "{seen}");
        assert!(seen.contains("CURRENT_DATA: "));
    }

    #[test]
    fn past_record_content_is_embedded() {
        let backend = CapturingBackend::new(ANALYSIS_REPLY);
        let past = record_with_bp("120/80");
        analyze(&backend, &record_with_bp("140/90"), Some(&past));

        let seen = backend.seen.lock().unwrap().clone().unwrap();
        assert!(seen.contains("140/90"));
        assert!(seen.contains("120/80"));
        assert!(!seen.contains("New Patient"));
    }

    #[test]
    fn worsening_bp_parses_into_trend() {
        let backend = MockChatBackend::replying(ANALYSIS_REPLY);
        let past = record_with_bp("120/80");
        let result = analyze(&backend, &record_with_bp("140/90"), Some(&past));

        let bp = result.trends.iter().find(|t| t.metric == "BP").unwrap();
        assert_eq!(bp.status, "Worsening");
        assert_eq!(bp.details, "120/80 -> 140/90");
        assert_eq!(result.alerts.len(), 1);
    }

    #[test]
    fn adapter_failure_returns_exact_fallback() {
        let backend = MockChatBackend::failing(Provider::Ollama, "connection failed");
        let result = analyze(&backend, &record_with_bp("120/80"), None);

        assert_eq!(
            result,
            AnalysisResult {
                alerts: vec![],
                trends: vec![],
                summary: "Analysis failed".to_string(),
            }
        );
    }

    #[test]
    fn malformed_reply_returns_fallback() {
        let backend = MockChatBackend::replying("The patient seems fine to me.");
        let result = analyze(&backend, &record_with_bp("120/80"), None);
        assert_eq!(result, AnalysisResult::failed());
    }

    #[test]
    fn partial_reply_fields_default_instead_of_failing() {
        let backend = MockChatBackend::replying(r#"{"summary": "stable"}"#);
        let result = analyze(&backend, &record_with_bp("120/80"), None);
        assert_eq!(result.summary, "stable");
        assert!(result.alerts.is_empty());
        assert!(result.trends.is_empty());
    }
}
