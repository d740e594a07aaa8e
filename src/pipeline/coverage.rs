//! Insurance eligibility check against free-text policy content.
//!
//! Fail-closed: an unparseable or erroring eligibility check comes back as
//! not eligible rather than silently succeeding.

use serde::{Deserialize, Serialize};

use super::extraction::StructuredRecord;
use super::prompts::COVERAGE_PROMPT;
use super::sanitize::isolate_json;
use crate::provider::ChatBackend;

/// Policy text beyond this many characters is dropped before prompting.
/// Unconditional and silent; context-window economy over completeness.
const POLICY_CHAR_LIMIT: usize = 4000;

/// Eligibility determination for a diagnosis vs. a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageResult {
    #[serde(default)]
    pub eligible: bool,
    /// High/Medium/Low by convention; free text, not enforced.
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub missing_info: Vec<String>,
}

impl CoverageResult {
    /// Fail-closed default carrying the failure message.
    fn denied(message: &str) -> Self {
        Self {
            eligible: false,
            confidence: String::new(),
            reasoning: format!("Error: {message}"),
            missing_info: Vec::new(),
        }
    }
}

/// Truncate to the first `limit` characters (not bytes).
fn truncate_chars(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Check whether the extracted clinical data is likely covered by a policy.
///
/// Never returns an error: adapter failures and malformed replies collapse
/// to a not-eligible result whose reasoning starts with `Error:`.
pub fn check_coverage(
    backend: &dyn ChatBackend,
    medical: &StructuredRecord,
    policy_text: &str,
) -> CoverageResult {
    let medical_json = match serde_json::to_string(medical) {
        Ok(json) => json,
        Err(e) => return CoverageResult::denied(&e.to_string()),
    };

    let policy = truncate_chars(policy_text, POLICY_CHAR_LIMIT);
    let context = format!("MEDICAL_DATA: {medical_json}\nINSURANCE_POLICY_TEXT: {policy}");

    let response = match backend.chat(COVERAGE_PROMPT, &context) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "coverage call failed");
            return CoverageResult::denied(&e.to_string());
        }
    };

    match serde_json::from_str(&isolate_json(&response)) {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, "coverage reply was not valid JSON");
            CoverageResult::denied(&format!("invalid JSON: {e}"))
        }
    }
}
