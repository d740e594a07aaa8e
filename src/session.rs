//! Per-request review session context.
//!
//! Everything a reviewer needs to validate one analyzed document travels in
//! an explicit session value with a defined lifecycle: created when
//! analysis completes, cleared when the review ends. No ambient globals.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pipeline::extraction::StructuredRecord;
use crate::pipeline::reasoning::AnalysisResult;

/// The state of one document review, returned to the caller of `/analyze`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSession {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    /// The structured data awaiting human review.
    pub extracted: Option<StructuredRecord>,
    /// Trend/alert analysis, if the reasoning stage ran.
    pub analysis: Option<AnalysisResult>,
    /// Whether a prior visit was found for this patient.
    pub history_available: bool,
    /// Where the uploaded document was stored, for display alongside the
    /// extracted data.
    pub document_path: Option<PathBuf>,
}

impl ReviewSession {
    /// Start a session for a completed analysis.
    pub fn new(
        extracted: StructuredRecord,
        analysis: AnalysisResult,
        history_available: bool,
        document_path: PathBuf,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            extracted: Some(extracted),
            analysis: Some(analysis),
            history_available,
            document_path: Some(document_path),
        }
    }

    /// End the session: drop the reviewed payload, keep only the identity.
    pub fn clear(&mut self) {
        self.extracted = None;
        self.analysis = None;
        self.history_available = false;
        self.document_path = None;
    }
}
