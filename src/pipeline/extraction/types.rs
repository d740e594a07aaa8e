use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::ExtractionError;

/// A digitized medical record as produced by the structuring phase.
///
/// Every field is optional by design: models return whatever the document
/// legibly contains, and absence means "unknown", never an error. Consumers
/// must not treat missing sections as failures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StructuredRecord {
    #[serde(default)]
    pub patient: Patient,
    #[serde(default)]
    pub encounter: Encounter,
    #[serde(default)]
    pub clinical: Clinical,
}

impl StructuredRecord {
    /// The history lookup key. No MRN means no history lookup is possible
    /// and the record is treated as a new patient.
    pub fn mrn(&self) -> Option<&str> {
        self.patient.mrn.as_deref()
    }
}

/// Patient demographics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Patient {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub dob: Option<String>,
    #[serde(default)]
    pub mrn: Option<String>,
}

/// Visit metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Encounter {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub facility: Option<String>,
}

/// Clinical findings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Clinical {
    #[serde(default)]
    pub diagnosis_list: Vec<String>,
    #[serde(default)]
    pub medications: Vec<Medication>,
    #[serde(default)]
    pub vitals: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Medication {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
}

/// Renders the first page of a PDF to a raster image on disk.
///
/// Returns a [`NamedTempFile`] so the page image is deleted on every exit
/// path once the handle drops, success or failure.
pub trait PageRenderer: Send + Sync {
    fn render_first_page(&self, pdf_path: &Path) -> Result<NamedTempFile, ExtractionError>;
}

/// Transcribes a document image to raw text.
pub trait OcrEngine: Send + Sync {
    fn transcribe(&self, image_path: &Path) -> Result<String, ExtractionError>;
}

impl<T: PageRenderer + ?Sized> PageRenderer for std::sync::Arc<T> {
    fn render_first_page(&self, pdf_path: &Path) -> Result<NamedTempFile, ExtractionError> {
        (**self).render_first_page(pdf_path)
    }
}

impl<T: OcrEngine + ?Sized> OcrEngine for std::sync::Arc<T> {
    fn transcribe(&self, image_path: &Path) -> Result<String, ExtractionError> {
        (**self).transcribe(image_path)
    }
}
