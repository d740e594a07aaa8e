//! Extraction pipeline: PREPROCESS → OCR → STRUCTURE.
//!
//! Each phase can exit with an error; later phases never run after a
//! failure. Temporary page images are deleted on every exit path.

use std::path::Path;

use tempfile::NamedTempFile;

use super::ocr::OllamaOcr;
use super::pdf::PdfiumRenderer;
use super::types::{OcrEngine, PageRenderer, StructuredRecord};
use super::ExtractionError;
use crate::pipeline::prompts::STRUCTURING_PROMPT;
use crate::pipeline::sanitize::isolate_json;
use crate::provider::ChatBackend;

/// Raster formats accepted as-is, without a preprocessing render.
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "tif", "tiff", "bmp", "webp"];

/// Document extraction pipeline.
///
/// The renderer and OCR engine are fixed at construction; the structuring
/// backend is supplied per call because it is the caller's provider choice.
pub struct ExtractionPipeline {
    renderer: Box<dyn PageRenderer>,
    ocr: Box<dyn OcrEngine>,
}

impl ExtractionPipeline {
    pub fn new(renderer: Box<dyn PageRenderer>, ocr: Box<dyn OcrEngine>) -> Self {
        Self { renderer, ocr }
    }

    /// Production pipeline: PDFium rendering + local `deepseek-ocr`.
    pub fn production(ollama_url: &str, ocr_model: &str) -> Self {
        Self::new(
            Box::new(PdfiumRenderer),
            Box::new(OllamaOcr::new(ollama_url, ocr_model, 300)),
        )
    }

    /// Run the full pipeline on an uploaded document.
    pub fn run(
        &self,
        file_path: &Path,
        structurer: &dyn ChatBackend,
    ) -> Result<StructuredRecord, ExtractionError> {
        let _span = tracing::info_span!("extract", file = %file_path.display()).entered();

        // PREPROCESS — PDFs get their first page rendered to a temp PNG.
        // The guard keeps the temp file alive through OCR and removes it
        // when this function returns, on success and on error alike.
        let mut page_guard: Option<NamedTempFile> = None;
        let extension = file_path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        let image_path: &Path = if extension == "pdf" {
            let temp = self.renderer.render_first_page(file_path)?;
            page_guard.get_or_insert(temp).path()
        } else if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            file_path
        } else {
            return Err(ExtractionError::UnsupportedFormat(format!(
                "unrecognized extension '.{extension}'"
            )));
        };

        // OCR — always the pinned local model.
        let raw_text = self.ocr.transcribe(image_path)?;
        tracing::info!(text_len = raw_text.len(), "OCR phase complete");

        // STRUCTURE — caller-selected backend turns raw text into the
        // record schema. The raw transcription is discarded on failure.
        let response = structurer
            .chat(STRUCTURING_PROMPT, &format!("OCR TEXT:\n{raw_text}"))
            .map_err(|e| ExtractionError::Structuring(e.to_string()))?;

        let json = isolate_json(&response);
        let record: StructuredRecord = serde_json::from_str(&json)
            .map_err(|e| ExtractionError::Structuring(format!("invalid JSON: {e}")))?;

        tracing::info!(
            mrn = record.mrn().unwrap_or("<none>"),
            diagnoses = record.clinical.diagnosis_list.len(),
            "structuring phase complete"
        );

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use super::*;
    use crate::pipeline::extraction::ocr::MockOcr;
    use crate::pipeline::extraction::pdf::{minimal_png, FailingPageRenderer, MockPageRenderer};
    use crate::provider::{MockChatBackend, Provider};

    const STRUCTURED_REPLY: &str = r#"```json
{
  "patient": {"full_name": "Ana Morales", "dob": "1975-08-02", "mrn": "MRN-7001"},
  "encounter": {"date": "2026-03-10", "provider": "Dr. Lindqvist", "facility": "Harborview"},
  "clinical": {
    "diagnosis_list": ["Hypertension"],
    "medications": [{"name": "Amlodipine", "dosage": "5mg", "frequency": "daily"}],
    "vitals": {"bp": "140/90", "hr": "78"}
  }
}
```"#;

    /// Renderer that records the path of the temp file it hands out.
    struct TrackingRenderer {
        last_path: Mutex<Option<PathBuf>>,
    }

    impl TrackingRenderer {
        fn new() -> Self {
            Self {
                last_path: Mutex::new(None),
            }
        }
    }

    impl PageRenderer for TrackingRenderer {
        fn render_first_page(&self, _pdf_path: &Path) -> Result<NamedTempFile, ExtractionError> {
            let mut temp = tempfile::Builder::new().suffix(".png").tempfile()?;
            temp.write_all(&minimal_png())?;
            *self.last_path.lock().unwrap() = Some(temp.path().to_path_buf());
            Ok(temp)
        }
    }

    fn image_fixture() -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(&minimal_png()).unwrap();
        file
    }

    #[test]
    fn image_upload_produces_structured_record() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::transcribing("BP 140/90 HR 78 Dx: Hypertension")),
        );
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);
        let image = image_fixture();

        let record = pipeline.run(image.path(), &backend).unwrap();
        assert_eq!(record.mrn(), Some("MRN-7001"));
        assert_eq!(record.clinical.vitals["bp"], "140/90");
        assert!(!record.clinical.diagnosis_list.is_empty());
    }

    #[test]
    fn pdf_rasterizer_failure_skips_ocr() {
        let ocr = std::sync::Arc::new(MockOcr::transcribing("should never run"));
        let pipeline =
            ExtractionPipeline::new(Box::new(FailingPageRenderer), Box::new(ocr.clone()));
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);

        let err = pipeline.run(Path::new("visit.pdf"), &backend).unwrap_err();
        assert!(err.to_string().contains("PDF Conversion failed"), "{err}");
        assert_eq!(ocr.call_count(), 0, "OCR must not run after render failure");
    }

    #[test]
    fn pdf_temp_image_is_removed_after_success() {
        let renderer = std::sync::Arc::new(TrackingRenderer::new());
        let pipeline = ExtractionPipeline::new(
            Box::new(renderer.clone()),
            Box::new(MockOcr::transcribing("some legible text")),
        );
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);

        pipeline.run(Path::new("visit.pdf"), &backend).unwrap();

        let path = renderer.last_path.lock().unwrap().clone().unwrap();
        assert!(!path.exists(), "temp page image should be deleted");
    }

    #[test]
    fn pdf_temp_image_is_removed_after_structuring_failure() {
        let renderer = std::sync::Arc::new(TrackingRenderer::new());
        let pipeline = ExtractionPipeline::new(
            Box::new(renderer.clone()),
            Box::new(MockOcr::transcribing("some legible text")),
        );
        let backend = MockChatBackend::failing(Provider::OpenAi, "HTTP 429: rate limited");

        let err = pipeline.run(Path::new("visit.pdf"), &backend).unwrap_err();
        assert!(matches!(err, ExtractionError::Structuring(_)));

        let path = renderer.last_path.lock().unwrap().clone().unwrap();
        assert!(!path.exists(), "temp page image should be deleted on error");
    }

    #[test]
    fn unsupported_extension_is_a_format_error() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::transcribing("unused")),
        );
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);

        let err = pipeline.run(Path::new("notes.docx"), &backend).unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat(_)));
        assert!(err.to_string().contains("docx"));
    }

    #[test]
    fn ocr_failure_stops_before_structuring() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::failing("model not pulled")),
        );
        // A backend reply is configured, but OCR failure must short-circuit.
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);
        let image = image_fixture();

        let err = pipeline.run(image.path(), &backend).unwrap_err();
        assert!(matches!(err, ExtractionError::Ocr(_)));
    }

    #[test]
    fn adapter_failure_surfaces_as_structuring_error() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::transcribing("BP 120/80")),
        );
        let backend = MockChatBackend::failing(Provider::Gemini, "quota exceeded");
        let image = image_fixture();

        let err = pipeline.run(image.path(), &backend).unwrap_err();
        assert!(err.to_string().contains("Structuring failed"));
        assert!(err.to_string().contains("Error with Gemini"));
    }

    #[test]
    fn non_json_reply_surfaces_as_structuring_error() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::transcribing("BP 120/80")),
        );
        let backend = MockChatBackend::replying("I could not read the document, sorry.");
        let image = image_fixture();

        let err = pipeline.run(image.path(), &backend).unwrap_err();
        assert!(matches!(err, ExtractionError::Structuring(_)));
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn uppercase_image_extension_is_accepted() {
        let pipeline = ExtractionPipeline::new(
            Box::new(MockPageRenderer),
            Box::new(MockOcr::transcribing("text")),
        );
        let backend = MockChatBackend::replying(STRUCTURED_REPLY);

        // Extension matching is case-insensitive; the mock OCR never reads
        // the file so a nonexistent path is fine here.
        let record = pipeline.run(Path::new("SCAN.PNG"), &backend).unwrap();
        assert_eq!(record.mrn(), Some("MRN-7001"));
    }
}
