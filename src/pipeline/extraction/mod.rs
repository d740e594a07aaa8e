pub mod ocr;
pub mod orchestrator;
pub mod pdf;
pub mod types;

pub use ocr::*;
pub use orchestrator::*;
pub use pdf::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Could not process file format: {0}")]
    UnsupportedFormat(String),

    #[error("PDF Conversion failed: {0}")]
    PdfConversion(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Structuring failed: {0}")]
    Structuring(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
