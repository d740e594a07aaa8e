//! The three-stage document pipeline: extraction (OCR + structuring),
//! clinical reasoning, and insurance coverage.

pub mod coverage;
pub mod extraction;
pub mod prompts;
pub mod reasoning;
pub mod sanitize;

pub use coverage::{check_coverage, CoverageResult};
pub use extraction::{ExtractionError, ExtractionPipeline, StructuredRecord};
pub use reasoning::{analyze, AnalysisResult, Trend};
pub use sanitize::isolate_json;
