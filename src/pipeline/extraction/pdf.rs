//! PDF page rendering via Google PDFium.
//!
//! Renders page 1 of an uploaded PDF to a PNG temp file for vision OCR.
//! PDFium handles CIDFont encodings, embedded fonts, and form fields that
//! trip up pure-Rust extractors.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each render loads a fresh
//! `Pdfium` instance because the upstream type is `!Send`; the OS caches
//! `dlopen` calls, so repeat loads are near-free.

use std::io::{Cursor, Write};
use std::path::Path;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::types::PageRenderer;
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages.
const MAX_DIMENSION_PX: u32 = 4096;

/// Rendering DPI for vision OCR. 200 DPI balances legibility and
/// inference speed.
const RENDER_DPI: u32 = 200;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG using PDFium.
pub struct PdfiumRenderer;

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to library file)
/// 2. Alongside the running executable
/// 3. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| {
            ExtractionError::PdfConversion(format!("failed to load PDFium from {path}: {e}"))
        })?;
        return Ok(Pdfium::new(bindings));
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let lib_path =
                Pdfium::pdfium_platform_library_name_at_path(exe_dir.to_string_lossy().as_ref());
            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                debug!(dir = %exe_dir.display(), "Loaded PDFium from executable directory");
                return Ok(Pdfium::new(bindings));
            }
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        ExtractionError::PdfConversion(format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ))
    })?;
    Ok(Pdfium::new(bindings))
}

/// Compute pixel dimensions for rendering, clamped to the dimension guard.
/// Preserves aspect ratio when capping.
fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_first_page(&self, pdf_path: &Path) -> Result<NamedTempFile, ExtractionError> {
        let pdf_bytes = std::fs::read(pdf_path)
            .map_err(|e| ExtractionError::PdfConversion(format!("cannot read PDF: {e}")))?;

        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(&pdf_bytes, None)
            .map_err(|e| ExtractionError::PdfConversion(format!("failed to load PDF: {e}")))?;

        let pages = document.pages();
        let page = pages
            .get(0)
            .map_err(|_| ExtractionError::PdfConversion("document has no pages".into()))?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) =
            compute_render_dimensions(width_points, height_points, RENDER_DPI);

        let uncapped_w = (width_points * RENDER_DPI as f32 / POINTS_PER_INCH) as u32;
        if target_w != uncapped_w {
            warn!(
                raw_width = uncapped_w,
                capped_width = target_w,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfConversion(format!("rendering failed: {e}")))?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::PdfConversion(format!("PNG encoding failed: {e}")))?;
        let png_bytes = cursor.into_inner();

        let mut temp = tempfile::Builder::new()
            .prefix("mediscribe-page-")
            .suffix(".png")
            .tempfile()?;
        temp.write_all(&png_bytes)?;
        temp.flush()?;

        debug!(
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            path = %temp.path().display(),
            "Rendered PDF page 1 to PNG"
        );

        Ok(temp)
    }
}

// ── Mocks for testing ─────────────────────────────────────

/// Mock renderer returning a minimal PNG temp file.
pub struct MockPageRenderer;

impl PageRenderer for MockPageRenderer {
    fn render_first_page(&self, _pdf_path: &Path) -> Result<NamedTempFile, ExtractionError> {
        let mut temp = tempfile::Builder::new().suffix(".png").tempfile()?;
        temp.write_all(&minimal_png())?;
        temp.flush()?;
        Ok(temp)
    }
}

/// Mock renderer that always fails, simulating a missing PDFium toolchain.
pub struct FailingPageRenderer;

impl PageRenderer for FailingPageRenderer {
    fn render_first_page(&self, _pdf_path: &Path) -> Result<NamedTempFile, ExtractionError> {
        Err(ExtractionError::PdfConversion(
            "PDFium library not found".into(),
        ))
    }
}

/// 1x1 white pixel PNG, encoded through the same path production uses.
pub(crate) fn minimal_png() -> Vec<u8> {
    let pixel = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
    let mut cursor = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(pixel)
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .expect("in-memory PNG encoding of a 1x1 image cannot fail");
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_under_cap_are_unchanged() {
        // US Letter = 612 x 792 points; 612 * 200/72 ~ 1700, 792 * 200/72 ~ 2200.
        // Float scaling truncates, so allow a pixel of slack.
        let (w, h) = compute_render_dimensions(612.0, 792.0, 200);
        assert!(w >= 1699 && w <= 1700, "Letter width at 200dpi: got {w}");
        assert!(h >= 2199 && h <= 2200, "Letter height at 200dpi: got {h}");
    }

    #[test]
    fn oversized_page_is_capped_preserving_aspect() {
        let (w, h) = compute_render_dimensions(7200.0, 3600.0, 200);
        assert_eq!(w, MAX_DIMENSION_PX);
        assert_eq!(h, MAX_DIMENSION_PX / 2);
    }

    #[test]
    fn degenerate_dimensions_clamp_to_one_pixel() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 200);
        assert_eq!((w, h), (1, 1));
    }

    #[test]
    fn mock_renderer_produces_decodable_png() {
        let temp = MockPageRenderer.render_first_page(Path::new("ignored.pdf")).unwrap();
        let bytes = std::fs::read(temp.path()).unwrap();
        assert!(image::load_from_memory(&bytes).is_ok());
    }

    #[test]
    fn mock_temp_file_is_removed_on_drop() {
        let path = {
            let temp = MockPageRenderer.render_first_page(Path::new("ignored.pdf")).unwrap();
            temp.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn failing_renderer_reports_pdf_conversion() {
        let err = FailingPageRenderer
            .render_first_page(Path::new("scan.pdf"))
            .unwrap_err();
        assert!(err.to_string().contains("PDF Conversion failed"));
    }
}
