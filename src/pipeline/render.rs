//! PDF rasterisation: render the selected pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto a dedicated blocking
//! thread so the Tokio workers never stall during CPU-heavy rendering.
//!
//! ## Resolution
//!
//! Pages are scaled by `dpi / 72` (PDF user space is 72 units per inch) and
//! the longest edge is capped at `max_rendered_pixels`, so an unusually
//! large page cannot blow up memory or the provider's upload limit.
//!
//! The pdfium document handle is owned by the blocking closure and dropped
//! before it returns, on success and on every error path.

use crate::config::ReviewConfig;
use crate::error::ReviewError;
use crate::output::DocumentInfo;
use crate::progress::ProgressCallback;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Points per inch in PDF user space.
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// A rasterised page, tagged with its 1-based page number.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub page: u32,
    pub image: DynamicImage,
}

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, then a library sitting in the
/// working directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, ReviewError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path)
            .map_err(|e| ReviewError::PdfiumBindingFailed(format!("{path}: {e:?}")))?,
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| ReviewError::PdfiumBindingFailed(format!("{e:?}")))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Rasterise the given 1-based pages of a PDF.
///
/// Pages beyond the document's page count are skipped with a warning; the
/// result keeps the order of `pages`.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ReviewConfig,
    pages: &[u32],
) -> Result<Vec<PageImage>, ReviewError> {
    let path = pdf_path.to_path_buf();
    let dpi = config.dpi;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();
    let pages = pages.to_vec();
    let progress = config.progress_callback.clone();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(
            &path,
            dpi,
            max_pixels,
            password.as_deref(),
            &pages,
            progress.as_ref(),
        )
    })
    .await
    .map_err(|e| ReviewError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    dpi: u32,
    max_pixels: u32,
    password: Option<&str>,
    pages: &[u32],
    progress: Option<&ProgressCallback>,
) -> Result<Vec<PageImage>, ReviewError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let doc_pages = document.pages();
    let total_pages = doc_pages.len() as usize;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(dpi as f32 / PDF_POINTS_PER_INCH)
        .set_maximum_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let in_range = pages
        .iter()
        .filter(|&&p| p >= 1 && p as usize <= total_pages)
        .count();
    if let Some(cb) = progress {
        cb.on_render_start(in_range);
    }

    let mut results = Vec::with_capacity(in_range);

    for &page_num in pages {
        if page_num < 1 || page_num as usize > total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                page_num, total_pages
            );
            continue;
        }

        let page = doc_pages
            .get((page_num - 1) as u16)
            .map_err(|e| ReviewError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page.render_with_config(&render_config).map_err(|e| {
            ReviewError::RasterisationFailed {
                page: page_num,
                detail: format!("{:?}", e),
            }
        })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        if let Some(cb) = progress {
            cb.on_page_rendered(page_num, in_range);
        }
        results.push(PageImage {
            page: page_num,
            image,
        });
    }

    Ok(results)
}

/// Extract document metadata from a PDF without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ReviewError> {
    let path: PathBuf = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());

    tokio::task::spawn_blocking(move || extract_metadata_blocking(&path, pwd.as_deref()))
        .await
        .map_err(|e| ReviewError::Internal(format!("Metadata task panicked: {}", e)))?
}

/// Blocking implementation of metadata extraction.
fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
) -> Result<DocumentInfo, ReviewError> {
    let pdfium = bind_pdfium()?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();

    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata.get(tag).and_then(|t| {
            let v = t.value().to_string();
            if v.is_empty() {
                None
            } else {
                Some(v)
            }
        })
    };

    Ok(DocumentInfo {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count: document.pages().len() as usize,
        pdf_version: format!("{:?}", document.version()),
    })
}

/// Open a document, classifying pdfium's load errors.
fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, ReviewError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                ReviewError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                ReviewError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            ReviewError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}
