//! Error types for the edgequake-slide-review library.
//!
//! Only fatal failures live here. A malformed model reply is *not* an error:
//! [`crate::pipeline::reconcile`] degrades it into a synthetic `unknown`
//! issue so the run still produces output. Everything in [`ReviewError`]
//! stops the run: a missing or corrupt document, an unusable page range, a
//! review service that cannot be reached, or a misused review session.
//!
//! There are no partial results: if the single review call fails, no issues
//! are returned for any page of the batch.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-slide-review library.
#[derive(Debug, Error)]
pub enum ReviewError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The requested page range is malformed or does not fit the document.
    #[error("Invalid page range {start}-{end}: {reason}")]
    InvalidPageRange {
        start: u32,
        end: u32,
        reason: String,
    },

    /// None of the requested pages exist in the document, so there is
    /// nothing to send for review.
    #[error("No pages to review: range {start}-{end} is outside the document ({total} pages)")]
    EmptyBatch { start: u32, end: u32, total: usize },

    /// pdfium-render returned an error for a specific page.
    #[error("Rasterisation failed for page {page}: {detail}")]
    RasterisationFailed { page: u32, detail: String },

    // ── Review service errors ─────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The review call failed (network, auth, rate limit, server error).
    /// Not retried.
    #[error("Review service error: {message}")]
    LlmApiError { message: String },

    // ── Session errors ────────────────────────────────────────────────────
    /// The interactive session received an event its current state does not accept.
    #[error("Cannot {event} while the session is {state}")]
    InvalidTransition {
        state: &'static str,
        event: &'static str,
    },

    /// The selected span is larger than one review batch may be.
    #[error("Please select no more than {max} pages (selected {requested})")]
    BatchTooLarge { requested: usize, max: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output CSV file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV stream could not be written or read back.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
The pdfium shared library must be available at runtime. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n\
  • Place libpdfium (pdfium.dll on Windows) in the working directory.\n\
  • Install pdfium system-wide (see bblanchon/pdfium-binaries).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_range_display() {
        let e = ReviewError::InvalidPageRange {
            start: 5,
            end: 3,
            reason: "end page must be >= start page".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("5-3"), "got: {msg}");
        assert!(msg.contains(">= start"), "got: {msg}");
    }

    #[test]
    fn empty_batch_display() {
        let e = ReviewError::EmptyBatch {
            start: 12,
            end: 14,
            total: 10,
        };
        assert!(e.to_string().contains("10 pages"));
    }

    #[test]
    fn batch_too_large_display() {
        let e = ReviewError::BatchTooLarge {
            requested: 7,
            max: 5,
        };
        assert_eq!(
            e.to_string(),
            "Please select no more than 5 pages (selected 7)"
        );
    }

    #[test]
    fn invalid_transition_display() {
        let e = ReviewError::InvalidTransition {
            state: "reviewing",
            event: "reset",
        };
        assert_eq!(e.to_string(), "Cannot reset while the session is reviewing");
    }

    #[test]
    fn api_error_display() {
        let e = ReviewError::LlmApiError {
            message: "401 invalid key".into(),
        };
        assert!(e.to_string().contains("401 invalid key"));
    }
}
