//! Input resolution: validate a local PDF path or materialise uploaded bytes.
//!
//! pdfium needs a file-system path. Uploaded bytes are written to a
//! `NamedTempFile` that lives inside [`ResolvedInput`], so the copy is
//! deleted when the value is dropped, on success, error or panic alike.
//! PDF magic bytes (`%PDF`) are checked before returning so callers get a
//! meaningful error rather than a pdfium failure.

use crate::error::ReviewError;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// The resolved input: either a local path or a managed temporary copy.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input arrived as bytes; the temp file is removed on drop.
    Temporary(NamedTempFile),
}

impl ResolvedInput {
    /// Get the path to the PDF file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Temporary(f) => f.path(),
        }
    }
}

/// Resolve a local file path, validating existence and PDF magic bytes.
pub fn resolve_input(path: impl AsRef<Path>) -> Result<ResolvedInput, ReviewError> {
    let path = path.as_ref().to_path_buf();

    if !path.exists() {
        return Err(ReviewError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ReviewError::NotAPdf { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ReviewError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(ReviewError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Placeholder path reported for errors about in-memory input.
pub const UPLOADED_BYTES: &str = "<uploaded bytes>";

/// Copy in-memory PDF bytes to a managed temp file.
pub fn resolve_bytes(bytes: &[u8]) -> Result<ResolvedInput, ReviewError> {
    if bytes.len() >= 4 && &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(ReviewError::NotAPdf {
            path: PathBuf::from(UPLOADED_BYTES),
            magic,
        });
    }

    let mut tmp = tempfile::Builder::new()
        .prefix("slide-review-")
        .suffix(".pdf")
        .tempfile()
        .map_err(|e| ReviewError::Internal(format!("tempfile: {e}")))?;

    tmp.write_all(bytes)
        .and_then(|_| tmp.flush())
        .map_err(|e| ReviewError::Internal(format!("tempfile write: {e}")))?;

    debug!(
        "Copied {} uploaded bytes to {}",
        bytes.len(),
        tmp.path().display()
    );
    Ok(ResolvedInput::Temporary(tmp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/a/real/file.pdf").unwrap_err();
        assert!(matches!(err, ReviewError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_is_rejected_by_magic() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04 not a pdf").unwrap();
        let err = resolve_input(f.path()).unwrap_err();
        match err {
            ReviewError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_is_accepted() {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        let resolved = resolve_input(f.path()).unwrap();
        assert_eq!(resolved.path(), f.path());
    }

    #[test]
    fn uploaded_bytes_are_removed_on_drop() {
        let resolved = resolve_bytes(b"%PDF-1.4\n%%EOF\n").unwrap();
        let path = resolved.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("pdf"));
        drop(resolved);
        assert!(!path.exists(), "temp copy must be deleted on drop");
    }

    #[test]
    fn uploaded_non_pdf_is_rejected() {
        let err = resolve_bytes(b"<html></html>").unwrap_err();
        match err {
            ReviewError::NotAPdf { path, magic } => {
                assert_eq!(path, PathBuf::from(UPLOADED_BYTES));
                assert_eq!(&magic, b"<htm");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
