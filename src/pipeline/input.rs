//! Input validation: make sure a user-supplied path is a readable PDF.
//!
//! pdfium reports a missing or non-PDF file as a generic load failure. We
//! check existence, read permission and the `%PDF` magic bytes first so the
//! caller gets an error that names the actual problem.

use crate::error::ExtractError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The four bytes every PDF file starts with.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Validate a local PDF path and return it unchanged.
pub fn resolve_local(path: &Path) -> Result<PathBuf, ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let mut file = match std::fs::File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    };

    let mut magic = [0u8; 4];
    let read = read_prefix(&mut file, &mut magic).map_err(|e| ExtractError::Internal(format!(
        "reading '{}': {e}",
        path.display()
    )))?;
    if read < magic.len() || &magic != PDF_MAGIC {
        return Err(ExtractError::NotAPdf {
            path: path.to_path_buf(),
            magic,
        });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path.to_path_buf())
}

/// Check in-memory bytes for the PDF magic.
pub fn check_magic(bytes: &[u8], label: &Path) -> Result<(), ExtractError> {
    if bytes.starts_with(PDF_MAGIC) {
        return Ok(());
    }
    let mut magic = [0u8; 4];
    let n = bytes.len().min(4);
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(ExtractError::NotAPdf {
        path: label.to_path_buf(),
        magic,
    })
}

/// Fill as much of `buf` as the file allows; short files are not an error.
fn read_prefix(file: &mut std::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_reported() {
        let err = resolve_local(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn accepts_pdf_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n%...").unwrap();
        let path = resolve_local(f.path()).unwrap();
        assert_eq!(path, f.path());
    }

    #[test]
    fn rejects_other_files() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zipdata").unwrap();
        match resolve_local(f.path()).unwrap_err() {
            ExtractError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn rejects_short_files() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_local(f.path()).unwrap_err(),
            ExtractError::NotAPdf { .. }
        ));
    }

    #[test]
    fn checks_bytes() {
        assert!(check_magic(b"%PDF-1.4", Path::new("<bytes>")).is_ok());
        assert!(check_magic(b"", Path::new("<bytes>")).is_err());
        assert!(check_magic(b"hello", Path::new("<bytes>")).is_err());
    }
}
