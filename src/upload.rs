//! File intake: type gate, whole-file read and the upfront credit estimate.

use crate::error::{AppError, Result};
use std::path::Path;

const CSV_MIME: &str = "text/csv";
const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";

/// Rough bytes-per-address figure behind the upfront credit estimate.
const BYTES_PER_ADDRESS: u64 = 50;

/// Upload types accepted at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    /// `.xlsx`/`.xls`. Only text content is readable; a binary workbook fails
    /// with [`AppError::FileRead`].
    Spreadsheet,
}

impl FileKind {
    pub fn from_mime(mime: &str) -> Result<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            CSV_MIME => Ok(FileKind::Csv),
            XLSX_MIME | XLS_MIME => Ok(FileKind::Spreadsheet),
            other => Err(AppError::UnsupportedFileType(other.to_string())),
        }
    }

    /// Infers the kind from the file extension, the way a browser derives a MIME type.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        let mime = match extension.as_deref() {
            Some("csv") => CSV_MIME,
            Some("xlsx") => XLSX_MIME,
            Some("xls") => XLS_MIME,
            _ => return Err(AppError::UnsupportedFileType(path.display().to_string())),
        };
        Self::from_mime(mime)
    }
}

/// Reads a whole upload into memory as text.
///
/// Both I/O failures and content that is not valid UTF-8 map to
/// [`AppError::FileRead`].
pub async fn read_upload(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::error!("Failed to read upload {}: {}", path.display(), e);
        AppError::FileRead(format!("{}: {}", path.display(), e))
    })?;

    tracing::debug!("Read {} bytes from {}", bytes.len(), path.display());

    String::from_utf8(bytes).map_err(|e| {
        tracing::warn!("Upload {} is not valid UTF-8 text: {}", path.display(), e);
        AppError::FileRead(format!("{} is not a text file", path.display()))
    })
}

/// Approximate address count (and so credits) for a file of this size.
/// Display only; the real charge is the result's `credits_used`.
pub fn estimate_credits(file_size_bytes: u64) -> u64 {
    file_size_bytes / BYTES_PER_ADDRESS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_from_mime() {
        assert_eq!(FileKind::from_mime("text/csv").unwrap(), FileKind::Csv);
        assert_eq!(FileKind::from_mime(XLSX_MIME).unwrap(), FileKind::Spreadsheet);
        assert!(matches!(
            FileKind::from_mime("application/pdf"),
            Err(AppError::UnsupportedFileType(_))
        ));
    }

    #[test]
    fn test_from_path() {
        assert_eq!(FileKind::from_path(Path::new("list.CSV")).unwrap(), FileKind::Csv);
        assert_eq!(
            FileKind::from_path(Path::new("/tmp/list.xlsx")).unwrap(),
            FileKind::Spreadsheet
        );
        assert_eq!(FileKind::from_path(Path::new("old.XLS")).unwrap(), FileKind::Spreadsheet);
        assert!(FileKind::from_path(Path::new("notes.txt")).is_err());
        assert!(FileKind::from_path(Path::new("no_extension")).is_err());
    }

    #[test]
    fn test_estimate_credits_rounds_down() {
        assert_eq!(estimate_credits(0), 0);
        assert_eq!(estimate_credits(49), 0);
        assert_eq!(estimate_credits(50), 1);
        assert_eq!(estimate_credits(1234), 24);
    }

    #[tokio::test]
    async fn test_read_upload_text() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "a@x.com\nb@x.com").unwrap();
        let content = read_upload(file.path()).await.unwrap();
        assert_eq!(content, "a@x.com\nb@x.com");
    }

    #[tokio::test]
    async fn test_read_upload_binary_is_file_read_error() {
        let mut file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        file.write_all(&[0x50, 0x4b, 0x03, 0x04, 0xff, 0xfe, 0x00]).unwrap();
        let err = read_upload(file.path()).await.unwrap_err();
        assert!(matches!(err, AppError::FileRead(_)));
    }

    #[tokio::test]
    async fn test_read_upload_missing_file() {
        let err = read_upload(Path::new("/definitely/not/here.csv")).await.unwrap_err();
        assert!(matches!(err, AppError::FileRead(_)));
    }
}
