//! Resume Extractor — plain text out of an uploaded document.
//! Parsing is CPU-bound and runs inside `tokio::task::spawn_blocking`.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Unsupported document type: '{0}'")]
    Unsupported(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("Document contains no extractable text")]
    Empty,

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Extracts text from the document at `path`, choosing a parser by extension.
pub async fn extract_text(path: &Path) -> Result<String, ExtractionError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_text_blocking(&path))
        .await
        .map_err(|e| ExtractionError::Task(e.to_string()))?
}

fn extract_text_blocking(path: &Path) -> Result<String, ExtractionError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    let text = match extension.as_str() {
        "pdf" => pdf_extract::extract_text(path).map_err(|e| ExtractionError::Pdf(e.to_string()))?,
        "txt" | "md" => {
            let bytes = std::fs::read(path)?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        other => return Err(ExtractionError::Unsupported(other.to_string())),
    };

    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_with(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("eval_")
            .suffix(suffix)
            .tempfile()
            .unwrap();
        file.write_all(content).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_plain_text_extracted_and_trimmed() {
        let file = temp_with(".txt", b"\n  Jane Doe\nRust engineer  \n");
        let text = extract_text(file.path()).await.unwrap();
        assert_eq!(text, "Jane Doe\nRust engineer");
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let file = temp_with(".png", b"\x89PNG");
        let err = extract_text(file.path()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Unsupported(ext) if ext == "png"));
    }

    #[tokio::test]
    async fn test_empty_text_is_error() {
        let file = temp_with(".txt", b"   \n\t");
        let err = extract_text(file.path()).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Empty));
    }

    #[tokio::test]
    async fn test_corrupt_pdf_is_error() {
        let file = temp_with(".pdf", b"this is not a pdf");
        assert!(extract_text(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let err = extract_text(Path::new("/nonexistent/resume.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }
}
