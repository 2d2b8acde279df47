//! Error types for the parsing, interpreter and writer layers.
//!
//! [`BackendError`] wraps lopdf and content-stream failures and converts into
//! the shared [`PdfError`].

use pdfmath_core::PdfError;
use thiserror::Error;

/// Error type for PDF backend operations.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Error from PDF parsing (structure, syntax, object resolution).
    #[error("PDF parse error: {0}")]
    Parse(String),

    /// Error reading or writing PDF data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error resolving font or encoding information.
    #[error("font error: {0}")]
    Font(String),

    /// Error during content stream interpretation.
    #[error("interpreter error: {0}")]
    Interpreter(String),

    /// Error writing regenerated content back into the document.
    #[error("write error: {0}")]
    Write(String),

    /// A core library error.
    #[error(transparent)]
    Core(#[from] PdfError),
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        BackendError::Parse(err.to_string())
    }
}

impl From<BackendError> for PdfError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Parse(msg) => PdfError::ParseError(msg),
            BackendError::Io(e) => PdfError::IoError(e.to_string()),
            BackendError::Font(msg) => PdfError::FontError(msg),
            BackendError::Interpreter(msg) => PdfError::InterpreterError(msg),
            BackendError::Write(msg) => PdfError::Other(msg),
            BackendError::Core(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            BackendError::Parse("invalid xref table".into()).to_string(),
            "PDF parse error: invalid xref table"
        );
        assert_eq!(
            BackendError::Write("no page".into()).to_string(),
            "write error: no page"
        );
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: BackendError = io_err.into();
        assert!(matches!(err, BackendError::Io(_)));
        let pdf_err: PdfError = err.into();
        assert!(matches!(pdf_err, PdfError::IoError(_)));
        assert!(pdf_err.to_string().contains("file missing"));
    }

    #[test]
    fn maps_to_core_variants() {
        let pdf_err: PdfError = BackendError::Font("missing widths".into()).into();
        assert_eq!(pdf_err, PdfError::FontError("missing widths".into()));
        let pdf_err: PdfError = BackendError::Interpreter("stack underflow".into()).into();
        assert_eq!(
            pdf_err,
            PdfError::InterpreterError("stack underflow".into())
        );
    }

    #[test]
    fn core_error_passes_through() {
        let original = PdfError::Other("mask size".into());
        let pdf_err: PdfError = BackendError::Core(original.clone()).into();
        assert_eq!(pdf_err, original);
    }
}
