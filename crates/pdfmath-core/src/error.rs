//! Fatal error type shared by the pdfmath crates.

use std::fmt;

/// Errors that stop processing of a document or of a single page.
#[derive(Debug, Clone, PartialEq)]
pub enum PdfError {
    /// Error parsing PDF structure or syntax.
    ParseError(String),
    /// I/O error reading or writing PDF data.
    IoError(String),
    /// Error resolving font or encoding information.
    FontError(String),
    /// Error during content stream interpretation.
    InterpreterError(String),
    /// Any other error not covered by specific variants.
    Other(String),
}

impl fmt::Display for PdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PdfError::ParseError(msg) => write!(f, "parse error: {msg}"),
            PdfError::IoError(msg) => write!(f, "I/O error: {msg}"),
            PdfError::FontError(msg) => write!(f, "font error: {msg}"),
            PdfError::InterpreterError(msg) => write!(f, "interpreter error: {msg}"),
            PdfError::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for PdfError {}

impl From<std::io::Error> for PdfError {
    fn from(err: std::io::Error) -> Self {
        PdfError::IoError(err.to_string())
    }
}

impl From<regex::Error> for PdfError {
    fn from(err: regex::Error) -> Self {
        PdfError::Other(format!("invalid pattern: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_variant() {
        assert_eq!(
            PdfError::ParseError("bad xref".into()).to_string(),
            "parse error: bad xref"
        );
        assert_eq!(
            PdfError::InterpreterError("bad op".into()).to_string(),
            "interpreter error: bad op"
        );
        assert_eq!(PdfError::Other("plain".into()).to_string(), "plain");
    }

    #[test]
    fn from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PdfError = io.into();
        assert_eq!(err, PdfError::IoError("gone".into()));
    }

    #[test]
    fn implements_std_error() {
        let err: Box<dyn std::error::Error> = Box::new(PdfError::FontError("x".into()));
        assert_eq!(err.to_string(), "font error: x");
    }
}
