//! Error types for translation and document processing.

use pdfmath_core::PdfError;
use pdfmath_parse::BackendError;
use thiserror::Error;

/// Errors from a translator backend or the translation cache.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    /// Network failure, timeout, rate limiting or a server-side error.
    #[error("transient translation failure: {0}")]
    Transient(String),

    /// Authentication, invalid request, malformed response or an
    /// unsupported service. Retrying cannot help.
    #[error("translation failed: {0}")]
    Permanent(String),

    /// The cache store could not be read or written.
    #[error("cache store error: {0}")]
    Cache(String),
}

impl TranslateError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TranslateError::Transient(_))
    }

    /// Classify an unsuccessful HTTP status.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = format!("HTTP {status}: {}", truncate(body, 200));
        if status == 429 || status == 408 || status >= 500 {
            TranslateError::Transient(message)
        } else {
            TranslateError::Permanent(message)
        }
    }
}

impl From<reqwest::Error> for TranslateError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return TranslateError::from_status(status.as_u16(), &err.to_string());
        }
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            TranslateError::Transient(err.to_string())
        } else {
            TranslateError::Permanent(err.to_string())
        }
    }
}

impl From<serde_json::Error> for TranslateError {
    fn from(err: serde_json::Error) -> Self {
        TranslateError::Permanent(format!("malformed response: {err}"))
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Top-level error of the pdfmath facade.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Pdf(#[from] PdfError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Translate(#[from] TranslateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fallback font program could not be loaded.
    #[error("font error: {0}")]
    Font(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
