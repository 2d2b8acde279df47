//! pdfmath: Translate PDF documents while preserving layout and math.
//!
//! This is the public API facade. It re-exports the layout model from
//! pdfmath-core and the PDF reader/writer from pdfmath-parse, and adds the
//! translation side: translator backends, the cache, the concurrent
//! orchestrator and the document driver.
//!
//! # Architecture
//!
//! - **pdfmath-core**: glyph model, classification mask, paragraph and
//!   formula assembly, retypesetting
//! - **pdfmath-parse**: content-stream interpretation and write-back on lopdf
//! - **pdfmath** (this crate): translation and the document pipeline
//!
//! No tracing subscriber is installed; applications choose their own.

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod fallback_font;
pub mod orchestrator;
pub mod services;
pub mod translator;

pub use pdfmath_core;
pub use pdfmath_parse;

pub use cache::{
    CacheStore, DEFAULT_MAX_NAMESPACES, FileCache, MemoryCache, NAMESPACE_SEED, default_namespace,
    deterministic_hash, paragraph_key,
};
pub use config::TranslateOptions;
pub use document::{DocumentReport, PageOutcome, PdfTranslator};
pub use error::{Error, TranslateError};
pub use fallback_font::{Fallback, FontdueFallback, MetricFallback};
pub use orchestrator::{
    OrchestratorStats, RetryPolicy, StatsSnapshot, TranslationOrchestrator, TranslationUnit,
};
pub use pdfmath_core::{
    AssemblerThresholds, ClassificationMask, FormulaHeuristics, LayoutRegion, PageLayout,
    PageSegmenter, RegionSegmenter, TypesetOptions, UniformSegmenter,
};
pub use services::{
    AzureTranslator, DeepLTranslator, DeepLXTranslator, GoogleTranslator, OllamaTranslator,
    OpenAiTranslator,
};
pub use translator::{LanguagePair, Translator, TranslatorKind, is_trivial, normalize_language};
