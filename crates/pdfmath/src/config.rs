//! Options for translating a document.

use std::path::PathBuf;

use pdfmath_core::{AssemblerThresholds, FormulaHeuristics, TypesetOptions};
use pdfmath_parse::DEFAULT_MAX_RECURSION_DEPTH;

use crate::error::Error;
use crate::orchestrator::RetryPolicy;
use crate::translator::LanguagePair;

/// Options for [`crate::PdfTranslator`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranslateOptions {
    /// Source and target language (default: en -> zh).
    pub languages: LanguagePair,
    /// Service descriptor, `"name"` or `"name:model"` (default: `"google"`).
    pub service: String,
    /// Concurrent translation calls per page (default: 4, at least 1).
    pub threads: usize,
    pub retry: RetryPolicy,
    /// Whether translations are cached (default: true).
    pub use_cache: bool,
    /// Cache root; `None` uses the system temp directory.
    pub cache_dir: Option<PathBuf>,
    /// Zero-based pages to translate; `None` translates every page.
    pub pages: Option<Vec<usize>>,
    /// Regex over font base names that marks formula fonts.
    pub formula_font_pattern: Option<String>,
    /// Regex over glyph text that marks formula characters.
    pub formula_char_pattern: Option<String>,
    pub thresholds: AssemblerThresholds,
    pub typeset: TypesetOptions,
    /// TrueType file embedded for characters no page font can draw.
    pub fallback_font: Option<PathBuf>,
    /// Maximum nesting depth of form XObjects (default: 12).
    pub max_recursion_depth: usize,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            languages: LanguagePair::default(),
            service: "google".to_string(),
            threads: 4,
            retry: RetryPolicy::default(),
            use_cache: true,
            cache_dir: None,
            pages: None,
            formula_font_pattern: None,
            formula_char_pattern: None,
            thresholds: AssemblerThresholds::default(),
            typeset: TypesetOptions::default(),
            fallback_font: None,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl TranslateOptions {
    /// Set the language pair; the typeset language follows the target.
    pub fn with_languages(mut self, lang_in: &str, lang_out: &str) -> Self {
        self.languages = LanguagePair::new(lang_in, lang_out);
        self.typeset.lang_out = self.languages.lang_out.clone();
        self
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self.use_cache = true;
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.use_cache = false;
        self
    }

    pub fn with_pages(mut self, pages: impl IntoIterator<Item = usize>) -> Self {
        let mut pages: Vec<usize> = pages.into_iter().collect();
        pages.sort_unstable();
        pages.dedup();
        self.pages = Some(pages);
        self
    }

    pub fn with_formula_patterns(
        mut self,
        font_pattern: Option<&str>,
        char_pattern: Option<&str>,
    ) -> Self {
        self.formula_font_pattern = font_pattern.map(str::to_string);
        self.formula_char_pattern = char_pattern.map(str::to_string);
        self
    }

    pub fn with_thresholds(mut self, thresholds: AssemblerThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_fallback_font(mut self, path: impl Into<PathBuf>) -> Self {
        self.fallback_font = Some(path.into());
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth.max(1);
        self
    }

    /// Compile the formula patterns.
    pub fn heuristics(&self) -> Result<FormulaHeuristics, Error> {
        Ok(FormulaHeuristics::new(
            self.formula_font_pattern.as_deref(),
            self.formula_char_pattern.as_deref(),
        )?)
    }

    /// Page indices to process in a document of `page_count` pages.
    /// Indices past the end are dropped.
    pub fn selected_pages(&self, page_count: usize) -> Vec<usize> {
        match &self.pages {
            Some(pages) => pages.iter().copied().filter(|&p| p < page_count).collect(),
            None => (0..page_count).collect(),
        }
    }
}
