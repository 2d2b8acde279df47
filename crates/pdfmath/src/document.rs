//! Whole-document translation.
//!
//! Each selected page goes through segment, interpret, assemble, translate,
//! retypeset and write-back in turn. A page that fails is left untouched and
//! reported; only cache failures and errors opening or saving the document
//! abort the run.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use lopdf::ObjectId;
use pdfmath_core::{
    FallbackFont, FormulaHeuristics, PageSegmenter, Retypesetter, TypesetFonts, UniformSegmenter,
    assemble_page,
};
use pdfmath_parse::{CollectedPage, ContentWriter, FontRegistry, LopdfDocument, StreamId};
use tracing::{debug, info, warn};

use crate::cache::{CacheStore, FileCache, default_namespace};
use crate::config::TranslateOptions;
use crate::error::{Error, TranslateError};
use crate::fallback_font::Fallback;
use crate::orchestrator::{StatsSnapshot, TranslationOrchestrator};
use crate::translator::{Translator, TranslatorKind};

/// Base font behind the Latin resource name.
const LATIN_BASE_FONT: &str = "Times-Roman";

type ProgressFn = dyn Fn(usize, usize) + Send + Sync;

/// What happened to one page.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Translated {
        index: usize,
        paragraphs: usize,
        formulas: usize,
    },
    /// The page was left as it was.
    Failed { index: usize, reason: String },
}

impl PageOutcome {
    pub fn index(&self) -> usize {
        match self {
            PageOutcome::Translated { index, .. } | PageOutcome::Failed { index, .. } => *index,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PageOutcome::Failed { .. })
    }
}

/// Per-page outcomes and translation counters of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentReport {
    pub pages: Vec<PageOutcome>,
    pub stats: StatsSnapshot,
}

impl DocumentReport {
    pub fn translated_count(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_failed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pages.iter().filter(|p| p.is_failed()).count()
    }
}

/// Translates PDF documents while keeping their layout and formulas.
///
/// # Example
///
/// ```ignore
/// use pdfmath::{PdfTranslator, TranslateOptions};
///
/// let options = TranslateOptions::default().with_languages("en", "zh");
/// let translator = PdfTranslator::new(options)?;
/// let report = translator.translate_file("paper.pdf", "paper-zh.pdf")?;
/// println!("{} pages translated", report.translated_count());
/// ```
pub struct PdfTranslator {
    options: TranslateOptions,
    heuristics: FormulaHeuristics,
    translator: Box<dyn Translator>,
    segmenter: Box<dyn PageSegmenter>,
    cache: Option<Box<dyn CacheStore>>,
    progress: Option<Box<ProgressFn>>,
}

impl std::fmt::Debug for PdfTranslator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfTranslator")
            .field("options", &self.options)
            .field("translator", &self.translator.identity())
            .field("cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}

impl PdfTranslator {
    /// Build a translator for the service named in `options`.
    pub fn new(options: TranslateOptions) -> Result<Self, Error> {
        let translator = TranslatorKind::from_service(&options.service)?
            .build(&options.service, &options.languages)?;
        Self::with_translator(options, translator)
    }

    /// Use an already constructed translation backend.
    ///
    /// When `options.use_cache` is set a [`FileCache`] is opened at
    /// `options.cache_dir` or the default location.
    pub fn with_translator(
        options: TranslateOptions,
        translator: Box<dyn Translator>,
    ) -> Result<Self, Error> {
        let heuristics = options.heuristics()?;
        let cache: Option<Box<dyn CacheStore>> = if options.use_cache {
            let root = options
                .cache_dir
                .clone()
                .unwrap_or_else(FileCache::default_location);
            let cache = FileCache::new(root)?;
            cache.open_namespace(&default_namespace())?;
            Some(Box::new(cache))
        } else {
            None
        };
        Ok(Self {
            options,
            heuristics,
            translator,
            segmenter: Box::new(UniformSegmenter),
            cache,
            progress: None,
        })
    }

    pub fn with_segmenter(mut self, segmenter: impl PageSegmenter + 'static) -> Self {
        self.segmenter = Box::new(segmenter);
        self
    }

    /// Replace the cache store.
    pub fn with_cache(mut self, cache: impl CacheStore + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Called with `(pages done, pages selected)` after every page.
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn options(&self) -> &TranslateOptions {
        &self.options
    }

    /// Translate `input` and write the result to `output`.
    pub fn translate_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<DocumentReport, Error> {
        let bytes = std::fs::read(input.as_ref())?;
        let (translated, report) = self.translate_document(&bytes)?;
        std::fs::write(output.as_ref(), translated)?;
        info!(
            output = %output.as_ref().display(),
            translated = report.translated_count(),
            failed = report.failed_count(),
            "wrote translated document"
        );
        Ok(report)
    }

    /// Translate a PDF held in memory, returning the new file and a report.
    pub fn translate_document(&self, bytes: &[u8]) -> Result<(Vec<u8>, DocumentReport), Error> {
        let mut doc = LopdfDocument::from_bytes(bytes)?;
        let report = self.translate_loaded(&mut doc)?;
        Ok((doc.save_to_bytes()?, report))
    }

    /// Translate every selected page of `doc` in place.
    pub fn translate_loaded(&self, doc: &mut LopdfDocument) -> Result<DocumentReport, Error> {
        let fallback = Fallback::load(self.options.fallback_font.as_deref())?;
        let orchestrator = self.orchestrator()?;
        let typeset = &self.options.typeset;
        let writer = ContentWriter::new(
            doc,
            &typeset.latin_font,
            LATIN_BASE_FONT,
            &typeset.fallback_font,
        );

        let pages = self.options.selected_pages(doc.page_count());
        let total = pages.len();
        info!(pages = total, of = doc.page_count(), "translating document");

        let mut report = DocumentReport::default();
        let mut forms: BTreeMap<ObjectId, BTreeSet<usize>> = BTreeMap::new();
        let mut kept_forms: BTreeSet<ObjectId> = BTreeSet::new();

        for (done, &index) in pages.iter().enumerate() {
            let mut registry = self.registry();
            let outcome = match doc.interpret_page_with_depth(
                index,
                &mut registry,
                self.options.max_recursion_depth,
            ) {
                Err(e) => Err(Error::from(e)),
                Ok(page) => {
                    let result = self
                        .render_page(doc, index, &page, &registry, &fallback, &orchestrator)
                        .and_then(|(ops, paragraphs, formulas)| {
                            writer.write_page(doc, index, &page, &registry, &ops)?;
                            Ok((paragraphs, formulas))
                        });
                    match &result {
                        Ok(_) => collect_forms(&page, &mut forms),
                        Err(_) => kept_forms.extend(page.forms.iter().copied()),
                    }
                    result
                }
            };

            match outcome {
                Ok((paragraphs, formulas)) => {
                    info!(page = index, paragraphs, formulas, "translated page");
                    report.pages.push(PageOutcome::Translated {
                        index,
                        paragraphs,
                        formulas,
                    });
                }
                Err(Error::Translate(e @ TranslateError::Cache(_))) => {
                    return Err(Error::Translate(e));
                }
                Err(e) => {
                    warn!(page = index, error = %e, "skipping page");
                    report.pages.push(PageOutcome::Failed {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
            if let Some(progress) = &self.progress {
                progress(done + 1, total);
            }
        }

        for (form, neutralized) in &forms {
            if kept_forms.contains(form) {
                debug!(form = ?form, "form also drawn by a skipped page, keeping its text");
                continue;
            }
            writer.strip_form(doc, *form, neutralized)?;
        }
        writer.finish(doc, &fallback.embedded_font())?;

        report.stats = orchestrator.stats();
        debug!(stats = ?report.stats, "translation counters");
        Ok(report)
    }

    /// Run one page through the pipeline and return its regenerated text
    /// operators, without modifying the document.
    pub fn process_page(&self, doc: &LopdfDocument, index: usize) -> Result<String, Error> {
        let fallback = Fallback::load(self.options.fallback_font.as_deref())?;
        let orchestrator = self.orchestrator()?;
        let mut registry = self.registry();
        let page =
            doc.interpret_page_with_depth(index, &mut registry, self.options.max_recursion_depth)?;
        let (ops, _, _) =
            self.render_page(doc, index, &page, &registry, &fallback, &orchestrator)?;
        Ok(ops)
    }

    fn registry(&self) -> FontRegistry {
        FontRegistry::new().with_latin(&self.options.typeset.latin_font, LATIN_BASE_FONT)
    }

    fn orchestrator(&self) -> Result<TranslationOrchestrator<'_>, Error> {
        Ok(TranslationOrchestrator::new(
            self.translator.as_ref(),
            self.cache.as_deref(),
            self.options.retry.clone(),
            self.options.threads,
        )?)
    }

    /// Segment, assemble, translate and retypeset an interpreted page.
    /// Returns the operators with the paragraph and formula counts.
    fn render_page(
        &self,
        doc: &LopdfDocument,
        index: usize,
        page: &CollectedPage,
        registry: &FontRegistry,
        fallback: &dyn FallbackFont,
        orchestrator: &TranslationOrchestrator<'_>,
    ) -> Result<(String, usize, usize), Error> {
        let crop = doc.crop_box(index)?;
        let width = crop.width().ceil().max(1.0) as usize;
        let height = crop.height().ceil().max(1.0) as usize;
        let mask = self.segmenter.segment(index, width, height)?;

        let layout = assemble_page(
            &page.items,
            &mask,
            crop.width(),
            &self.heuristics,
            self.options.thresholds,
        );
        for warning in &page.warnings {
            debug!(page = index, warning = %warning, "interpreter warning");
        }

        let translations = orchestrator.translate_all(&layout.paragraph_texts())?;
        let retypesetter = Retypesetter::new(
            &self.options.typeset,
            TypesetFonts {
                metrics: registry,
                fallback,
            },
        )?;
        let ops = retypesetter.typeset_page(&layout, &translations);
        Ok((ops, layout.paragraphs.len(), layout.formulas.len()))
    }
}

fn collect_forms(page: &CollectedPage, forms: &mut BTreeMap<ObjectId, BTreeSet<usize>>) {
    for form in &page.forms {
        let entry = forms.entry(*form).or_default();
        if let Some(neutralized) = page.neutralized.get(&StreamId::Form(*form)) {
            entry.extend(neutralized.iter().copied());
        }
    }
}
