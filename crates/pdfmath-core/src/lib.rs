//! pdfmath-core: Backend-independent layout model for layout-preserving PDF
//! translation.
//!
//! This crate holds the glyph and line model produced by content-stream
//! interpretation, the page classification mask, the paragraph/formula
//! assembler and the retypesetter that turns translated paragraphs back into
//! PDF text operators. It knows nothing about PDF syntax or translation
//! services.

pub mod assembler;
pub mod classify;
pub mod error;
pub mod fonts;
pub mod geometry;
pub mod glyph;
pub mod mask;
pub mod typeset;

pub use assembler::{
    Assembler, FormulaGroup, PageLayout, Paragraph, assemble_page, placeholder,
};
pub use classify::{
    AssemblerThresholds, Classification, FormulaHeuristics, GlyphContext, classify,
    is_emphasis_font,
};
pub use error::PdfError;
pub use fonts::{FallbackFont, FontMetricsProvider, round_trips};
pub use geometry::{BBox, Ctm, Point};
pub use glyph::{
    Glyph, GlyphFont, LineSegment, PageItem, strip_subset_prefix, undefined_glyph_text,
};
pub use mask::{
    ClassificationMask, DEFAULT_REGION, EXCLUDED_LABELS, LayoutRegion, PageSegmenter,
    RESERVED_REGION, RegionSegmenter, UniformSegmenter,
};
pub use typeset::{Retypesetter, Token, TypesetFonts, TypesetOptions, line_spacing};
