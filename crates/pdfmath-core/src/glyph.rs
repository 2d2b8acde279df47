//! Items produced by content-stream interpretation: glyphs, line segments
//! and figure boundaries.

use std::sync::Arc;

use crate::geometry::{BBox, Point};

/// The font a glyph was drawn with, as seen from the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GlyphFont {
    /// Key of the font in the `/Resources/Font` dictionary (e.g. `F1`).
    pub resource_name: String,
    /// `/BaseFont` name, subset prefix included (e.g. `ABCDEF+CMMI10`).
    pub base_name: String,
    /// Composite (Type0) font with multi-byte codes.
    pub composite: bool,
}

impl GlyphFont {
    pub fn new(
        resource_name: impl Into<String>,
        base_name: impl Into<String>,
        composite: bool,
    ) -> Self {
        Self {
            resource_name: resource_name.into(),
            base_name: base_name.into(),
            composite,
        }
    }

    /// Base name with any `XXXXXX+` subset tag removed.
    pub fn family(&self) -> &str {
        strip_subset_prefix(&self.base_name)
    }
}

/// Drop the subset tag from a font name: everything up to the last `+`.
pub fn strip_subset_prefix(name: &str) -> &str {
    match name.rfind('+') {
        Some(idx) => &name[idx + 1..],
        None => name,
    }
}

/// Text used for a character code the font cannot map to Unicode.
pub fn undefined_glyph_text(code: u32) -> String {
    format!("(cid:{code})")
}

/// A single rendered character, positioned in page space.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Glyph {
    /// Resolved Unicode text, or `(cid:N)` when unmapped.
    pub text: String,
    /// Raw character code (CID for composite fonts).
    pub code: u32,
    pub font: Arc<GlyphFont>,
    /// Rendered size: the glyph box height for horizontal text.
    pub size: f64,
    /// Text matrix combined with the CTM at the time the glyph was shown.
    pub matrix: [f64; 6],
    pub bbox: BBox,
    /// Horizontal advance in page space.
    pub advance: f64,
    /// Glyph-space width reported by the font (thousandths of an em).
    pub displacement: f64,
}

impl Glyph {
    pub fn x0(&self) -> f64 {
        self.bbox.x0
    }

    pub fn y0(&self) -> f64 {
        self.bbox.y0
    }

    pub fn x1(&self) -> f64 {
        self.bbox.x1
    }

    pub fn y1(&self) -> f64 {
        self.bbox.y1
    }

    pub fn width(&self) -> f64 {
        self.bbox.width()
    }

    /// First character of the glyph text.
    pub fn first_char(&self) -> Option<char> {
        self.text.chars().next()
    }

    /// Drawn with zero horizontal and vertical scale terms (vertical writing).
    pub fn is_vertical(&self) -> bool {
        self.matrix[0] == 0.0 && self.matrix[3] == 0.0
    }
}

/// A straight stroked segment in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LineSegment {
    pub start: Point,
    pub end: Point,
    /// Stroke width from the graphics state.
    pub width: f64,
}

impl LineSegment {
    pub fn new(start: Point, end: Point, width: f64) -> Self {
        Self { start, end, width }
    }

    pub fn x0(&self) -> f64 {
        self.start.x.min(self.end.x)
    }

    pub fn y0(&self) -> f64 {
        self.start.y.min(self.end.y)
    }
}

/// One element of a page's interpreted content, in drawing order.
#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    Glyph(Glyph),
    Line(LineSegment),
    /// Start of a form XObject; its glyphs and lines follow inline.
    FigureStart { name: String, page_index: usize },
    FigureEnd { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subset_prefix_is_stripped() {
        assert_eq!(strip_subset_prefix("ABCDEF+CMMI10"), "CMMI10");
        assert_eq!(strip_subset_prefix("Times-Roman"), "Times-Roman");
        assert_eq!(strip_subset_prefix("A+B+Symbol"), "Symbol");
    }

    #[test]
    fn family_uses_base_name() {
        let font = GlyphFont::new("F1", "XYZABC+CMR10", false);
        assert_eq!(font.family(), "CMR10");
    }

    #[test]
    fn undefined_glyph_placeholder() {
        assert_eq!(undefined_glyph_text(42), "(cid:42)");
    }

    #[test]
    fn vertical_matrix_detection() {
        let glyph = Glyph {
            text: "a".into(),
            code: 97,
            font: Arc::new(GlyphFont::new("F1", "Times-Roman", false)),
            size: 10.0,
            matrix: [0.0, 1.0, -1.0, 0.0, 0.0, 0.0],
            bbox: BBox::new(0.0, 0.0, 5.0, 10.0),
            advance: 5.0,
            displacement: 500.0,
        };
        assert!(glyph.is_vertical());
        assert_eq!(glyph.first_char(), Some('a'));
    }

    #[test]
    fn line_lower_left() {
        let line = LineSegment::new(Point::new(50.0, 10.0), Point::new(20.0, 10.0), 0.4);
        assert_eq!(line.x0(), 20.0);
        assert_eq!(line.y0(), 10.0);
    }
}
