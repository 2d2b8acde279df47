//! Content handler callbacks for content stream interpretation.
//!
//! The interpreter reports glyphs, qualifying line segments and form
//! XObject boundaries to a [`ContentHandler`]. [`PageCollector`] is the
//! handler the page pipeline uses: it builds the ordered [`PageItem`] list
//! and remembers which stroke operators the writer must neutralize.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use lopdf::ObjectId;
use pdfmath_core::{BBox, Ctm, Glyph, GlyphFont, LineSegment, PageItem, Point};

/// The content stream an operator index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StreamId {
    Page,
    Form(ObjectId),
}

/// A shown character with the state needed to place it.
#[derive(Debug, Clone)]
pub struct GlyphEvent {
    pub code: u32,
    /// Resolved text, `(cid:N)` when the font has no mapping.
    pub text: String,
    pub font: Arc<GlyphFont>,
    pub font_size: f64,
    /// Text matrix at the glyph origin.
    pub text_matrix: Ctm,
    pub ctm: Ctm,
    /// Glyph-space width (thousandths of an em).
    pub displacement: f64,
    /// Horizontal scaling as a fraction.
    pub h_scaling: f64,
    pub rise: f64,
    /// Font descent, thousandths of an em.
    pub descent: f64,
}

impl GlyphEvent {
    /// Text-space advance of this glyph.
    pub fn advance(&self) -> f64 {
        self.displacement / 1000.0 * self.font_size * self.h_scaling
    }

    /// Page-space glyph: the box from `(0, descent + rise)` to
    /// `(advance, descent + rise + size)` mapped through `Tm × CTM`.
    pub fn to_glyph(&self) -> Glyph {
        let matrix = self.text_matrix.concat(&self.ctm);
        let advance = self.advance();
        let bottom = self.descent / 1000.0 * self.font_size + self.rise;
        let bbox = BBox::from_corners(
            matrix.transform_point(Point::new(0.0, bottom)),
            matrix.transform_point(Point::new(advance, bottom + self.font_size)),
        );
        Glyph {
            text: self.text.clone(),
            code: self.code,
            font: Arc::clone(&self.font),
            size: bbox.height(),
            matrix: matrix.to_array(),
            bbox,
            advance,
            displacement: self.displacement,
        }
    }
}

/// Callbacks invoked while interpreting a page.
pub trait ContentHandler {
    fn on_glyph(&mut self, _event: GlyphEvent) {}

    /// A black horizontal two-point stroke, painted by operator `op_index`
    /// of `stream`.
    fn on_line(&mut self, _line: LineSegment, _stream: StreamId, _op_index: usize) {}

    fn on_figure_start(&mut self, _name: &str, _form: ObjectId) {}

    fn on_figure_end(&mut self, _name: &str) {}

    /// Non-fatal problem; interpretation continues.
    fn on_warning(&mut self, _message: String) {}
}

/// Everything one page's interpretation produced.
#[derive(Debug, Default)]
pub struct CollectedPage {
    pub items: Vec<PageItem>,
    /// Stroke operators whose lines were captured, per stream.
    pub neutralized: HashMap<StreamId, BTreeSet<usize>>,
    /// Form XObjects whose glyphs were emitted inline.
    pub forms: BTreeSet<ObjectId>,
    pub warnings: Vec<String>,
}

impl CollectedPage {
    pub fn glyph_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, PageItem::Glyph(_)))
            .count()
    }
}

/// Collects interpreter events into a [`CollectedPage`].
#[derive(Debug, Default)]
pub struct PageCollector {
    page_index: usize,
    page: CollectedPage,
}

impl PageCollector {
    pub fn new(page_index: usize) -> Self {
        Self {
            page_index,
            page: CollectedPage::default(),
        }
    }

    pub fn finish(self) -> CollectedPage {
        self.page
    }
}

impl ContentHandler for PageCollector {
    fn on_glyph(&mut self, event: GlyphEvent) {
        self.page.items.push(PageItem::Glyph(event.to_glyph()));
    }

    fn on_line(&mut self, line: LineSegment, stream: StreamId, op_index: usize) {
        self.page.items.push(PageItem::Line(line));
        self.page
            .neutralized
            .entry(stream)
            .or_default()
            .insert(op_index);
    }

    fn on_figure_start(&mut self, name: &str, form: ObjectId) {
        self.page.forms.insert(form);
        self.page.items.push(PageItem::FigureStart {
            name: name.to_string(),
            page_index: self.page_index,
        });
    }

    fn on_figure_end(&mut self, name: &str) {
        self.page.items.push(PageItem::FigureEnd {
            name: name.to_string(),
        });
    }

    fn on_warning(&mut self, message: String) {
        tracing::warn!(page = self.page_index, "{message}");
        self.page.warnings.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(text_matrix: Ctm, ctm: Ctm) -> GlyphEvent {
        GlyphEvent {
            code: 65,
            text: "A".into(),
            font: Arc::new(GlyphFont::new("F1", "Helvetica", false)),
            font_size: 10.0,
            text_matrix,
            ctm,
            displacement: 667.0,
            h_scaling: 1.0,
            rise: 0.0,
            descent: -225.0,
        }
    }

    #[test]
    fn glyph_box_from_descent_and_size() {
        let glyph = event(Ctm::translation(100.0, 700.0), Ctm::identity()).to_glyph();
        assert!((glyph.x0() - 100.0).abs() < 1e-9);
        assert!((glyph.x1() - 106.67).abs() < 1e-9);
        assert!((glyph.y0() - 697.75).abs() < 1e-9);
        assert!((glyph.y1() - 707.75).abs() < 1e-9);
        assert!((glyph.size - 10.0).abs() < 1e-9);
        assert_eq!(glyph.displacement, 667.0);
    }

    #[test]
    fn ctm_scales_the_box() {
        let glyph = event(
            Ctm::translation(10.0, 10.0),
            Ctm::new(2.0, 0.0, 0.0, 2.0, -5.0, -5.0),
        )
        .to_glyph();
        assert!((glyph.x0() - 15.0).abs() < 1e-9);
        assert!((glyph.size - 20.0).abs() < 1e-9);
        assert_eq!(glyph.matrix, [2.0, 0.0, 0.0, 2.0, 15.0, 15.0]);
    }

    #[test]
    fn collector_records_neutralized_strokes() {
        let mut collector = PageCollector::new(3);
        let line = LineSegment::new(Point::new(0.0, 5.0), Point::new(50.0, 5.0), 0.5);
        collector.on_line(line, StreamId::Page, 7);
        collector.on_line(line, StreamId::Form((12, 0)), 2);
        collector.on_figure_start("Fm0", (12, 0));
        collector.on_glyph(event(Ctm::identity(), Ctm::identity()));
        collector.on_figure_end("Fm0");
        let page = collector.finish();
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.glyph_count(), 1);
        assert!(page.neutralized[&StreamId::Page].contains(&7));
        assert!(page.neutralized[&StreamId::Form((12, 0))].contains(&2));
        assert!(page.forms.contains(&(12, 0)));
        assert!(matches!(
            &page.items[2],
            PageItem::FigureStart { name, page_index: 3 } if name == "Fm0"
        ));
    }
}
