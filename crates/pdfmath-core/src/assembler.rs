//! Paragraph and formula assembly.
//!
//! Scans a page's glyphs and lines once, in drawing order, and splits them
//! into paragraphs of translatable text and formula groups that are carried
//! over verbatim. Each formula group leaves a `$v<N>$` placeholder in the
//! paragraph that was open when it was closed.

use std::sync::Arc;

use tracing::debug;

use crate::classify::{
    AssemblerThresholds, Classification, FormulaHeuristics, GlyphContext, classify,
    is_emphasis_font,
};
use crate::glyph::{Glyph, GlyphFont, LineSegment, PageItem};
use crate::mask::{ClassificationMask, RESERVED_REGION};

/// Placeholder text for formula group `index`.
pub fn placeholder(index: usize) -> String {
    format!("$v{index}$")
}

/// A run of translatable text with its original geometry.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Paragraph {
    /// Baseline origin y, corrected when the representative size changes.
    pub y: f64,
    /// Left edge of the first glyph.
    pub x: f64,
    /// Left boundary.
    pub x0: f64,
    /// Right boundary.
    pub x1: f64,
    /// Representative font size.
    pub size: f64,
    /// Representative font.
    pub font: Arc<GlyphFont>,
    /// The source wrapped onto a new line inside this paragraph.
    pub line_break: bool,
    /// Accumulated text with formula placeholders.
    pub text: String,
    /// Number of text glyphs appended to `text`.
    pub glyph_count: usize,
}

impl Paragraph {
    fn start(glyph: &Glyph) -> Self {
        Self {
            y: glyph.y0(),
            x: glyph.x0(),
            x0: glyph.x0(),
            x1: glyph.x0(),
            size: glyph.size,
            font: Arc::clone(&glyph.font),
            line_break: false,
            text: String::new(),
            glyph_count: 0,
        }
    }

    /// Number of `$v<N>$` placeholders in the text.
    pub fn placeholder_count(&self) -> usize {
        self.text.matches("$v").count()
    }
}

/// A contiguous run of formula glyphs and the lines drawn with them.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FormulaGroup {
    /// Source glyphs in drawing order.
    pub glyphs: Vec<Glyph>,
    /// Lines drawn while the group was open, such as fraction bars.
    pub lines: Vec<LineSegment>,
    /// Vertical correction applied when the group is re-inserted inline.
    pub y_offset: f64,
    /// Rightmost glyph edge minus the first glyph's left edge.
    pub width: f64,
}

impl FormulaGroup {
    /// Build a group; `glyphs` must be non-empty for a meaningful width.
    pub fn new(glyphs: Vec<Glyph>, lines: Vec<LineSegment>, y_offset: f64) -> Self {
        let width = match glyphs.first() {
            Some(first) => {
                let right = glyphs
                    .iter()
                    .map(Glyph::x1)
                    .fold(f64::NEG_INFINITY, f64::max);
                right - first.x0()
            }
            None => 0.0,
        };
        Self {
            glyphs,
            lines,
            y_offset,
            width,
        }
    }

    /// Concatenated glyph text.
    pub fn text(&self) -> String {
        self.glyphs.iter().map(|g| g.text.as_str()).collect()
    }
}

/// Everything recovered from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    /// Paragraphs in reading order; their placeholders index `formulas`.
    pub paragraphs: Vec<Paragraph>,
    /// Formula groups, indexed by placeholder number.
    pub formulas: Vec<FormulaGroup>,
    /// Lines not attached to any formula.
    pub lines: Vec<LineSegment>,
}

impl PageLayout {
    /// Source text of every paragraph, in order.
    pub fn paragraph_texts(&self) -> Vec<String> {
        self.paragraphs.iter().map(|p| p.text.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy)]
struct PreviousGlyph {
    x0: f64,
    x1: f64,
    y0: f64,
    region: u32,
}

/// Single-page scanner. Feed items with [`push`](Self::push), then call
/// [`finish`](Self::finish).
pub struct Assembler<'a> {
    mask: &'a ClassificationMask,
    heuristics: &'a FormulaHeuristics,
    thresholds: AssemblerThresholds,
    /// Horizontal jump that closes an open formula.
    formula_break: f64,
    paragraphs: Vec<Paragraph>,
    formulas: Vec<FormulaGroup>,
    lines: Vec<LineSegment>,
    formula_glyphs: Vec<Glyph>,
    formula_lines: Vec<LineSegment>,
    formula_offset: f64,
    bracket_depth: u32,
    previous: Option<PreviousGlyph>,
}

impl<'a> Assembler<'a> {
    /// Start a page. `page_width` scales the formula break distance.
    pub fn new(
        mask: &'a ClassificationMask,
        heuristics: &'a FormulaHeuristics,
        thresholds: AssemblerThresholds,
        page_width: f64,
    ) -> Self {
        Self {
            mask,
            heuristics,
            thresholds,
            formula_break: page_width * thresholds.formula_break_fraction,
            paragraphs: Vec::new(),
            formulas: Vec::new(),
            lines: Vec::new(),
            formula_glyphs: Vec::new(),
            formula_lines: Vec::new(),
            formula_offset: 0.0,
            bracket_depth: 0,
            previous: None,
        }
    }

    /// Consume the next item in drawing order. Figure markers are ignored.
    pub fn push(&mut self, item: &PageItem) {
        match item {
            PageItem::Glyph(glyph) => self.push_glyph(glyph),
            PageItem::Line(line) => self.push_line(*line),
            PageItem::FigureStart { .. } | PageItem::FigureEnd { .. } => {}
        }
    }

    fn push_glyph(&mut self, glyph: &Glyph) {
        let region = self.mask.region_at(glyph.x0(), glyph.y0());
        let previous_region = self.previous.map(|p| p.region);
        let same_region = previous_region == Some(region);

        let ctx = GlyphContext {
            region,
            previous_region,
            paragraph_text: self.paragraphs.last().map(|p| p.text.as_str()),
            paragraph_size: self.paragraphs.last().map(|p| p.size),
        };
        let mut is_formula =
            classify(glyph, &ctx, self.heuristics, &self.thresholds) == Classification::Formula;
        if !is_formula {
            is_formula = self.extend_brackets(&glyph.text);
        }

        let jumped = match self.previous {
            Some(prev) => {
                (glyph.x0() - prev.x0).abs() > self.formula_break && region != RESERVED_REGION
            }
            None => false,
        };
        if (!is_formula || !same_region || jumped) && !self.formula_glyphs.is_empty() {
            if !is_formula && same_region && glyph.x0() > self.formula_right_anchor() {
                self.formula_offset = self.formula_glyphs[0].y0() - glyph.y0();
            }
            self.flush_formula();
        }

        if self.formula_glyphs.is_empty() {
            match (same_region, self.previous, self.paragraphs.last_mut()) {
                (true, Some(prev), Some(paragraph)) => {
                    if glyph.x0() > prev.x1 + self.thresholds.space_gap {
                        paragraph.text.push(' ');
                    } else if glyph.x1() < prev.x0 {
                        paragraph.text.push(' ');
                        paragraph.line_break = true;
                    }
                }
                _ => self.paragraphs.push(Paragraph::start(glyph)),
            }
        }

        if is_formula {
            if self.formula_glyphs.is_empty() && same_region {
                if let Some(prev) = self.previous {
                    if glyph.x0() > prev.x0 {
                        self.formula_offset = glyph.y0() - prev.y0;
                    }
                }
            }
            self.formula_glyphs.push(glyph.clone());
        } else {
            self.append_text(glyph);
        }

        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.x0 = paragraph.x0.min(glyph.x0());
            paragraph.x1 = paragraph.x1.max(glyph.x1());
        }
        self.previous = Some(PreviousGlyph {
            x0: glyph.x0(),
            x1: glyph.x1(),
            y0: glyph.y0(),
            region,
        });
    }

    /// Parentheses next to an open formula join it until they balance.
    fn extend_brackets(&mut self, text: &str) -> bool {
        let mut is_formula = false;
        if !self.formula_glyphs.is_empty() && text == "(" {
            is_formula = true;
            self.bracket_depth += 1;
        }
        if self.bracket_depth > 0 && text == ")" {
            is_formula = true;
            self.bracket_depth -= 1;
        }
        is_formula
    }

    fn formula_right_anchor(&self) -> f64 {
        self.formula_glyphs
            .iter()
            .map(Glyph::x0)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn append_text(&mut self, glyph: &Glyph) {
        let ratio = self.thresholds.subscript_ratio;
        let heuristics = self.heuristics;
        let Some(paragraph) = self.paragraphs.last_mut() else {
            return;
        };
        let enlarge = glyph.size > paragraph.size / ratio
            || paragraph.text.trim().chars().count() == 1
            || heuristics.is_formula_font(&paragraph.font.base_name)
            || is_emphasis_font(&paragraph.font.base_name);
        if enlarge {
            paragraph.y -= glyph.size - paragraph.size;
            paragraph.size = glyph.size;
            paragraph.font = Arc::clone(&glyph.font);
        }
        paragraph.text.push_str(&glyph.text);
        paragraph.glyph_count += 1;
    }

    fn push_line(&mut self, line: LineSegment) {
        let region = self.mask.region_at(line.x0(), line.y0());
        let active = self.previous.map(|p| p.region);
        if !self.formula_glyphs.is_empty() && active == Some(region) {
            self.formula_lines.push(line);
        } else {
            self.lines.push(line);
        }
    }

    /// Close the open formula buffer into a [`FormulaGroup`] and leave its
    /// placeholder in the current paragraph.
    fn flush_formula(&mut self) {
        let glyphs = std::mem::take(&mut self.formula_glyphs);
        let lines = std::mem::take(&mut self.formula_lines);
        let offset = std::mem::replace(&mut self.formula_offset, 0.0);
        if let Some(paragraph) = self.paragraphs.last_mut() {
            paragraph.text.push_str(&placeholder(self.formulas.len()));
        }
        self.formulas.push(FormulaGroup::new(glyphs, lines, offset));
    }

    /// Close any open formula and return the page layout.
    pub fn finish(mut self) -> PageLayout {
        if !self.formula_glyphs.is_empty() {
            self.flush_formula();
        }
        for (i, formula) in self.formulas.iter().enumerate() {
            if let Some(first) = formula.glyphs.first() {
                debug!(
                    width = formula.width,
                    x0 = first.x0(),
                    y0 = first.y0(),
                    code = first.code,
                    font = %first.font.base_name,
                    lines = formula.lines.len(),
                    "{} = {}",
                    placeholder(i),
                    formula.text()
                );
            }
        }
        PageLayout {
            paragraphs: self.paragraphs,
            formulas: self.formulas,
            lines: self.lines,
        }
    }
}

/// Assemble a whole page in one call.
pub fn assemble_page(
    items: &[PageItem],
    mask: &ClassificationMask,
    page_width: f64,
    heuristics: &FormulaHeuristics,
    thresholds: AssemblerThresholds,
) -> PageLayout {
    let mut assembler = Assembler::new(mask, heuristics, thresholds, page_width);
    for item in items {
        assembler.push(item);
    }
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{BBox, Point};
    use crate::mask::ClassificationMask;

    fn font(name: &str) -> Arc<GlyphFont> {
        Arc::new(GlyphFont::new("F1", name, false))
    }

    fn glyph_at(text: &str, font: &Arc<GlyphFont>, x0: f64, y0: f64, width: f64, size: f64) -> Glyph {
        Glyph {
            text: text.to_string(),
            code: text.chars().next().map_or(0, |c| c as u32),
            font: Arc::clone(font),
            size,
            matrix: [1.0, 0.0, 0.0, 1.0, x0, y0],
            bbox: BBox::new(x0, y0, x0 + width, y0 + size),
            advance: width,
            displacement: width / size * 1000.0,
        }
    }

    /// Lay out `text` left to right with 5pt advances and no gaps.
    fn word(text: &str, font: &Arc<GlyphFont>, x0: f64, y0: f64) -> Vec<PageItem> {
        text.chars()
            .enumerate()
            .map(|(i, c)| {
                PageItem::Glyph(glyph_at(
                    &c.to_string(),
                    font,
                    x0 + 5.0 * i as f64,
                    y0,
                    5.0,
                    10.0,
                ))
            })
            .collect()
    }

    fn run(items: &[PageItem], mask: &ClassificationMask) -> PageLayout {
        let heuristics = FormulaHeuristics::new(None, None).unwrap();
        assemble_page(items, mask, 600.0, &heuristics, AssemblerThresholds::default())
    }

    fn glyph_total(items: &[PageItem]) -> usize {
        items
            .iter()
            .filter(|i| matches!(i, PageItem::Glyph(_)))
            .count()
    }

    fn assigned_total(layout: &PageLayout) -> usize {
        layout.paragraphs.iter().map(|p| p.glyph_count).sum::<usize>()
            + layout.formulas.iter().map(|f| f.glyphs.len()).sum::<usize>()
    }

    #[test]
    fn plain_text_forms_one_paragraph() {
        let roman = font("Times-Roman");
        let items = word("Hello", &roman, 100.0, 700.0);
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs.len(), 1);
        let p = &layout.paragraphs[0];
        assert_eq!(p.text, "Hello");
        assert_eq!(p.x, 100.0);
        assert_eq!(p.x0, 100.0);
        assert_eq!(p.x1, 125.0);
        assert!(!p.line_break);
        assert!(layout.formulas.is_empty());
    }

    #[test]
    fn two_point_gap_inserts_exactly_one_space() {
        let roman = font("Times-Roman");
        let mut items = word("ab", &roman, 100.0, 700.0);
        items.extend(word("cd", &roman, 112.0, 700.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs[0].text, "ab cd");
    }

    #[test]
    fn wrapping_back_sets_line_break() {
        let roman = font("Times-Roman");
        let mut items = word("abcdef", &roman, 100.0, 700.0);
        items.extend(word("gh", &roman, 60.0, 688.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        let p = &layout.paragraphs[0];
        assert_eq!(p.text, "abcdef gh");
        assert!(p.line_break);
        assert_eq!(p.x0, 60.0);
        assert!(p.x0 <= p.x && p.x <= p.x1);
    }

    #[test]
    fn math_font_run_becomes_placeholder() {
        let roman = font("Times-Roman");
        let math = font("ABCDEF+CMMI10");
        let mut items = word("The value is ", &roman, 100.0, 700.0);
        items.extend(word("x", &math, 165.0, 700.0));
        items.extend(word(".", &roman, 170.0, 700.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs.len(), 1);
        assert_eq!(layout.paragraphs[0].text, "The value is $v0$.");
        assert_eq!(layout.formulas.len(), 1);
        assert_eq!(layout.formulas[0].text(), "x");
        assert_eq!(layout.formulas[0].width, 5.0);
        assert_eq!(glyph_total(&items), assigned_total(&layout));
    }

    #[test]
    fn reserved_mask_cell_overrides_plain_font() {
        let roman = font("Times-Roman");
        let mut cells = vec![1u32; 600 * 800];
        // reserve x in [200, 300) for every row
        for row in 0..800 {
            cells[row * 600 + 200..row * 600 + 300].fill(0);
        }
        let mask = ClassificationMask::from_cells(600, 800, cells).unwrap();
        let mut items = word("ab", &roman, 100.0, 700.0);
        items.extend(word("xy", &roman, 210.0, 700.0));
        let layout = run(&items, &mask);
        assert_eq!(layout.formulas.len(), 1);
        assert_eq!(layout.formulas[0].text(), "xy");
        assert_eq!(glyph_total(&items), assigned_total(&layout));
    }

    #[test]
    fn subscript_joins_formula_and_placeholder_count_matches() {
        let roman = font("Times-Roman");
        let mut items = word("abc", &roman, 100.0, 700.0);
        items.push(PageItem::Glyph(glyph_at("i", &roman, 115.0, 697.0, 3.0, 7.0)));
        items.extend(word(" more", &roman, 118.0, 700.0));
        items.push(PageItem::Glyph(glyph_at("j", &roman, 143.0, 697.0, 3.0, 7.0)));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs.len(), 1);
        assert_eq!(layout.formulas.len(), 2);
        assert_eq!(layout.paragraphs[0].placeholder_count(), 2);
        assert_eq!(layout.paragraphs[0].text, "abc$v0$ more$v1$");
        // trailing text sits to the right: offset from first formula baseline
        assert_eq!(layout.formulas[0].y_offset, -3.0);
        assert_eq!(glyph_total(&items), assigned_total(&layout));
    }

    #[test]
    fn parentheses_extend_open_formula() {
        let roman = font("Times-Roman");
        let math = font("CMMI10");
        let mut items = word("see ", &roman, 100.0, 700.0);
        items.extend(word("f", &math, 120.0, 700.0));
        items.extend(word("(", &roman, 125.0, 700.0));
        items.extend(word("x", &math, 130.0, 700.0));
        items.extend(word(")", &roman, 135.0, 700.0));
        items.extend(word(" ok", &roman, 140.0, 700.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.formulas.len(), 1);
        assert_eq!(layout.formulas[0].text(), "f(x)");
        assert_eq!(layout.paragraphs[0].text, "see $v0$ ok");
    }

    #[test]
    fn region_change_starts_new_paragraph() {
        let roman = font("Times-Roman");
        let regions = vec![
            crate::mask::LayoutRegion::new("plain_text", 90.0, 90.0, 200.0, 110.0),
            crate::mask::LayoutRegion::new("plain_text", 90.0, 190.0, 200.0, 210.0),
        ];
        let mask = ClassificationMask::from_regions(600, 800, &regions);
        let mut items = word("top", &roman, 100.0, 700.0);
        items.extend(word("low", &roman, 100.0, 600.0));
        let layout = run(&items, &mask);
        assert_eq!(layout.paragraph_texts(), vec!["top", "low"]);
    }

    #[test]
    fn lines_attach_to_open_formula_or_page() {
        let roman = font("Times-Roman");
        let math = font("CMSY10");
        let mut items = word("a", &roman, 100.0, 700.0);
        items.extend(word("x", &math, 110.0, 700.0));
        items.push(PageItem::Line(LineSegment::new(
            Point::new(110.0, 698.0),
            Point::new(120.0, 698.0),
            0.4,
        )));
        items.extend(word("b", &roman, 130.0, 700.0));
        items.push(PageItem::Line(LineSegment::new(
            Point::new(0.0, 10.0),
            Point::new(600.0, 10.0),
            1.0,
        )));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.formulas[0].lines.len(), 1);
        assert_eq!(layout.lines.len(), 1);
    }

    #[test]
    fn enlarged_second_character_resets_paragraph_size() {
        let roman = font("Times-Roman");
        let items = vec![
            PageItem::Glyph(glyph_at("T", &roman, 100.0, 700.0, 5.0, 10.0)),
            PageItem::Glyph(glyph_at("h", &roman, 105.0, 700.0, 5.0, 12.0)),
        ];
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        let p = &layout.paragraphs[0];
        assert_eq!(p.size, 12.0);
        assert_eq!(p.y, 698.0);
    }

    #[test]
    fn figure_markers_are_ignored() {
        let roman = font("Times-Roman");
        let mut items = vec![PageItem::FigureStart {
            name: "Fm0".into(),
            page_index: 0,
        }];
        items.extend(word("in", &roman, 100.0, 700.0));
        items.push(PageItem::FigureEnd { name: "Fm0".into() });
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs[0].text, "in");
    }

    #[test]
    fn wide_jump_splits_formula() {
        let roman = font("Times-Roman");
        let math = font("CMMI10");
        let mut items = word("a", &roman, 100.0, 700.0);
        items.extend(word("x", &math, 105.0, 700.0));
        // 195pt to the right on a 600pt page, past the 150pt break
        items.extend(word("y", &math, 300.0, 700.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.formulas.len(), 2);
        assert_eq!(layout.formulas[0].text(), "x");
        assert_eq!(layout.formulas[1].text(), "y");
        assert_eq!(layout.paragraphs[0].text, "a$v0$ $v1$");
        assert_eq!(glyph_total(&items), assigned_total(&layout));
    }

    #[test]
    fn wide_jump_inside_reserved_region_keeps_formula() {
        let roman = font("Times-Roman");
        let mask = ClassificationMask::from_cells(600, 800, vec![RESERVED_REGION; 600 * 800])
            .unwrap();
        let mut items = word("ab", &roman, 100.0, 700.0);
        items.extend(word("cd", &roman, 300.0, 700.0));
        let layout = run(&items, &mask);
        assert_eq!(layout.formulas.len(), 1);
        assert_eq!(layout.formulas[0].text(), "abcd");
        assert_eq!(layout.paragraph_texts(), vec!["$v0$"]);
    }

    #[test]
    fn raised_formula_after_text_keeps_left_offset() {
        let roman = font("Times-Roman");
        let math = font("CMMI10");
        let mut items = word("ab", &roman, 100.0, 700.0);
        items.extend(word("x", &math, 110.0, 703.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs[0].text, "ab$v0$");
        assert_eq!(layout.formulas[0].y_offset, 3.0);
    }

    #[test]
    fn text_after_formula_replaces_left_offset() {
        let roman = font("Times-Roman");
        let math = font("CMMI10");
        let mut items = word("ab", &roman, 100.0, 700.0);
        items.extend(word("x", &math, 110.0, 703.0));
        items.extend(word("c", &roman, 115.0, 701.0));
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs[0].text, "ab$v0$c");
        assert_eq!(layout.formulas[0].y_offset, 2.0);
    }

    #[test]
    fn formula_at_page_end_is_flushed() {
        let math = font("CMMI10");
        let items = word("xy", &math, 100.0, 700.0);
        let layout = run(&items, &ClassificationMask::uniform(600, 800));
        assert_eq!(layout.paragraphs.len(), 1);
        assert_eq!(layout.paragraphs[0].text, "$v0$");
        assert_eq!(layout.formulas[0].width, 10.0);
    }
}
