//! Text-versus-formula classification of individual glyphs.
//!
//! Precedence: the mask's reserved region, then the subscript-size test,
//! then the vertical-matrix test, then font-name and character patterns.
//! Latin letters inside an open double quote are always text.

use regex::Regex;

use crate::error::PdfError;
use crate::glyph::{Glyph, strip_subset_prefix};
use crate::mask::RESERVED_REGION;

/// Outcome of classifying one glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Text,
    Formula,
}

impl Classification {
    pub fn is_formula(self) -> bool {
        self == Classification::Formula
    }
}

/// Tunable geometric thresholds used while scanning a page.
///
/// The defaults are the values every existing translation was produced
/// with; changing them changes paragraph and formula boundaries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblerThresholds {
    /// A glyph smaller than `ratio * paragraph size` is a sub/superscript.
    pub subscript_ratio: f64,
    /// Horizontal gap (points) above which a space is inserted.
    pub space_gap: f64,
    /// Fraction of the page width beyond which a horizontal jump closes a formula.
    pub formula_break_fraction: f64,
}

impl Default for AssemblerThresholds {
    fn default() -> Self {
        Self {
            subscript_ratio: 0.79,
            space_gap: 1.0,
            formula_break_fraction: 0.25,
        }
    }
}

/// Font-name and character rules that mark glyphs as mathematics.
#[derive(Debug, Clone)]
pub struct FormulaHeuristics {
    font_pattern: Option<Regex>,
    char_pattern: Option<Regex>,
    math_char: Regex,
}

impl FormulaHeuristics {
    /// Build the heuristics, optionally overriding the built-in font list
    /// and character rule with patterns anchored at the start of the name
    /// or character.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::Other`] if either pattern is not a valid regex.
    pub fn new(font_pattern: Option<&str>, char_pattern: Option<&str>) -> Result<Self, PdfError> {
        Ok(Self {
            font_pattern: font_pattern.map(anchored).transpose()?,
            char_pattern: char_pattern.map(anchored).transpose()?,
            math_char: Regex::new(r"^[\p{Mn}\p{Sm}\x{0370}-\x{03FF}]")?,
        })
    }

    /// Whether a font name belongs to a math or symbol family.
    pub fn is_formula_font(&self, base_name: &str) -> bool {
        let family = strip_subset_prefix(base_name);
        match &self.font_pattern {
            Some(re) => re.is_match(family),
            None => is_builtin_math_font(family),
        }
    }

    /// Whether a glyph's text is mathematical on its own.
    pub fn is_formula_char(&self, text: &str) -> bool {
        match &self.char_pattern {
            Some(re) => re.is_match(text),
            None => !text.is_empty() && text != " " && self.math_char.is_match(text),
        }
    }

    /// Combined font/character rule. Unmapped `(cid:N)` glyphs always count.
    pub fn is_formula(&self, base_name: &str, text: &str) -> bool {
        text.starts_with("(cid:") || self.is_formula_font(base_name) || self.is_formula_char(text)
    }
}

fn anchored(pattern: &str) -> Result<Regex, PdfError> {
    Ok(Regex::new(&format!("^(?:{pattern})"))?)
}

/// Built-in list of TeX and office math font families.
fn is_builtin_math_font(family: &str) -> bool {
    const PREFIXES: [&str; 6] = ["LINE", "TeX-", "rsfs", "txsy", "wasy", "stmary"];
    const TWO_LETTER: [&str; 7] = ["MS", "XY", "MT", "BL", "RM", "EU", "RS"];

    let bytes = family.as_bytes();
    if bytes.len() >= 3 && family.starts_with("CM") && bytes[2] != b'R' {
        return true;
    }
    if bytes.len() >= 3
        && TWO_LETTER.iter().any(|p| family.starts_with(p))
        && bytes[2].is_ascii_uppercase()
    {
        return true;
    }
    PREFIXES.iter().any(|p| family.starts_with(p))
        || family.contains("Math")
        || family.contains("Sym")
}

/// Bold or medium weight, matched case-insensitively.
pub fn is_emphasis_font(base_name: &str) -> bool {
    let lower = base_name.to_ascii_lowercase();
    lower.contains("medi") || lower.contains("bold")
}

/// What the classifier may know about the scan when it sees a glyph.
#[derive(Debug, Clone, Copy)]
pub struct GlyphContext<'a> {
    /// Mask region under the glyph.
    pub region: u32,
    /// Mask region of the previous glyph, if any.
    pub previous_region: Option<u32>,
    /// Text accumulated so far in the most recent paragraph.
    pub paragraph_text: Option<&'a str>,
    /// Representative size of the most recent paragraph.
    pub paragraph_size: Option<f64>,
}

/// Classify one glyph. Bracket balancing is stateful and handled by the assembler.
pub fn classify(
    glyph: &Glyph,
    ctx: &GlyphContext<'_>,
    heuristics: &FormulaHeuristics,
    thresholds: &AssemblerThresholds,
) -> Classification {
    if ctx.region == RESERVED_REGION {
        return Classification::Formula;
    }
    if ctx.previous_region == Some(ctx.region) {
        if let (Some(text), Some(size)) = (ctx.paragraph_text, ctx.paragraph_size) {
            if text.trim().chars().count() > 1 && glyph.size < size * thresholds.subscript_ratio {
                return Classification::Formula;
            }
        }
    }
    if glyph.is_vertical() {
        return Classification::Formula;
    }
    if let Some(text) = ctx.paragraph_text {
        let in_quotes = text.matches('"').count() % 2 == 1;
        if in_quotes && glyph.text.chars().any(|c| c.is_ascii_alphabetic()) {
            return Classification::Text;
        }
    }
    if heuristics.is_formula(&glyph.font.base_name, &glyph.text) {
        Classification::Formula
    } else {
        Classification::Text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::geometry::BBox;
    use crate::glyph::GlyphFont;

    fn heuristics() -> FormulaHeuristics {
        FormulaHeuristics::new(None, None).unwrap()
    }

    fn glyph(text: &str, font: &str, size: f64) -> Glyph {
        Glyph {
            text: text.to_string(),
            code: text.chars().next().map_or(0, |c| c as u32),
            font: Arc::new(GlyphFont::new("F1", font, false)),
            size,
            matrix: [1.0, 0.0, 0.0, 1.0, 0.0, 0.0],
            bbox: BBox::new(10.0, 10.0, 15.0, 10.0 + size),
            advance: 5.0,
            displacement: 500.0,
        }
    }

    fn ctx<'a>(region: u32, prev: Option<u32>, text: Option<&'a str>) -> GlyphContext<'a> {
        GlyphContext {
            region,
            previous_region: prev,
            paragraph_text: text,
            paragraph_size: text.map(|_| 10.0),
        }
    }

    #[test]
    fn builtin_math_fonts() {
        let h = heuristics();
        assert!(h.is_formula_font("CMMI10"));
        assert!(h.is_formula_font("ABCDEF+CMSY7"));
        assert!(!h.is_formula_font("CMR10"));
        assert!(h.is_formula_font("MSBM10"));
        assert!(!h.is_formula_font("MSx"));
        assert!(h.is_formula_font("CambriaMath"));
        assert!(h.is_formula_font("Symbol"));
        assert!(h.is_formula_font("rsfs10"));
        assert!(!h.is_formula_font("Times-Roman"));
        assert!(!h.is_formula_font("CM"));
    }

    #[test]
    fn custom_font_pattern_replaces_builtin_list() {
        let h = FormulaHeuristics::new(Some("Foo"), None).unwrap();
        assert!(h.is_formula_font("FooBar"));
        assert!(!h.is_formula_font("BarFoo"));
        assert!(!h.is_formula_font("CMMI10"));
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(FormulaHeuristics::new(Some("("), None).is_err());
    }

    #[test]
    fn math_characters() {
        let h = heuristics();
        assert!(h.is_formula_char("="));
        assert!(h.is_formula_char("∑"));
        assert!(h.is_formula_char("α"));
        assert!(h.is_formula_char("\u{0301}"));
        assert!(!h.is_formula_char("a"));
        assert!(!h.is_formula_char(" "));
        assert!(!h.is_formula_char(""));
        assert!(!h.is_formula_char("("));
    }

    #[test]
    fn unmapped_glyphs_are_formula() {
        assert!(heuristics().is_formula("Times-Roman", "(cid:12)"));
    }

    #[test]
    fn reserved_region_wins_over_plain_font() {
        let g = glyph("a", "Times-Roman", 10.0);
        let c = classify(&g, &ctx(0, Some(0), None), &heuristics(), &Default::default());
        assert_eq!(c, Classification::Formula);
    }

    #[test]
    fn small_glyph_after_two_characters_is_subscript() {
        let g = glyph("i", "Times-Roman", 7.0);
        let h = heuristics();
        let t = AssemblerThresholds::default();
        assert!(classify(&g, &ctx(2, Some(2), Some("ab")), &h, &t).is_formula());
        // only one character so far
        assert!(!classify(&g, &ctx(2, Some(2), Some("a")), &h, &t).is_formula());
        let g = glyph("i", "Times-Roman", 8.0);
        assert!(!classify(&g, &ctx(2, Some(2), Some("ab")), &h, &t).is_formula());
    }

    #[test]
    fn vertical_matrix_is_formula() {
        let mut g = glyph("a", "Times-Roman", 10.0);
        g.matrix = [0.0, 1.0, -1.0, 0.0, 0.0, 0.0];
        assert!(classify(&g, &ctx(2, None, None), &heuristics(), &Default::default()).is_formula());
    }

    #[test]
    fn quoted_latin_stays_text() {
        let g = glyph("x", "CMMI10", 10.0);
        let h = heuristics();
        let t = AssemblerThresholds::default();
        assert!(!classify(&g, &ctx(2, Some(2), Some("the \"")), &h, &t).is_formula());
        assert!(classify(&g, &ctx(2, Some(2), Some("the \"a\" ")), &h, &t).is_formula());
    }

    #[test]
    fn emphasis_fonts() {
        assert!(is_emphasis_font("Times-Bold"));
        assert!(is_emphasis_font("NimbusRomNo9L-Medi"));
        assert!(is_emphasis_font("ABC+SOMEBOLD"));
        assert!(!is_emphasis_font("Times-Roman"));
    }
}
