//! Retypesetting translated paragraphs into PDF text operators.
//!
//! The output is a fragment meant to sit between `BT` and `ET`; strokes are
//! emitted with an `ET q ... Q BT` escape so the text object stays balanced.

use std::fmt::Write as _;

use regex::Regex;
use tracing::{debug, trace};

use crate::assembler::{FormulaGroup, PageLayout, Paragraph};
use crate::error::PdfError;
use crate::fonts::{FallbackFont, FontMetricsProvider, round_trips};
use crate::glyph::LineSegment;

/// Options for laying out translated text.
#[derive(Debug, Clone, PartialEq)]
pub struct TypesetOptions {
    /// Target language code; selects the line spacing.
    pub lang_out: String,
    /// Resource name of the registered Latin font.
    pub latin_font: String,
    /// Resource name of the Unicode fallback font.
    pub fallback_font: String,
    /// Try the paragraph's own font before the Latin font.
    pub reuse_source_fonts: bool,
    /// Strokes at least this wide are treated as backgrounds and dropped.
    pub max_line_width: f64,
    /// Overflow tolerance, as a fraction of the font size.
    pub wrap_epsilon: f64,
}

impl Default for TypesetOptions {
    fn default() -> Self {
        Self {
            lang_out: "zh".to_string(),
            latin_font: "tiro".to_string(),
            fallback_font: "noto".to_string(),
            reuse_source_fonts: true,
            max_line_width: 5.0,
            wrap_epsilon: 0.1,
        }
    }
}

/// Line spacing multiplier for a target language.
pub fn line_spacing(lang: &str) -> f64 {
    match lang {
        "zh" | "zh-CN" | "zh-TW" | "zh-Hans" | "zh-Hant" => 1.4,
        "ja" => 1.1,
        "ko" | "en" => 1.2,
        "ar" => 1.0,
        "ru" | "uk" | "ta" => 0.8,
        _ => 1.1,
    }
}

/// One unit of translated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Char(char),
    /// A `$v<N>$` placeholder. The index may be out of range.
    Formula(usize),
}

/// Fonts available while typesetting one page.
#[derive(Clone, Copy)]
pub struct TypesetFonts<'a> {
    /// Page fonts plus the registered Latin font.
    pub metrics: &'a dyn FontMetricsProvider,
    pub fallback: &'a dyn FallbackFont,
}

/// Lays out translated paragraphs at their source positions.
pub struct Retypesetter<'a> {
    options: &'a TypesetOptions,
    fonts: TypesetFonts<'a>,
    spacing: f64,
    marker: Regex,
    modifier: Regex,
}

/// A run of characters drawn with one font.
#[derive(Default)]
struct Run {
    x: f64,
    text: String,
}

impl<'a> Retypesetter<'a> {
    pub fn new(options: &'a TypesetOptions, fonts: TypesetFonts<'a>) -> Result<Self, PdfError> {
        Ok(Self {
            options,
            fonts,
            spacing: line_spacing(&options.lang_out),
            // translators sometimes drop the leading `$` or pad the digits
            marker: Regex::new(r"(?i)^\$?\s*v([0-9\s]+)\$")?,
            modifier: Regex::new(r"^[\p{Lm}\p{Mn}\p{Sk}]")?,
        })
    }

    /// Split translated text into characters and formula placeholders.
    ///
    /// Only ASCII digits form a placeholder; anything else stays text.
    /// Placeholders whose digits do not parse are dropped.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut rest = text;
        while let Some(ch) = rest.chars().next() {
            if let Some(caps) = self.marker.captures(rest) {
                let len = caps.get(0).map_or(ch.len_utf8(), |m| m.end());
                let digits: String = caps
                    .get(1)
                    .map_or("", |m| m.as_str())
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect();
                if let Ok(index) = digits.parse() {
                    tokens.push(Token::Formula(index));
                }
                rest = &rest[len..];
            } else {
                tokens.push(Token::Char(ch));
                rest = &rest[ch.len_utf8()..];
            }
        }
        tokens
    }

    /// Width to pull back after a formula ending in a combining mark.
    fn modifier_width(&self, formula: &FormulaGroup) -> f64 {
        match formula.glyphs.last() {
            Some(last) if self.modifier.is_match(&last.text) => last.width(),
            _ => 0.0,
        }
    }

    /// Pick the font for one character and its advance at `size`.
    ///
    /// A zero width counts as missing: subset fonts list every code in
    /// `/Widths` but only carry the glyphs the page used.
    fn resolve_char(&self, paragraph: &Paragraph, ch: char) -> (String, f64) {
        let size = paragraph.size;
        if self.options.reuse_source_fonts {
            let source = paragraph.font.resource_name.as_str();
            if let Some(width) = self.usable_width(source, ch) {
                return (source.to_string(), width / 1000.0 * size);
            }
        }
        let latin = self.options.latin_font.as_str();
        if let Some(width) = self.usable_width(latin, ch) {
            return (latin.to_string(), width / 1000.0 * size);
        }
        (
            self.options.fallback_font.clone(),
            self.fonts.fallback.advance(ch, size),
        )
    }

    fn usable_width(&self, font: &str, ch: char) -> Option<f64> {
        let metrics = self.fonts.metrics;
        let width = metrics.advance_width(font, ch as u32)?;
        (width > 0.0 && round_trips(metrics, font, ch)).then_some(width)
    }

    /// Hex string for `text` drawn with `font`.
    fn encode(&self, font: &str, composite: bool, text: &str) -> String {
        let mut hex = String::with_capacity(text.len() * 4);
        for ch in text.chars() {
            if font == self.options.fallback_font {
                let _ = write!(hex, "{:04x}", self.fonts.fallback.glyph_index(ch));
            } else if composite {
                let _ = write!(hex, "{:04x}", ch as u32);
            } else {
                let _ = write!(hex, "{:02x}", ch as u32);
            }
        }
        hex
    }

    fn emit_run(&self, ops: &mut String, font: &str, size: f64, y: f64, run: &Run) {
        let composite = self.fonts.metrics.is_composite(font);
        let hex = self.encode(font, composite, &run.text);
        let _ = write!(
            ops,
            "/{font} {size:.6} Tf 1 0 0 1 {:.6} {y:.6} Tm [<{hex}>] TJ ",
            run.x
        );
    }

    fn emit_line(&self, ops: &mut String, line: &LineSegment, dx: f64, dy: f64) {
        if line.width >= self.options.max_line_width {
            return;
        }
        let _ = write!(
            ops,
            "ET q 1 0 0 1 {:.6} {:.6} cm [] 0 d 0 J {:.6} w 0 0 m {:.6} {:.6} l S Q BT ",
            line.start.x + dx,
            line.start.y + dy,
            line.width,
            line.end.x - line.start.x,
            line.end.y - line.start.y,
        );
    }

    fn emit_formula(&self, ops: &mut String, formula: &FormulaGroup, x: f64, y: f64, fix: f64) {
        let Some(first) = formula.glyphs.first() else {
            return;
        };
        for glyph in &formula.glyphs {
            let hex = if glyph.font.composite {
                format!("{:04x}", glyph.code)
            } else {
                format!("{:02x}", glyph.code)
            };
            let _ = write!(
                ops,
                "/{} {:.6} Tf 1 0 0 1 {:.6} {:.6} Tm [<{hex}>] TJ ",
                glyph.font.resource_name,
                glyph.size,
                x + glyph.x0() - first.x0(),
                fix + y + glyph.y0() - first.y0(),
            );
        }
        for line in &formula.lines {
            self.emit_line(ops, line, x - first.x0(), fix + y - first.y0());
        }
    }

    /// Append operators for one paragraph's translation to `ops`.
    pub fn typeset_paragraph(
        &self,
        paragraph: &Paragraph,
        translated: &str,
        formulas: &[FormulaGroup],
        ops: &mut String,
    ) {
        let size = paragraph.size;
        let limit = paragraph.x1 + self.options.wrap_epsilon * size;
        let mut x = paragraph.x;
        let mut y = paragraph.y;
        let mut run = Run {
            x,
            text: String::new(),
        };
        let mut current: Option<String> = None;
        let mut pending: Option<String> = None;

        trace!(
            y,
            x,
            x0 = paragraph.x0,
            x1 = paragraph.x1,
            size,
            font = %paragraph.font.base_name,
            line_break = paragraph.line_break,
            "{} | {}",
            paragraph.text,
            translated
        );

        for token in self.tokenize(translated) {
            let (mut advance, modifier, formula, ch) = match token {
                Token::Formula(index) => {
                    let Some(formula) = formulas.get(index) else {
                        debug!(index, "skipping placeholder without a formula");
                        continue;
                    };
                    (formula.width, self.modifier_width(formula), Some(formula), None)
                }
                Token::Char(ch) => {
                    let (font, advance) = self.resolve_char(paragraph, ch);
                    pending = Some(font);
                    (advance, 0.0, None, Some(ch))
                }
            };

            let overflow = x + advance > limit;
            if pending != current || formula.is_some() || overflow {
                if !run.text.is_empty() {
                    if let Some(font) = &current {
                        self.emit_run(ops, font, size, y, &run);
                    }
                    run.text.clear();
                }
            }
            if paragraph.line_break && overflow {
                x = paragraph.x0;
                y -= size * self.spacing;
            }

            match (formula, ch) {
                (Some(formula), _) => {
                    let fix = if current.is_some() {
                        formula.y_offset
                    } else {
                        0.0
                    };
                    self.emit_formula(ops, formula, x, y, fix);
                }
                (None, Some(ch)) => {
                    if run.text.is_empty() {
                        run.x = x;
                        if x == paragraph.x0 && ch == ' ' {
                            advance = 0.0;
                        } else {
                            run.text.push(ch);
                        }
                    } else {
                        run.text.push(ch);
                    }
                }
                (None, None) => {}
            }

            advance -= modifier;
            current.clone_from(&pending);
            x += advance;
        }

        if !run.text.is_empty() {
            if let Some(font) = &current {
                self.emit_run(ops, font, size, y, &run);
            }
        }
    }

    /// Operators for a whole page: every paragraph, then free-standing lines,
    /// wrapped in one text object.
    ///
    /// `translations[i]` is the text for `layout.paragraphs[i]`; missing
    /// entries fall back to the source text.
    pub fn typeset_page(&self, layout: &PageLayout, translations: &[String]) -> String {
        let mut ops = String::new();
        for (i, paragraph) in layout.paragraphs.iter().enumerate() {
            let text = translations
                .get(i)
                .map_or(paragraph.text.as_str(), String::as_str);
            self.typeset_paragraph(paragraph, text, &layout.formulas, &mut ops);
        }
        for line in &layout.lines {
            self.emit_line(&mut ops, line, 0.0, 0.0);
        }
        format!("BT {ops}ET ")
    }
}
