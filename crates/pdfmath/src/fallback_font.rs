//! The Unicode fallback font.
//!
//! Characters no page font can draw are written with this font, coded by
//! glyph index. Every glyph handed out is remembered so the embedded font
//! only declares widths for glyphs the document uses.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

use fontdue::{Font, FontSettings};
use pdfmath_core::FallbackFont;
use pdfmath_parse::{EmbeddedFont, EmbeddedGlyph};
use tracing::debug;

use crate::error::Error;

/// Glyph indices handed out so far, with the character each one draws.
#[derive(Debug, Default)]
struct UsedGlyphs(Mutex<BTreeMap<u16, char>>);

impl UsedGlyphs {
    fn record(&self, gid: u16, ch: char) {
        if let Ok(mut used) = self.0.lock() {
            used.entry(gid).or_insert(ch);
        }
    }

    fn snapshot(&self) -> Vec<(u16, char)> {
        self.0
            .lock()
            .map(|used| used.iter().map(|(&g, &c)| (g, c)).collect())
            .unwrap_or_default()
    }
}

/// A TrueType fallback font loaded with fontdue and embedded on save.
pub struct FontdueFallback {
    font: Font,
    program: Vec<u8>,
    base_name: String,
    used: UsedGlyphs,
}

impl std::fmt::Debug for FontdueFallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontdueFallback")
            .field("base_name", &self.base_name)
            .field("glyphs", &self.font.glyph_count())
            .finish_non_exhaustive()
    }
}

impl FontdueFallback {
    pub fn from_bytes(program: Vec<u8>, base_name: &str) -> Result<Self, Error> {
        let font = Font::from_bytes(program.as_slice(), FontSettings::default())
            .map_err(|e| Error::Font(format!("{base_name}: {e}")))?;
        debug!(font = base_name, glyphs = font.glyph_count(), "loaded fallback font");
        Ok(Self {
            font,
            program,
            base_name: base_name.to_string(),
            used: UsedGlyphs::default(),
        })
    }

    /// Load a TrueType file; the PostScript name is taken from the file stem.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let program = std::fs::read(path)?;
        let name: String = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Fallback".to_string())
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        Self::from_bytes(program, &name)
    }
}

impl FallbackFont for FontdueFallback {
    fn glyph_index(&self, ch: char) -> u16 {
        let gid = self.font.lookup_glyph_index(ch);
        self.used.record(gid, ch);
        gid
    }

    fn advance(&self, ch: char, size: f64) -> f64 {
        f64::from(self.font.metrics(ch, size as f32).advance_width)
    }
}

/// Metric-only fallback used when no font program is configured.
///
/// Glyph indices are the BMP code point; wide characters advance a full
/// em and everything else half an em. The font is referenced, not embedded,
/// so viewers substitute their own.
#[derive(Debug, Default)]
pub struct MetricFallback {
    used: UsedGlyphs,
}

impl MetricFallback {
    pub fn new() -> Self {
        Self::default()
    }

    fn em_fraction(ch: char) -> f64 {
        if is_wide(ch) { 1.0 } else { 0.5 }
    }
}

impl FallbackFont for MetricFallback {
    fn glyph_index(&self, ch: char) -> u16 {
        let gid = u16::try_from(u32::from(ch)).unwrap_or(0);
        self.used.record(gid, ch);
        gid
    }

    fn advance(&self, ch: char, size: f64) -> f64 {
        Self::em_fraction(ch) * size
    }
}

/// East Asian wide and fullwidth ranges.
fn is_wide(ch: char) -> bool {
    matches!(u32::from(ch),
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xA000..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6
        | 0x20000..=0x3FFFD)
}

/// The configured fallback font, in either flavor.
#[derive(Debug)]
pub enum Fallback {
    Embedded(FontdueFallback),
    Metric(MetricFallback),
}

impl Fallback {
    /// Load `path`, or use the metric-only fallback when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        Ok(match path {
            Some(path) => Fallback::Embedded(FontdueFallback::open(path)?),
            None => Fallback::Metric(MetricFallback::new()),
        })
    }

    /// What the content writer embeds: the used glyphs with their widths.
    pub fn embedded_font(&self) -> EmbeddedFont {
        match self {
            Fallback::Embedded(f) => {
                let glyphs = f
                    .used
                    .snapshot()
                    .into_iter()
                    .map(|(gid, ch)| EmbeddedGlyph {
                        gid,
                        width: f64::from(f.font.metrics_indexed(gid, 1000.0).advance_width),
                        ch,
                    })
                    .collect();
                let (ascent, descent) = f
                    .font
                    .horizontal_line_metrics(1000.0)
                    .map_or((880.0, -120.0), |m| (f64::from(m.ascent), f64::from(m.descent)));
                EmbeddedFont {
                    base_name: f.base_name.clone(),
                    program: Some(f.program.clone()),
                    glyphs,
                    ascent,
                    descent,
                }
            }
            Fallback::Metric(f) => EmbeddedFont {
                base_name: "NotoSans-Regular".to_string(),
                program: None,
                glyphs: f
                    .used
                    .snapshot()
                    .into_iter()
                    .map(|(gid, ch)| EmbeddedGlyph {
                        gid,
                        width: MetricFallback::em_fraction(ch) * 1000.0,
                        ch,
                    })
                    .collect(),
                ascent: 880.0,
                descent: -120.0,
            },
        }
    }
}

impl FallbackFont for Fallback {
    fn glyph_index(&self, ch: char) -> u16 {
        match self {
            Fallback::Embedded(f) => f.glyph_index(ch),
            Fallback::Metric(f) => f.glyph_index(ch),
        }
    }

    fn advance(&self, ch: char, size: f64) -> f64 {
        match self {
            Fallback::Embedded(f) => f.advance(ch, size),
            Fallback::Metric(f) => f.advance(ch, size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_fallback_widths() {
        let fallback = MetricFallback::new();
        assert_eq!(fallback.advance('中', 10.0), 10.0);
        assert_eq!(fallback.advance('a', 10.0), 5.0);
        assert_eq!(fallback.glyph_index('中'), 0x4E2D);
        assert_eq!(fallback.glyph_index('𝑥'), 0);
    }

    #[test]
    fn used_glyphs_are_embedded_once() {
        let fallback = Fallback::Metric(MetricFallback::new());
        fallback.glyph_index('中');
        fallback.glyph_index('文');
        fallback.glyph_index('中');
        let font = fallback.embedded_font();
        assert!(font.program.is_none());
        assert_eq!(font.glyphs.len(), 2);
        assert_eq!(
            font.glyphs[0],
            EmbeddedGlyph { gid: 0x4E2D, width: 1000.0, ch: '中' }
        );
    }

    #[test]
    fn rejects_invalid_font_program() {
        let err = FontdueFallback::from_bytes(b"not a font".to_vec(), "Broken").unwrap_err();
        assert!(matches!(err, Error::Font(_)));
    }

    #[test]
    fn missing_font_file_is_io_error() {
        let err = Fallback::load(Some(Path::new("/nonexistent/font.ttf"))).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
