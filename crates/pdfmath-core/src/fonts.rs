//! Font capabilities the retypesetter needs from the backend.

/// Per-page font lookups, keyed by the resource name a glyph was drawn with.
///
/// Implemented by the parsing backend for the page's own fonts and for the
/// registered Latin font. Widths are glyph-space units (thousandths of an em).
pub trait FontMetricsProvider {
    /// Width the font declares explicitly for `code`. `None` when the font
    /// has no entry for it, so a fallback must be used.
    fn advance_width(&self, font: &str, code: u32) -> Option<f64>;

    /// Unicode text the font maps `code` to.
    fn to_unicode(&self, font: &str, code: u32) -> Option<String>;

    /// Whether the font uses two-byte codes.
    fn is_composite(&self, font: &str) -> bool;
}

/// The Unicode fallback font that can draw any character.
///
/// Codes written with this font are glyph indices in its font program.
pub trait FallbackFont: Send + Sync {
    fn glyph_index(&self, ch: char) -> u16;

    /// Horizontal advance at `size` points.
    fn advance(&self, ch: char, size: f64) -> f64;
}

/// Whether the code equal to `ch`'s scalar value decodes back to `ch`.
///
/// Retypeset text is written with code = Unicode scalar, so a font can only
/// render `ch` when this holds.
pub fn round_trips(provider: &dyn FontMetricsProvider, font: &str, ch: char) -> bool {
    provider
        .to_unicode(font, ch as u32)
        .is_some_and(|decoded| decoded.chars().eq(std::iter::once(ch)))
}


#[cfg(test)]
mod tests {
    use super::testing::TableFonts;
    use super::*;

    #[test]
    fn round_trip_accepts_encodable_chars() {
        let fonts = TableFonts::default().with_font("F1", false, 500.0);
        assert!(round_trips(&fonts, "F1", 'a'));
        assert!(!round_trips(&fonts, "F1", 'é'));
        assert!(!round_trips(&fonts, "F9", 'a'));
    }
}
