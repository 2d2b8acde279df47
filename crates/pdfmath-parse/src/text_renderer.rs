//! Glyph positioning for the text showing operators.
//!
//! Walks the codes of `Tj`, `'`, `"` and `TJ` strings, emitting one
//! [`GlyphEvent`] per code and advancing the text matrix. Character spacing
//! is applied between glyphs and after a `TJ` adjustment, never before the
//! first glyph of a string; word spacing applies to single-byte code 32.

use pdfmath_core::Ctm;

use crate::fonts::LoadedFont;
use crate::handler::{ContentHandler, GlyphEvent};
use crate::text_state::TextState;

/// One element of a `TJ` array.
#[derive(Debug, Clone, PartialEq)]
pub enum TjElement<'a> {
    Text(&'a [u8]),
    /// Thousandths of an em, subtracted from the horizontal position.
    Adjust(f64),
}

/// Show a `TJ` sequence (a `Tj` string is a one-element sequence).
pub fn show_text(
    elements: &[TjElement<'_>],
    font: &LoadedFont,
    tstate: &mut TextState,
    ctm: &Ctm,
    handler: &mut dyn ContentHandler,
) {
    let scaling = tstate.h_scaling_normalized();
    let char_space = tstate.char_spacing * scaling;
    let word_space = if font.is_composite() {
        0.0
    } else {
        tstate.word_spacing * scaling
    };
    let adjust_scale = 0.001 * tstate.font_size * scaling;
    let mut need_char_space = false;

    for element in elements {
        match element {
            TjElement::Adjust(amount) => {
                tstate.advance_text_position(-amount * adjust_scale);
                need_char_space = true;
            }
            TjElement::Text(bytes) => {
                for code in font.codes(bytes) {
                    if need_char_space {
                        tstate.advance_text_position(char_space);
                    }
                    let event = GlyphEvent {
                        code,
                        text: font.text(code),
                        font: font.glyph_font().clone(),
                        font_size: tstate.font_size,
                        text_matrix: *tstate.text_matrix(),
                        ctm: *ctm,
                        displacement: font.width(code),
                        h_scaling: scaling,
                        rise: tstate.rise,
                        descent: font.descent(),
                    };
                    tstate.advance_text_position(event.advance());
                    handler.on_glyph(event);
                    if code == 32 && word_space != 0.0 {
                        tstate.advance_text_position(word_space);
                    }
                    need_char_space = true;
                }
            }
        }
    }
}
