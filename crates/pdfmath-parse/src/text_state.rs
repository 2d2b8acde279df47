//! Text state for the content stream interpreter.
//!
//! Tracks the text object (BT/ET), the current font and the text and line
//! matrices moved by Td, TD, Tm and T*.

use pdfmath_core::Ctm;

/// The part of the text state saved and restored by `q`/`Q`.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStateSnapshot {
    pub char_spacing: f64,
    pub word_spacing: f64,
    pub h_scaling: f64,
    pub leading: f64,
    pub font_name: String,
    pub font_size: f64,
    pub rise: f64,
}

/// Text parameters set by Tc, Tw, Tz, TL, Tf and Ts, plus the matrices.
#[derive(Debug, Clone, PartialEq)]
pub struct TextState {
    pub char_spacing: f64,
    /// Applied after each single-byte code 32.
    pub word_spacing: f64,
    /// Percentage, 100 = normal.
    pub h_scaling: f64,
    pub leading: f64,
    pub font_name: String,
    pub font_size: f64,
    pub rise: f64,
    in_text_object: bool,
    text_matrix: Ctm,
    line_matrix: Ctm,
}

impl Default for TextState {
    fn default() -> Self {
        Self::new()
    }
}

impl TextState {
    pub fn new() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            h_scaling: 100.0,
            leading: 0.0,
            font_name: String::new(),
            font_size: 0.0,
            rise: 0.0,
            in_text_object: false,
            text_matrix: Ctm::identity(),
            line_matrix: Ctm::identity(),
        }
    }

    pub fn in_text_object(&self) -> bool {
        self.in_text_object
    }

    pub fn text_matrix(&self) -> &Ctm {
        &self.text_matrix
    }

    pub fn h_scaling_normalized(&self) -> f64 {
        self.h_scaling / 100.0
    }

    // --- BT / ET ---

    pub fn begin_text(&mut self) {
        self.text_matrix = Ctm::identity();
        self.line_matrix = Ctm::identity();
        self.in_text_object = true;
    }

    pub fn end_text(&mut self) {
        self.in_text_object = false;
    }

    // --- Tf ---

    pub fn set_font(&mut self, font_name: String, font_size: f64) {
        self.font_name = font_name;
        self.font_size = font_size;
    }

    // --- Tm ---

    /// Replace both the text and line matrices.
    pub fn set_text_matrix(&mut self, m: Ctm) {
        self.text_matrix = m;
        self.line_matrix = m;
    }

    // --- Td / TD / T* ---

    pub fn move_text_position(&mut self, tx: f64, ty: f64) {
        self.line_matrix = Ctm::translation(tx, ty).concat(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    /// `TD`: sets the leading to `-ty`, then moves like `Td`.
    pub fn move_text_position_and_set_leading(&mut self, tx: f64, ty: f64) {
        self.leading = -ty;
        self.move_text_position(tx, ty);
    }

    pub fn move_to_next_line(&mut self) {
        let leading = self.leading;
        self.move_text_position(0.0, -leading);
    }

    /// Move the text matrix by `tx` text-space units along the baseline.
    pub fn advance_text_position(&mut self, tx: f64) {
        self.text_matrix = Ctm::translation(tx, 0.0).concat(&self.text_matrix);
    }

    // --- q / Q ---

    pub fn save_snapshot(&self) -> TextStateSnapshot {
        TextStateSnapshot {
            char_spacing: self.char_spacing,
            word_spacing: self.word_spacing,
            h_scaling: self.h_scaling,
            leading: self.leading,
            font_name: self.font_name.clone(),
            font_size: self.font_size,
            rise: self.rise,
        }
    }

    pub fn restore_snapshot(&mut self, snapshot: TextStateSnapshot) {
        self.char_spacing = snapshot.char_spacing;
        self.word_spacing = snapshot.word_spacing;
        self.h_scaling = snapshot.h_scaling;
        self.leading = snapshot.leading;
        self.font_name = snapshot.font_name;
        self.font_size = snapshot.font_size;
        self.rise = snapshot.rise;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_text_resets_matrices() {
        let mut ts = TextState::new();
        ts.set_text_matrix(Ctm::new(2.0, 0.0, 0.0, 2.0, 50.0, 60.0));
        ts.begin_text();
        assert!(ts.in_text_object());
        assert_eq!(*ts.text_matrix(), Ctm::identity());
        ts.end_text();
        assert!(!ts.in_text_object());
    }

    #[test]
    fn td_moves_from_line_start() {
        let mut ts = TextState::new();
        ts.begin_text();
        ts.move_text_position(72.0, 700.0);
        ts.advance_text_position(30.0);
        assert_eq!(ts.text_matrix().e, 102.0);
        ts.move_text_position(0.0, -14.0);
        assert_eq!(ts.text_matrix().e, 72.0);
        assert_eq!(ts.text_matrix().f, 686.0);
    }

    #[test]
    fn td_is_scaled_by_text_matrix() {
        let mut ts = TextState::new();
        ts.begin_text();
        ts.set_text_matrix(Ctm::new(2.0, 0.0, 0.0, 2.0, 10.0, 10.0));
        ts.move_text_position(5.0, 5.0);
        assert_eq!(ts.text_matrix().e, 20.0);
        assert_eq!(ts.text_matrix().f, 20.0);
    }

    #[test]
    fn capital_td_sets_leading() {
        let mut ts = TextState::new();
        ts.begin_text();
        ts.move_text_position_and_set_leading(0.0, -12.0);
        assert_eq!(ts.leading, 12.0);
        ts.move_to_next_line();
        assert_eq!(ts.text_matrix().f, -24.0);
    }

    #[test]
    fn snapshot_round_trip() {
        let mut ts = TextState::new();
        ts.set_font("F1".into(), 10.0);
        ts.char_spacing = 1.5;
        let saved = ts.save_snapshot();
        ts.set_font("F2".into(), 20.0);
        ts.char_spacing = 0.0;
        ts.h_scaling = 50.0;
        ts.restore_snapshot(saved);
        assert_eq!(ts.font_name, "F1");
        assert_eq!(ts.font_size, 10.0);
        assert_eq!(ts.char_spacing, 1.5);
        assert_eq!(ts.h_scaling, 100.0);
    }
}
