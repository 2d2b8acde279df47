//! Graphics state stack for the content stream interpreter.
//!
//! Tracks the CTM, line width and stroking color through `q`/`Q`, `cm`, `w`
//! and the stroking color operators. The text state parameters that belong
//! to the graphics state are saved alongside.

use pdfmath_core::Ctm;

use crate::text_state::TextStateSnapshot;

/// Stroking color as raw components. `None` components means a pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeColor(pub Option<Vec<f64>>);

impl Default for StrokeColor {
    fn default() -> Self {
        StrokeColor(Some(vec![0.0]))
    }
}

impl StrokeColor {
    /// All components zero: black in gray, RGB, and the `0 0 0 0` CMYK case.
    pub fn is_black(&self) -> bool {
        match &self.0 {
            Some(components) => components.iter().sum::<f64>() == 0.0,
            None => false,
        }
    }
}

#[derive(Debug, Clone)]
struct SavedState {
    ctm: Ctm,
    line_width: f64,
    stroke_color: StrokeColor,
    text: TextStateSnapshot,
}

/// Interpreter-level graphics state with its save stack.
#[derive(Debug, Clone)]
pub struct InterpreterState {
    ctm: Ctm,
    line_width: f64,
    stroke_color: StrokeColor,
    stack: Vec<SavedState>,
}

impl Default for InterpreterState {
    fn default() -> Self {
        Self::new(Ctm::identity())
    }
}

impl InterpreterState {
    pub fn new(ctm: Ctm) -> Self {
        Self {
            ctm,
            line_width: 1.0,
            stroke_color: StrokeColor::default(),
            stack: Vec::new(),
        }
    }

    pub fn ctm(&self) -> &Ctm {
        &self.ctm
    }

    pub fn line_width(&self) -> f64 {
        self.line_width
    }

    pub fn stroke_color(&self) -> &StrokeColor {
        &self.stroke_color
    }

    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    // --- q / Q ---

    pub fn save_state(&mut self, text: TextStateSnapshot) {
        self.stack.push(SavedState {
            ctm: self.ctm,
            line_width: self.line_width,
            stroke_color: self.stroke_color.clone(),
            text,
        });
    }

    /// Pop the last saved state, returning its text snapshot. `None` for an
    /// unbalanced `Q`.
    pub fn restore_state(&mut self) -> Option<TextStateSnapshot> {
        let saved = self.stack.pop()?;
        self.ctm = saved.ctm;
        self.line_width = saved.line_width;
        self.stroke_color = saved.stroke_color;
        Some(saved.text)
    }

    // --- cm ---

    /// Pre-concatenate `m` with the CTM.
    pub fn concat_matrix(&mut self, m: Ctm) {
        self.ctm = m.concat(&self.ctm);
    }

    // --- w ---

    pub fn set_line_width(&mut self, width: f64) {
        self.line_width = width;
    }

    // --- G / RG / K / SC / SCN / CS ---

    pub fn set_stroke_components(&mut self, components: Vec<f64>) {
        self.stroke_color = StrokeColor(Some(components));
    }

    pub fn set_stroke_pattern(&mut self) {
        self.stroke_color = StrokeColor(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_state::TextState;

    #[test]
    fn cm_pre_concatenates() {
        let mut state = InterpreterState::new(Ctm::translation(-10.0, -20.0));
        state.concat_matrix(Ctm::new(2.0, 0.0, 0.0, 2.0, 5.0, 5.0));
        let p = state.ctm().transform_point(pdfmath_core::Point::new(1.0, 1.0));
        assert_eq!(p.x, -3.0);
        assert_eq!(p.y, -13.0);
    }

    #[test]
    fn save_restore_round_trip() {
        let mut state = InterpreterState::default();
        let mut text = TextState::new();
        text.set_font("F1".into(), 9.0);
        state.save_state(text.save_snapshot());
        state.set_line_width(3.0);
        state.set_stroke_components(vec![1.0, 0.0, 0.0]);
        state.concat_matrix(Ctm::translation(5.0, 5.0));
        let restored = state.restore_state().unwrap();
        assert_eq!(restored.font_name, "F1");
        assert_eq!(state.line_width(), 1.0);
        assert!(state.stroke_color().is_black());
        assert_eq!(*state.ctm(), Ctm::identity());
    }

    #[test]
    fn unbalanced_restore() {
        let mut state = InterpreterState::default();
        assert!(state.restore_state().is_none());
    }

    #[test]
    fn black_detection() {
        assert!(StrokeColor(Some(vec![0.0, 0.0, 0.0])).is_black());
        assert!(!StrokeColor(Some(vec![0.5])).is_black());
        assert!(!StrokeColor(None).is_black());
    }
}
