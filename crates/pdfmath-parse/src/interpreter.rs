//! Content stream interpreter.
//!
//! Interprets tokenized operators, maintaining graphics and text state, and
//! reports glyphs, line segments and form XObject boundaries to a
//! [`ContentHandler`]. Form XObjects are interpreted recursively and their
//! content is reported inline between figure events.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object, Stream};
use pdfmath_core::{Ctm, LineSegment, Point};
use tracing::trace;

use crate::error::BackendError;
use crate::font_metrics::resolve;
use crate::fonts::FontRegistry;
use crate::handler::{ContentHandler, StreamId};
use crate::interpreter_state::InterpreterState;
use crate::text_renderer::{TjElement, show_text};
use crate::text_state::TextState;
use crate::tokenizer::{Operand, tokenize};

/// Nesting limit for form XObjects.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 12;

/// Path construction step, in user space.
#[derive(Debug, Clone, Copy, PartialEq)]
enum PathStep {
    Move(Point),
    Line(Point),
    Other,
}

/// Interprets one page and the form XObjects it draws.
pub struct Interpreter<'a> {
    doc: &'a Document,
    registry: &'a mut FontRegistry,
    handler: &'a mut dyn ContentHandler,
    max_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        doc: &'a Document,
        registry: &'a mut FontRegistry,
        handler: &'a mut dyn ContentHandler,
    ) -> Self {
        Self {
            doc,
            registry,
            handler,
            max_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Interpret a page's content under the initial `ctm`.
    pub fn run_page(
        &mut self,
        content: &[u8],
        resources: &Dictionary,
        ctm: Ctm,
    ) -> Result<(), BackendError> {
        let mut gstate = InterpreterState::new(ctm);
        let mut tstate = TextState::new();
        self.run(content, resources, StreamId::Page, 0, &mut gstate, &mut tstate)
    }

    fn run(
        &mut self,
        content: &[u8],
        resources: &Dictionary,
        stream: StreamId,
        depth: usize,
        gstate: &mut InterpreterState,
        tstate: &mut TextState,
    ) -> Result<(), BackendError> {
        if depth > self.max_depth {
            return Err(BackendError::Interpreter(format!(
                "form XObject nesting depth {depth} exceeds limit {}",
                self.max_depth
            )));
        }

        let operators = tokenize(content)?;
        let fonts = self.register_fonts(resources, stream);
        let mut path: Vec<PathStep> = Vec::new();

        for (op_index, op) in operators.iter().enumerate() {
            let operands = &op.operands;
            match op.name.as_str() {
                // --- Graphics state operators ---
                "q" => gstate.save_state(tstate.save_snapshot()),
                "Q" => {
                    if let Some(snapshot) = gstate.restore_state() {
                        tstate.restore_snapshot(snapshot);
                    }
                }
                "cm" => {
                    if let Some(m) = get_matrix(operands) {
                        gstate.concat_matrix(m);
                    }
                }
                "w" => {
                    if let Some(v) = get_f64(operands, 0) {
                        gstate.set_line_width(v);
                    }
                }

                // --- Stroking color operators ---
                "G" | "RG" | "K" => {
                    gstate.set_stroke_components(numbers(operands));
                }
                "SC" | "SCN" => {
                    if matches!(operands.last(), Some(Operand::Name(_))) {
                        gstate.set_stroke_pattern();
                    } else {
                        gstate.set_stroke_components(numbers(operands));
                    }
                }
                "CS" => gstate.set_stroke_components(vec![0.0]),

                // --- Text state operators ---
                "BT" => tstate.begin_text(),
                "ET" => tstate.end_text(),
                "Tf" => {
                    let name = operands.first().and_then(Operand::as_name).unwrap_or("");
                    let size = get_f64(operands, 1).unwrap_or(0.0);
                    let key = match fonts.get(name) {
                        Some(key) => key.clone(),
                        None => {
                            self.handler
                                .on_warning(format!("font /{name} not found in resources"));
                            name.to_string()
                        }
                    };
                    tstate.set_font(key, size);
                }
                "Tm" => {
                    if let Some(m) = get_matrix(operands) {
                        tstate.set_text_matrix(m);
                    }
                }
                "Td" => {
                    let tx = get_f64(operands, 0).unwrap_or(0.0);
                    let ty = get_f64(operands, 1).unwrap_or(0.0);
                    tstate.move_text_position(tx, ty);
                }
                "TD" => {
                    let tx = get_f64(operands, 0).unwrap_or(0.0);
                    let ty = get_f64(operands, 1).unwrap_or(0.0);
                    tstate.move_text_position_and_set_leading(tx, ty);
                }
                "T*" => tstate.move_to_next_line(),
                "Tc" => tstate.char_spacing = get_f64(operands, 0).unwrap_or(0.0),
                "Tw" => tstate.word_spacing = get_f64(operands, 0).unwrap_or(0.0),
                "Tz" => tstate.h_scaling = get_f64(operands, 0).unwrap_or(100.0),
                "TL" => tstate.leading = get_f64(operands, 0).unwrap_or(0.0),
                "Ts" => tstate.rise = get_f64(operands, 0).unwrap_or(0.0),

                // --- Text showing operators ---
                "Tj" => {
                    if let Some(bytes) = operands.first().and_then(Operand::as_bytes) {
                        self.show(&[TjElement::Text(bytes)], tstate, gstate);
                    }
                }
                "'" => {
                    tstate.move_to_next_line();
                    if let Some(bytes) = operands.first().and_then(Operand::as_bytes) {
                        self.show(&[TjElement::Text(bytes)], tstate, gstate);
                    }
                }
                "\"" => {
                    if let Some(aw) = get_f64(operands, 0) {
                        tstate.word_spacing = aw;
                    }
                    if let Some(ac) = get_f64(operands, 1) {
                        tstate.char_spacing = ac;
                    }
                    tstate.move_to_next_line();
                    if let Some(bytes) = operands.get(2).and_then(Operand::as_bytes) {
                        self.show(&[TjElement::Text(bytes)], tstate, gstate);
                    }
                }
                "TJ" => {
                    if let Some(Operand::Array(items)) = operands.first() {
                        let elements: Vec<TjElement<'_>> = items
                            .iter()
                            .filter_map(|item| match item {
                                Operand::LiteralString(b) | Operand::HexString(b) => {
                                    Some(TjElement::Text(b))
                                }
                                other => other.as_f64().map(TjElement::Adjust),
                            })
                            .collect();
                        self.show(&elements, tstate, gstate);
                    }
                }

                // --- XObject operator ---
                "Do" => {
                    if let Some(name) = operands.first().and_then(Operand::as_name) {
                        self.handle_do(resources, name, depth, gstate, tstate)?;
                    }
                }

                // --- Path construction operators ---
                "m" => {
                    if let Some(p) = get_point(operands, 0) {
                        path.push(PathStep::Move(p));
                    }
                }
                "l" => {
                    if let Some(p) = get_point(operands, 0) {
                        path.push(PathStep::Line(p));
                    }
                }
                "c" | "v" | "y" | "h" | "re" => path.push(PathStep::Other),

                // --- Path painting operators ---
                "S" => {
                    if let Some(line) = horizontal_rule(&path, gstate) {
                        trace!(?stream, op_index, "captured rule");
                        self.handler.on_line(line, stream, op_index);
                    }
                    path.clear();
                }
                "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" | "n" => path.clear(),

                _ => {}
            }
        }

        Ok(())
    }

    /// Register the scope's fonts; returns local name to registry key.
    fn register_fonts(
        &mut self,
        resources: &Dictionary,
        stream: StreamId,
    ) -> HashMap<String, String> {
        let from_form = matches!(stream, StreamId::Form(_));
        match resources
            .get(b"Font")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
        {
            Some(fonts) => self.registry.register_all(self.doc, fonts, from_form),
            None => HashMap::new(),
        }
    }

    fn show(
        &mut self,
        elements: &[TjElement<'_>],
        tstate: &mut TextState,
        gstate: &InterpreterState,
    ) {
        match self.registry.get(&tstate.font_name) {
            Some(font) => show_text(elements, font, tstate, gstate.ctm(), &mut *self.handler),
            None => self.handler.on_warning(format!(
                "text shown without a usable font ({:?})",
                tstate.font_name
            )),
        }
    }

    fn handle_do(
        &mut self,
        resources: &Dictionary,
        name: &str,
        depth: usize,
        gstate: &mut InterpreterState,
        tstate: &mut TextState,
    ) -> Result<(), BackendError> {
        let Some(entry) = resources
            .get(b"XObject")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
            .and_then(|xobjects| xobjects.get(name.as_bytes()).ok())
        else {
            self.handler
                .on_warning(format!("XObject /{name} not found in resources"));
            return Ok(());
        };
        let Ok(id) = entry.as_reference() else {
            self.handler
                .on_warning(format!("XObject /{name} is not an indirect object"));
            return Ok(());
        };
        let Ok(stream) = self.doc.get_object(id).and_then(Object::as_stream) else {
            self.handler
                .on_warning(format!("XObject /{name} is not a stream"));
            return Ok(());
        };
        let is_form = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            == Some(&b"Form"[..]);
        if !is_form {
            return Ok(());
        }

        let content = decode_stream(stream)?;
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_dict().ok())
            .unwrap_or(resources);

        self.handler.on_figure_start(name, id);
        gstate.save_state(tstate.save_snapshot());
        if let Some(m) = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(self.doc, o).as_array().ok())
            .and_then(|arr| object_matrix(self.doc, arr))
        {
            gstate.concat_matrix(m);
        }
        let result = self.run(
            &content,
            form_resources,
            StreamId::Form(id),
            depth + 1,
            gstate,
            tstate,
        );
        if let Some(snapshot) = gstate.restore_state() {
            tstate.restore_snapshot(snapshot);
        }
        self.handler.on_figure_end(name);
        result
    }
}

/// A black stroke of exactly one `m` and one `l` whose endpoints share a
/// device-space y.
fn horizontal_rule(path: &[PathStep], gstate: &InterpreterState) -> Option<LineSegment> {
    let [PathStep::Move(a), PathStep::Line(b)] = path else {
        return None;
    };
    if !gstate.stroke_color().is_black() {
        return None;
    }
    let ctm = gstate.ctm();
    let (start, end) = (ctm.transform_point(*a), ctm.transform_point(*b));
    (start.y == end.y).then(|| LineSegment::new(start, end, gstate.line_width()))
}

/// Decode a stream, decompressing when it has a filter.
pub(crate) fn decode_stream(stream: &Stream) -> Result<Vec<u8>, BackendError> {
    if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| BackendError::Interpreter(format!("stream decompression failed: {e}")))
    } else {
        Ok(stream.content.clone())
    }
}

// --- Operand extraction helpers ---

fn get_f64(operands: &[Operand], index: usize) -> Option<f64> {
    operands.get(index).and_then(Operand::as_f64)
}

fn get_point(operands: &[Operand], index: usize) -> Option<Point> {
    Some(Point::new(
        get_f64(operands, index)?,
        get_f64(operands, index + 1)?,
    ))
}

fn get_matrix(operands: &[Operand]) -> Option<Ctm> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (i, slot) in m.iter_mut().enumerate() {
        *slot = get_f64(operands, operands.len() - 6 + i)?;
    }
    Some(Ctm::from_array(m))
}

fn numbers(operands: &[Operand]) -> Vec<f64> {
    operands.iter().filter_map(Operand::as_f64).collect()
}

fn object_matrix(doc: &Document, arr: &[Object]) -> Option<Ctm> {
    if arr.len() != 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, obj) in m.iter_mut().zip(arr) {
        *slot = crate::font_metrics::number(doc, obj)?;
    }
    Some(Ctm::from_array(m))
}

#[cfg(test)]
mod tests {
    use lopdf::dictionary;
    use pdfmath_core::PageItem;

    use super::*;
    use crate::handler::PageCollector;

    fn helvetica_resources(doc: &mut Document) -> Dictionary {
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });
        dictionary! { "Font" => dictionary! { "F1" => font } }
    }

    fn interpret(
        doc: &Document,
        resources: &Dictionary,
        content: &[u8],
        ctm: Ctm,
    ) -> crate::CollectedPage {
        let mut registry = FontRegistry::new();
        let mut collector = PageCollector::new(0);
        Interpreter::new(doc, &mut registry, &mut collector)
            .run_page(content, resources, ctm)
            .unwrap();
        collector.finish()
    }

    fn glyphs(page: &crate::CollectedPage) -> Vec<&pdfmath_core::Glyph> {
        page.items
            .iter()
            .filter_map(|item| match item {
                PageItem::Glyph(g) => Some(g),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn simple_text_positions() {
        let mut doc = Document::with_version("1.5");
        let resources = helvetica_resources(&mut doc);
        let page = interpret(
            &doc,
            &resources,
            b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET",
            Ctm::identity(),
        );
        let glyphs = glyphs(&page);
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].text, "H");
        assert_eq!(glyphs[0].font.resource_name, "F1");
        assert!((glyphs[0].x0() - 72.0).abs() < 1e-9);
        assert!((glyphs[1].x0() - (72.0 + 0.722 * 12.0)).abs() < 1e-9);
        assert!((glyphs[0].size - 12.0).abs() < 1e-9);
    }

    #[test]
    fn initial_ctm_offsets_crop_box() {
        let mut doc = Document::with_version("1.5");
        let resources = helvetica_resources(&mut doc);
        let page = interpret(
            &doc,
            &resources,
            b"BT /F1 10 Tf 1 0 0 1 100 100 Tm (x) Tj ET",
            Ctm::translation(-50.0, -20.0),
        );
        let glyphs = glyphs(&page);
        assert!((glyphs[0].x0() - 50.0).abs() < 1e-9);
        assert_eq!(glyphs[0].matrix[5], 80.0);
    }

    #[test]
    fn font_state_survives_q_q() {
        let mut doc = Document::with_version("1.5");
        let resources = helvetica_resources(&mut doc);
        let page = interpret(
            &doc,
            &resources,
            b"BT /F1 10 Tf ET q BT /F1 20 Tf ET Q BT 0 0 Td (a) Tj ET",
            Ctm::identity(),
        );
        assert!((glyphs(&page)[0].size - 10.0).abs() < 1e-9);
    }

    #[test]
    fn black_horizontal_stroke_is_captured() {
        let doc = Document::with_version("1.5");
        let page = interpret(
            &doc,
            &Dictionary::new(),
            b"0.4 w 0 G 10 50 m 90 50 l S 1 0 0 RG 10 60 m 90 60 l S 0 G 10 70 m 90 71 l S",
            Ctm::identity(),
        );
        assert_eq!(page.items.len(), 1);
        match &page.items[0] {
            PageItem::Line(line) => {
                assert_eq!(line.width, 0.4);
                assert_eq!(line.start, Point::new(10.0, 50.0));
            }
            other => panic!("unexpected item {other:?}"),
        }
        let indices: Vec<usize> = page.neutralized[&StreamId::Page].iter().copied().collect();
        assert_eq!(indices, vec![4]);
    }

    #[test]
    fn rectangles_and_curves_are_not_rules() {
        let doc = Document::with_version("1.5");
        let page = interpret(
            &doc,
            &Dictionary::new(),
            b"10 10 m 20 10 l 30 10 l S 0 0 10 10 re S 10 10 m 20 10 l f",
            Ctm::identity(),
        );
        assert!(page.items.is_empty());
        assert!(page.neutralized.is_empty());
    }

    #[test]
    fn form_xobject_glyphs_are_inlined() {
        let mut doc = Document::with_version("1.5");
        let resources = helvetica_resources(&mut doc);
        let form = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Matrix" => vec![1.into(), 0.into(), 0.into(), 1.into(), 200.into(), 0.into()],
                "Resources" => resources.clone(),
            },
            b"BT /F1 10 Tf 0 0 Td (z) Tj ET 0 G 0 5 m 10 5 l S".to_vec(),
        ));
        let mut page_resources = resources;
        page_resources.set("XObject", dictionary! { "Fm0" => form });
        let page = interpret(&doc, &page_resources, b"q /Fm0 Do Q", Ctm::identity());

        assert!(matches!(page.items[0], PageItem::FigureStart { .. }));
        assert!(matches!(page.items.last(), Some(PageItem::FigureEnd { .. })));
        let glyphs = glyphs(&page);
        assert!((glyphs[0].x0() - 200.0).abs() < 1e-9);
        assert!(page.forms.contains(&form));
        assert!(page.neutralized[&StreamId::Form(form)].contains(&8));
    }

    #[test]
    fn recursion_limit() {
        let mut doc = Document::with_version("1.5");
        let form_id = doc.new_object_id();
        let resources = dictionary! { "XObject" => dictionary! { "Fm0" => form_id } };
        doc.objects.insert(
            form_id,
            Object::Stream(Stream::new(
                dictionary! {
                    "Subtype" => "Form",
                    "Resources" => resources.clone(),
                },
                b"/Fm0 Do".to_vec(),
            )),
        );
        let mut registry = FontRegistry::new();
        let mut collector = PageCollector::new(0);
        let result = Interpreter::new(&doc, &mut registry, &mut collector)
            .with_max_depth(3)
            .run_page(b"/Fm0 Do", &resources, Ctm::identity());
        assert!(matches!(result, Err(BackendError::Interpreter(_))));
    }

    #[test]
    fn missing_font_warns() {
        let doc = Document::with_version("1.5");
        let page = interpret(&doc, &Dictionary::new(), b"BT /F9 12 Tf (a) Tj ET", Ctm::identity());
        assert!(page.items.is_empty());
        assert_eq!(page.warnings.len(), 2);
    }
}
