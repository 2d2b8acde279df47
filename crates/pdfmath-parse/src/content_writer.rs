//! Writing regenerated text back into the document.
//!
//! The original text objects are removed from the page stream (and from the
//! form XObjects whose glyphs were re-emitted), captured rules are turned
//! into no-op path ends, and the retypeset operators are appended in a new
//! content stream. Font resources the new operators refer to are installed
//! on the page.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use lopdf::{Dictionary, Object, ObjectId, Stream, dictionary};
use tracing::debug;

use crate::error::BackendError;
use crate::fonts::FontRegistry;
use crate::handler::{CollectedPage, StreamId};
use crate::interpreter::decode_stream;
use crate::lopdf_backend::LopdfDocument;
use crate::tokenizer::tokenize;

/// Operators removed from rewritten streams.
const TEXT_OPERATORS: [&str; 10] = ["BT", "ET", "Tj", "TJ", "'", "\"", "Td", "TD", "Tm", "T*"];

/// Remove text-object operators from `content`.
///
/// Every other operator is copied verbatim, one per line. `S` operators
/// listed in `neutralized` become `n` so captured rules are not drawn twice.
pub fn strip_text(content: &[u8], neutralized: &BTreeSet<usize>) -> Result<Vec<u8>, BackendError> {
    let operators = tokenize(content)?;
    let mut out = Vec::with_capacity(content.len());
    for (index, op) in operators.iter().enumerate() {
        if TEXT_OPERATORS.contains(&op.name.as_str()) {
            continue;
        }
        if !out.is_empty() {
            out.push(b'\n');
        }
        if op.name == "S" && neutralized.contains(&index) {
            let operator_start = op.span.end - op.name.len();
            out.extend_from_slice(&content[op.span.start..operator_start]);
            out.push(b'n');
        } else {
            out.extend_from_slice(&content[op.span.clone()]);
        }
    }
    Ok(out)
}

/// A glyph of the fallback font that retypeset text used.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedGlyph {
    pub gid: u16,
    /// Advance in thousandths of an em.
    pub width: f64,
    pub ch: char,
}

/// The fallback font as it is written into the document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddedFont {
    pub base_name: String,
    /// TrueType program; without one the font is referenced but not embedded.
    pub program: Option<Vec<u8>>,
    pub glyphs: Vec<EmbeddedGlyph>,
    pub ascent: f64,
    pub descent: f64,
}

/// Installs regenerated content and the fonts it needs.
///
/// The Latin font object is shared by every page. The fallback font's id is
/// reserved up front and its objects are written by
/// [`ContentWriter::finish`], once every page has been typeset.
#[derive(Debug)]
pub struct ContentWriter {
    latin_name: String,
    latin_font: ObjectId,
    fallback_name: String,
    fallback_font: ObjectId,
}

impl ContentWriter {
    pub fn new(
        doc: &mut LopdfDocument,
        latin_name: &str,
        latin_base: &str,
        fallback_name: &str,
    ) -> Self {
        let inner = doc.inner_mut();
        let latin_font = inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => latin_base,
            "Encoding" => "WinAnsiEncoding",
        });
        let fallback_font = inner.new_object_id();
        Self {
            latin_name: latin_name.to_string(),
            latin_font,
            fallback_name: fallback_name.to_string(),
            fallback_font,
        }
    }

    /// Replace page `index`'s content with its graphics plus `ops`.
    ///
    /// `ops` is a complete `BT ... ET` fragment in crop-box coordinates.
    pub fn write_page(
        &self,
        doc: &mut LopdfDocument,
        index: usize,
        page: &CollectedPage,
        registry: &FontRegistry,
        ops: &str,
    ) -> Result<(), BackendError> {
        let crop = doc.crop_box(index)?;
        let original = doc.content_bytes(index)?;
        let empty = BTreeSet::new();
        let neutralized = page.neutralized.get(&StreamId::Page).unwrap_or(&empty);
        let graphics = strip_text(&original, neutralized)?;

        let mut content = Vec::with_capacity(graphics.len() + ops.len() + 64);
        content.extend_from_slice(b"q\n");
        content.extend_from_slice(&graphics);
        content.extend_from_slice(b"\nQ\n");
        let mut text = String::new();
        let _ = write!(text, "q 1 0 0 1 {} {} cm {ops}Q", crop.x0, crop.y0);
        content.extend_from_slice(text.as_bytes());

        let mut resources = doc.resources(index)?;
        let mut fonts = match resources.get(b"Font") {
            Ok(Object::Reference(id)) => doc
                .inner()
                .get_dictionary(*id)
                .cloned()
                .map_err(|e| BackendError::Write(format!("font resources: {e}")))?,
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => Dictionary::new(),
        };
        for (key, origin) in registry.form_fonts() {
            if !fonts.has(key.as_bytes()) {
                fonts.set(key, origin.clone());
            }
        }
        fonts.set(self.latin_name.as_str(), self.latin_font);
        fonts.set(self.fallback_name.as_str(), self.fallback_font);
        resources.set("Font", fonts);

        let page_id = doc.page_id(index)?;
        let inner = doc.inner_mut();
        let stream_id = inner.add_object(Stream::new(dictionary! {}, content));
        let page_dict = inner
            .get_object_mut(page_id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| BackendError::Write(format!("page {index} dictionary: {e}")))?;
        page_dict.set("Contents", stream_id);
        page_dict.set("Resources", resources);
        debug!(page = index, stream = ?stream_id, "installed regenerated content");
        Ok(())
    }

    /// Remove the text of a form XObject whose glyphs were re-emitted on
    /// the page that draws it.
    pub fn strip_form(
        &self,
        doc: &mut LopdfDocument,
        form: ObjectId,
        neutralized: &BTreeSet<usize>,
    ) -> Result<(), BackendError> {
        let stream = doc
            .inner_mut()
            .get_object_mut(form)
            .and_then(Object::as_stream_mut)
            .map_err(|e| BackendError::Write(format!("form {form:?}: {e}")))?;
        let content = decode_stream(stream)?;
        let stripped = strip_text(&content, neutralized)?;
        stream.set_plain_content(stripped);
        Ok(())
    }

    /// Write the fallback font objects under the reserved id.
    pub fn finish(self, doc: &mut LopdfDocument, font: &EmbeddedFont) -> Result<(), BackendError> {
        let inner = doc.inner_mut();
        let mut descriptor = dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => font.base_name.as_str(),
            "Flags" => 4,
            "FontBBox" => vec![0.into(), real(font.descent), 1000.into(), real(font.ascent)],
            "ItalicAngle" => 0,
            "Ascent" => real(font.ascent),
            "Descent" => real(font.descent),
            "CapHeight" => real(font.ascent),
            "StemV" => 80,
        };
        if let Some(program) = &font.program {
            let file = inner.add_object(Stream::new(
                dictionary! { "Length1" => program.len() as i64 },
                program.clone(),
            ));
            descriptor.set("FontFile2", file);
        }
        let descriptor_id = inner.add_object(descriptor);

        let descendant = inner.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => font.base_name.as_str(),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => 1000,
            "W" => width_array(&font.glyphs),
            "CIDToGIDMap" => "Identity",
        });
        let to_unicode = inner.add_object(Stream::new(
            dictionary! {},
            to_unicode_cmap(&font.glyphs).into_bytes(),
        ));

        inner.objects.insert(
            self.fallback_font,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => font.base_name.as_str(),
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![descendant.into()],
                "ToUnicode" => to_unicode,
            }),
        );
        debug!(
            glyphs = font.glyphs.len(),
            embedded = font.program.is_some(),
            "wrote fallback font"
        );
        Ok(())
    }
}

/// `/W` entries for the used glyphs, consecutive ids grouped.
fn width_array(glyphs: &[EmbeddedGlyph]) -> Vec<Object> {
    let mut sorted: Vec<&EmbeddedGlyph> = glyphs.iter().collect();
    sorted.sort_by_key(|g| g.gid);
    sorted.dedup_by_key(|g| g.gid);

    let mut w = Vec::new();
    let mut run: Vec<Object> = Vec::new();
    let mut run_start: Option<u16> = None;
    let mut last = 0u16;
    for glyph in sorted {
        match run_start {
            Some(_) if glyph.gid == last + 1 => {}
            Some(start) => {
                w.push(Object::Integer(i64::from(start)));
                w.push(Object::Array(std::mem::take(&mut run)));
                run_start = Some(glyph.gid);
            }
            None => run_start = Some(glyph.gid),
        }
        run.push(real(glyph.width));
        last = glyph.gid;
    }
    if let Some(start) = run_start {
        w.push(Object::Integer(i64::from(start)));
        w.push(Object::Array(run));
    }
    w
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn to_unicode_cmap(glyphs: &[EmbeddedGlyph]) -> String {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n12 dict begin\nbegincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n/CMapType 2 def\n\
         1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n",
    );
    for chunk in glyphs.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for glyph in chunk {
            let mut units = [0u16; 2];
            let hex: String = glyph
                .ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{hex}>", glyph.gid);
        }
        cmap.push_str("endbfchar\n");
    }
    cmap.push_str("endcmap\nCMapName currentdict /CMap defineresource pop\nend\nend\n");
    cmap
}
