//! Fonts loaded from page resources, and the per-page registry the
//! interpreter and the retypesetter share.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfmath_core::{FontMetricsProvider, GlyphFont, undefined_glyph_text};
use tracing::{debug, warn};

use crate::cmap::ToUnicodeCMap;
use crate::encoding::{BaseEncoding, SimpleEncoding};
use crate::font_metrics::{FontMetrics, dict_array, number, resolve};
use crate::interpreter::decode_stream;

/// A font ready for text extraction and width lookups.
#[derive(Debug, Clone)]
pub struct LoadedFont {
    glyph_font: Arc<GlyphFont>,
    metrics: FontMetrics,
    encoding: Option<SimpleEncoding>,
    to_unicode: Option<ToUnicodeCMap>,
}

impl LoadedFont {
    /// Load a font dictionary under `resource_name`.
    pub fn load(doc: &Document, resource_name: &str, dict: &Dictionary) -> Self {
        let base_name = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| resolve(doc, o).as_name().ok())
            .map(|n| String::from_utf8_lossy(n).into_owned())
            .unwrap_or_default();
        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| resolve(doc, o).as_name().ok())
            .unwrap_or(&b"Type1"[..]);
        let composite = subtype == b"Type0";

        let to_unicode = dict
            .get(b"ToUnicode")
            .ok()
            .and_then(|o| resolve(doc, o).as_stream().ok())
            .and_then(|stream| {
                let parsed = decode_stream(stream).and_then(|data| ToUnicodeCMap::parse(&data));
                match parsed {
                    Ok(cmap) => Some(cmap),
                    Err(e) => {
                        warn!(font = resource_name, "unreadable ToUnicode CMap: {e}");
                        None
                    }
                }
            });

        let (metrics, encoding) = if composite {
            let descendant = dict_array(doc, dict, b"DescendantFonts")
                .and_then(|fonts| fonts.first())
                .and_then(|o| resolve(doc, o).as_dict().ok());
            let metrics = descendant
                .map(|d| FontMetrics::from_cid_font(doc, d))
                .unwrap_or_else(|| FontMetrics::new(HashMap::new(), 1000.0, 0.0));
            (metrics, None)
        } else {
            let mut metrics = FontMetrics::from_simple_font(doc, dict, &base_name);
            if subtype == b"Type3" {
                let scale = dict_array(doc, dict, b"FontMatrix")
                    .and_then(|m| m.first())
                    .and_then(|o| number(doc, o))
                    .unwrap_or(0.001);
                metrics = metrics.scaled(scale * 1000.0);
            }
            (metrics, Some(simple_encoding(doc, dict)))
        };

        debug!(
            font = resource_name,
            base = %base_name,
            composite,
            "loaded font"
        );

        Self {
            glyph_font: Arc::new(GlyphFont::new(resource_name, base_name, composite)),
            metrics,
            encoding,
            to_unicode,
        }
    }

    /// A standard font with WinAnsi encoding, drawn without a font program.
    pub fn standard(resource_name: &str, base_name: &str) -> Option<Self> {
        Some(Self {
            glyph_font: Arc::new(GlyphFont::new(resource_name, base_name, false)),
            metrics: FontMetrics::standard(base_name)?,
            encoding: Some(SimpleEncoding::new(BaseEncoding::WinAnsi)),
            to_unicode: None,
        })
    }

    pub fn glyph_font(&self) -> &Arc<GlyphFont> {
        &self.glyph_font
    }

    pub fn is_composite(&self) -> bool {
        self.glyph_font.composite
    }

    /// Split a shown string into character codes: two bytes per code for
    /// composite fonts, one otherwise.
    pub fn codes(&self, bytes: &[u8]) -> Vec<u32> {
        if self.is_composite() {
            bytes
                .chunks(2)
                .map(|pair| match pair {
                    [hi, lo] => u32::from(u16::from_be_bytes([*hi, *lo])),
                    [single] => u32::from(*single),
                    _ => 0,
                })
                .collect()
        } else {
            bytes.iter().map(|&b| u32::from(b)).collect()
        }
    }

    /// Unicode for a code: `/ToUnicode` first, then the simple encoding.
    pub fn unicode(&self, code: u32) -> Option<String> {
        if let Some(text) = self.to_unicode.as_ref().and_then(|m| m.lookup(code)) {
            return Some(text.to_string());
        }
        self.encoding
            .as_ref()
            .and_then(|e| e.decode(code))
            .map(String::from)
    }

    /// Text of a shown code, `(cid:N)` when unmapped.
    pub fn text(&self, code: u32) -> String {
        self.unicode(code)
            .unwrap_or_else(|| undefined_glyph_text(code))
    }

    pub fn explicit_width(&self, code: u32) -> Option<f64> {
        self.metrics.explicit_width(code)
    }

    pub fn width(&self, code: u32) -> f64 {
        self.metrics.width(code)
    }

    pub fn descent(&self) -> f64 {
        self.metrics.descent()
    }
}

fn simple_encoding(doc: &Document, dict: &Dictionary) -> SimpleEncoding {
    let Ok(entry) = dict.get(b"Encoding") else {
        return SimpleEncoding::new(BaseEncoding::Standard);
    };
    match resolve(doc, entry) {
        Object::Name(name) => SimpleEncoding::new(
            BaseEncoding::from_name(&String::from_utf8_lossy(name))
                .unwrap_or(BaseEncoding::Standard),
        ),
        Object::Dictionary(enc) => {
            let base = enc
                .get(b"BaseEncoding")
                .ok()
                .and_then(|o| resolve(doc, o).as_name().ok())
                .and_then(|n| BaseEncoding::from_name(&String::from_utf8_lossy(n)))
                .unwrap_or(BaseEncoding::Standard);
            let differences = dict_array(doc, enc, b"Differences")
                .map(|arr| parse_differences(doc, arr))
                .unwrap_or_default();
            SimpleEncoding::new(base).with_differences(&differences)
        }
        _ => SimpleEncoding::new(BaseEncoding::Standard),
    }
}

/// `[code /name /name ... code /name ...]` into `(code, name)` pairs.
fn parse_differences(doc: &Document, items: &[Object]) -> Vec<(u8, String)> {
    let mut out = Vec::new();
    let mut code: Option<u32> = None;
    for item in items {
        match resolve(doc, item) {
            Object::Integer(n) => code = u32::try_from(*n).ok(),
            Object::Name(name) => {
                if let Some(c) = code {
                    if let Ok(byte) = u8::try_from(c) {
                        out.push((byte, String::from_utf8_lossy(name).into_owned()));
                    }
                    code = Some(c + 1);
                }
            }
            _ => {}
        }
    }
    out
}

/// Fonts of one page, keyed by the name glyphs and operators refer to.
///
/// Page fonts keep their resource names. A form XObject font whose name is
/// already taken by a different object is registered as `{name}_{objnum}`;
/// [`FontRegistry::form_fonts`] lists those so the writer can add them to
/// the page's font resources.
#[derive(Debug, Default)]
pub struct FontRegistry {
    fonts: HashMap<String, LoadedFont>,
    origins: HashMap<String, Object>,
    form_fonts: Vec<String>,
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every entry of a `/Font` resource dictionary. Returns the
    /// registry key for each local name.
    pub fn register_all(
        &mut self,
        doc: &Document,
        fonts: &Dictionary,
        from_form: bool,
    ) -> HashMap<String, String> {
        fonts
            .iter()
            .map(|(name, obj)| {
                let local = String::from_utf8_lossy(name).into_owned();
                let key = self.register(doc, &local, obj, from_form);
                (local, key)
            })
            .collect()
    }

    /// Register one font object, returning its registry key.
    pub fn register(
        &mut self,
        doc: &Document,
        name: &str,
        obj: &Object,
        from_form: bool,
    ) -> String {
        let key = match self.origins.get(name) {
            None => name.to_string(),
            Some(existing) if existing == obj => return name.to_string(),
            Some(_) => match obj {
                Object::Reference((num, _)) => format!("{name}_{num}"),
                _ => format!("{name}_{}", self.fonts.len()),
            },
        };
        if self.fonts.contains_key(&key) {
            return key;
        }

        let font = match resolve(doc, obj).as_dict() {
            Ok(dict) => LoadedFont::load(doc, &key, dict),
            Err(_) => {
                warn!(font = name, "font resource is not a dictionary");
                LoadedFont {
                    glyph_font: Arc::new(GlyphFont::new(key.as_str(), "", false)),
                    metrics: FontMetrics::default(),
                    encoding: Some(SimpleEncoding::new(BaseEncoding::Standard)),
                    to_unicode: None,
                }
            }
        };
        self.fonts.insert(key.clone(), font);
        self.origins.insert(key.clone(), obj.clone());
        if from_form {
            self.form_fonts.push(key.clone());
        }
        key
    }

    /// Register the standard font used for translated Latin text.
    pub fn with_latin(mut self, name: &str, base_name: &str) -> Self {
        match LoadedFont::standard(name, base_name) {
            Some(font) => {
                self.fonts.insert(name.to_string(), font);
            }
            None => warn!(font = base_name, "no built-in metrics for Latin font"),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&LoadedFont> {
        self.fonts.get(key)
    }

    /// Fonts first seen inside form XObjects, with the object to add to the
    /// page's `/Font` dictionary under that key.
    pub fn form_fonts(&self) -> impl Iterator<Item = (&str, &Object)> {
        self.form_fonts
            .iter()
            .filter_map(|key| Some((key.as_str(), self.origins.get(key)?)))
    }

    pub fn object_id(&self, key: &str) -> Option<ObjectId> {
        self.origins.get(key).and_then(|o| o.as_reference().ok())
    }
}

impl FontMetricsProvider for FontRegistry {
    fn advance_width(&self, font: &str, code: u32) -> Option<f64> {
        self.fonts.get(font)?.explicit_width(code)
    }

    fn to_unicode(&self, font: &str, code: u32) -> Option<String> {
        self.fonts.get(font)?.unicode(code)
    }

    fn is_composite(&self, font: &str) -> bool {
        self.fonts.get(font).is_some_and(LoadedFont::is_composite)
    }
}

#[cfg(test)]
mod tests {
    use lopdf::{Stream, dictionary};
    use pdfmath_core::round_trips;

    use super::*;

    fn helvetica() -> Dictionary {
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        }
    }

    #[test]
    fn simple_font_text_and_widths() {
        let doc = Document::with_version("1.5");
        let font = LoadedFont::load(&doc, "F1", &helvetica());
        assert!(!font.is_composite());
        assert_eq!(font.codes(b"Hi"), vec![72, 105]);
        assert_eq!(font.text(0xE9), "é");
        assert_eq!(font.width(u32::from(b'A')), 667.0);
        assert_eq!(font.glyph_font().resource_name, "F1");
    }

    #[test]
    fn differences_and_unmapped_codes() {
        let doc = Document::with_version("1.5");
        let font = LoadedFont::load(
            &doc,
            "F2",
            &dictionary! {
                "Subtype" => "Type1",
                "BaseFont" => "XYZABC+CMMI10",
                "Encoding" => dictionary! {
                    "Differences" => vec![11.into(), "alpha".into(), "beta".into()],
                },
            },
        );
        assert_eq!(font.text(11), "α");
        assert_eq!(font.text(12), "β");
        assert_eq!(font.text(5), "(cid:5)");
        assert_eq!(font.glyph_font().family(), "CMMI10");
    }

    #[test]
    fn composite_font_uses_to_unicode() {
        let mut doc = Document::with_version("1.5");
        let cmap = doc.add_object(Stream::new(
            dictionary! {},
            b"1 beginbfchar <0005> <4E2D> endbfchar".to_vec(),
        ));
        let descendant = doc.add_object(dictionary! {
            "Subtype" => "CIDFontType2",
            "W" => vec![5.into(), Object::Array(vec![1000.into()])],
            "DW" => 500,
        });
        let font = LoadedFont::load(
            &doc,
            "F3",
            &dictionary! {
                "Subtype" => "Type0",
                "BaseFont" => "SimSun",
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![descendant.into()],
                "ToUnicode" => cmap,
            },
        );
        assert!(font.is_composite());
        assert_eq!(font.codes(&[0x00, 0x05, 0x01, 0x00]), vec![5, 256]);
        assert_eq!(font.text(5), "中");
        assert_eq!(font.text(256), "(cid:256)");
        assert_eq!(font.width(5), 1000.0);
        assert_eq!(font.width(6), 500.0);
        assert_eq!(font.explicit_width(6), None);
    }

    #[test]
    fn registry_aliases_colliding_form_fonts() {
        let mut doc = Document::with_version("1.5");
        let page_font = doc.add_object(helvetica());
        let form_font = doc.add_object(dictionary! {
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let mut registry = FontRegistry::new();
        let page = registry.register(&doc, "F1", &Object::Reference(page_font), false);
        let same = registry.register(&doc, "F1", &Object::Reference(page_font), true);
        let other = registry.register(&doc, "F1", &Object::Reference(form_font), true);
        assert_eq!(page, "F1");
        assert_eq!(same, "F1");
        assert_eq!(other, format!("F1_{}", form_font.0));
        assert_eq!(registry.get(&other).unwrap().width(65), 600.0);
        let added: Vec<&str> = registry.form_fonts().map(|(k, _)| k).collect();
        assert_eq!(added, vec![other.as_str()]);
        assert_eq!(registry.object_id(&other), Some(form_font));
    }

    #[test]
    fn latin_font_round_trips_latin1_only() {
        let registry = FontRegistry::new().with_latin("tiro", "Times-Roman");
        assert!(round_trips(&registry, "tiro", 'a'));
        assert!(round_trips(&registry, "tiro", 'é'));
        assert!(!round_trips(&registry, "tiro", '中'));
        assert_eq!(registry.advance_width("tiro", u32::from(b'a')), Some(444.0));
        assert!(!registry.is_composite("tiro"));
    }
}
