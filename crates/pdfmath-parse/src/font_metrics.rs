//! Glyph widths and descent read from font dictionaries.
//!
//! Simple fonts use `/FirstChar` + `/Widths` and the descriptor's
//! `/MissingWidth`; CID fonts use the descendant's `/W` array and `/DW`.
//! Standard Type1 fonts without `/Widths` take their AFM widths.

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};

use crate::standard_fonts;

/// Default width of a CID font without `/DW`.
const DEFAULT_CID_WIDTH: f64 = 1000.0;

/// Widths and descent of one font, in thousandths of an em.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontMetrics {
    widths: HashMap<u32, f64>,
    default_width: f64,
    descent: f64,
}

impl FontMetrics {
    pub fn new(widths: HashMap<u32, f64>, default_width: f64, descent: f64) -> Self {
        Self {
            widths,
            default_width,
            descent,
        }
    }

    /// Metrics of a standard font, used for the registered Latin font.
    pub fn standard(base_name: &str) -> Option<Self> {
        let data = standard_fonts::lookup(base_name)?;
        Some(Self {
            widths: (32..=255)
                .filter_map(|code| data.width(code).map(|w| (code, w)))
                .collect(),
            default_width: 0.0,
            descent: data.descent(),
        })
    }

    /// Read a simple font's metrics.
    pub fn from_simple_font(doc: &Document, font: &Dictionary, base_name: &str) -> Self {
        let descriptor = dict_entry(doc, font, b"FontDescriptor");
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(doc, o))
            .map_or(0, |v| v as u32);

        let mut widths: HashMap<u32, f64> = dict_array(doc, font, b"Widths")
            .map(|arr| {
                arr.iter()
                    .enumerate()
                    .filter_map(|(i, o)| {
                        let code = first_char.checked_add(u32::try_from(i).ok()?)?;
                        Some((code, number(doc, o)?))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let standard = standard_fonts::lookup(pdfmath_core::strip_subset_prefix(base_name));
        if widths.is_empty() {
            if let Some(data) = standard {
                widths = (32..=255)
                    .filter_map(|code| data.width(code).map(|w| (code, w)))
                    .collect();
            }
        }

        let default_width = descriptor
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(|o| number(doc, o))
            .unwrap_or(0.0);

        let descent = match descriptor {
            Some(d) => d
                .get(b"Descent")
                .ok()
                .and_then(|o| number(doc, o))
                .unwrap_or(0.0),
            None => standard.map_or(0.0, |s| s.descent()),
        };

        Self {
            widths,
            default_width,
            descent,
        }
    }

    /// Read a CID font's metrics from its descendant dictionary.
    pub fn from_cid_font(doc: &Document, descendant: &Dictionary) -> Self {
        let widths = dict_array(doc, descendant, b"W")
            .map(|arr| parse_w_array(doc, arr))
            .unwrap_or_default();
        let default_width = descendant
            .get(b"DW")
            .ok()
            .and_then(|o| number(doc, o))
            .unwrap_or(DEFAULT_CID_WIDTH);
        let descent = dict_entry(doc, descendant, b"FontDescriptor")
            .and_then(|d| d.get(b"Descent").ok())
            .and_then(|o| number(doc, o))
            .unwrap_or(0.0);
        Self {
            widths,
            default_width,
            descent,
        }
    }

    /// Scale every width, for Type3 fonts whose glyph space is not 1/1000.
    pub fn scaled(mut self, factor: f64) -> Self {
        for w in self.widths.values_mut() {
            *w *= factor;
        }
        self.default_width *= factor;
        self
    }

    /// Width the font declares for `code`, if any.
    pub fn explicit_width(&self, code: u32) -> Option<f64> {
        self.widths.get(&code).copied()
    }

    /// Width used for layout: explicit, else the font's default.
    pub fn width(&self, code: u32) -> f64 {
        self.explicit_width(code).unwrap_or(self.default_width)
    }

    pub fn descent(&self) -> f64 {
        self.descent
    }
}

/// Parse a CID `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
pub fn parse_w_array(doc: &Document, objects: &[Object]) -> HashMap<u32, f64> {
    let mut widths = HashMap::new();
    let mut items = objects.iter().map(|o| resolve(doc, o));

    while let Some(first) = items.next() {
        let Some(start) = number(doc, first).map(|v| v as u32) else {
            continue;
        };
        let Some(next) = items.next() else {
            break;
        };
        if let Ok(list) = next.as_array() {
            for (offset, w) in list.iter().enumerate() {
                let cid = u32::try_from(offset)
                    .ok()
                    .and_then(|offset| start.checked_add(offset));
                if let (Some(cid), Some(w)) = (cid, number(doc, w)) {
                    widths.insert(cid, w);
                }
            }
        } else if let Some(end) = number(doc, next).map(|v| v as u32) {
            let Some(w) = items.next().and_then(|o| number(doc, o)) else {
                break;
            };
            if end >= start && end - start < 0x1_0000 {
                for cid in start..=end {
                    widths.insert(cid, w);
                }
            }
        }
    }

    widths
}

/// Follow an indirect reference.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub(crate) fn number(doc: &Document, obj: &Object) -> Option<f64> {
    match resolve(doc, obj) {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

pub(crate) fn dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    dict.get(key).ok().and_then(|o| resolve(doc, o).as_dict().ok())
}

pub(crate) fn dict_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    dict.get(key).ok().and_then(|o| resolve(doc, o).as_array().ok())
}
