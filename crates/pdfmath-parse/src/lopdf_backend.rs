//! lopdf-based document access.
//!
//! Wraps a [`lopdf::Document`] with the page-level lookups the translation
//! pipeline needs: crop boxes with page-tree inheritance, decoded content
//! bytes, inherited resources and one-call page interpretation.

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use pdfmath_core::{BBox, Ctm};
use tracing::debug;

use crate::error::BackendError;
use crate::fonts::FontRegistry;
use crate::handler::{CollectedPage, PageCollector};
use crate::interpreter::{DEFAULT_MAX_RECURSION_DEPTH, Interpreter, decode_stream};

/// A parsed PDF document backed by lopdf.
pub struct LopdfDocument {
    inner: Document,
    /// Ordered page object ids, indexed by 0-based page number.
    page_ids: Vec<ObjectId>,
}

impl std::fmt::Debug for LopdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfDocument")
            .field("page_count", &self.page_ids.len())
            .finish_non_exhaustive()
    }
}

impl LopdfDocument {
    /// Parse a document from memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let inner = Document::load_mem(bytes)
            .map_err(|e| BackendError::Parse(format!("failed to parse PDF: {e}")))?;
        Self::from_document(inner)
    }

    /// Read and parse a document from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, BackendError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_document(inner: Document) -> Result<Self, BackendError> {
        if inner.is_encrypted() {
            return Err(BackendError::Parse(
                "encrypted PDFs are not supported".to_string(),
            ));
        }
        let page_ids: Vec<ObjectId> = inner.get_pages().into_values().collect();
        debug!(pages = page_ids.len(), "opened document");
        Ok(Self { inner, page_ids })
    }

    pub fn inner(&self) -> &Document {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut Document {
        &mut self.inner
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    pub fn page_id(&self, index: usize) -> Result<ObjectId, BackendError> {
        self.page_ids.get(index).copied().ok_or_else(|| {
            BackendError::Parse(format!(
                "page index {index} out of range (0..{})",
                self.page_ids.len()
            ))
        })
    }

    /// The visible area of a page: `/CropBox`, else `/MediaBox`, both
    /// inherited through the page tree. Defaults to US Letter.
    pub fn crop_box(&self, index: usize) -> Result<BBox, BackendError> {
        let page_id = self.page_id(index)?;
        for key in [&b"CropBox"[..], b"MediaBox"] {
            if let Some(obj) = resolve_inherited(&self.inner, page_id, key)? {
                let obj = resolve(&self.inner, obj)?;
                if let Ok(array) = obj.as_array() {
                    return extract_bbox_from_array(&self.inner, array);
                }
            }
        }
        Ok(BBox::new(0.0, 0.0, 612.0, 792.0))
    }

    /// Decoded page content; multiple content streams are joined.
    pub fn content_bytes(&self, index: usize) -> Result<Vec<u8>, BackendError> {
        let page_id = self.page_id(index)?;
        let page_dict = self
            .inner
            .get_dictionary(page_id)
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;
        get_page_content_bytes(&self.inner, page_dict)
    }

    /// The page's resource dictionary, inherited when the page has none.
    pub fn resources(&self, index: usize) -> Result<Dictionary, BackendError> {
        let page_id = self.page_id(index)?;
        match resolve_inherited(&self.inner, page_id, b"Resources")? {
            Some(obj) => resolve(&self.inner, obj)?
                .as_dict()
                .cloned()
                .map_err(|_| BackendError::Parse("/Resources is not a dictionary".to_string())),
            None => Ok(Dictionary::new()),
        }
    }

    /// Interpret page `index` into glyphs, lines and figure markers.
    ///
    /// Coordinates are relative to the crop box origin. `registry` receives
    /// every font the page and its forms use.
    pub fn interpret_page(
        &self,
        index: usize,
        registry: &mut FontRegistry,
    ) -> Result<CollectedPage, BackendError> {
        self.interpret_page_with_depth(index, registry, DEFAULT_MAX_RECURSION_DEPTH)
    }

    /// [`LopdfDocument::interpret_page`] with a custom form nesting limit.
    pub fn interpret_page_with_depth(
        &self,
        index: usize,
        registry: &mut FontRegistry,
        max_depth: usize,
    ) -> Result<CollectedPage, BackendError> {
        let crop = self.crop_box(index)?;
        let content = self.content_bytes(index)?;
        let resources = self.resources(index)?;
        let mut collector = PageCollector::new(index);
        Interpreter::new(&self.inner, registry, &mut collector)
            .with_max_depth(max_depth)
            .run_page(&content, &resources, Ctm::translation(-crop.x0, -crop.y0))?;
        let page = collector.finish();
        debug!(
            page = index,
            glyphs = page.glyph_count(),
            items = page.items.len(),
            "interpreted page"
        );
        Ok(page)
    }

    /// Serialize the document.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>, BackendError> {
        let mut buf = Vec::new();
        self.inner
            .save_to(&mut buf)
            .map_err(|e| BackendError::Write(format!("failed to serialize PDF: {e}")))?;
        Ok(buf)
    }
}

/// Extract a [`BBox`] from an array of four numbers, normalizing corners.
fn extract_bbox_from_array(doc: &Document, array: &[Object]) -> Result<BBox, BackendError> {
    if array.len() != 4 {
        return Err(BackendError::Parse(format!(
            "expected 4-element array for box, got {}",
            array.len()
        )));
    }
    let mut v = [0.0; 4];
    for (slot, obj) in v.iter_mut().zip(array) {
        *slot = crate::font_metrics::number(doc, obj)
            .ok_or_else(|| BackendError::Parse(format!("expected number, got {obj:?}")))?;
    }
    Ok(BBox::new(
        v[0].min(v[2]),
        v[1].min(v[3]),
        v[0].max(v[2]),
        v[1].max(v[3]),
    ))
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object, BackendError> {
    match obj {
        Object::Reference(id) => doc
            .get_object(*id)
            .map_err(|e| BackendError::Parse(format!("failed to resolve {id:?}: {e}"))),
        other => Ok(other),
    }
}

/// Look up a key on the page, walking up `/Parent` links when missing.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Result<Option<&'a Object>, BackendError> {
    let mut current_id = page_id;
    // page trees are shallow; the bound stops cyclic /Parent chains
    for _ in 0..64 {
        let dict = doc
            .get_dictionary(current_id)
            .map_err(|e| BackendError::Parse(format!("failed to get page dictionary: {e}")))?;

        if let Ok(value) = dict.get(key) {
            return Ok(Some(value));
        }

        match dict.get(b"Parent") {
            Ok(parent_obj) => {
                current_id = parent_obj
                    .as_reference()
                    .map_err(|e| BackendError::Parse(format!("invalid /Parent reference: {e}")))?;
            }
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

/// Content bytes of a page: one stream or an array of streams.
fn get_page_content_bytes(doc: &Document, page_dict: &Dictionary) -> Result<Vec<u8>, BackendError> {
    let contents_obj = match page_dict.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents_obj)? {
        Object::Stream(stream) => decode_stream(stream),
        Object::Array(arr) => {
            let mut content = Vec::new();
            for item in arr {
                let stream = resolve(doc, item)?.as_stream().map_err(|e| {
                    BackendError::Parse(format!("/Contents array item is not a stream: {e}"))
                })?;
                let bytes = decode_stream(stream)?;
                if !content.is_empty() {
                    content.push(b'\n');
                }
                content.extend_from_slice(&bytes);
            }
            Ok(content)
        }
        _ => Err(BackendError::Parse(
            "/Contents is not a stream or array".to_string(),
        )),
    }
}

#[cfg(test)]
fn create_test_pdf(pages: &[(&[u8], Option<[i64; 4]>)]) -> Vec<u8> {
    use lopdf::{Stream, dictionary};

    let mut doc = Document::with_version("1.5");
    let pages_id: ObjectId = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids: Vec<Object> = Vec::new();
    for (content, crop) in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(crop) = crop {
            page.set(
                "CropBox",
                crop.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
            );
        }
        kids.push(doc.add_object(page).into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.clone(),
            "Count" => kids.len() as i64,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("failed to save test PDF");
    buf
}

#[cfg(test)]
mod tests {
    use pdfmath_core::PageItem;

    use super::*;

    #[test]
    fn page_count_and_out_of_range() {
        let bytes = create_test_pdf(&[(b"", None), (b"", None)]);
        let doc = LopdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert!(doc.page_id(2).is_err());
    }

    #[test]
    fn media_box_is_inherited() {
        let bytes = create_test_pdf(&[(b"", None)]);
        let doc = LopdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.crop_box(0).unwrap(), BBox::new(0.0, 0.0, 612.0, 792.0));
    }

    #[test]
    fn crop_box_wins_over_media_box() {
        let bytes = create_test_pdf(&[(b"", Some([50, 60, 550, 760]))]);
        let doc = LopdfDocument::from_bytes(&bytes).unwrap();
        assert_eq!(doc.crop_box(0).unwrap(), BBox::new(50.0, 60.0, 550.0, 760.0));
    }

    #[test]
    fn resources_are_inherited() {
        let bytes = create_test_pdf(&[(b"", None)]);
        let doc = LopdfDocument::from_bytes(&bytes).unwrap();
        let resources = doc.resources(0).unwrap();
        assert!(resources.get(b"Font").is_ok());
    }

    #[test]
    fn interpret_page_is_relative_to_crop_box() {
        let bytes = create_test_pdf(&[(
            b"BT /F1 10 Tf 100 100 Td (A) Tj ET",
            Some([50, 60, 550, 760]),
        )]);
        let doc = LopdfDocument::from_bytes(&bytes).unwrap();
        let mut registry = FontRegistry::new();
        let page = doc.interpret_page(0, &mut registry).unwrap();
        let glyph = page
            .items
            .iter()
            .find_map(|item| match item {
                PageItem::Glyph(g) => Some(g),
                _ => None,
            })
            .unwrap();
        assert!((glyph.x0() - 50.0).abs() < 1e-9);
        assert_eq!(glyph.text, "A");
        assert!(registry.get("F1").is_some());
    }

    #[test]
    fn rejects_garbage() {
        assert!(LopdfDocument::from_bytes(b"not a pdf").is_err());
    }
}
