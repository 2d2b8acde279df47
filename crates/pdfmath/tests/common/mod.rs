//! Shared helpers for the integration tests: in-memory PDFs built with
//! lopdf and translators that never touch the network.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use lopdf::{Dictionary, Document, Object, Stream, dictionary};
use pdfmath::{TranslateError, Translator};

/// A document whose pages share Helvetica as `/F1` and CMMI10 as `/F2`.
pub fn pdf_with_pages(pages: &[&[u8]]) -> Vec<u8> {
    pdf_with_body_font(
        dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        },
        pages,
    )
}

/// Like [`pdf_with_pages`] with `body` as `/F1`.
pub fn pdf_with_body_font(body: Dictionary, pages: &[&[u8]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let body_font = doc.add_object(body);
    let math = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "CMMI10",
        "FirstChar" => 120,
        "LastChar" => 120,
        "Widths" => vec![Object::Integer(572)],
    });
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = pages
        .iter()
        .map(|content| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => body_font, "F2" => math },
            },
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// Decoded content of every page of a saved document.
pub fn page_contents(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    doc.get_pages()
        .into_values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
        .collect()
}

/// Font resource names of the first page.
pub fn first_page_fonts(bytes: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(bytes).unwrap();
    let page = doc.page_iter().next().unwrap();
    let resources = match doc.get_dictionary(page).unwrap().get(b"Resources").unwrap() {
        Object::Dictionary(dict) => dict.clone(),
        Object::Reference(id) => doc.get_dictionary(*id).unwrap().clone(),
        other => panic!("unexpected resources: {other:?}"),
    };
    let fonts = match resources.get(b"Font").unwrap() {
        Object::Dictionary(dict) => dict.clone(),
        Object::Reference(id) => doc.get_dictionary(*id).unwrap().clone(),
        other => panic!("unexpected font resources: {other:?}"),
    };
    fonts
        .iter()
        .map(|(name, _)| String::from_utf8_lossy(name).into_owned())
        .collect()
}

/// Replies through `reply` and records every paragraph it was sent.
pub struct Recording {
    reply: Box<dyn Fn(&str) -> Result<String, TranslateError> + Send + Sync>,
    seen: Mutex<Vec<String>>,
}

impl Recording {
    pub fn new(
        reply: impl Fn(&str) -> Result<String, TranslateError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            reply: Box::new(reply),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Translates everything to the same text.
    pub fn constant(text: &'static str) -> Arc<Self> {
        Self::new(move |_| Ok(text.to_string()))
    }

    pub fn echo() -> Arc<Self> {
        Self::new(|text| Ok(text.to_string()))
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

/// Lets a test keep a handle on a translator it gives away.
pub struct Shared(pub Arc<Recording>);

impl Translator for Shared {
    fn translate(&self, text: &str) -> Result<String, TranslateError> {
        self.0.seen.lock().unwrap().push(text.to_string());
        (self.0.reply)(text)
    }

    fn identity(&self) -> String {
        "recording zh en".to_string()
    }
}
