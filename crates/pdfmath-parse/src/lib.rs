//! pdfmath-parse: lopdf backend, content stream interpreter and page writer.
//!
//! Reads page content into the glyph/line model of pdfmath-core and writes
//! regenerated text back. Font loading (simple and composite fonts,
//! encodings, ToUnicode maps, standard-font metrics) lives here because it
//! needs the PDF object graph.

pub mod cmap;
pub mod content_writer;
pub mod encoding;
pub mod error;
pub mod font_metrics;
pub mod fonts;
pub mod handler;
pub mod interpreter;
pub mod interpreter_state;
pub mod lopdf_backend;
pub mod standard_fonts;
pub mod text_renderer;
pub mod text_state;
pub mod tokenizer;

pub use cmap::ToUnicodeCMap;
pub use content_writer::{ContentWriter, EmbeddedFont, EmbeddedGlyph, strip_text};
pub use encoding::{BaseEncoding, SimpleEncoding, glyph_name_to_char};
pub use error::BackendError;
pub use font_metrics::FontMetrics;
pub use fonts::{FontRegistry, LoadedFont};
pub use handler::{CollectedPage, ContentHandler, GlyphEvent, PageCollector, StreamId};
pub use interpreter::{DEFAULT_MAX_RECURSION_DEPTH, Interpreter};
pub use interpreter_state::{InterpreterState, StrokeColor};
pub use lopdf_backend::LopdfDocument;
pub use pdfmath_core;
pub use text_state::TextState;
pub use tokenizer::{Operand, Operator, tokenize};
