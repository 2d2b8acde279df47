//! Page classification masks.
//!
//! A mask assigns a small integer region id to every point-sized cell of a
//! page. Id `0` marks figures, tables, isolated formulas and captions: glyphs
//! there are never translated. Every other id identifies one text region.
//!
//! Rows are indexed by PDF y (bottom-up), columns by PDF x.

use std::collections::HashMap;

use crate::error::PdfError;

/// Region id reserved for content that must not be translated.
pub const RESERVED_REGION: u32 = 0;

/// Region id of cells not covered by any detected layout box.
pub const DEFAULT_REGION: u32 = 1;

/// Layout labels whose boxes are painted with [`RESERVED_REGION`].
pub const EXCLUDED_LABELS: [&str; 5] = [
    "abandon",
    "figure",
    "table",
    "isolate_formula",
    "formula_caption",
];

/// A labelled box produced by a layout detector, in image coordinates
/// (top-left origin, y growing downwards).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutRegion {
    pub label: String,
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl LayoutRegion {
    pub fn new(label: impl Into<String>, x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            label: label.into(),
            x0,
            y0,
            x1,
            y1,
        }
    }

    /// Whether this region is excluded from paragraph text.
    pub fn is_excluded(&self) -> bool {
        EXCLUDED_LABELS.contains(&self.label.as_str())
    }
}

/// Per-page grid of region ids. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationMask {
    width: usize,
    height: usize,
    cells: Vec<u32>,
}

impl ClassificationMask {
    /// A mask where every cell holds `value`. Zero dimensions are raised to 1.
    pub fn filled(width: usize, height: usize, value: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// A mask covering the page with the single [`DEFAULT_REGION`].
    pub fn uniform(width: usize, height: usize) -> Self {
        Self::filled(width, height, DEFAULT_REGION)
    }

    /// Build from row-major cells (row 0 is the bottom of the page).
    pub fn from_cells(width: usize, height: usize, cells: Vec<u32>) -> Result<Self, PdfError> {
        if width == 0 || height == 0 || cells.len() != width * height {
            return Err(PdfError::Other(format!(
                "mask of {width}x{height} needs {} cells, got {}",
                width * height,
                cells.len()
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Build a mask from detector boxes.
    ///
    /// Text boxes are painted first with `index + 2`, excluded boxes after
    /// them with [`RESERVED_REGION`], so exclusions always win. Each box is
    /// flipped into PDF orientation and padded by one cell.
    pub fn from_regions(width: usize, height: usize, regions: &[LayoutRegion]) -> Self {
        let mut mask = Self::uniform(width, height);
        for (i, region) in regions.iter().enumerate() {
            if !region.is_excluded() {
                mask.paint_region(region, i as u32 + 2);
            }
        }
        for region in regions.iter().filter(|r| r.is_excluded()) {
            mask.paint_region(region, RESERVED_REGION);
        }
        mask
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Region id under the page-space point `(x, y)`, clamped to the grid.
    pub fn region_at(&self, x: f64, y: f64) -> u32 {
        let cx = clamp_cell(x, self.width);
        let cy = clamp_cell(y, self.height);
        self.cells[cy * self.width + cx]
    }

    fn paint_region(&mut self, region: &LayoutRegion, value: u32) {
        let h = self.height as f64;
        let x0 = clamp_cell(region.x0 - 1.0, self.width);
        let x1 = clamp_cell(region.x1 + 1.0, self.width);
        let y0 = clamp_cell(h - region.y1 - 1.0, self.height);
        let y1 = clamp_cell(h - region.y0 + 1.0, self.height);
        if x1 <= x0 {
            return;
        }
        for row in y0..y1 {
            let start = row * self.width;
            self.cells[start + x0..start + x1].fill(value);
        }
    }
}

/// Truncate toward zero and clamp into `0..len`.
fn clamp_cell(v: f64, len: usize) -> usize {
    let max = len.saturating_sub(1) as i64;
    (v.trunc() as i64).clamp(0, max) as usize
}

/// Source of classification masks, one per page.
pub trait PageSegmenter: Send + Sync {
    /// Produce the mask for a page of `width` x `height` points.
    fn segment(
        &self,
        page_index: usize,
        width: usize,
        height: usize,
    ) -> Result<ClassificationMask, PdfError>;
}

/// Treats every page as a single text region.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSegmenter;

impl PageSegmenter for UniformSegmenter {
    fn segment(
        &self,
        _page_index: usize,
        width: usize,
        height: usize,
    ) -> Result<ClassificationMask, PdfError> {
        Ok(ClassificationMask::uniform(width, height))
    }
}

/// Builds masks from layout boxes detected ahead of time.
///
/// Pages without an entry fall back to a uniform mask.
#[derive(Debug, Clone, Default)]
pub struct RegionSegmenter {
    pages: HashMap<usize, Vec<LayoutRegion>>,
}

impl RegionSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, page_index: usize, regions: Vec<LayoutRegion>) -> Self {
        self.pages.insert(page_index, regions);
        self
    }
}

impl PageSegmenter for RegionSegmenter {
    fn segment(
        &self,
        page_index: usize,
        width: usize,
        height: usize,
    ) -> Result<ClassificationMask, PdfError> {
        Ok(match self.pages.get(&page_index) {
            Some(regions) => ClassificationMask::from_regions(width, height, regions),
            None => ClassificationMask::uniform(width, height),
        })
    }
}
