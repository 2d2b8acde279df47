//! Built-in metrics for the standard Type1 fonts.
//!
//! Used when a simple font has no `/Widths` array and for the Times-Roman
//! font registered to draw translated Latin text. Widths are AFM values in
//! thousandths of an em, indexed by WinAnsi code from 32 to 255.

/// Metrics of one standard font family.
#[derive(Debug)]
pub struct StandardFontData {
    widths: [u16; 224],
    /// `[llx lly urx ury]`, thousandths of an em.
    pub font_bbox: [i16; 4],
}

impl StandardFontData {
    /// Width of a WinAnsi code, `None` for codes without a glyph.
    pub fn width(&self, code: u32) -> Option<f64> {
        let idx = usize::try_from(code.checked_sub(32)?).ok()?;
        match self.widths.get(idx) {
            Some(&w) if w > 0 => Some(f64::from(w)),
            _ => None,
        }
    }

    pub fn descent(&self) -> f64 {
        f64::from(self.font_bbox[1])
    }
}

/// Metrics for a standard font name, style suffixes included.
///
/// Bold and italic faces share the regular face's table.
pub fn lookup(name: &str) -> Option<&'static StandardFontData> {
    let family = name.split([',', '-']).next().unwrap_or(name);
    match family {
        "Times" | "TimesNewRoman" | "TimesNewRomanPS" | "TimesNewRomanPSMT" => Some(&TIMES_ROMAN),
        "Helvetica" | "Arial" | "ArialMT" => Some(&HELVETICA),
        "Courier" | "CourierNew" | "CourierNewPSMT" => Some(&COURIER),
        _ => None,
    }
}

static COURIER: StandardFontData = StandardFontData {
    widths: {
        let mut w = [600u16; 224];
        w[127 - 32] = 0;
        w[129 - 32] = 0;
        w[141 - 32] = 0;
        w[143 - 32] = 0;
        w[144 - 32] = 0;
        w[157 - 32] = 0;
        w
    },
    font_bbox: [-23, -250, 715, 805],
};

#[rustfmt::skip]
static TIMES_ROMAN: StandardFontData = StandardFontData {
    widths: [
        // 32
        250, 333, 408, 500, 500, 833, 778, 180, 333, 333, 500, 564, 250, 333, 250, 278,
        500, 500, 500, 500, 500, 500, 500, 500, 500, 500, 278, 278, 564, 564, 564, 444,
        // 64
        921, 722, 667, 667, 722, 611, 556, 722, 722, 333, 389, 722, 611, 889, 722, 722,
        556, 722, 667, 556, 611, 722, 722, 944, 722, 722, 611, 333, 278, 333, 469, 500,
        // 96
        333, 444, 500, 444, 500, 444, 333, 500, 500, 278, 278, 500, 278, 778, 500, 500,
        500, 500, 333, 389, 278, 500, 500, 722, 500, 500, 444, 480, 200, 480, 541, 0,
        // 128
        500, 0, 333, 500, 444, 1000, 500, 500, 333, 1000, 556, 333, 889, 0, 611, 0,
        0, 333, 333, 444, 444, 350, 500, 1000, 333, 980, 389, 333, 722, 0, 444, 722,
        // 160
        250, 333, 500, 500, 500, 500, 200, 500, 333, 760, 276, 500, 564, 333, 760, 333,
        400, 564, 300, 300, 333, 500, 453, 250, 333, 300, 310, 500, 750, 750, 750, 444,
        // 192
        722, 722, 722, 722, 722, 722, 889, 667, 611, 611, 611, 611, 333, 333, 333, 333,
        722, 722, 722, 722, 722, 722, 722, 564, 722, 722, 722, 722, 722, 722, 556, 500,
        // 224
        444, 444, 444, 444, 444, 444, 667, 444, 444, 444, 444, 444, 278, 278, 278, 278,
        500, 500, 500, 500, 500, 500, 500, 564, 500, 500, 500, 500, 500, 500, 500, 500,
    ],
    font_bbox: [-168, -218, 1000, 898],
};

#[rustfmt::skip]
static HELVETICA: StandardFontData = StandardFontData {
    widths: [
        // 32
        278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
        // 64
        1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
        // 96
        333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
        556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, 0,
        // 128
        556, 0, 222, 556, 333, 1000, 556, 556, 333, 1000, 667, 333, 1000, 0, 611, 0,
        0, 222, 222, 333, 333, 350, 556, 1000, 333, 1000, 500, 333, 944, 0, 500, 667,
        // 160
        278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
        400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
        // 192
        667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
        722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
        // 224
        556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
        556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
    ],
    font_bbox: [-166, -225, 1000, 931],
};
