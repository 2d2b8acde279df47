//! `/ToUnicode` CMap parsing.
//!
//! CMap streams are PostScript fragments whose syntax the content stream
//! tokenizer already reads: each `endbfchar`/`endbfrange` keyword arrives
//! as an operator carrying the section's entries as operands.

use std::collections::HashMap;

use crate::error::BackendError;
use crate::tokenizer::{Operand, tokenize};

/// Upper bound on the codes one `bfrange` entry may expand to.
const MAX_RANGE_LEN: u32 = 0x1_0000;

/// Character code to Unicode mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToUnicodeCMap {
    mappings: HashMap<u32, String>,
}

impl ToUnicodeCMap {
    pub fn parse(data: &[u8]) -> Result<Self, BackendError> {
        let mut mappings = HashMap::new();
        for op in tokenize(data)? {
            match op.name.as_str() {
                "endbfchar" => {
                    for pair in op.operands.chunks_exact(2) {
                        let (Some(src), Some(dst)) = (pair[0].as_bytes(), pair[1].as_bytes())
                        else {
                            continue;
                        };
                        mappings.insert(code_value(src), decode_utf16be(dst));
                    }
                }
                "endbfrange" => {
                    for entry in op.operands.chunks_exact(3) {
                        parse_range(&entry[0], &entry[1], &entry[2], &mut mappings);
                    }
                }
                _ => {}
            }
        }
        Ok(Self { mappings })
    }

    pub fn lookup(&self, code: u32) -> Option<&str> {
        self.mappings.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

fn parse_range(lo: &Operand, hi: &Operand, dst: &Operand, mappings: &mut HashMap<u32, String>) {
    let (Some(lo), Some(hi)) = (lo.as_bytes(), hi.as_bytes()) else {
        return;
    };
    let (lo, hi) = (code_value(lo), code_value(hi));
    if hi < lo || hi - lo >= MAX_RANGE_LEN {
        return;
    }
    match dst {
        Operand::Array(items) => {
            for (code, item) in (lo..=hi).zip(items) {
                if let Some(bytes) = item.as_bytes() {
                    mappings.insert(code, decode_utf16be(bytes));
                }
            }
        }
        other => {
            let Some(bytes) = other.as_bytes() else {
                return;
            };
            let mut units = utf16_units(bytes);
            let Some(last) = units.pop() else {
                return;
            };
            for offset in 0..=(hi - lo) {
                let Ok(unit) = u16::try_from(u32::from(last) + offset) else {
                    break;
                };
                let mut run = units.clone();
                run.push(unit);
                mappings.insert(lo + offset, String::from_utf16_lossy(&run));
            }
        }
    }
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .take(4)
        .fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_units(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => u16::from(*single),
            _ => 0,
        })
        .collect()
}

fn decode_utf16be(bytes: &[u8]) -> String {
    String::from_utf16_lossy(&utf16_units(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = b"/CIDInit /ProcSet findresource begin
12 dict begin
begincmap
/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def
/CMapName /Adobe-Identity-UCS def
/CMapType 2 def
1 begincodespacerange
<0000> <FFFF>
endcodespacerange
3 beginbfchar
<0003> <0020>
<0011> <0066 0069>
<0024> <D835DC00>
endbfchar
2 beginbfrange
<0044> <0046> <0061>
<0050> <0052> [<03B1> <03B2> <03B3>]
endbfrange
endcmap
CMapName currentdict /CMap defineresource pop
end
end";

    #[test]
    fn bfchar_entries() {
        let cmap = ToUnicodeCMap::parse(SAMPLE).unwrap();
        assert_eq!(cmap.lookup(0x03), Some(" "));
        assert_eq!(cmap.lookup(0x11), Some("fi"));
        assert_eq!(cmap.lookup(0x24), Some("𝐀"));
    }

    #[test]
    fn bfrange_increments() {
        let cmap = ToUnicodeCMap::parse(SAMPLE).unwrap();
        assert_eq!(cmap.lookup(0x44), Some("a"));
        assert_eq!(cmap.lookup(0x46), Some("c"));
        assert_eq!(cmap.lookup(0x47), None);
    }

    #[test]
    fn bfrange_array_form() {
        let cmap = ToUnicodeCMap::parse(SAMPLE).unwrap();
        assert_eq!(cmap.lookup(0x50), Some("α"));
        assert_eq!(cmap.lookup(0x52), Some("γ"));
        assert_eq!(cmap.len(), 9);
    }

    #[test]
    fn single_byte_codes() {
        let cmap = ToUnicodeCMap::parse(b"1 beginbfchar <41> <0042> endbfchar").unwrap();
        assert_eq!(cmap.lookup(0x41), Some("B"));
    }

    #[test]
    fn oversized_range_is_ignored() {
        let cmap =
            ToUnicodeCMap::parse(b"1 beginbfrange <00000000> <FFFFFFFF> <0041> endbfrange")
                .unwrap();
        assert!(cmap.is_empty());
    }
}
