//! Content stream tokenizer.
//!
//! Splits raw content stream bytes into [`Operator`]s, each carrying its
//! operands and the byte range it was read from. The range lets the writer
//! copy untouched operators verbatim instead of re-serializing them.

use std::ops::Range;

use crate::error::BackendError;

/// A content stream operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Integer(i64),
    Real(f64),
    /// Name without the leading `/`.
    Name(String),
    LiteralString(Vec<u8>),
    /// Decoded bytes of a `<...>` string.
    HexString(Vec<u8>),
    Array(Vec<Operand>),
    Boolean(bool),
    Null,
    Dictionary(Vec<(String, Operand)>),
}

impl Operand {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Integer(i) => Some(*i as f64),
            Operand::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Operand::LiteralString(s) | Operand::HexString(s) => Some(s),
            _ => None,
        }
    }
}

/// An operator with the operands that preceded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Operator {
    pub name: String,
    pub operands: Vec<Operand>,
    /// Source bytes from the first operand to the end of the operator.
    pub span: Range<usize>,
}

/// Parse content stream bytes into operators.
///
/// Comments are skipped. Inline images (`BI ... ID ... EI`) become a single
/// `BI` operator whose span covers the image data.
///
/// # Errors
///
/// Returns [`BackendError::Interpreter`] for malformed strings, arrays or
/// dictionaries.
pub fn tokenize(input: &[u8]) -> Result<Vec<Operator>, BackendError> {
    Lexer::new(input).run()
}

struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\r' | b'\n' | 0x0C | 0x00)
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

fn is_keyword_byte(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'*' || b == b'\'' || b == b'"' || b.is_ascii_digit()
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn malformed(msg: impl Into<String>) -> BackendError {
    BackendError::Interpreter(msg.into())
}

impl<'a> Lexer<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Result<Vec<Operator>, BackendError> {
        let mut ops = Vec::new();
        let mut operands = Vec::new();
        let mut start: Option<usize> = None;

        loop {
            self.skip_whitespace_and_comments();
            let Some(b) = self.peek() else { break };
            let token_start = self.pos;
            match b {
                b'a'..=b'z' | b'A'..=b'Z' | b'*' | b'\'' | b'"' => {
                    let keyword = self.keyword();
                    match keyword.as_str() {
                        "true" => operands.push(Operand::Boolean(true)),
                        "false" => operands.push(Operand::Boolean(false)),
                        "null" => operands.push(Operand::Null),
                        "BI" => {
                            let dict = self.inline_image()?;
                            ops.push(Operator {
                                name: keyword,
                                operands: vec![Operand::Dictionary(dict)],
                                span: start.take().unwrap_or(token_start)..self.pos,
                            });
                            operands.clear();
                            continue;
                        }
                        _ => {
                            ops.push(Operator {
                                name: keyword,
                                operands: std::mem::take(&mut operands),
                                span: start.take().unwrap_or(token_start)..self.pos,
                            });
                            continue;
                        }
                    }
                }
                b']' | b')' | b'>' | b'{' | b'}' => {
                    // stray closing delimiter: skip it
                    self.pos += 1;
                    continue;
                }
                _ => {
                    let operand = self.operand()?;
                    operands.push(operand);
                }
            }
            start.get_or_insert(token_start);
        }

        Ok(ops)
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(b) = self.peek() {
            if is_whitespace(b) {
                self.pos += 1;
            } else if b == b'%' {
                while let Some(c) = self.peek() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Any operand value. Bare keywords inside arrays and dictionaries are
    /// read as names.
    fn operand(&mut self) -> Result<Operand, BackendError> {
        let b = self
            .peek()
            .ok_or_else(|| malformed("unexpected end of content stream"))?;
        match b {
            b'(' => Ok(Operand::LiteralString(self.literal_string()?)),
            b'<' if self.peek_at(1) == Some(b'<') => Ok(Operand::Dictionary(self.dictionary()?)),
            b'<' => Ok(Operand::HexString(self.hex_string()?)),
            b'[' => Ok(Operand::Array(self.array()?)),
            b'/' => Ok(Operand::Name(self.name())),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.number(),
            b'a'..=b'z' | b'A'..=b'Z' => {
                let keyword = self.keyword();
                Ok(match keyword.as_str() {
                    "true" => Operand::Boolean(true),
                    "false" => Operand::Boolean(false),
                    "null" => Operand::Null,
                    _ => Operand::Name(keyword),
                })
            }
            _ => Err(malformed(format!("unexpected byte 0x{b:02X}"))),
        }
    }

    fn literal_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut out = Vec::new();
        let mut depth = 1u32;
        while let Some(b) = self.peek() {
            self.pos += 1;
            match b {
                b'(' => {
                    depth += 1;
                    out.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(out);
                    }
                    out.push(b);
                }
                b'\\' => {
                    let escaped = self
                        .peek()
                        .ok_or_else(|| malformed("unterminated escape in literal string"))?;
                    self.pos += 1;
                    match escaped {
                        b'n' => out.push(b'\n'),
                        b'r' => out.push(b'\r'),
                        b't' => out.push(b'\t'),
                        b'b' => out.push(0x08),
                        b'f' => out.push(0x0C),
                        b'\r' => {
                            if self.peek() == Some(b'\n') {
                                self.pos += 1;
                            }
                        }
                        b'\n' => {}
                        b'0'..=b'7' => {
                            let mut value = u32::from(escaped - b'0');
                            for _ in 0..2 {
                                match self.peek() {
                                    Some(d @ b'0'..=b'7') => {
                                        value = value * 8 + u32::from(d - b'0');
                                        self.pos += 1;
                                    }
                                    _ => break,
                                }
                            }
                            out.push((value & 0xFF) as u8);
                        }
                        other => out.push(other),
                    }
                }
                _ => out.push(b),
            }
        }
        Err(malformed("unterminated literal string"))
    }

    fn hex_string(&mut self) -> Result<Vec<u8>, BackendError> {
        self.pos += 1;
        let mut digits = Vec::new();
        loop {
            let b = self
                .peek()
                .ok_or_else(|| malformed("unterminated hex string"))?;
            self.pos += 1;
            if b == b'>' {
                break;
            }
            if is_whitespace(b) {
                continue;
            }
            digits.push(hex_digit(b).ok_or_else(|| {
                malformed(format!("invalid hex digit: {:?}", b as char))
            })?);
        }
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        Ok(digits.chunks(2).map(|p| (p[0] << 4) | p[1]).collect())
    }

    fn array(&mut self) -> Result<Vec<Operand>, BackendError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(malformed("unterminated array")),
                Some(b']') => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.push(self.operand()?),
            }
        }
    }

    fn dictionary(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        self.pos += 2;
        let mut entries = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(malformed("unterminated dictionary")),
                Some(b'>') if self.peek_at(1) == Some(b'>') => {
                    self.pos += 2;
                    return Ok(entries);
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.operand()?;
                    entries.push((key, value));
                }
                Some(_) => return Err(malformed("expected name key in dictionary")),
            }
        }
    }

    fn name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while let Some(b) = self.peek() {
            if is_whitespace(b) || is_delimiter(b) {
                break;
            }
            self.pos += 1;
        }
        let raw = &self.input[start..self.pos];
        let mut decoded = Vec::with_capacity(raw.len());
        let mut i = 0;
        while i < raw.len() {
            if raw[i] == b'#' && i + 2 < raw.len() {
                if let (Some(hi), Some(lo)) = (hex_digit(raw[i + 1]), hex_digit(raw[i + 2])) {
                    decoded.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
            }
            decoded.push(raw[i]);
            i += 1;
        }
        String::from_utf8_lossy(&decoded).into_owned()
    }

    fn number(&mut self) -> Result<Operand, BackendError> {
        let start = self.pos;
        if matches!(self.peek(), Some(b'+' | b'-')) {
            self.pos += 1;
        }
        let mut real = false;
        while let Some(b) = self.peek() {
            match b {
                b'.' if !real => real = true,
                b'0'..=b'9' => {}
                _ => break,
            }
            self.pos += 1;
        }
        let token = String::from_utf8_lossy(&self.input[start..self.pos]);
        // lone signs or dots are read as zero
        let digits = token.trim_start_matches(['+', '-']);
        if digits.is_empty() || digits == "." {
            return Ok(Operand::Integer(0));
        }
        if real {
            token
                .parse()
                .map(Operand::Real)
                .map_err(|_| malformed(format!("invalid real number: {token}")))
        } else {
            match token.parse() {
                Ok(v) => Ok(Operand::Integer(v)),
                Err(_) => token
                    .parse()
                    .map(Operand::Real)
                    .map_err(|_| malformed(format!("invalid integer: {token}"))),
            }
        }
    }

    fn keyword(&mut self) -> String {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if !is_keyword_byte(b) {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    /// Read an inline image after `BI`, leaving the cursor after `EI`.
    fn inline_image(&mut self) -> Result<Vec<(String, Operand)>, BackendError> {
        let mut dict = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            match self.peek() {
                None => return Err(malformed("unterminated inline image (missing ID)")),
                Some(b'I')
                    if self.peek_at(1) == Some(b'D')
                        && self.peek_at(2).is_none_or(is_whitespace) =>
                {
                    self.pos += 3;
                    break;
                }
                Some(b'/') => {
                    let key = self.name();
                    self.skip_whitespace_and_comments();
                    let value = self.operand()?;
                    dict.push((key, value));
                }
                Some(_) => return Err(malformed("expected name key in inline image")),
            }
        }

        let data_start = self.pos;
        while self.pos + 1 < self.input.len() {
            let at_boundary = self.pos == data_start || is_whitespace(self.input[self.pos - 1]);
            if at_boundary
                && self.input[self.pos] == b'E'
                && self.input[self.pos + 1] == b'I'
                && self
                    .peek_at(2)
                    .is_none_or(|b| is_whitespace(b) || is_delimiter(b))
            {
                self.pos += 2;
                return Ok(dict);
            }
            self.pos += 1;
        }
        Err(malformed("unterminated inline image (missing EI)"))
    }
}
