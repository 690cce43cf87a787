//! Forward-only cursor over the UTF-16 code units of a `.reg` document.
//!
//! The cursor works on raw code units so that names and strings holding
//! unpaired surrogates pass through unchanged. All syntax is ASCII.

use crate::text::RegString;

/// Line terminator used throughout `.reg` files.
pub const NEWLINE: &str = "\r\n";

/// Marker ending a line whose value rendition continues on the next line.
pub const CONTINUATION: &str = "\\\r\n";

pub(crate) const QUOTE: u16 = b'"' as u16;
pub(crate) const BACKSLASH: u16 = b'\\' as u16;
pub(crate) const CR: u16 = b'\r' as u16;
pub(crate) const LF: u16 = b'\n' as u16;

/// Scan position within a `.reg` document.
///
/// All `eat_*` methods consume input only when they match.
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    text: &'a [u16],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Starts scanning at the beginning of `text`.
    pub fn new(text: &'a [u16]) -> Self {
        Self { text, pos: 0 }
    }

    /// Unconsumed input.
    pub fn rest(&self) -> &'a [u16] {
        &self.text[self.pos..]
    }

    /// True once all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Unconsumed input length in UTF-16 code units.
    pub fn remaining_units(&self) -> usize {
        self.text.len().saturating_sub(self.pos)
    }

    /// Consumes `len` code units.
    pub fn advance(&mut self, len: usize) {
        self.pos = (self.pos + len).min(self.text.len());
    }

    /// True if `expected` is next.
    pub fn starts_with(&self, expected: &str) -> bool {
        let rest = self.rest();
        let mut index = 0;
        for unit in expected.encode_utf16() {
            if rest.get(index) != Some(&unit) {
                return false;
            }
            index += 1;
        }
        true
    }

    /// Position of the first occurrence of `needle` in the unconsumed
    /// input, relative to the cursor.
    pub fn find(&self, needle: &str) -> Option<usize> {
        let needle: Vec<u16> = needle.encode_utf16().collect();
        self.rest().windows(needle.len()).position(|window| window == needle.as_slice())
    }

    /// Consumes `expected` if it is next.
    pub fn eat(&mut self, expected: char) -> bool {
        let mut buf = [0u16; 2];
        let units = expected.encode_utf16(&mut buf);
        if self.rest().starts_with(units) {
            self.pos += units.len();
            true
        } else {
            false
        }
    }

    /// Consumes `expected` if it is next.
    pub fn eat_str(&mut self, expected: &str) -> bool {
        if self.starts_with(expected) {
            self.pos += expected.encode_utf16().count();
            true
        } else {
            false
        }
    }

    /// Consumes one CRLF.
    pub fn eat_newline(&mut self) -> bool {
        self.eat_str(NEWLINE)
    }

    /// Consumes any number of consecutive CRLFs.
    pub fn skip_blank_lines(&mut self) {
        while self.eat_newline() {}
    }

    /// Consumes a continuation marker and the leading spaces of the next line.
    pub fn eat_continuation(&mut self) -> bool {
        if !self.eat_str(CONTINUATION) {
            return false;
        }
        while self.eat(' ') {}
        true
    }

    /// Consumes the next `count` code units as ASCII text. Consumes nothing
    /// and returns `None` if fewer remain or any of them is not ASCII.
    pub fn take_ascii(&mut self, count: usize) -> Option<String> {
        let units = self.rest().get(..count)?;
        let text = ascii_text(units)?;
        self.pos += count;
        Some(text)
    }

    /// Consumes the longest run of ASCII characters satisfying `predicate`.
    pub fn take_ascii_while(&mut self, predicate: impl Fn(char) -> bool) -> String {
        let rest = self.rest();
        let end = rest
            .iter()
            .position(|&unit| !char::from_u32(u32::from(unit)).map_or(false, |c| c.is_ascii() && predicate(c)))
            .unwrap_or(rest.len());
        self.pos += end;
        ascii_text(&rest[..end]).unwrap_or_default()
    }

    /// Reads the body of a double-quoted string whose opening quote has
    /// already been consumed, through the closing quote.
    ///
    /// A backslash makes the following code unit literal. A carriage return
    /// directly before a line feed is dropped, folding CRLF back to a single
    /// newline. Returns `None`, consuming nothing, when the closing quote is
    /// missing.
    pub fn read_quoted(&mut self) -> Option<RegString> {
        let rest = self.rest();
        let mut text = RegString::new();
        let mut index = 0;

        while let Some(&unit) = rest.get(index) {
            match unit {
                QUOTE => {
                    self.pos += index + 1;
                    return Some(text);
                }
                BACKSLASH => {
                    text.push_unit(*rest.get(index + 1)?);
                    index += 1;
                }
                CR if rest.get(index + 1) == Some(&LF) => {}
                _ => text.push_unit(unit),
            }
            index += 1;
        }

        None
    }
}

fn ascii_text(units: &[u16]) -> Option<String> {
    units
        .iter()
        .map(|&unit| u8::try_from(unit).ok().filter(u8::is_ascii).map(char::from))
        .collect()
}
