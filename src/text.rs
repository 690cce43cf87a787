//! Registry text as raw UTF-16 code units.
//!
//! Key and value names are sequences of UTF-16 code units that are not
//! required to be well-formed: an unpaired surrogate is a legal name
//! character. [`RegString`] keeps such text losslessly through every
//! format, and only turns it into a Rust `String` for display.

use crate::utils::{decode_utf16le, units_from_utf16le, units_to_utf16le};
use std::fmt;

/// A possibly ill-formed UTF-16 string.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegString(Vec<u16>);

impl RegString {
    /// Creates an empty string.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Wraps raw code units.
    pub fn from_units(units: Vec<u16>) -> Self {
        Self(units)
    }

    /// Reads UTF-16LE bytes. Fails only for an odd byte count.
    pub fn from_utf16le(data: &[u8]) -> Option<Self> {
        units_from_utf16le(data).map(Self)
    }

    /// Reads single-byte (Latin-1) text.
    pub fn from_latin1(data: &[u8]) -> Self {
        Self(data.iter().map(|&b| u16::from(b)).collect())
    }

    /// The code units.
    pub fn as_units(&self) -> &[u16] {
        &self.0
    }

    /// Consumes the string, returning its code units.
    pub fn into_units(self) -> Vec<u16> {
        self.0
    }

    /// Length in code units.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Appends one code unit.
    pub fn push_unit(&mut self, unit: u16) {
        self.0.push(unit);
    }

    /// Appends code units.
    pub fn push_units(&mut self, units: &[u16]) {
        self.0.extend_from_slice(units);
    }

    /// Appends Rust text.
    pub fn push_str(&mut self, text: &str) {
        self.0.extend(text.encode_utf16());
    }

    /// Appends a character.
    pub fn push(&mut self, c: char) {
        let mut buf = [0u16; 2];
        self.0.extend_from_slice(c.encode_utf16(&mut buf));
    }

    /// Returns `self`, `separator` and `child` joined.
    pub fn join(&self, separator: char, child: &RegString) -> RegString {
        let mut joined = self.clone();
        joined.push(separator);
        joined.push_units(child.as_units());
        joined
    }

    /// True if `c` occurs.
    pub fn contains_char(&self, c: char) -> bool {
        let mut buf = [0u16; 2];
        contains_units(&self.0, c.encode_utf16(&mut buf))
    }

    /// True if `text` occurs as a run of code units.
    pub fn contains_str(&self, text: &str) -> bool {
        let needle: Vec<u16> = text.encode_utf16().collect();
        contains_units(&self.0, &needle)
    }

    /// True if the units of `prefix` start this string.
    pub fn starts_with(&self, prefix: &RegString) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Splits on a character, like [`str::split`].
    pub fn split(&self, separator: char) -> impl Iterator<Item = RegString> + '_ {
        let mut buf = [0u16; 2];
        let unit = separator.encode_utf16(&mut buf)[0];
        self.0.split(move |&u| u == unit).map(|part| RegString(part.to_vec()))
    }

    /// UTF-16LE bytes, without terminator.
    pub fn to_utf16le(&self) -> Vec<u8> {
        units_to_utf16le(&self.0)
    }

    /// Converts to a `String` if the units are well-formed UTF-16.
    pub fn to_string_checked(&self) -> Option<String> {
        decode_utf16le(&self.to_utf16le())
    }

    /// True if no surrogate is unpaired.
    pub fn is_well_formed(&self) -> bool {
        char::decode_utf16(self.0.iter().copied()).all(|c| c.is_ok())
    }

    /// Case-folded copy used for name comparisons.
    ///
    /// Characters are lowercased; unpaired surrogates are kept as they are.
    pub fn fold_case(&self) -> Vec<u16> {
        let mut folded = Vec::with_capacity(self.0.len());
        let mut buf = [0u16; 2];
        for decoded in char::decode_utf16(self.0.iter().copied()) {
            match decoded {
                Ok(c) => {
                    for lower in c.to_lowercase() {
                        folded.extend_from_slice(lower.encode_utf16(&mut buf));
                    }
                }
                Err(err) => folded.push(err.unpaired_surrogate()),
            }
        }
        folded
    }

    /// Compares two names the way the registry does: ignoring case.
    pub fn eq_ignore_case(&self, other: &RegString) -> bool {
        self == other || self.fold_case() == other.fold_case()
    }
}

fn contains_units(haystack: &[u16], needle: &[u16]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Unpaired surrogates are shown as `\u{xxxx}` escapes.
impl fmt::Display for RegString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for decoded in char::decode_utf16(self.0.iter().copied()) {
            match decoded {
                Ok(c) => fmt::Write::write_char(f, c)?,
                Err(err) => write!(f, "\\u{{{:04x}}}", err.unpaired_surrogate())?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RegString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

impl From<&str> for RegString {
    fn from(text: &str) -> Self {
        Self(text.encode_utf16().collect())
    }
}

impl From<String> for RegString {
    fn from(text: String) -> Self {
        Self::from(text.as_str())
    }
}

impl From<&String> for RegString {
    fn from(text: &String) -> Self {
        Self::from(text.as_str())
    }
}

impl From<&RegString> for RegString {
    fn from(text: &RegString) -> Self {
        text.clone()
    }
}

impl From<Vec<u16>> for RegString {
    fn from(units: Vec<u16>) -> Self {
        Self(units)
    }
}

impl PartialEq<str> for RegString {
    fn eq(&self, other: &str) -> bool {
        self.0.iter().copied().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for RegString {
    fn eq(&self, other: &&str) -> bool {
        *self == **other
    }
}

impl PartialEq<String> for RegString {
    fn eq(&self, other: &String) -> bool {
        *self == *other.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unpaired_surrogate_survives() {
        let name = RegString::from_units(vec![0x41, 0xD800, 0x42]);
        assert!(!name.is_well_formed());
        assert_eq!(name.to_string_checked(), None);
        assert_eq!(RegString::from_utf16le(&name.to_utf16le()), Some(name.clone()));
        assert_eq!(name.to_string(), "A\\u{d800}B");
    }

    #[test]
    fn test_fold_case_keeps_surrogates() {
        let upper = RegString::from_units(vec![0x41, 0xDC00]);
        let lower = RegString::from_units(vec![0x61, 0xDC00]);
        assert!(upper.eq_ignore_case(&lower));
        assert!(!upper.eq_ignore_case(&RegString::from_units(vec![0x61, 0xDC01])));
    }

    #[test]
    fn test_search_and_split() {
        let path = RegString::from("a\\b\\c");
        let parts: Vec<String> = path.split('\\').map(|p| p.to_string()).collect();
        assert_eq!(parts, ["a", "b", "c"]);
        assert!(path.contains_char('\\'));
        assert!(RegString::from("x]\ny").contains_str("]\n"));
        assert!(path.starts_with(&RegString::from("a\\")));
        assert_eq!(RegString::from("a").join('\\', &RegString::from("b")), "a\\b");
    }

    #[test]
    fn test_odd_length_is_rejected() {
        assert_eq!(RegString::from_utf16le(&[0x41]), None);
        assert_eq!(RegString::from_latin1(b"Caf\xe9"), "Café");
    }
}
