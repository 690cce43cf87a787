//! Reading and writing whole `.reg` export files.
//!
//! A file is UTF-16LE text with a byte-order mark, a fixed header line and a
//! blank line, followed by the key blocks of exactly one root key.
//!
//! # Examples
//!
//! ```rust
//! use reg_convert::regfile::{self, RegFileOptions};
//! use reg_convert::{RegistryKey, RegistryValue};
//!
//! # fn main() -> reg_convert::Result<()> {
//! let root = RegistryKey::new("HKEY_CURRENT_USER\\Software\\Example")
//!     .with_value(RegistryValue::dword("Enabled", 1));
//!
//! let options = RegFileOptions::default();
//! let text = regfile::render_string(&root, &options)?;
//! assert!(text.contains("\"Enabled\"=dword:00000001\r\n"));
//!
//! let parsed = regfile::parse_str(&text, &options)?;
//! assert_eq!(parsed, root);
//! # Ok(())
//! # }
//! ```

use crate::error::{RegistryError, Result};
use crate::model::RegistryKey;
use crate::parser::parse_key_list;
use crate::renderer::render_key;
use crate::scanner::Scanner;
use crate::text::RegString;
use crate::utils::units_from_utf16le;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Text every `.reg` file starts with, including the byte-order mark.
pub const PREAMBLE: &str = "\u{feff}Windows Registry Editor Version 5.00\r\n\r\n";

/// Deepest key nesting accepted by default, matching the registry's own
/// limit. Larger settings are capped to it.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Options for reading and writing `.reg` files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegFileOptions {
    /// Read and write `qword:`, `multi_sz:` and `expand_sz:` forms.
    ///
    /// Off by default, in which case those values are written as hex and
    /// the forms are rejected when reading.
    pub extensions: bool,

    /// Maximum key nesting depth below the root, capped at
    /// [`DEFAULT_MAX_DEPTH`].
    pub max_depth: usize,
}

impl Default for RegFileOptions {
    fn default() -> Self {
        Self::standard()
    }
}

impl RegFileOptions {
    /// Options for files the registry editor itself can import.
    pub fn standard() -> Self {
        Self {
            extensions: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Options enabling the extension forms.
    pub fn extended() -> Self {
        Self {
            extensions: true,
            ..Self::standard()
        }
    }

    /// Sets the maximum nesting depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// The nesting depth actually enforced.
    pub fn depth_limit(&self) -> usize {
        self.max_depth.min(DEFAULT_MAX_DEPTH)
    }
}

/// Parses `.reg` text given as UTF-16 code units, starting with the
/// byte-order mark.
///
/// Unpaired surrogates in names and strings are kept.
///
/// # Errors
///
/// Fails if the preamble is missing, any block is malformed, the file does
/// not hold exactly one root key, input is left over, or the resulting tree
/// is invalid (for example duplicate value names).
pub fn parse_units(text: &[u16], options: &RegFileOptions) -> Result<RegistryKey> {
    let preamble: Vec<u16> = PREAMBLE.encode_utf16().collect();
    let body = text
        .strip_prefix(preamble.as_slice())
        .ok_or(RegistryError::MissingPreamble)?;
    let mut scanner = Scanner::new(body);

    let mut roots = parse_key_list(&mut scanner, &RegString::new(), 0, options)?;
    if roots.len() != 1 {
        return Err(RegistryError::RootKeyCount(roots.len()));
    }
    if !scanner.is_empty() {
        return Err(RegistryError::TrailingData {
            remaining: scanner.remaining_units(),
        });
    }

    let root = roots.remove(0);
    root.validate(options.depth_limit())?;
    debug!(root = %root.name, keys = root.key_count(), values = root.value_count(), "Parsed registry file");
    Ok(root)
}

/// Parses `.reg` text, starting with the byte-order mark. See [`parse_units`].
pub fn parse_str(text: &str, options: &RegFileOptions) -> Result<RegistryKey> {
    let units: Vec<u16> = text.encode_utf16().collect();
    parse_units(&units, options)
}

/// Parses the raw UTF-16LE bytes of a `.reg` file.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidEncoding`] for an odd byte count,
/// otherwise as [`parse_units`].
pub fn parse_bytes(data: &[u8], options: &RegFileOptions) -> Result<RegistryKey> {
    let units = units_from_utf16le(data).ok_or_else(|| {
        RegistryError::InvalidEncoding(format!("odd length of {} bytes in registry file", data.len()))
    })?;
    parse_units(&units, options)
}

/// Renders a key tree as `.reg` text in UTF-16 code units, preamble
/// included.
///
/// # Errors
///
/// Fails if the tree does not pass [`RegistryKey::validate`].
pub fn render_units(root: &RegistryKey, options: &RegFileOptions) -> Result<RegString> {
    root.validate(options.depth_limit())?;
    let mut out = RegString::from(PREAMBLE);
    render_key(&mut out, root, options);
    Ok(out)
}

/// Renders a key tree as a Rust string.
///
/// # Errors
///
/// As [`render_units`], plus [`RegistryError::InvalidEncoding`] when a name
/// or string holds an unpaired surrogate. [`render_bytes`] has no such
/// restriction.
pub fn render_string(root: &RegistryKey, options: &RegFileOptions) -> Result<String> {
    render_units(root, options)?.to_string_checked().ok_or_else(|| {
        RegistryError::InvalidEncoding(format!("unpaired surrogate below {}", root.name))
    })
}

/// Renders a key tree as the UTF-16LE bytes of a `.reg` file.
pub fn render_bytes(root: &RegistryKey, options: &RegFileOptions) -> Result<Vec<u8>> {
    Ok(render_units(root, options)?.to_utf16le())
}

/// Reads and parses a `.reg` file.
#[instrument(skip(path, options), fields(path = %path.as_ref().display()))]
pub fn read_file<P: AsRef<Path>>(path: P, options: &RegFileOptions) -> Result<RegistryKey> {
    info!("Reading registry file");
    let data = fs::read(path.as_ref())?;
    debug!(size = data.len(), "Registry file loaded");
    parse_bytes(&data, options)
}

/// Renders a key tree and writes it to a `.reg` file.
///
/// Nothing is written if the tree is invalid.
#[instrument(skip(path, root, options), fields(path = %path.as_ref().display()))]
pub fn write_file<P: AsRef<Path>>(path: P, root: &RegistryKey, options: &RegFileOptions) -> Result<()> {
    let data = render_bytes(root, options)?;
    info!(size = data.len(), "Writing registry file");
    let mut file = File::create(path.as_ref())?;
    file.write_all(&data)?;
    file.flush()?;
    Ok(())
}
