//! Group Policy registry files (`.pol`, `PReg` format).
//!
//! A policy file is a flat list of entries, each carrying the full path of
//! its key:
//!
//! ```text
//! "PReg" | version: u32 = 1
//! [ key\0 ; name\0 ; type: u32 ; size: u32 ; data ]
//! [ key\0 ; name\0 ; type: u32 ; size: u32 ; data ]
//! ...
//! ```
//!
//! Strings and the `[`, `;` and `]` delimiters are UTF-16LE code units. An
//! entry with an empty value name, type 0 and no data only declares its key.

use crate::error::{RegistryError, Result};
use crate::model::{names_equal, RegistryKey, RegistryValue, ValueType, PATH_SEPARATOR};
use crate::regfile::DEFAULT_MAX_DEPTH;
use crate::text::RegString;
use crate::utils::read_u32_le;
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, instrument, trace};

/// Magic bytes at the start of every policy file.
pub const POL_SIGNATURE: &[u8; 4] = b"PReg";

/// The only policy file version.
pub const POL_VERSION: u32 = 1;

const HEADER_SIZE: usize = 8;
const ENTRY_OPEN: u16 = b'[' as u16;
const ENTRY_SEPARATOR: u16 = b';' as u16;
const ENTRY_CLOSE: u16 = b']' as u16;

/// One decoded `[key;name;type;size;data]` record.
#[derive(Debug)]
struct PolEntry {
    key_path: RegString,
    value: Option<RegistryValue>,
}

/// Cursor over the raw bytes of a policy file.
struct EntryReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EntryReader<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn unit(&mut self, expected: u16, what: &str) -> Result<()> {
        let found = self.u16_at(self.pos);
        if found != Some(expected) {
            return Err(RegistryError::invalid_policy(self.pos, format!("expected {}", what)));
        }
        self.pos += 2;
        Ok(())
    }

    fn u16_at(&self, pos: usize) -> Option<u16> {
        self.data
            .get(pos..pos + 2)
            .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Reads a null-terminated string followed by a separator.
    fn terminated_string(&mut self, what: &str) -> Result<RegString> {
        let start = self.pos;
        let mut end = start;
        loop {
            match (self.u16_at(end), self.u16_at(end + 2)) {
                (Some(0), Some(ENTRY_SEPARATOR)) => break,
                (Some(_), _) => end += 2,
                (None, _) => {
                    return Err(RegistryError::invalid_policy(start, format!("{} is not terminated", what)));
                }
            }
        }
        let text = RegString::from_utf16le(&self.data[start..end])
            .ok_or_else(|| RegistryError::invalid_policy(start, format!("{} has an odd length", what)))?;
        self.pos = end + 4;
        Ok(text)
    }

    fn u32_field(&mut self, what: &str) -> Result<u32> {
        let value = read_u32_le(self.data, self.pos)
            .map_err(|_| RegistryError::invalid_policy(self.pos, format!("truncated {}", what)))?;
        self.pos += 4;
        Ok(value)
    }

    fn entry(&mut self) -> Result<PolEntry> {
        let offset = self.pos;
        self.unit(ENTRY_OPEN, "opening bracket")?;
        let key_path = self.terminated_string("key name")?;
        let name = self.terminated_string("value name")?;
        let type_tag = self.u32_field("value type")?;
        self.unit(ENTRY_SEPARATOR, "separator after value type")?;
        let size = self.u32_field("value size")? as usize;
        self.unit(ENTRY_SEPARATOR, "separator after value size")?;

        let data = self
            .data
            .get(self.pos..self.pos.saturating_add(size))
            .ok_or_else(|| RegistryError::invalid_policy(self.pos, "end of file before end of value data"))?
            .to_vec();
        self.pos += size;
        self.unit(ENTRY_CLOSE, "closing bracket")?;

        trace!(offset, key = %key_path, value = %name, "Read policy entry");
        let value = if name.is_empty() && type_tag == 0 && data.is_empty() {
            None
        } else {
            Some(RegistryValue::new(name, ValueType::from_u32(type_tag), data))
        };
        Ok(PolEntry { key_path, value })
    }
}

/// Parses policy file bytes into a tree below a key named `root_name`.
///
/// Entry key paths are split on the path separator and merged into nested
/// keys, matching names case-insensitively and keeping first-seen order.
///
/// # Errors
///
/// Fails on a bad header, a malformed or truncated entry, or an empty key
/// path or path component.
pub fn parse_bytes(data: &[u8], root_name: &str) -> Result<RegistryKey> {
    if data.len() < HEADER_SIZE || &data[..4] != POL_SIGNATURE {
        let found = &data[..data.len().min(4)];
        return Err(RegistryError::invalid_signature(POL_SIGNATURE, found));
    }
    let version = read_u32_le(data, 4)?;
    if version != POL_VERSION {
        return Err(RegistryError::invalid_policy(4, format!("unsupported version {}", version)));
    }

    let mut root = RegistryKey::new(root_name);
    let mut reader = EntryReader { data, pos: HEADER_SIZE };
    let mut entries = 0usize;

    while !reader.is_empty() {
        let offset = reader.pos;
        let entry = reader.entry()?;
        let key = find_or_insert_path(&mut root, &entry.key_path)
            .ok_or_else(|| RegistryError::invalid_policy(offset, "empty key name"))?;
        if let Some(value) = entry.value {
            key.values.push(value);
        }
        entries += 1;
    }

    debug!(entries, keys = root.key_count(), "Parsed policy file");
    Ok(root)
}

/// Walks `path` down from `root`, creating missing keys.
///
/// Returns `None` for an empty path or an empty component.
fn find_or_insert_path<'k>(root: &'k mut RegistryKey, path: &RegString) -> Option<&'k mut RegistryKey> {
    if path.is_empty() {
        return None;
    }
    let mut key = root;
    for component in path.split(PATH_SEPARATOR) {
        if component.is_empty() {
            return None;
        }
        let index = match key.subkeys.iter().position(|k| names_equal(&k.name, &component)) {
            Some(index) => index,
            None => {
                key.subkeys.push(RegistryKey::new(component));
                key.subkeys.len() - 1
            }
        };
        key = &mut key.subkeys[index];
    }
    Some(key)
}

/// Renders a tree as policy file bytes.
///
/// The root key itself is not written; every descendant is written in
/// pre-order with its path relative to the root, and keys without values
/// get a key-only entry.
///
/// # Errors
///
/// Fails if the tree is invalid, nests deeper than `max_depth` (capped at
/// [`DEFAULT_MAX_DEPTH`]) or a value holds more than `u32::MAX` bytes.
pub fn render_bytes(root: &RegistryKey, max_depth: usize) -> Result<Vec<u8>> {
    root.validate(max_depth.min(DEFAULT_MAX_DEPTH))?;

    let mut out = Vec::new();
    out.extend_from_slice(POL_SIGNATURE);
    out.write_u32::<LittleEndian>(POL_VERSION)?;

    let mut pending: Vec<(&RegistryKey, RegString)> = root
        .subkeys
        .iter()
        .rev()
        .map(|k| (k, k.name.clone()))
        .collect();

    while let Some((key, path)) = pending.pop() {
        if key.values.is_empty() {
            write_entry(&mut out, &path, &RegString::new(), 0, &[])?;
        }
        for value in &key.values {
            write_entry(&mut out, &path, &value.name, value.value_type.as_u32(), &value.data)?;
        }
        for subkey in key.subkeys.iter().rev() {
            pending.push((subkey, path.join(PATH_SEPARATOR, &subkey.name)));
        }
    }

    Ok(out)
}

fn write_entry(
    out: &mut Vec<u8>,
    key_path: &RegString,
    name: &RegString,
    type_tag: u32,
    data: &[u8],
) -> Result<()> {
    let size = u32::try_from(data.len()).map_err(|_| {
        RegistryError::invalid_tree(key_path, format!("value {} is too large for a policy file", name))
    })?;

    out.write_u16::<LittleEndian>(ENTRY_OPEN)?;
    out.extend(key_path.to_utf16le());
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(ENTRY_SEPARATOR)?;
    out.extend(name.to_utf16le());
    out.write_u16::<LittleEndian>(0)?;
    out.write_u16::<LittleEndian>(ENTRY_SEPARATOR)?;
    out.write_u32::<LittleEndian>(type_tag)?;
    out.write_u16::<LittleEndian>(ENTRY_SEPARATOR)?;
    out.write_u32::<LittleEndian>(size)?;
    out.write_u16::<LittleEndian>(ENTRY_SEPARATOR)?;
    out.extend_from_slice(data);
    out.write_u16::<LittleEndian>(ENTRY_CLOSE)?;
    Ok(())
}

/// Reads and parses a policy file.
#[instrument(skip(path), fields(path = %path.as_ref().display()))]
pub fn read_file<P: AsRef<Path>>(path: P, root_name: &str) -> Result<RegistryKey> {
    info!("Reading policy file");
    let data = fs::read(path.as_ref())?;
    parse_bytes(&data, root_name)
}

/// Renders a tree and writes it to a policy file.
#[instrument(skip(path, root), fields(path = %path.as_ref().display()))]
pub fn write_file<P: AsRef<Path>>(path: P, root: &RegistryKey, max_depth: usize) -> Result<()> {
    let data = render_bytes(root, max_depth)?;
    info!(size = data.len(), "Writing policy file");
    let mut file = File::create(path.as_ref())?;
    file.write_all(&data)?;
    file.flush()?;
    Ok(())
}
