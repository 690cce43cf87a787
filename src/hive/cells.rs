//! Hive cell records: key nodes, value keys, subkey lists and big data.
//!
//! Every parser takes the cell payload (without the 4-byte size field) and
//! the cell offset, which is only used in error messages.

use crate::error::{RegistryError, Result};
use crate::model::ValueType;
use crate::text::RegString;
use crate::utils::{read_i32_le, read_u16_le, read_u32_le};

/// Largest value stored in a single data cell; bigger values use a `db` record.
pub const MAX_DIRECT_DATA_SIZE: usize = 16344;

/// Key node flag: the name is stored as Latin-1 rather than UTF-16LE.
pub const KEY_COMP_NAME: u16 = 0x0020;

/// Value key flag: the name is stored as Latin-1 rather than UTF-16LE.
pub const VALUE_COMP_NAME: u16 = 0x0001;

/// High bit of a value's data size: the data lives in the offset field.
pub const DATA_INLINE: u32 = 0x8000_0000;

const KEY_NODE_MIN_SIZE: usize = 0x4C;
const KEY_NAME_OFFSET: usize = 0x4C;
const VALUE_KEY_MIN_SIZE: usize = 0x14;
const VALUE_NAME_OFFSET: usize = 0x14;

fn check_signature(data: &[u8], expected: &[u8; 2], offset: u32) -> Result<()> {
    if data.len() < 2 || &data[0..2] != expected {
        return Err(RegistryError::InvalidFormat(format!(
            "Expected '{}' signature at offset {:#x}",
            String::from_utf8_lossy(expected),
            offset
        )));
    }
    Ok(())
}

fn require_len(data: &[u8], expected: usize, offset: u32) -> Result<()> {
    if data.len() < expected {
        return Err(RegistryError::TruncatedData {
            offset,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// Names are kept as raw code units; an unpaired surrogate is legal.
fn read_name(data: &[u8], start: usize, len: usize, compressed: bool, offset: u32) -> Result<RegString> {
    require_len(data, start + len, offset)?;
    let bytes = &data[start..start + len];
    if compressed {
        return Ok(RegString::from_latin1(bytes));
    }
    RegString::from_utf16le(bytes).ok_or_else(|| {
        RegistryError::InvalidFormat(format!("Odd name length {} in cell at offset {:#x}", len, offset))
    })
}

/// Key node (`nk`), reduced to the fields needed to walk the tree.
#[derive(Debug, Clone)]
pub struct KeyNode {
    /// Key flags.
    pub flags: u16,
    /// Number of stable subkeys.
    pub subkey_count: u32,
    /// Offset of the stable subkey list.
    pub subkey_list_offset: u32,
    /// Number of values.
    pub value_count: u32,
    /// Offset of the value list.
    pub value_list_offset: u32,
    /// Key name.
    pub name: RegString,
}

impl KeyNode {
    /// Parses a key node cell.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        require_len(data, KEY_NODE_MIN_SIZE, offset)?;
        check_signature(data, b"nk", offset)?;

        let flags = read_u16_le(data, 0x02)?;
        let name_length = read_u16_le(data, 0x48)? as usize;
        let name = read_name(data, KEY_NAME_OFFSET, name_length, flags & KEY_COMP_NAME != 0, offset)?;

        Ok(KeyNode {
            flags,
            subkey_count: read_u32_le(data, 0x14)?,
            subkey_list_offset: read_u32_le(data, 0x1C)?,
            value_count: read_u32_le(data, 0x24)?,
            value_list_offset: read_u32_le(data, 0x28)?,
            name,
        })
    }
}

/// Value key (`vk`).
#[derive(Debug, Clone)]
pub struct ValueKey {
    /// Value name; empty for the default value.
    pub name: RegString,
    /// Data size with the inline flag removed.
    pub data_size: u32,
    /// Whether the data is held in `data_offset` itself.
    pub inline: bool,
    /// Offset of the data cell, or the data itself when inline.
    pub data_offset: u32,
    /// Value type tag.
    pub value_type: ValueType,
}

impl ValueKey {
    /// Parses a value key cell.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        require_len(data, VALUE_KEY_MIN_SIZE, offset)?;
        check_signature(data, b"vk", offset)?;

        let name_length = read_u16_le(data, 0x02)? as usize;
        let raw_size = read_u32_le(data, 0x04)?;
        let flags = read_u16_le(data, 0x10)?;
        let name = read_name(data, VALUE_NAME_OFFSET, name_length, flags & VALUE_COMP_NAME != 0, offset)?;

        Ok(ValueKey {
            name,
            data_size: raw_size & !DATA_INLINE,
            inline: raw_size & DATA_INLINE != 0,
            data_offset: read_u32_le(data, 0x08)?,
            value_type: ValueType::from_u32(read_u32_le(data, 0x0C)?),
        })
    }

    /// Inline data, at most four bytes.
    pub fn inline_data(&self) -> Vec<u8> {
        let len = (self.data_size as usize).min(4);
        self.data_offset.to_le_bytes()[..len].to_vec()
    }
}

/// Subkey list (`li`, `lf`, `lh` or `ri`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubkeyList {
    /// Offsets of key nodes (`li`, and `lf`/`lh` with their hints dropped).
    Leaf(Vec<u32>),
    /// Offsets of further subkey lists (`ri`).
    IndexRoot(Vec<u32>),
}

impl SubkeyList {
    /// Parses a subkey list cell.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        require_len(data, 4, offset)?;
        let count = read_u16_le(data, 0x02)? as usize;

        let stride = match &data[0..2] {
            b"li" | b"ri" => 4,
            b"lf" | b"lh" => 8,
            _ => {
                return Err(RegistryError::InvalidSubkeyList {
                    list_type: [data[0], data[1]],
                })
            }
        };
        require_len(data, 4 + count * stride, offset)?;

        let offsets = (0..count)
            .map(|i| read_u32_le(data, 4 + i * stride))
            .collect::<Result<Vec<_>>>()?;

        if &data[0..2] == b"ri" {
            Ok(SubkeyList::IndexRoot(offsets))
        } else {
            Ok(SubkeyList::Leaf(offsets))
        }
    }
}

/// Big data record (`db`) describing a value split across segments.
#[derive(Debug, Clone)]
pub struct BigDataBlock {
    /// Number of data segments.
    pub segment_count: u16,
    /// Offset of the cell listing the segment offsets.
    pub segment_list_offset: u32,
}

impl BigDataBlock {
    /// Parses a big data cell.
    pub fn parse(data: &[u8], offset: u32) -> Result<Self> {
        require_len(data, 8, offset)?;
        check_signature(data, b"db", offset)?;
        Ok(BigDataBlock {
            segment_count: read_u16_le(data, 0x02)?,
            segment_list_offset: read_u32_le(data, 0x04)?,
        })
    }
}

/// Reads the size field of the cell at absolute offset `abs`.
///
/// Allocated cells store their size negated.
pub fn cell_size(hive: &[u8], abs: usize, offset: u32) -> Result<usize> {
    let size = read_i32_le(hive, abs).map_err(|_| RegistryError::invalid_offset(offset, hive.len()))?;
    if size >= 0 {
        return Err(RegistryError::InvalidFormat(format!(
            "Cell at offset {:#x} is not allocated",
            offset
        )));
    }
    let len = size.unsigned_abs() as usize;
    if len < 4 {
        return Err(RegistryError::invalid_cell_size(size, offset));
    }
    Ok(len)
}
