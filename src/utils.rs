//! Utility functions for binary parsing and UTF-16 conversion.

use crate::error::{RegistryError, Result};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use encoding_rs::UTF_16LE;

/// Offset where hive bins start (after base block)
pub const HBIN_START_OFFSET: u32 = 0x1000;

/// Decodes UTF-16LE bytes exactly: no byte-order-mark sniffing, no
/// replacement characters and no trimming of null code units.
///
/// Returns `None` for an odd byte count or unpaired surrogates.
pub fn decode_utf16le(data: &[u8]) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }
    UTF_16LE
        .decode_without_bom_handling_and_without_replacement(data)
        .map(|text| text.into_owned())
}

/// Splits UTF-16LE bytes into code units without checking that they form
/// valid UTF-16. Returns `None` for an odd byte count.
pub fn units_from_utf16le(data: &[u8]) -> Option<Vec<u16>> {
    if data.len() % 2 != 0 {
        return None;
    }
    let mut units = vec![0u16; data.len() / 2];
    LittleEndian::read_u16_into(data, &mut units);
    Some(units)
}

/// Joins code units into UTF-16LE bytes.
pub fn units_to_utf16le(units: &[u16]) -> Vec<u8> {
    let mut data = vec![0u8; units.len() * 2];
    LittleEndian::write_u16_into(units, &mut data);
    data
}

/// Encodes text as UTF-16LE bytes without terminator.
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        // Writing into a Vec cannot fail.
        let _ = out.write_u16::<LittleEndian>(unit);
    }
    out
}

/// Returns `len` bytes at `offset`, or a truncation error naming how many
/// bytes were actually there.
fn field(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset.saturating_add(len)).ok_or(RegistryError::TruncatedData {
        offset: offset as u32,
        expected: len,
        actual: data.len().saturating_sub(offset),
    })
}

/// Reads a little-endian u32 at `offset`.
pub fn read_u32_le(data: &[u8], offset: usize) -> Result<u32> {
    field(data, offset, 4).map(LittleEndian::read_u32)
}

/// Reads a little-endian u16 at `offset`.
pub fn read_u16_le(data: &[u8], offset: usize) -> Result<u16> {
    field(data, offset, 2).map(LittleEndian::read_u16)
}

/// Reads a little-endian i32 at `offset`; cell sizes are signed.
pub fn read_i32_le(data: &[u8], offset: usize) -> Result<i32> {
    field(data, offset, 4).map(LittleEndian::read_i32)
}

/// Calculates XOR checksum for the first 508 bytes of the base block.
pub fn calculate_checksum(data: &[u8]) -> u32 {
    (0..0x1FC)
        .step_by(4)
        .filter_map(|i| read_u32_le(data, i).ok())
        .fold(0, |checksum, dword| checksum ^ dword)
}

/// Converts a relative cell offset to an absolute hive offset.
///
/// Cell offsets in the registry are relative to the first hbin (at 0x1000).
///
/// # Errors
///
/// Returns `RegistryError::InvalidOffset` if the offset would overflow.
#[inline]
pub fn cell_offset_to_absolute(cell_offset: u32) -> Result<u32> {
    cell_offset
        .checked_add(HBIN_START_OFFSET)
        .ok_or(RegistryError::InvalidOffset {
            offset: cell_offset,
            hive_size: 0,
        })
}
