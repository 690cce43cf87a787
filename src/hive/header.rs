//! Hive base block parsing.
//!
//! The base block is the first 4096 bytes of a hive file. It identifies the
//! file, records its format version and points at the root key cell.

use crate::error::{RegistryError, Result};
use crate::utils::{calculate_checksum, read_u32_le};
use chrono::{DateTime, Utc};

/// Size of the base block in bytes.
pub const BASE_BLOCK_SIZE: usize = 4096;

/// Signature at the start of every hive file.
pub const REGF_SIGNATURE: &[u8; 4] = b"regf";

/// Offset of the XOR checksum covering the preceding 508 bytes.
pub const CHECKSUM_OFFSET: usize = 0x1FC;

const ROOT_CELL_OFFSET: usize = 0x24;

/// Hive base block.
#[derive(Debug, Clone)]
pub struct BaseBlock {
    /// Primary sequence number.
    pub primary_sequence: u32,

    /// Secondary sequence number. Differs from the primary one while a
    /// write is in progress.
    pub secondary_sequence: u32,

    /// Last written timestamp (Windows FILETIME).
    pub last_written: u64,

    /// Major format version, always 1.
    pub major_version: u32,

    /// Minor format version, 3 through 6.
    pub minor_version: u32,

    /// Offset of the root key cell, relative to the first hive bin.
    pub root_cell_offset: u32,

    /// Length of the hive bins in bytes.
    pub hive_length: u32,
}

impl BaseBlock {
    /// Parses and checks a base block.
    ///
    /// # Errors
    ///
    /// Returns an error if the data is shorter than a base block, or the
    /// signature, checksum or version is wrong.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < BASE_BLOCK_SIZE {
            return Err(RegistryError::HiveTooSmall {
                size: data.len(),
                minimum: BASE_BLOCK_SIZE,
            });
        }

        if &data[0..4] != REGF_SIGNATURE {
            return Err(RegistryError::invalid_signature(REGF_SIGNATURE, &data[0..4]));
        }

        let checksum = read_u32_le(data, CHECKSUM_OFFSET)?;
        let calculated = calculate_checksum(data);
        if checksum != calculated {
            return Err(RegistryError::ChecksumMismatch {
                expected: checksum,
                calculated,
            });
        }

        let major_version = read_u32_le(data, 0x14)?;
        let minor_version = read_u32_le(data, 0x18)?;
        if major_version != 1 || !(3..=6).contains(&minor_version) {
            return Err(RegistryError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        Ok(BaseBlock {
            primary_sequence: read_u32_le(data, 0x04)?,
            secondary_sequence: read_u32_le(data, 0x08)?,
            last_written: u64::from(read_u32_le(data, 0x0C)?) | (u64::from(read_u32_le(data, 0x10)?) << 32),
            major_version,
            minor_version,
            root_cell_offset: read_u32_le(data, ROOT_CELL_OFFSET)?,
            hive_length: read_u32_le(data, 0x28)?,
        })
    }

    /// Returns true when no write was interrupted.
    pub fn is_consistent(&self) -> bool {
        self.primary_sequence == self.secondary_sequence
    }

    /// Last written time, if the FILETIME is representable.
    pub fn last_written_datetime(&self) -> Option<DateTime<Utc>> {
        // FILETIME counts 100 ns intervals since 1601-01-01.
        const FILETIME_UNIX_DIFF: i64 = 11_644_473_600;

        let seconds = (self.last_written / 10_000_000) as i64 - FILETIME_UNIX_DIFF;
        let nanos = ((self.last_written % 10_000_000) * 100) as u32;
        DateTime::from_timestamp(seconds, nanos)
    }
}
