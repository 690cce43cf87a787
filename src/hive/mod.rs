//! Read-only access to binary registry hives (`regf` files).
//!
//! The reader validates the base block, then walks key nodes from the root
//! cell and materializes them as a [`RegistryKey`] tree.
//!
//! ```text
//! [Base Block - 4KB]   "regf", versions, root cell offset, checksum
//! [Hive Bins]          "hbin" blocks of cells; cell offsets are relative
//!                      to the first bin, cell sizes are negative when allocated
//!   nk  key node       -> subkey list (li/lf/lh/ri), value list
//!   vk  value key      -> data cell, inline data or db record
//!   db  big data       -> list of segments of up to 16344 bytes
//! ```

pub mod cells;
pub mod header;

use crate::error::{RegistryError, Result};
use crate::model::{RegistryKey, RegistryValue, PATH_SEPARATOR};
use crate::regfile::DEFAULT_MAX_DEPTH;
use crate::text::RegString;
use crate::utils::{cell_offset_to_absolute, read_u32_le};
use cells::{cell_size, BigDataBlock, KeyNode, SubkeyList, ValueKey, MAX_DIRECT_DATA_SIZE};
use header::{BaseBlock, BASE_BLOCK_SIZE};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use tracing::{debug, info, instrument, trace, warn};

/// Nesting allowed for `ri` lists pointing at further lists.
const MAX_INDEX_ROOT_DEPTH: usize = 8;

/// Hive contents, either mapped from a file or owned.
#[derive(Debug)]
enum HiveData {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl HiveData {
    fn as_slice(&self) -> &[u8] {
        match self {
            HiveData::Mapped(mmap) => mmap,
            HiveData::Owned(data) => data,
        }
    }
}

/// A parsed registry hive.
#[derive(Debug)]
pub struct Hive {
    data: HiveData,
    base_block: BaseBlock,
}

impl Hive {
    /// Opens and memory-maps a hive file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or mapped, or its base
    /// block is invalid.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        info!("Opening registry hive");
        let file = File::open(path.as_ref())?;

        let file_size = file.metadata()?.len() as usize;
        if file_size < BASE_BLOCK_SIZE {
            return Err(RegistryError::HiveTooSmall {
                size: file_size,
                minimum: BASE_BLOCK_SIZE,
            });
        }

        // SAFETY: the file is opened read-only and every access to the map
        // goes through bounds-checked slicing.
        let mmap = unsafe { Mmap::map(&file)? };
        debug!(size = mmap.len(), "Memory mapped hive file");
        Self::from_data(HiveData::Mapped(mmap))
    }

    /// Creates a hive from bytes already in memory.
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::from_data(HiveData::Owned(data))
    }

    fn from_data(data: HiveData) -> Result<Self> {
        let base_block = BaseBlock::parse(data.as_slice())?;
        if !base_block.is_consistent() {
            warn!(
                primary = base_block.primary_sequence,
                secondary = base_block.secondary_sequence,
                "Hive sequence numbers differ; the last write may be incomplete"
            );
        }
        if let Some(written) = base_block.last_written_datetime() {
            debug!(last_written = %written, "Hive base block validated");
        }
        Ok(Self { data, base_block })
    }

    /// The hive's base block.
    pub fn base_block(&self) -> &BaseBlock {
        &self.base_block
    }

    /// Reads the whole hive into a tree whose root is named `root_name`.
    ///
    /// Key and value names are kept as stored; an unnamed value becomes the
    /// default value.
    ///
    /// # Errors
    ///
    /// Fails on any malformed cell or when keys nest deeper than `max_depth`,
    /// which is capped at [`DEFAULT_MAX_DEPTH`].
    #[instrument(skip(self))]
    pub fn to_tree(&self, root_name: &str, max_depth: usize) -> Result<RegistryKey> {
        let max_depth = max_depth.min(DEFAULT_MAX_DEPTH);
        let root_offset = self.base_block.root_cell_offset;
        let root = self.read_key(root_offset, Some(root_name.into()), None, 0, max_depth)?;
        info!(keys = root.key_count(), values = root.value_count(), "Hive read");
        Ok(root)
    }

    /// Reads the key node at `offset` and everything below it.
    ///
    /// `name` replaces the stored name, which is only wanted for the root.
    fn read_key(
        &self,
        offset: u32,
        name: Option<RegString>,
        parent_path: Option<&RegString>,
        depth: usize,
        max_depth: usize,
    ) -> Result<RegistryKey> {
        let node = KeyNode::parse(self.read_cell(offset)?, offset)?;
        let name = name.unwrap_or(node.name);
        let path = match parent_path {
            Some(parent) => parent.join(PATH_SEPARATOR, &name),
            None => name.clone(),
        };

        if depth > max_depth {
            return Err(RegistryError::DepthLimitExceeded {
                path: path.to_string(),
                limit: max_depth,
            });
        }
        trace!(offset = %format!("{:#x}", offset), path = %path, "Reading key node");

        let mut key = RegistryKey::new(name);

        if node.value_count > 0 {
            let list = self.read_cell(node.value_list_offset)?;
            for i in 0..node.value_count as usize {
                let value_offset = read_u32_le(list, i * 4)?;
                key.values.push(self.read_value(value_offset)?);
            }
        }

        if node.subkey_count > 0 {
            let mut offsets = Vec::with_capacity(node.subkey_count as usize);
            self.collect_subkeys(node.subkey_list_offset, 0, &mut offsets)?;
            for child_offset in offsets {
                key.subkeys
                    .push(self.read_key(child_offset, None, Some(&path), depth + 1, max_depth)?);
            }
        }

        Ok(key)
    }

    fn collect_subkeys(&self, list_offset: u32, depth: usize, offsets: &mut Vec<u32>) -> Result<()> {
        match SubkeyList::parse(self.read_cell(list_offset)?, list_offset)? {
            SubkeyList::Leaf(leaf) => offsets.extend(leaf),
            SubkeyList::IndexRoot(lists) => {
                if depth >= MAX_INDEX_ROOT_DEPTH {
                    return Err(RegistryError::InvalidFormat(format!(
                        "Index root lists nested too deeply at offset {:#x}",
                        list_offset
                    )));
                }
                for sublist in lists {
                    self.collect_subkeys(sublist, depth + 1, offsets)?;
                }
            }
        }
        Ok(())
    }

    fn read_value(&self, offset: u32) -> Result<RegistryValue> {
        let vk = ValueKey::parse(self.read_cell(offset)?, offset)?;
        let size = vk.data_size as usize;

        let data = if vk.inline {
            vk.inline_data()
        } else if size == 0 {
            Vec::new()
        } else if size > MAX_DIRECT_DATA_SIZE && self.is_big_data(vk.data_offset) {
            self.read_big_data(vk.data_offset, size)?
        } else {
            let cell = self.read_cell(vk.data_offset)?;
            if cell.len() < size {
                return Err(RegistryError::TruncatedData {
                    offset: vk.data_offset,
                    expected: size,
                    actual: cell.len(),
                });
            }
            cell[..size].to_vec()
        };

        Ok(RegistryValue::new(vk.name, vk.value_type, data))
    }

    fn is_big_data(&self, offset: u32) -> bool {
        self.read_cell(offset)
            .map(|cell| cell.starts_with(b"db"))
            .unwrap_or(false)
    }

    fn read_big_data(&self, offset: u32, size: usize) -> Result<Vec<u8>> {
        let db = BigDataBlock::parse(self.read_cell(offset)?, offset)?;
        debug!(offset = %format!("{:#x}", offset), segments = db.segment_count, size, "Reading big data");

        let list = self.read_cell(db.segment_list_offset)?;
        let mut data = Vec::with_capacity(size);
        for i in 0..db.segment_count as usize {
            if data.len() >= size {
                break;
            }
            let segment_offset = read_u32_le(list, i * 4)?;
            let segment = self.read_cell(segment_offset)?;
            let take = MAX_DIRECT_DATA_SIZE.min(size - data.len()).min(segment.len());
            data.extend_from_slice(&segment[..take]);
        }

        if data.len() < size {
            return Err(RegistryError::TruncatedData {
                offset,
                expected: size,
                actual: data.len(),
            });
        }
        Ok(data)
    }

    /// Returns the payload of the cell at `offset`, without its size field.
    fn read_cell(&self, offset: u32) -> Result<&[u8]> {
        let hive = self.data.as_slice();
        let abs = cell_offset_to_absolute(offset)? as usize;
        if abs + 4 > hive.len() {
            return Err(RegistryError::invalid_offset(offset, hive.len()));
        }

        let len = cell_size(hive, abs, offset)?;
        let end = abs + len;
        if end > hive.len() {
            return Err(RegistryError::TruncatedData {
                offset,
                expected: len,
                actual: hive.len() - abs,
            });
        }
        Ok(&hive[abs + 4..end])
    }
}

/// Opens a hive file and reads it into a tree rooted at `root_name`.
pub fn read_file<P: AsRef<Path>>(path: P, root_name: &str, max_depth: usize) -> Result<RegistryKey> {
    Hive::open(path)?.to_tree(root_name, max_depth)
}
