//! In-memory registry tree shared by every input and output format.
//!
//! A tree is built in one pass by a reader (`.reg`, `.pol`, hive) and then
//! handed, unchanged, to a writer. Keys and values keep document order.

use crate::error::{RegistryError, Result};
use crate::text::RegString;
use crate::utils::encode_utf16le;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Component separator in registry key paths.
pub const PATH_SEPARATOR: char = '\\';

/// Registry value data types.
///
/// Tags 0 through 11 have named variants; every other tag is carried as
/// [`ValueType::Unknown`]. Use [`ValueType::from_u32`] to build values from
/// raw tags so that known tags always map to their named variant.
///
/// Equality and hashing go by the raw tag, so `Unknown(4)` equals `Dword`.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueType {
    /// No value type.
    None,

    /// String (null-terminated).
    String,

    /// String with environment variables.
    ExpandString,

    /// Binary data.
    Binary,

    /// 32-bit little-endian integer.
    Dword,

    /// 32-bit big-endian integer.
    DwordBigEndian,

    /// Symbolic link (Unicode).
    Link,

    /// Multiple strings.
    MultiString,

    /// Resource list.
    ResourceList,

    /// Full resource descriptor.
    FullResourceDescriptor,

    /// Resource requirements list.
    ResourceRequirementsList,

    /// 64-bit little-endian integer.
    Qword,

    /// Any other type tag.
    Unknown(u32),
}

impl ValueType {
    /// Maps a raw type tag to a value type.
    pub fn from_u32(value: u32) -> Self {
        match value {
            0 => ValueType::None,
            1 => ValueType::String,
            2 => ValueType::ExpandString,
            3 => ValueType::Binary,
            4 => ValueType::Dword,
            5 => ValueType::DwordBigEndian,
            6 => ValueType::Link,
            7 => ValueType::MultiString,
            8 => ValueType::ResourceList,
            9 => ValueType::FullResourceDescriptor,
            10 => ValueType::ResourceRequirementsList,
            11 => ValueType::Qword,
            _ => ValueType::Unknown(value),
        }
    }

    /// Returns the raw type tag.
    pub fn as_u32(self) -> u32 {
        match self {
            ValueType::None => 0,
            ValueType::String => 1,
            ValueType::ExpandString => 2,
            ValueType::Binary => 3,
            ValueType::Dword => 4,
            ValueType::DwordBigEndian => 5,
            ValueType::Link => 6,
            ValueType::MultiString => 7,
            ValueType::ResourceList => 8,
            ValueType::FullResourceDescriptor => 9,
            ValueType::ResourceRequirementsList => 10,
            ValueType::Qword => 11,
            ValueType::Unknown(value) => value,
        }
    }

    /// Returns the name of this value type.
    pub fn name(&self) -> String {
        match self {
            ValueType::None => "REG_NONE".to_string(),
            ValueType::String => "REG_SZ".to_string(),
            ValueType::ExpandString => "REG_EXPAND_SZ".to_string(),
            ValueType::Binary => "REG_BINARY".to_string(),
            ValueType::Dword => "REG_DWORD".to_string(),
            ValueType::DwordBigEndian => "REG_DWORD_BIG_ENDIAN".to_string(),
            ValueType::Link => "REG_LINK".to_string(),
            ValueType::MultiString => "REG_MULTI_SZ".to_string(),
            ValueType::ResourceList => "REG_RESOURCE_LIST".to_string(),
            ValueType::FullResourceDescriptor => "REG_FULL_RESOURCE_DESCRIPTOR".to_string(),
            ValueType::ResourceRequirementsList => "REG_RESOURCE_REQUIREMENTS_LIST".to_string(),
            ValueType::Qword => "REG_QWORD".to_string(),
            ValueType::Unknown(value) => format!("REG_UNKNOWN_{:#010x}", value),
        }
    }
}

impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.as_u32() == other.as_u32()
    }
}

impl Eq for ValueType {}

impl Hash for ValueType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_u32().hash(state);
    }
}

impl From<u32> for ValueType {
    fn from(value: u32) -> Self {
        ValueType::from_u32(value)
    }
}

impl From<ValueType> for u32 {
    fn from(value: ValueType) -> Self {
        value.as_u32()
    }
}

/// A named, typed registry value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryValue {
    /// Value name. Empty for the key's default value.
    pub name: RegString,

    /// Interpretation of `data`.
    pub value_type: ValueType,

    /// Raw value bytes.
    pub data: Vec<u8>,
}

impl RegistryValue {
    /// Creates a value from its raw parts.
    pub fn new(name: impl Into<RegString>, value_type: ValueType, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            value_type,
            data,
        }
    }

    /// Creates a REG_SZ value holding `text` plus its null terminator.
    pub fn string(name: impl Into<RegString>, text: &str) -> Self {
        Self::new(name, ValueType::String, terminated_utf16(text))
    }

    /// Creates a REG_EXPAND_SZ value holding `text` plus its null terminator.
    pub fn expand_string(name: impl Into<RegString>, text: &str) -> Self {
        Self::new(name, ValueType::ExpandString, terminated_utf16(text))
    }

    /// Creates a REG_MULTI_SZ value: each string null-terminated, followed
    /// by the list terminator.
    pub fn multi_string<I, S>(name: impl Into<RegString>, strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut data = Vec::new();
        for s in strings {
            data.extend(terminated_utf16(s.as_ref()));
        }
        data.extend([0, 0]);
        Self::new(name, ValueType::MultiString, data)
    }

    /// Creates a REG_DWORD value.
    pub fn dword(name: impl Into<RegString>, value: u32) -> Self {
        Self::new(name, ValueType::Dword, value.to_le_bytes().to_vec())
    }

    /// Creates a REG_QWORD value.
    pub fn qword(name: impl Into<RegString>, value: u64) -> Self {
        Self::new(name, ValueType::Qword, value.to_le_bytes().to_vec())
    }

    /// Creates a REG_BINARY value.
    pub fn binary(name: impl Into<RegString>, data: Vec<u8>) -> Self {
        Self::new(name, ValueType::Binary, data)
    }

    /// Returns true for the key's unnamed default value.
    pub fn is_default(&self) -> bool {
        self.name.is_empty()
    }
}

fn terminated_utf16(text: &str) -> Vec<u8> {
    let mut data = encode_utf16le(text);
    data.extend([0, 0]);
    data
}

/// A registry key with its subkeys and values, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistryKey {
    /// Key name. The root may carry a multi-component path; other keys
    /// never contain [`PATH_SEPARATOR`].
    pub name: RegString,

    /// Child keys.
    pub subkeys: Vec<RegistryKey>,

    /// Values of this key.
    pub values: Vec<RegistryValue>,
}

impl RegistryKey {
    /// Creates an empty key.
    pub fn new(name: impl Into<RegString>) -> Self {
        Self {
            name: name.into(),
            subkeys: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Appends a value, builder style.
    pub fn with_value(mut self, value: RegistryValue) -> Self {
        self.values.push(value);
        self
    }

    /// Appends a subkey, builder style.
    pub fn with_subkey(mut self, subkey: RegistryKey) -> Self {
        self.subkeys.push(subkey);
        self
    }

    /// Finds a direct subkey by name, ignoring case.
    pub fn subkey(&self, name: impl Into<RegString>) -> Option<&RegistryKey> {
        let name = name.into();
        self.subkeys.iter().find(|k| names_equal(&k.name, &name))
    }

    /// Finds a value by name, ignoring case. An empty name finds the default value.
    pub fn value(&self, name: impl Into<RegString>) -> Option<&RegistryValue> {
        let name = name.into();
        self.values.iter().find(|v| names_equal(&v.name, &name))
    }

    /// Number of keys in this subtree, including this one.
    pub fn key_count(&self) -> usize {
        1 + self.subkeys.iter().map(RegistryKey::key_count).sum::<usize>()
    }

    /// Number of values in this subtree.
    pub fn value_count(&self) -> usize {
        self.values.len() + self.subkeys.iter().map(RegistryKey::value_count).sum::<usize>()
    }

    /// Checks the tree invariants every serialized form relies on.
    ///
    /// Treating `self` as the root, this verifies that:
    /// - every key name is non-empty,
    /// - no key below the root contains [`PATH_SEPARATOR`],
    /// - no key name contains `]` followed by a newline (it would end a `.reg` header early),
    /// - sibling key names and value names within a key are unique (ignoring case),
    /// - no key sits more than `max_depth` levels below the root.
    ///
    /// The walk uses an explicit stack, so arbitrarily deep trees are
    /// rejected without exhausting the call stack.
    pub fn validate(&self, max_depth: usize) -> Result<()> {
        let mut pending: Vec<(&RegistryKey, RegString, usize)> = vec![(self, self.name.clone(), 0)];

        while let Some((key, path, depth)) = pending.pop() {
            if key.name.is_empty() {
                return Err(RegistryError::invalid_tree(&path, "empty key name"));
            }
            if depth > 0 && key.name.contains_char(PATH_SEPARATOR) {
                return Err(RegistryError::invalid_tree(&path, "key name contains a path separator"));
            }
            if key.name.contains_str("]\n") {
                return Err(RegistryError::invalid_tree(
                    &path,
                    "key name contains a closing bracket followed by a newline",
                ));
            }
            if depth > max_depth {
                return Err(RegistryError::DepthLimitExceeded {
                    path: path.to_string(),
                    limit: max_depth,
                });
            }

            if let Some(name) = first_duplicate(key.values.iter().map(|v| &v.name)) {
                let shown = if name.is_empty() { String::from("@") } else { name.to_string() };
                return Err(RegistryError::invalid_tree(&path, format!("duplicate value name {}", shown)));
            }
            if let Some(name) = first_duplicate(key.subkeys.iter().map(|k| &k.name)) {
                return Err(RegistryError::invalid_tree(&path, format!("duplicate subkey name {}", name)));
            }

            for subkey in key.subkeys.iter().rev() {
                let child_path = path.join(PATH_SEPARATOR, &subkey.name);
                pending.push((subkey, child_path, depth + 1));
            }
        }

        Ok(())
    }
}

/// Compares key or value names the way the registry does: ignoring case.
pub fn names_equal(a: &RegString, b: &RegString) -> bool {
    a.eq_ignore_case(b)
}

fn first_duplicate<'a>(mut names: impl Iterator<Item = &'a RegString>) -> Option<&'a RegString> {
    let mut seen = HashSet::new();
    names.find(|name| !seen.insert(name.fold_case()))
}
