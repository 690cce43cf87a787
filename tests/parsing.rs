//! Unit-level checks of the public building blocks: type tags, constants,
//! format names and error helpers.

use reg_convert::hive::header::{BaseBlock, BASE_BLOCK_SIZE, CHECKSUM_OFFSET, REGF_SIGNATURE};
use reg_convert::polfile::{POL_SIGNATURE, POL_VERSION};
use reg_convert::regfile::{PREAMBLE, DEFAULT_MAX_DEPTH};
use reg_convert::utils::{calculate_checksum, cell_offset_to_absolute, decode_utf16le, encode_utf16le};
use reg_convert::*;

#[test]
fn test_constants() {
    assert_eq!(BASE_BLOCK_SIZE, 4096);
    assert_eq!(REGF_SIGNATURE, b"regf");
    assert_eq!(POL_SIGNATURE, b"PReg");
    assert_eq!(POL_VERSION, 1);
    assert!(PREAMBLE.starts_with('\u{feff}'));
    assert!(PREAMBLE.ends_with("5.00\r\n\r\n"));
    assert_eq!(DEFAULT_MAX_DEPTH, 512);
}

#[test]
fn test_value_type_conversion() {
    assert_eq!(ValueType::from_u32(0), ValueType::None);
    assert_eq!(ValueType::from_u32(1), ValueType::String);
    assert_eq!(ValueType::from_u32(3), ValueType::Binary);
    assert_eq!(ValueType::from_u32(4), ValueType::Dword);
    assert_eq!(ValueType::from_u32(7), ValueType::MultiString);
    assert_eq!(ValueType::from_u32(11), ValueType::Qword);
    assert_eq!(ValueType::from_u32(999), ValueType::Unknown(999));

    for tag in 0..=11 {
        assert_eq!(ValueType::from_u32(tag).as_u32(), tag);
    }
    assert_eq!(u32::from(ValueType::Unknown(0xFFFF_0011)), 0xFFFF_0011);
}

#[test]
fn test_value_type_names() {
    assert_eq!(ValueType::ExpandString.name(), "REG_EXPAND_SZ");
    assert_eq!(ValueType::DwordBigEndian.name(), "REG_DWORD_BIG_ENDIAN");
    assert_eq!(ValueType::Unknown(0x20).name(), "REG_UNKNOWN_0x00000020");
}

#[test]
fn test_value_constructors() {
    let value = RegistryValue::string("Name", "ab");
    assert_eq!(value.data, vec![0x61, 0, 0x62, 0, 0, 0]);

    let value = RegistryValue::multi_string("List", ["a", "b"]);
    assert_eq!(value.data, vec![0x61, 0, 0, 0, 0x62, 0, 0, 0, 0, 0]);

    let value = RegistryValue::qword("Big", 0x0102_0304_0506_0708);
    assert_eq!(value.data, vec![8, 7, 6, 5, 4, 3, 2, 1]);

    assert!(RegistryValue::dword("", 1).is_default());
}

#[test]
fn test_tree_lookup_ignores_case() {
    let root = RegistryKey::new("Root")
        .with_subkey(RegistryKey::new("Software").with_value(RegistryValue::dword("Level", 2)));

    let software = root.subkey("SOFTWARE").unwrap();
    assert_eq!(software.value("level").unwrap().data, vec![2, 0, 0, 0]);
    assert!(root.subkey("Hardware").is_none());
    assert_eq!(root.key_count(), 2);
    assert_eq!(root.value_count(), 1);
}

#[test]
fn test_tree_validation() {
    let ok = RegistryKey::new("HKEY_CURRENT_USER\\Software").with_subkey(RegistryKey::new("A"));
    assert!(ok.validate(DEFAULT_MAX_DEPTH).is_ok());

    let nested_separator = RegistryKey::new("Root").with_subkey(RegistryKey::new("A\\B"));
    assert!(matches!(
        nested_separator.validate(DEFAULT_MAX_DEPTH),
        Err(RegistryError::InvalidTree { .. })
    ));

    let duplicate = RegistryKey::new("Root")
        .with_value(RegistryValue::dword("x", 1))
        .with_value(RegistryValue::dword("X", 2));
    assert!(duplicate.validate(DEFAULT_MAX_DEPTH).is_err());

    let deep = RegistryKey::new("Root").with_subkey(RegistryKey::new("A").with_subkey(RegistryKey::new("B")));
    assert!(deep.validate(2).is_ok());
    assert!(matches!(
        deep.validate(1),
        Err(RegistryError::DepthLimitExceeded { limit: 1, .. })
    ));
}

#[test]
fn test_offset_conversion() {
    assert_eq!(cell_offset_to_absolute(0).unwrap(), 0x1000);
    assert_eq!(cell_offset_to_absolute(0x20).unwrap(), 0x1020);
    assert_eq!(cell_offset_to_absolute(0x1000).unwrap(), 0x2000);
    assert!(cell_offset_to_absolute(u32::MAX).is_err());
}

#[test]
fn test_utf16_helpers() {
    let encoded = encode_utf16le("Aé");
    assert_eq!(encoded, vec![0x41, 0x00, 0xe9, 0x00]);
    assert_eq!(decode_utf16le(&encoded).as_deref(), Some("Aé"));
    assert_eq!(decode_utf16le(&[0x41]), None);
}

#[test]
fn test_base_block_checksum() {
    let mut block = vec![0u8; BASE_BLOCK_SIZE];
    block[0..4].copy_from_slice(REGF_SIGNATURE);
    block[0x04..0x08].copy_from_slice(&7u32.to_le_bytes());
    block[0x08..0x0C].copy_from_slice(&7u32.to_le_bytes());
    block[0x14..0x18].copy_from_slice(&1u32.to_le_bytes());
    block[0x18..0x1C].copy_from_slice(&5u32.to_le_bytes());
    block[0x24..0x28].copy_from_slice(&0x20u32.to_le_bytes());
    let checksum = calculate_checksum(&block[..CHECKSUM_OFFSET]);
    block[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());

    let base = BaseBlock::parse(&block).unwrap();
    assert_eq!(base.root_cell_offset, 0x20);
    assert!(base.is_consistent());

    block[0x24] = 0x40;
    assert!(matches!(
        BaseBlock::parse(&block),
        Err(RegistryError::ChecksumMismatch { .. })
    ));
}

#[test]
fn test_format_parsing() {
    assert_eq!("hive".parse::<Format>().unwrap(), Format::Hive);
    assert_eq!("Reg".parse::<Format>().unwrap(), Format::Reg);
    assert_eq!("reg+".parse::<Format>().unwrap(), Format::RegExtended);
    assert_eq!("POL".parse::<Format>().unwrap(), Format::Pol);
    assert!("regedit".parse::<Format>().is_err());
    assert!(!Format::Hive.is_writable());
    assert!(Format::Pol.is_writable());
}

#[test]
fn test_error_types() {
    let err = RegistryError::invalid_signature(b"regf", b"XXXX");
    assert!(matches!(err, RegistryError::InvalidSignature { .. }));

    let err = RegistryError::invalid_offset(0x1234, 0x1000);
    assert!(matches!(err, RegistryError::InvalidOffset { .. }));

    let err = RegistryError::invalid_cell_size(-2, 0x2000);
    assert!(matches!(err, RegistryError::InvalidCellSize { .. }));

    let err = RegistryError::syntax("HKEY_CURRENT_USER\\Foo", "Expecting ']'");
    assert!(err.to_string().contains("HKEY_CURRENT_USER\\Foo"));
}

#[cfg(feature = "serde")]
#[test]
fn test_tree_serializes_to_json() {
    let root = RegistryKey::new("Root").with_value(RegistryValue::dword("Count", 42));
    let json = serde_json::to_string(&root).unwrap();
    let back: RegistryKey = serde_json::from_str(&json).unwrap();
    assert_eq!(back, root);
}
