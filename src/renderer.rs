//! Emission of a key tree as flat `.reg` key blocks.

use crate::model::{RegistryKey, PATH_SEPARATOR};
use crate::regfile::RegFileOptions;
use crate::scanner::{LF, NEWLINE};
use crate::text::RegString;
use crate::value_codec::render_value_line;

/// Appends `root` and all of its descendants to `out` in pre-order.
///
/// Every key becomes a `[full\path]` header, its value lines and a blank
/// line. Newlines inside names are written as CRLF, which is how the parser
/// reads them back. The walk keeps its own stack, so nesting depth is only
/// bounded by memory.
///
/// The tree is expected to have passed [`RegistryKey::validate`]; names
/// containing `]` followed by a newline would not survive a round trip.
pub fn render_key(out: &mut RegString, root: &RegistryKey, options: &RegFileOptions) {
    let mut pending: Vec<(&RegistryKey, RegString)> = vec![(root, root.name.clone())];

    while let Some((key, path)) = pending.pop() {
        out.push('[');
        for &unit in path.as_units() {
            if unit == LF {
                out.push_str(NEWLINE);
            } else {
                out.push_unit(unit);
            }
        }
        out.push(']');
        out.push_str(NEWLINE);

        for value in &key.values {
            out.push_units(render_value_line(value, options.extensions).as_units());
        }
        out.push_str(NEWLINE);

        for subkey in key.subkeys.iter().rev() {
            pending.push((subkey, path.join(PATH_SEPARATOR, &subkey.name)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RegistryValue;

    fn render(root: &RegistryKey) -> String {
        let mut out = RegString::new();
        render_key(&mut out, root, &RegFileOptions::default());
        out.to_string()
    }

    #[test]
    fn test_pre_order_blocks() {
        let root = RegistryKey::new("Root")
            .with_value(RegistryValue::dword("n", 1))
            .with_subkey(RegistryKey::new("A").with_subkey(RegistryKey::new("B")))
            .with_subkey(RegistryKey::new("C"));

        assert_eq!(
            render(&root),
            "[Root]\r\n\"n\"=dword:00000001\r\n\r\n\
             [Root\\A]\r\n\r\n\
             [Root\\A\\B]\r\n\r\n\
             [Root\\C]\r\n\r\n"
        );
    }

    #[test]
    fn test_newline_in_key_name() {
        let root = RegistryKey::new("Root").with_subkey(RegistryKey::new("a\nb"));
        assert!(render(&root).contains("[Root\\a\r\nb]\r\n"));
    }

    #[test]
    fn test_deep_tree() {
        let mut root = RegistryKey::new("k");
        for _ in 0..3_000 {
            root = RegistryKey::new("k").with_subkey(root);
        }
        let text = render(&root);
        assert_eq!(text.matches("]\r\n\r\n").count(), 3_001);
        assert!(text.ends_with(&format!("[{}]\r\n\r\n", vec!["k"; 3_001].join("\\"))));
    }
}
