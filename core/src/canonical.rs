// MRV Registry
// Copyright (C) 2019 Monadic GmbH <radicle@monadic.xyz>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License version 3 as
// published by the Free Software Foundation.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Canonical JSON encoding and content-addressed references.
//!
//! Object keys are sorted at every nesting level. Separators are `", "` and `": "` and every
//! character outside printable ASCII is written as a `\uXXXX` escape. The output is byte for
//! byte what the metadata pinning tools of the registry produce, so references computed here
//! match references already stored on the ledger.
//!
//! ```rust
//! # use mrv_registry_core::canonical;
//! let a = serde_json::json!({"b": 1, "a": [true, null]});
//! let b = serde_json::json!({"a": [true, null], "b": 1});
//! assert_eq!(canonical::to_bytes(&a).unwrap(), b"{\"a\": [true, null], \"b\": 1}".to_vec());
//! assert_eq!(canonical::content_ref(&a).unwrap(), canonical::content_ref(&b).unwrap());
//! ```

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::io;

/// Prefix of every reference produced by [content_ref].
pub const REF_PREFIX: &str = "sha256:";

/// Serialize `value` canonically.
pub fn to_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    let mut bytes = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut bytes, SpacedAsciiFormatter);
    Sorted(&value).serialize(&mut serializer)?;
    Ok(bytes)
}

/// `"sha256:" + hex(sha256(to_bytes(value)))`
pub fn content_ref<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let bytes = to_bytes(value)?;
    Ok(format!("{}{}", REF_PREFIX, hex::encode(Sha256::digest(&bytes))))
}

struct Sorted<'a>(&'a Value);

impl Serialize for Sorted<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                let mut object = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    object.serialize_entry(key, &Sorted(value))?;
                }
                object.end()
            }
            Value::Array(items) => serializer.collect_seq(items.iter().map(Sorted)),
            other => other.serialize(serializer),
        }
    }
}

struct SpacedAsciiFormatter;

impl serde_json::ser::Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        let mut start = 0;
        for (index, c) in fragment.char_indices() {
            if (c as u32) < 0x7f {
                continue;
            }
            writer.write_all(fragment[start..index].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = index + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": {"z": 1, "a": "é"}, "a": [1, 2]});
        let bytes = to_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a": [1, 2], "b": {"a": "\u00e9", "z": 1}}"#
        );
        assert_eq!(
            content_ref(&value).unwrap(),
            "sha256:9d9592450b0c1e65ad3a8342b2ae02a8a426569a95a7d99808755ee48e78c36f"
        );
    }

    #[test]
    fn escapes_outside_printable_ascii() {
        let bytes = to_bytes(&json!(["a\u{7f}b", "\u{1F331}", "tab\t"])).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"["a\u007fb", "\ud83c\udf31", "tab\t"]"#
        );
    }

    #[test]
    fn order_independent() {
        let first: Value =
            serde_json::from_str(r#"{"avg_ndvi": 0.4, "area_ha": 3.0, "images": ["x"]}"#).unwrap();
        let second: Value =
            serde_json::from_str(r#"{"images": ["x"], "area_ha": 3.0, "avg_ndvi": 0.4}"#).unwrap();
        assert_eq!(content_ref(&first).unwrap(), content_ref(&second).unwrap());
        assert!(content_ref(&first).unwrap().starts_with(REF_PREFIX));
        assert_eq!(content_ref(&first).unwrap().len(), REF_PREFIX.len() + 64);
    }
}
