//! Canonical serialization for block hashing
//!
//! Produces a deterministic JSON text for any [`serde_json::Value`]:
//!
//! - object keys sorted by code point at every level, regardless of how the
//!   map stored them
//! - `", "` between items and `": "` between key and value, nothing else
//! - non-ASCII characters written as UTF-8; only `"`, `\` and control
//!   characters are escaped
//! - integers in plain decimal, floats in shortest round-trip form
//!
//! Only the text layout follows `json.dumps(sort_keys=True, ensure_ascii=False)`.
//! The hashed field set is this crate's own (see [`crate::types::Block`]), so
//! blocks hashed over the legacy field names do not re-verify.

use crate::crypto::sha256_hex;
use serde_json::Value;

/// Encode a value into its canonical JSON text
pub fn encode(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// SHA-256 (lowercase hex) of the canonical encoding
pub fn hash(value: &Value) -> String {
    sha256_hex(encode(value).as_bytes())
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_string(out, key);
                out.push_str(": ");
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_with_spaced_separators() {
        let value = json!({"b": 1, "a": [true, null], "c": {"z": "x", "y": 2}});
        assert_eq!(
            encode(&value),
            r#"{"a": [true, null], "b": 1, "c": {"y": 2, "z": "x"}}"#
        );
    }

    #[test]
    fn test_unicode_not_escaped() {
        let value = json!({"title": "区块链 café"});
        assert_eq!(encode(&value), "{\"title\": \"区块链 café\"}");
    }

    #[test]
    fn test_control_characters_escaped() {
        let value = json!("line\nnext\t\"q\"\\\u{01}");
        assert_eq!(encode(&value), r#""line\nnext\t\"q\"\\\u0001""#);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(encode(&json!([1, -7, 2.5, 1.0])), "[1, -7, 2.5, 1.0]");
    }

    #[test]
    fn test_empty_containers() {
        assert_eq!(encode(&json!({"a": {}, "b": []})), r#"{"a": {}, "b": []}"#);
    }

    #[test]
    fn test_hash_deterministic() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(hash(&a), hash(&b));
        assert_ne!(hash(&a), hash(&json!({"x": 1, "y": 3})));
    }
}
