//! Canonical request encoding
//!
//! Signatures cover `METHOD ∥ PATH ∥ TIMESTAMP ∥ BODY_HASH` with no
//! separators. `BODY_HASH` is the lowercase hex SHA-256 of the body after a
//! canonical re-encoding: keys sorted recursively by code point, minimal
//! whitespace, arrays left in order. Two bodies that differ only in
//! formatting therefore hash identically, and any semantic difference
//! changes the hash.
//!
//! Duplicate object keys are rejected at parse time rather than silently
//! last-one-wins: a signer and a lenient parser disagreeing about which
//! duplicate survives would otherwise open a tampering gap.

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CryptoError, CryptoResult};

/// Parse a JSON body, rejecting duplicate object keys at any depth.
pub fn parse_strict(bytes: &[u8]) -> CryptoResult<Value> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = StrictValue::deserialize(&mut de)
        .map_err(|e| CryptoError::InvalidBody(e.to_string()))?;
    de.end()
        .map_err(|e| CryptoError::InvalidBody(e.to_string()))?;
    Ok(value.0)
}

/// Canonical compact encoding: recursively sorted keys, no whitespace.
pub fn canonical_string(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Hash a raw body per the signing rules.
///
/// Empty bodies hash the empty byte string. Non-empty bodies must be JSON;
/// the parsed value is returned alongside the hash so callers can hand it to
/// the handler without re-parsing.
pub fn body_hash(bytes: &[u8]) -> CryptoResult<(String, Option<Value>)> {
    if bytes.is_empty() {
        return Ok((hex_sha256(b""), None));
    }
    let value = parse_strict(bytes)?;
    let canonical = canonical_string(&value);
    Ok((hex_sha256(canonical.as_bytes()), Some(value)))
}

/// Assemble the exact byte string a request signature covers.
pub fn canonical_message(method: &str, path: &str, timestamp: &str, body_hash: &str) -> String {
    format!("{}{}{}{}", method.to_ascii_uppercase(), path, timestamp, body_hash)
}

fn hex_sha256(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly: the underlying map type must not matter.
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// `serde_json::Value` wrapper whose deserializer fails on duplicate keys.
struct StrictValue(Value);

impl<'de> Deserialize<'de> for StrictValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct StrictVisitor;

        impl<'de> Visitor<'de> for StrictVisitor {
            type Value = StrictValue;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("any JSON value without duplicate object keys")
            }

            fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::Bool(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::from(v)))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::from(v)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::from(v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::String(v.to_owned())))
            }

            fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::String(v)))
            }

            fn visit_unit<E>(self) -> Result<Self::Value, E> {
                Ok(StrictValue(Value::Null))
            }

            fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
            where
                A: SeqAccess<'de>,
            {
                let mut items = Vec::new();
                while let Some(item) = seq.next_element::<StrictValue>()? {
                    items.push(item.0);
                }
                Ok(StrictValue(Value::Array(items)))
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut map = Map::new();
                while let Some(key) = access.next_key::<String>()? {
                    let value = access.next_value::<StrictValue>()?;
                    if map.insert(key.clone(), value.0).is_some() {
                        return Err(de::Error::custom(format!("duplicate key: {key}")));
                    }
                }
                Ok(StrictValue(Value::Object(map)))
            }
        }

        deserializer.deserialize_any(StrictVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whitespace_and_key_order_hash_identically() {
        let a = br#"{"item_id":"room-101","bid_amount":160.0}"#;
        let b = br#"{  "bid_amount" : 160.0 ,  "item_id" : "room-101" }"#;
        assert_eq!(body_hash(a).unwrap().0, body_hash(b).unwrap().0);
    }

    #[test]
    fn semantic_difference_changes_hash() {
        let a = br#"{"bid_amount":160.0}"#;
        let b = br#"{"bid_amount":160.5}"#;
        assert_ne!(body_hash(a).unwrap().0, body_hash(b).unwrap().0);
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let a = json!({"b": {"z": 1, "a": 2}, "a": [3, {"y": 1, "x": 2}]});
        assert_eq!(
            canonical_string(&a),
            r#"{"a":[3,{"x":2,"y":1}],"b":{"a":2,"z":1}}"#
        );
    }

    #[test]
    fn arrays_keep_their_order() {
        let v = json!({"k": [3, 1, 2]});
        assert_eq!(canonical_string(&v), r#"{"k":[3,1,2]}"#);
    }

    #[test]
    fn duplicate_keys_rejected() {
        let err = parse_strict(br#"{"a":1,"a":2}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn nested_duplicate_keys_rejected() {
        assert!(parse_strict(br#"{"outer":{"a":1,"a":2}}"#).is_err());
    }

    #[test]
    fn unicode_keys_sort_by_code_point() {
        let v = json!({"é": 1, "a": 2, "Z": 3});
        // 'Z' (0x5A) < 'a' (0x61) < 'é' (0xE9)
        assert_eq!(canonical_string(&v), r#"{"Z":3,"a":2,"é":1}"#);
    }

    #[test]
    fn empty_body_hashes_empty_bytes() {
        let (hash, value) = body_hash(b"").unwrap();
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(value.is_none());
    }

    #[test]
    fn string_escapes() {
        let v = json!({"s": "a\"b\\c\nd"});
        assert_eq!(canonical_string(&v), r#"{"s":"a\"b\\c\nd"}"#);
    }

    #[test]
    fn message_uppercases_method() {
        let msg = canonical_message("post", "/v1/negotiate", "1700000000", "ffff");
        assert_eq!(msg, "POST/v1/negotiate1700000000ffff");
    }

    #[test]
    fn trailing_garbage_rejected() {
        assert!(parse_strict(br#"{"a":1} extra"#).is_err());
    }
}
