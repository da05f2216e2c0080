//! Canonical request body serialization.
//!
//! Object keys are emitted in byte order with no insignificant whitespace,
//! so a client and the server produce identical bytes for the same body
//! regardless of map ordering.

use bytes::{BufMut, BytesMut};
use serde_json::Value;

/// Canonical bytes of a request body.
pub fn canonical_bytes(body: &Value) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(128);
    write_value(&mut buf, body);
    buf.to_vec()
}

/// The message a request signature covers: canonical body then salt.
pub fn signed_message(body: &Value, salt: &[u8]) -> Vec<u8> {
    let mut message = canonical_bytes(body);
    message.extend_from_slice(salt);
    message
}

fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            buf.put_u8(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    buf.put_u8(b',');
                }
                write_scalar(buf, &Value::String(key.clone()));
                buf.put_u8(b':');
                if let Some(inner) = map.get(key) {
                    write_value(buf, inner);
                }
            }
            buf.put_u8(b'}');
        }
        Value::Array(items) => {
            buf.put_u8(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.put_u8(b',');
                }
                write_value(buf, item);
            }
            buf.put_u8(b']');
        }
        scalar => write_scalar(buf, scalar),
    }
}

fn write_scalar(buf: &mut BytesMut, value: &Value) {
    // Scalars never fail to serialize.
    if let Ok(encoded) = serde_json::to_vec(value) {
        buf.put_slice(&encoded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_order_is_normalized() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"d": [1, 2], "c": null}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"c": null, "d": [1,2]}, "b": 1}"#).unwrap();
        assert_eq!(canonical_bytes(&a), canonical_bytes(&b));
        assert_eq!(canonical_bytes(&a), br#"{"a":{"c":null,"d":[1,2]},"b":1}"#.to_vec());
    }

    #[test]
    fn test_signed_message_appends_salt() {
        let message = signed_message(&json!({"op": "ping"}), &[1, 2]);
        assert!(message.ends_with(&[1, 2]));
        assert!(message.starts_with(br#"{"op":"ping"}"#));
    }

    #[test]
    fn test_strings_are_escaped() {
        assert_eq!(canonical_bytes(&json!("a\"b")), br#""a\"b""#.to_vec());
    }
}
