//! MessagePack payloads.
//!
//! Event arguments travel as one MessagePack array. Vectors use an extension
//! type holding three little-endian `f32`s. Typed payloads (HTTP request
//! options and the like) go through `rmp_serde` instead.

use rmpv::Value as Mp;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Value, Vector3};
use crate::error::DecodeError;

/// Extension type tag for [`Vector3`].
pub const VECTOR3_EXT: i8 = 21;

fn to_mp(value: &Value) -> Mp {
    match value {
        Value::Nil => Mp::Nil,
        Value::Bool(b) => Mp::Boolean(*b),
        Value::Int(i) => Mp::Integer((*i).into()),
        Value::Float(f) => Mp::F64(*f),
        Value::Str(s) => Mp::String(s.as_str().into()),
        Value::Bytes(b) => Mp::Binary(b.clone()),
        Value::Vector3(v) => {
            let mut data = Vec::with_capacity(12);
            for c in [v.x, v.y, v.z] {
                data.extend_from_slice(&c.to_le_bytes());
            }
            Mp::Ext(VECTOR3_EXT, data)
        }
        Value::List(items) => Mp::Array(items.iter().map(to_mp).collect()),
        Value::Map(entries) => Mp::Map(
            entries
                .iter()
                .map(|(k, v)| (to_mp(k), to_mp(v)))
                .collect(),
        ),
    }
}

fn from_mp(value: Mp) -> Result<Value, DecodeError> {
    Ok(match value {
        Mp::Nil => Value::Nil,
        Mp::Boolean(b) => Value::Bool(b),
        Mp::Integer(i) => match i.as_i64() {
            Some(i) => Value::Int(i),
            None => {
                return Err(DecodeError::MessagePack(format!(
                    "integer {i} does not fit in i64"
                )))
            }
        },
        Mp::F32(f) => Value::Float(f as f64),
        Mp::F64(f) => Value::Float(f),
        Mp::String(s) => Value::Str(s.into_str().ok_or(DecodeError::InvalidUtf8)?),
        Mp::Binary(b) => Value::Bytes(b),
        Mp::Array(items) => Value::List(items.into_iter().map(from_mp).collect::<Result<_, _>>()?),
        Mp::Map(entries) => Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| Ok((from_mp(k)?, from_mp(v)?)))
                .collect::<Result<_, DecodeError>>()?,
        ),
        Mp::Ext(VECTOR3_EXT, data) => {
            if data.len() != 12 {
                return Err(DecodeError::mismatch(
                    "12-byte vector3 extension",
                    format!("{} bytes", data.len()),
                ));
            }
            let c = |i: usize| f32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
            Value::Vector3(Vector3::new(c(0), c(4), c(8)))
        }
        Mp::Ext(tag, _) => return Err(DecodeError::UnsupportedExtension(tag)),
    })
}

/// Serialize one value.
pub fn pack_one(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    // writing into a Vec only fails on allocation failure
    if let Err(e) = rmpv::encode::write_value(&mut buf, &to_mp(value)) {
        tracing::error!("[codec] MessagePack encode failed: {e}");
    }
    buf
}

/// Serialize an argument list as one MessagePack array.
pub fn pack(values: &[Value]) -> Vec<u8> {
    pack_one(&Value::List(values.to_vec()))
}

pub fn unpack_one(bytes: &[u8]) -> Result<Value, DecodeError> {
    let mut rd = bytes;
    let value = rmpv::decode::read_value(&mut rd)
        .map_err(|e| DecodeError::MessagePack(e.to_string()))?;
    if !rd.is_empty() {
        return Err(DecodeError::MessagePack(format!(
            "{} trailing byte(s) after payload",
            rd.len()
        )));
    }
    from_mp(value)
}

/// Decode an argument list. An empty payload or a bare nil is zero arguments;
/// any other non-array value is a single argument.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Value>, DecodeError> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    Ok(match unpack_one(bytes)? {
        Value::List(items) => items,
        Value::Nil => Vec::new(),
        other => vec![other],
    })
}

/// Typed payload via serde, map-encoded so field names survive.
pub fn to_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, DecodeError> {
    rmp_serde::to_vec_named(value).map_err(|e| DecodeError::MessagePack(e.to_string()))
}

pub fn from_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, DecodeError> {
    rmp_serde::from_slice(bytes).map_err(|e| DecodeError::MessagePack(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_arguments_keep_order_and_types() {
        let args = vec![
            Value::Int(1),
            Value::from("a"),
            Value::Vector3(Vector3::new(1.0, 2.5, -3.0)),
            Value::Map(vec![(Value::from("armour"), Value::Float(50.5))]),
            Value::Bytes(vec![0, 1, 2]),
            Value::Nil,
        ];
        let bytes = pack(&args);
        assert_eq!(unpack(&bytes).unwrap(), args);
    }

    #[test]
    fn test_empty_and_scalar_payloads() {
        assert!(unpack(&[]).unwrap().is_empty());
        assert!(unpack(&pack_one(&Value::Nil)).unwrap().is_empty());
        assert_eq!(unpack(&pack_one(&Value::Bool(true))).unwrap(), vec![Value::Bool(true)]);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Mp::Ext(3, vec![1, 2])).unwrap();
        assert!(matches!(unpack_one(&buf), Err(DecodeError::UnsupportedExtension(3))));
    }

    #[test]
    fn test_short_vector_extension_rejected() {
        let mut buf = Vec::new();
        rmpv::encode::write_value(&mut buf, &Mp::Ext(VECTOR3_EXT, vec![0; 8])).unwrap();
        assert!(matches!(unpack_one(&buf), Err(DecodeError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut buf = pack_one(&Value::Int(5));
        buf.push(0xc0);
        assert!(matches!(unpack_one(&buf), Err(DecodeError::MessagePack(_))));
    }

    #[test]
    fn test_typed_payload() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Options {
            url: String,
            method: String,
        }
        let opts = Options {
            url: "http://localhost/".into(),
            method: "GET".into(),
        };
        let bytes = to_payload(&opts).unwrap();
        assert_eq!(from_payload::<Options>(&bytes).unwrap(), opts);
    }
}
