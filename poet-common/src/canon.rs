//! Deterministic JSON encoding used whenever a signature or hash must be
//! reproducible across peers. Every payload we sign or hash is a
//! `#[derive(Serialize)]` struct with fields in declaration order, so
//! `serde_json`'s default compact output is already deterministic: there is
//! no free-form map in the signed path that would need explicit key
//! ordering. Callers that need to re-verify a signature must use the exact
//! bytes they received on the wire rather than re-encoding through this
//! module, since re-encoding a struct that round-tripped through an
//! intermediate `serde_json::Value` is not guaranteed to reproduce the
//! original byte-for-byte.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::Result;

/// Render a value to its canonical, compact JSON string.
pub fn to_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).expect("canonical JSON types never fail to serialize")
}

/// Render a value to its canonical JSON bytes.
pub fn to_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    to_string(value).into_bytes()
}

/// Parse a canonical JSON string back into a value.
pub fn from_str<T: DeserializeOwned>(s: &str) -> Result<T> {
    Ok(serde_json::from_str(s)?)
}

/// Parse canonical JSON bytes back into a value.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        b: u32,
        a: String,
    }

    #[test]
    fn encoding_is_deterministic_and_preserves_field_order() {
        let value = Sample { b: 1, a: "x".to_string() };
        let encoded = to_string(&value);
        assert_eq!(encoded, r#"{"b":1,"a":"x"}"#);
        assert_eq!(to_string(&value), encoded);
    }

    #[test]
    fn round_trips_through_from_str() {
        let value = Sample { b: 7, a: "y".to_string() };
        let encoded = to_string(&value);
        let decoded: Sample = from_str(&encoded).unwrap();
        assert_eq!(decoded, value);
    }
}
