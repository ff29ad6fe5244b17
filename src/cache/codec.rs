//! Value encodings for [`TypedCache`](super::TypedCache).

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Turns values into the backend's string representation and back.
pub trait Codec: Send + Sync {
    /// Encodes `value`.
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String>;

    /// Decodes a stored string.
    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T>;
}

/// JSON via `serde_json`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Codec {
            message: e.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, raw: &str) -> Result<T> {
        serde_json::from_str(raw).map_err(|e| Error::Codec {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Order {
        id: u64,
        sku: String,
    }

    #[test]
    fn test_json_codec() {
        let order = Order {
            id: 7,
            sku: "A-1".to_string(),
        };
        let raw = JsonCodec.encode(&order).unwrap();
        assert_eq!(raw, r#"{"id":7,"sku":"A-1"}"#);
        assert_eq!(JsonCodec.decode::<Order>(&raw).unwrap(), order);
    }

    #[test]
    fn test_json_codec_decode_error() {
        let err = JsonCodec.decode::<Order>("{not json").unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_none_encodes_as_null() {
        assert_eq!(JsonCodec.encode(&Option::<u8>::None).unwrap(), "null");
    }
}
