//! Body encoding and decoding.

use serde::de::{self, DeserializeOwned, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to turn a body into a typed payload or back.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Body was empty or whitespace only.
    #[error("body is empty")]
    EmptyInput,
    /// Body did not parse into the expected type.
    #[error("failed to decode {type_name}: {message}")]
    Malformed { type_name: &'static str, message: String },
    /// Payload could not be serialized.
    #[error("failed to encode {type_name}: {message}")]
    Encode { type_name: &'static str, message: String },
}

/// Converts typed payloads to body text and back.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError>;

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, CodecError>;
}

/// JSON codec backed by serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub const fn new() -> Self {
        Self { pretty: false }
    }

    pub const fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        encoded.map_err(|error| CodecError::Encode {
            type_name: std::any::type_name::<T>(),
            message: error.to_string(),
        })
    }

    fn decode<T: DeserializeOwned>(&self, body: &str) -> Result<T, CodecError> {
        if body.trim().is_empty() {
            return Err(CodecError::EmptyInput);
        }

        serde_json::from_str(body).or_else(|error| {
            T::deserialize(RawText(body)).map_err(|_| CodecError::Malformed {
                type_name: std::any::type_name::<T>(),
                message: error.to_string(),
            })
        })
    }
}

/// Feeds a non-JSON body verbatim to string-like targets.
///
/// Only `deserialize_str`/`deserialize_string` succeed, so self-describing
/// targets such as `serde_json::Value` still reject text that isn't JSON.
struct RawText<'a>(&'a str);

impl<'de> Deserializer<'de> for RawText<'_> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(self, _visitor: V) -> Result<V::Value, Self::Error> {
        Err(de::Error::custom("body is not JSON"))
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str(self.0)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_str(self.0)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char bytes byte_buf
        option unit unit_struct newtype_struct seq tuple tuple_struct map struct
        enum identifier ignored_any
    }
}
