//! Serialization bridge between table values and sink records.
//!
//! The table only touches a codec while draining: every accumulated value is
//! turned into one byte record and handed to the partition's [`Emitter`](crate::Emitter).
//! The only requirement is that `decode(encode(v)) == v` for the table's own value
//! type; the byte layout is the codec's business.
//!
//! Two serde-backed codecs are provided:
//! - [`PostcardCodec`]: compact binary, the default
//! - [`JsonCodec`]: one JSON document per record, handy for debugging
//!
//! Types with a fixed binary layout can implement [`Codec`] directly.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::CodecError;

/// Encodes values of `T` into records and back.
pub trait Codec<T> {
    /// # Errors
    ///
    /// Returns a [`CodecError`] if the value cannot be represented.
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// # Errors
    ///
    /// Returns a [`CodecError`] if `bytes` is not a record this codec produced.
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// Compact binary codec built on `postcard`.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostcardCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for PostcardCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(postcard::to_allocvec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}

/// JSON codec built on `serde_json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl<T: Serialize + DeserializeOwned> Codec<T> for JsonCodec {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
