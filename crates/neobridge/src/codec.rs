//! Payload codec.
//!
//! Envelopes treat arguments and results as opaque text. Generated or
//! hand-written adapters use these helpers to produce that text; any other
//! codec works as long as both sides agree.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::error::Result;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::Codec(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| Error::Codec(e.to_string()))
}
