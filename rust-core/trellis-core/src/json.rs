//! # JSON Body Parsing
//!
//! Request bodies are parsed with simd-json. The parser works in place, so
//! callers hand over a mutable copy of the body.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

/// Parse JSON bytes to a typed value using simd-json
///
/// # Errors
///
/// Returns `Error::MalformedJson` if parsing fails
pub fn parse_json_bytes<T: DeserializeOwned>(bytes: &mut [u8]) -> Result<T> {
    simd_json::from_slice(bytes).map_err(|e| Error::MalformedJson(e.to_string()))
}

/// Parse a borrowed JSON body
///
/// Copies the input once; the original buffer is left untouched.
///
/// # Errors
///
/// Returns `Error::MalformedJson` if parsing fails
pub fn parse_json_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let mut owned = body.to_vec();
    parse_json_bytes(&mut owned)
}
