//! JSON ↔ CBOR transcoding for definition bodies
//!
//! Definitions arrive from the API as JSON and are stored as CBOR, which
//! is both smaller and cheap to decode on lookup.

use anyhow::{Context, Result};
use serde_json::Value;

/// Encode a JSON value as CBOR bytes.
pub fn json_to_cbor(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).context("encoding definition as CBOR")?;
    Ok(buf)
}

/// Decode stored CBOR bytes back into a JSON value.
pub fn cbor_to_json(bytes: &[u8]) -> Result<Value> {
    ciborium::from_reader(bytes).context("decoding stored definition as CBOR")
}
