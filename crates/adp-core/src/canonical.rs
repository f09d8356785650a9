//! # Canonical Serialization
//!
//! [`CanonicalBytes`] holds RFC 8785 (JCS) output: object keys sorted, no
//! insignificant whitespace, numbers in their shortest form. Two producers
//! that serialize the same record through this type get byte-identical
//! output, and therefore the same digest.
//!
//! Floats are rejected. Package records only ever carry strings and
//! integers, and refusing floats keeps the encoding unambiguous.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced by JCS canonicalization.
///
/// The inner buffer is private; the only constructors run the full
/// canonicalization pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        Self::from_value(value)
    }

    /// Canonicalize an already-built JSON value.
    pub fn from_value(value: Value) -> Result<Self, CanonicalizationError> {
        reject_floats(&value)?;
        Ok(Self(serde_jcs::to_vec(&value)?))
    }

    /// The canonical bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume and return the inner buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Byte length of the canonical form.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the canonical form is empty (never the case for valid JSON).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Number(n) if n.is_f64() => Err(CanonicalizationError::FloatRejected(
            n.as_f64().unwrap_or(f64::NAN),
        )),
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
        _ => Ok(()),
    }
}
