//! RFC 6902 JSON Patch application.
//!
//! Pure functions: the input state is never modified. A patch whose operations
//! cannot all be applied yields an error and no partial result.

use crate::error::PatchError;
use json_patch::Patch;
use serde_json::Value;

/// Parse a JSON Patch document.
pub fn decode(data: &str) -> Result<Patch, PatchError> {
    Ok(serde_json::from_str(data)?)
}

/// Apply an already decoded patch to `state`, returning the new state.
pub fn apply_patch(state: &Value, patch: &Patch) -> Result<Value, PatchError> {
    let mut next = state.clone();
    json_patch::patch(&mut next, &patch.0)?;
    Ok(next)
}

/// Parse `data` and apply it to `state`.
pub fn apply(state: &Value, data: &str) -> Result<Value, PatchError> {
    apply_patch(state, &decode(data)?)
}

/// The document every replica starts from.
pub fn empty_document() -> Value {
    Value::Object(serde_json::Map::new())
}
