//! Transaction wire format.
//!
//! One transaction per WebSocket text frame:
//! `{"data":"<JSON Patch text>","source":"<id>","sequence":<u64 >= 1>}`.

use crate::error::WireError;
use snapsync_core::Transaction;

/// Encode a transaction as a text frame payload.
pub fn encode(tx: &Transaction) -> String {
    // Transaction is plain strings and an integer; serialization cannot fail.
    serde_json::to_string(tx).unwrap_or_default()
}

/// Decode a text frame payload. Sequence 0 is never valid on the wire.
pub fn decode(frame: &str) -> Result<Transaction, WireError> {
    let tx: Transaction = serde_json::from_str(frame)?;
    if tx.sequence() == 0 {
        return Err(WireError::ZeroSequence(tx.source().to_string()));
    }
    Ok(tx)
}
