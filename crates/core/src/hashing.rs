//! Content hashing for deduplication.
//!
//! The digest covers only the semantic fields of a record. Optional
//! references, row ids and timestamps never take part, so re-importing the
//! same usage event from a differently formatted file yields the same key.

use chrono::{NaiveDate, NaiveTime};
use sha2::{Digest, Sha256};

/// Length of a content hash in hex characters.
pub const CONTENT_HASH_LEN: usize = 64;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Derive the dedup key for a record from its semantic fields.
///
/// Dates and times are rendered canonically (`YYYY-MM-DD`, `HH:MM:SS`) and
/// text fields are trimmed, so incidental formatting never changes the key.
/// Every field is written as `<byte length>:<value>` so no value, whatever
/// characters it contains, can shift a field boundary.
pub fn content_hash(
    date: NaiveDate,
    time: NaiveTime,
    entry_point: &str,
    exit_point: &str,
    amount: i64,
    vehicle_id: &str,
    card_id: &str,
) -> String {
    let date = date.format("%Y-%m-%d").to_string();
    let time = time.format("%H:%M:%S").to_string();
    let amount = amount.to_string();
    let fields = [
        date.as_str(),
        time.as_str(),
        entry_point.trim(),
        exit_point.trim(),
        amount.as_str(),
        vehicle_id.trim(),
        card_id.trim(),
    ];

    let mut canonical = String::new();
    for field in fields {
        canonical.push_str(&field.len().to_string());
        canonical.push(':');
        canonical.push_str(field);
    }
    sha256_hex(canonical.as_bytes())
}
