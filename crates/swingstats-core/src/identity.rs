// Deterministic match identity and filename date extraction.
//
// A match is identified by an MD5 digest of its Settings metadata, so the
// same export uploaded twice maps onto the same id and is skipped. Nothing in
// the Points or Shots tables contributes to the id.

use chrono::{NaiveDate, NaiveDateTime};
use md5::{Digest, Md5};
use uuid::Uuid;

/// The delimiter-joined string that gets hashed. Field prefixes keep an empty
/// location from colliding with an empty host name.
pub fn identity_string(
    start_time: NaiveDateTime,
    location: &str,
    host_team: &str,
    guest_team: &str,
) -> String {
    // Epoch seconds sidestep any timestamp formatting ambiguity.
    let epoch = start_time.and_utc().timestamp();
    format!(
        "ST:{epoch}|LOC:{}|HOST:{}|GUEST:{}",
        location.trim(),
        host_team.trim(),
        guest_team.trim()
    )
}

/// Derive the match id: the 16 MD5 bytes of [`identity_string`] used
/// verbatim as a UUID.
pub fn derive_match_identity(
    start_time: NaiveDateTime,
    location: &str,
    host_team: &str,
    guest_team: &str,
) -> Uuid {
    let digest = Md5::digest(identity_string(start_time, location, host_team, guest_team).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    Uuid::from_bytes(bytes)
}

/// Find the first `YYYY-MM-DD` date embedded in a filename, e.g.
/// `SwingVision-Jane-2024-06-15.xlsx`. Digit runs that are not a real
/// calendar date are passed over.
pub fn extract_match_date(file_name: &str) -> Option<NaiveDate> {
    let bytes = file_name.as_bytes();
    if bytes.len() < 10 {
        return None;
    }
    (0..=bytes.len() - 10).find_map(|start| {
        let window = &bytes[start..start + 10];
        let shaped = window.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
        if !shaped {
            return None;
        }
        // All-ASCII window, so these are valid char boundaries.
        NaiveDate::parse_from_str(&file_name[start..start + 10], "%Y-%m-%d").ok()
    })
}
