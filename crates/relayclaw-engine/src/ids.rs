//! Short identifier allocation for payloads, campaigns, and schedules.
//!
//! Admins type these ids back into commands, so single characters are tried
//! first: digits `1..9`, then `A..Z`. Only once all 35 are taken does the
//! allocator fall back to random uppercase-alphanumeric strings.

use rand::Rng;
use std::collections::HashSet;

const FALLBACK_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Allocate an identifier not present in `existing`.
///
/// Preference order is fixed: `"1".."9"` in order, then `"A".."Z"` in order,
/// then random strings of length `requested_len + 1` drawn until fresh.
/// Always terminates with a fresh id; there is no error path.
pub fn allocate_id(existing: &HashSet<String>, requested_len: usize) -> String {
    for d in 1..10u32 {
        let id = d.to_string();
        if !existing.contains(&id) {
            return id;
        }
    }

    for c in b'A'..=b'Z' {
        let id = (c as char).to_string();
        if !existing.contains(&id) {
            return id;
        }
    }

    let mut rng = rand::thread_rng();
    loop {
        let id: String = (0..requested_len + 1)
            .map(|_| FALLBACK_CHARS[rng.gen_range(0..FALLBACK_CHARS.len())] as char)
            .collect();
        if !existing.contains(&id) {
            return id;
        }
    }
}
