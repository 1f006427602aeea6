//! Append-only merging of message sequences.

use std::collections::HashSet;

use uuid::Uuid;

use super::message::ModelMessage;

/// Merge `right` onto the end of `left`.
///
/// Messages in `right` whose id already appears in `left` (or earlier in
/// `right`) are skipped. Nothing in `left` is replaced, reordered or removed.
pub fn add_messages(left: Vec<ModelMessage>, right: Vec<ModelMessage>) -> Vec<ModelMessage> {
    let mut seen: HashSet<Uuid> = left.iter().map(|m| m.id).collect();
    let mut merged = left;
    merged.reserve(right.len());
    for message in right {
        if seen.insert(message.id) {
            merged.push(message);
        }
    }
    merged
}
