//! Deterministic extractor — pattern-based text-to-slot mapping.
//!
//! The baseline beneath the LLM step: instant, free, always available, and
//! conservatively biased. A slot with no matching pattern stays absent
//! rather than being guessed.

use crate::schema::SlotSchema;
use crate::session::SlotValues;

/// Lowercase and collapse all whitespace runs to single spaces.
pub fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map raw conversation text to a slot-value mapping.
///
/// Pure function: no external calls, same text always yields the same
/// result. The returned map contains every schema key; each slot gets the
/// first value-bearing match from its pattern family, or `None`.
pub fn extract(schema: &SlotSchema, text: &str) -> SlotValues {
    let normalized = normalize(text);
    let mut values = schema.empty_values();
    for slot in schema.slots() {
        let hit = slot
            .patterns
            .iter()
            .find_map(|re| re.find(&normalized).map(|m| m.as_str().to_string()));
        values.insert(slot.key.to_string(), hit);
    }
    values
}
