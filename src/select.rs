//! Question selector — picks the one slot to ask about next.

use crate::schema::{Slot, SlotSchema};
use crate::session::SlotValues;

/// Choose the next slot to ask about and its canonical question.
///
/// The highest-weight absent slot wins; on equal weights the earlier
/// declaration wins. When nothing is absent the closing slot's question is
/// returned instead of a completion signal, since finalization is decided
/// separately.
pub fn next_question(schema: &SlotSchema, values: &SlotValues) -> (&'static str, &'static str) {
    let mut best: Option<&Slot> = None;
    for slot in schema.slots() {
        let absent = values.get(slot.key).map(Option::is_none).unwrap_or(true);
        if !absent {
            continue;
        }
        // Strictly-greater comparison keeps the earliest declared slot on ties.
        if best.is_none_or(|b| slot.weight > b.weight) {
            best = Some(slot);
        }
    }
    let chosen = best.unwrap_or_else(|| schema.closing_slot());
    (chosen.key, chosen.question)
}
