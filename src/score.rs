//! Readiness scorer — weighted completion percentage.

use crate::schema::SlotSchema;
use crate::session::SlotValues;

/// Score how complete the intake is, 0-100.
///
/// Sum of weights of filled slots over the total weight, scaled to 100,
/// rounded and clamped. Monotonic: filling another slot can only raise or
/// hold the score.
pub fn readiness(schema: &SlotSchema, values: &SlotValues) -> u8 {
    let total = schema.total_weight();
    if total <= 0.0 {
        return 0;
    }
    let filled: f64 = schema
        .slots()
        .iter()
        .filter(|s| values.get(s.key).map(|v| v.is_some()).unwrap_or(false))
        .map(|s| s.weight)
        .sum();
    (100.0 * filled / total).round().clamp(0.0, 100.0) as u8
}
