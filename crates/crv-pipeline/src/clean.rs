//! Event cleaning: whole-event removal of faulty readouts.
//!
//! A single negative PE value indicates a readout fault affecting the
//! whole event's calibration, so the entire event is dropped rather than
//! masking the offending channel.

use crate::table::EventTable;

/// Remove every event containing at least one negative raw channel value.
///
/// Returns the filtered table and the number of removed events. The
/// operation is idempotent and order-preserving.
pub fn remove_negative_pes(table: EventTable) -> (EventTable, usize) {
    let n_total = table.len();
    let (kept, n_removed) = table.filter(|e| !e.pes.has_negative());
    tracing::info!(n_removed, n_total, "removed events containing negative PE values");
    (kept, n_removed)
}
