//! Per-event ordering of layer sums.
//!
//! Reduces a module's 4x32 grid to one sum per layer and sorts the four
//! sums ascending, producing the order statistic the inefficiency scan is
//! defined on: rank 0 is the weakest layer, rank 3 the strongest, so
//! "at least k of 4 layers above threshold" reads directly off the ranks.

use crate::table::{EventTable, LayerGrid, ModuleKind, N_LAYERS};
use crv_core::{Error, Result};

/// Ascending per-layer sums for one grid. Masked channels are excluded
/// from the sums.
pub fn sorted_layer_sums(grid: &LayerGrid) -> [f64; N_LAYERS] {
    let mut sums = grid.layer_sums();
    sums.sort_by(f64::total_cmp);
    sums
}

/// Attach ascending sorted layer sums for `module` (normally the T
/// module) to every event. The module's grid must be present.
pub fn sort_layer_sums(table: EventTable, module: ModuleKind) -> Result<EventTable> {
    if table.iter().any(|e| e.layers(module).is_none()) {
        return Err(Error::Validation(format!(
            "layer sorting requires the {module} layer grid; run the layer mapper first"
        )));
    }
    Ok(table.map(|mut event| {
        event.sorted_layer_sums = event.layers(module).map(sorted_layer_sums);
        event
    }))
}
