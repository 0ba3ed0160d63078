//! Trigger decisions from layer sums.
//!
//! A layer is "hit" when its channel sum exceeds the threshold; a module
//! is triggered when all four of its layers are hit. The combined event
//! trigger is `L-end AND DS`. The T module's flags are computed and
//! stored for the downstream inefficiency study but deliberately never
//! gate the combined decision; that asymmetry is a fixed design choice.

use crate::table::{EventTable, LayerGrid, ModuleKind, N_LAYERS};
use crv_core::{Error, Result};
use serde::Serialize;

/// Default layer-sum trigger threshold in PEs.
pub const DEFAULT_TRIGGER_THRESHOLD: f64 = 10.0;

/// Per-event trigger flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerFlags {
    /// Per-layer hits for the L-end module.
    pub l_end_layers: [bool; N_LAYERS],
    /// Per-layer hits for the T module.
    pub t_layers: [bool; N_LAYERS],
    /// Per-layer hits for the DS module.
    pub ds_layers: [bool; N_LAYERS],
    /// All four L-end layers hit.
    pub l_end: bool,
    /// All four T layers hit (stored, never gating).
    pub t: bool,
    /// All four DS layers hit.
    pub ds: bool,
    /// Combined event trigger: L-end AND DS.
    pub combined: bool,
}

/// Trigger summary for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct TriggerReport {
    /// Events evaluated.
    pub n_total: usize,
    /// Events with a combined trigger.
    pub n_triggered: usize,
    /// Percent of events with a combined trigger.
    pub pct_triggered: f64,
}

impl std::fmt::Display for TriggerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} = {:.2}% events have triggers",
            self.n_triggered, self.n_total, self.pct_triggered
        )
    }
}

fn layer_hits(grid: &LayerGrid, threshold: f64) -> [bool; N_LAYERS] {
    std::array::from_fn(|l| grid.layer_sum(l) > threshold)
}

/// Evaluate trigger flags for every event and attach them to the table.
///
/// Requires the L-end, T, and DS layer grids; a missing grid is a
/// configuration error.
pub fn evaluate(table: EventTable, threshold: f64) -> Result<EventTable> {
    for module in [ModuleKind::LEnd, ModuleKind::T, ModuleKind::Ds] {
        if table.iter().any(|e| e.layers(module).is_none()) {
            return Err(Error::Validation(format!(
                "trigger evaluation requires the {module} layer grid; run the layer mapper first"
            )));
        }
    }
    let table = table.map(|mut event| {
        let l_end_layers = layer_hits(event.layers_l_end.as_ref().unwrap(), threshold);
        let t_layers = layer_hits(event.layers_t.as_ref().unwrap(), threshold);
        let ds_layers = layer_hits(event.layers_ds.as_ref().unwrap(), threshold);
        let l_end = l_end_layers.iter().all(|&h| h);
        let t = t_layers.iter().all(|&h| h);
        let ds = ds_layers.iter().all(|&h| h);
        event.triggers = Some(TriggerFlags {
            l_end_layers,
            t_layers,
            ds_layers,
            l_end,
            t,
            ds,
            combined: l_end && ds,
        });
        event
    });
    Ok(table)
}

/// Keep only events with a combined trigger. Requires [`evaluate`] to
/// have run.
pub fn apply(table: EventTable) -> Result<(EventTable, TriggerReport)> {
    if table.iter().any(|e| e.triggers.is_none()) {
        return Err(Error::Validation(
            "trigger application requires trigger flags; run trigger evaluation first".into(),
        ));
    }
    let n_total = table.len();
    let (kept, _) = table.filter(|e| e.triggers.map(|t| t.combined).unwrap_or(false));
    let n_triggered = kept.len();
    let pct_triggered =
        if n_total > 0 { 100.0 * n_triggered as f64 / n_total as f64 } else { 0.0 };
    let report = TriggerReport { n_total, n_triggered, pct_triggered };
    tracing::info!(%report, "applied combined trigger");
    Ok((kept, report))
}
