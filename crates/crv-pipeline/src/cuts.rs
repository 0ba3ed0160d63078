//! Quality and fiducial cuts on remapped layer arrays.
//!
//! Each cut takes the current table and returns the filtered table plus a
//! [`CutReport`]. Percentages are reported both relative to the
//! immediately preceding step and relative to the pipeline's original
//! input count, which the engine carries. Cuts are order-preserving and
//! monotonic non-increasing in event count.

use crate::table::{EventTable, ModuleKind};
use crv_core::{Error, Result};
use serde::Serialize;

/// Default lower bound on total PEs (below: noise / empty triggers).
pub const DEFAULT_MIN_PES: f64 = 900.0;
/// Default upper bound on total PEs (above: EM contamination).
pub const DEFAULT_MAX_PES: f64 = 2250.0;
/// Default fiducial channel range on the L-end module, inclusive.
pub const DEFAULT_FIDUCIAL_RANGE: (usize, usize) = (12, 19);
/// Default lower bound on hit-channel multiplicity.
pub const DEFAULT_MIN_HITS: usize = 16;
/// Default upper bound on hit-channel multiplicity.
pub const DEFAULT_MAX_HITS: usize = 36;

/// Before/after bookkeeping for one cut stage.
#[derive(Debug, Clone, Serialize)]
pub struct CutReport {
    /// Stage label.
    pub label: String,
    /// Events entering the cut.
    pub n_before: usize,
    /// Events removed by the cut.
    pub n_removed: usize,
    /// Events surviving the cut.
    pub n_after: usize,
    /// Percent removed relative to the preceding step.
    pub pct_removed: f64,
    /// Percent remaining relative to the pipeline's initial input.
    pub pct_of_initial: f64,
}

impl CutReport {
    fn new(label: &str, n_before: usize, n_after: usize, n_initial: usize) -> Self {
        let n_removed = n_before - n_after;
        let pct_removed =
            if n_before > 0 { 100.0 * n_removed as f64 / n_before as f64 } else { 0.0 };
        let pct_of_initial =
            if n_initial > 0 { 100.0 * n_after as f64 / n_initial as f64 } else { 0.0 };
        Self { label: label.to_string(), n_before, n_removed, n_after, pct_removed, pct_of_initial }
    }
}

impl std::fmt::Display for CutReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: removed {} ({:.1}%), remaining {} ({:.1}% of initial)",
            self.label, self.n_removed, self.pct_removed, self.n_after, self.pct_of_initial
        )
    }
}

/// Cut engine, anchored to the pipeline's initial event count.
#[derive(Debug, Clone, Copy)]
pub struct CutEngine {
    n_initial: usize,
}

impl CutEngine {
    /// Engine for a pipeline whose original input held `n_initial` events.
    pub fn new(n_initial: usize) -> Self {
        Self { n_initial }
    }

    /// Keep events whose summed PEs over all three modules' layer arrays
    /// lie in `[min_pes, max_pes)`. Requires the layer grids.
    pub fn total_signal_cut(
        &self,
        table: EventTable,
        min_pes: f64,
        max_pes: f64,
    ) -> Result<(EventTable, CutReport)> {
        require_grids(&table)?;
        let n_before = table.len();
        let (kept, _) = table.filter(|e| {
            let tot = e.layers_l_end.as_ref().map(|g| g.total()).unwrap_or(0.0)
                + e.layers_t.as_ref().map(|g| g.total()).unwrap_or(0.0)
                + e.layers_ds.as_ref().map(|g| g.total()).unwrap_or(0.0);
            tot >= min_pes && tot < max_pes
        });
        let report = CutReport::new("total PE cut", n_before, kept.len(), self.n_initial);
        tracing::info!(%report, "applied total signal cut");
        Ok((kept, report))
    }

    /// Mask L-end channels outside `[lo_chan, hi_chan]` (inclusive) in
    /// every layer. Masked channels become missing, not zero, and no
    /// events are removed.
    pub fn fiducial_cut(
        &self,
        table: EventTable,
        lo_chan: usize,
        hi_chan: usize,
    ) -> Result<(EventTable, CutReport)> {
        require_grids(&table)?;
        let n_before = table.len();
        let masked = table.map(|mut e| {
            if let Some(grid) = e.layers_l_end.as_mut() {
                grid.mask_outside(lo_chan, hi_chan);
            }
            e
        });
        let report = CutReport::new("fiducial cut", n_before, masked.len(), self.n_initial);
        tracing::info!(%report, lo_chan, hi_chan, "applied fiducial mask on L-end");
        Ok((masked, report))
    }

    /// Keep events whose count of raw channels above zero (over the full
    /// 8x64 grid) lies in `[min_hits, max_hits)`.
    pub fn multiplicity_cut(
        &self,
        table: EventTable,
        min_hits: usize,
        max_hits: usize,
    ) -> (EventTable, CutReport) {
        let n_before = table.len();
        let (kept, _) = table.filter(|e| {
            let hits = e.pes.hit_count();
            hits >= min_hits && hits < max_hits
        });
        let report = CutReport::new("counters hit cut", n_before, kept.len(), self.n_initial);
        tracing::info!(%report, "applied channel multiplicity cut");
        (kept, report)
    }
}

fn require_grids(table: &EventTable) -> Result<()> {
    for module in [ModuleKind::LEnd, ModuleKind::T, ModuleKind::Ds] {
        if table.iter().any(|e| e.layers(module).is_none()) {
            return Err(Error::Validation(format!(
                "cut requires the {module} layer grid; run the layer mapper first"
            )));
        }
    }
    Ok(())
}
