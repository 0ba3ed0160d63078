//! Stage composition: clean -> map -> cuts -> trigger -> sort -> scan.
//!
//! Every stage stays independently callable; this module only wires them
//! together in the canonical order and collects the per-stage reports.

use crate::clean;
use crate::cuts::{
    CutEngine, CutReport, DEFAULT_FIDUCIAL_RANGE, DEFAULT_MAX_HITS, DEFAULT_MAX_PES,
    DEFAULT_MIN_HITS, DEFAULT_MIN_PES,
};
use crate::remap::{map_all, TReadout};
use crate::scan::{
    InefficiencyCurve, InefficiencyScanner, DEFAULT_SCAN_START, DEFAULT_SCAN_STEPS,
    DEFAULT_SCAN_STOP,
};
use crate::sort::sort_layer_sums;
use crate::table::{EventTable, ModuleKind};
use crate::trigger::{self, DEFAULT_TRIGGER_THRESHOLD};
use crv_core::Result;
use serde::{Deserialize, Serialize};

/// Tunable parameters for a full pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// T-module readout mode.
    pub t_readout: TReadout,
    /// Cross-validate the remap against manual slicing.
    pub self_check: bool,
    /// Total-signal cut lower bound (inclusive).
    pub min_pes: f64,
    /// Total-signal cut upper bound (exclusive).
    pub max_pes: f64,
    /// Fiducial range on the L-end module, inclusive.
    pub fiducial_lo: usize,
    /// Fiducial range on the L-end module, inclusive.
    pub fiducial_hi: usize,
    /// Multiplicity cut lower bound (inclusive).
    pub min_hits: usize,
    /// Multiplicity cut upper bound (exclusive).
    pub max_hits: usize,
    /// Layer-sum trigger threshold.
    pub trigger_threshold: f64,
    /// Module whose sorted layer sums feed the scan.
    pub sort_module: ModuleKind,
    /// Inefficiency scan start threshold.
    pub scan_start: f64,
    /// Inefficiency scan stop threshold.
    pub scan_stop: f64,
    /// Number of scan points.
    pub scan_steps: usize,
    /// Use the upper Wilson bound for uncertainties.
    pub conservative_errors: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            t_readout: TReadout::SingleEnded,
            self_check: true,
            min_pes: DEFAULT_MIN_PES,
            max_pes: DEFAULT_MAX_PES,
            fiducial_lo: DEFAULT_FIDUCIAL_RANGE.0,
            fiducial_hi: DEFAULT_FIDUCIAL_RANGE.1,
            min_hits: DEFAULT_MIN_HITS,
            max_hits: DEFAULT_MAX_HITS,
            trigger_threshold: DEFAULT_TRIGGER_THRESHOLD,
            sort_module: ModuleKind::T,
            scan_start: DEFAULT_SCAN_START,
            scan_stop: DEFAULT_SCAN_STOP,
            scan_steps: DEFAULT_SCAN_STEPS,
            conservative_errors: true,
        }
    }
}

/// Everything a pipeline run reports.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Events in the input table.
    pub n_input: usize,
    /// Events removed for negative PE values.
    pub n_negative_removed: usize,
    /// Remap self-check disagreements (diagnostic only).
    pub n_remap_mismatches: usize,
    /// Per-cut reports in application order.
    pub cuts: Vec<CutReport>,
    /// Combined-trigger report.
    pub trigger: trigger::TriggerReport,
    /// Events surviving all stages.
    pub n_final: usize,
    /// The inefficiency scan result.
    pub curve: InefficiencyCurve,
}

/// Run the full analysis over one consolidated table.
///
/// Configuration errors surface before any data is touched; otherwise
/// every stage runs to completion, even when a stage removes all events.
pub fn run(table: EventTable, config: &PipelineConfig) -> Result<PipelineSummary> {
    // Validate the scan bounds up front so a bad configuration aborts
    // before any cut mutates the table.
    let scanner = InefficiencyScanner::new(config.scan_start, config.scan_stop, config.scan_steps)?
        .conservative(config.conservative_errors);

    let n_input = table.len();
    let (table, n_negative_removed) = clean::remove_negative_pes(table);
    let (table, mismatches) = map_all(table, config.t_readout, config.self_check);

    let engine = CutEngine::new(n_input);
    let mut cuts = Vec::with_capacity(3);
    let (table, report) = engine.total_signal_cut(table, config.min_pes, config.max_pes)?;
    cuts.push(report);
    let (table, report) = engine.fiducial_cut(table, config.fiducial_lo, config.fiducial_hi)?;
    cuts.push(report);
    let (table, report) = engine.multiplicity_cut(table, config.min_hits, config.max_hits);
    cuts.push(report);

    let table = trigger::evaluate(table, config.trigger_threshold)?;
    let (table, trigger_report) = trigger::apply(table)?;

    let table = sort_layer_sums(table, config.sort_module)?;
    let curve = scanner.scan_table(&table)?;

    Ok(PipelineSummary {
        n_input,
        n_negative_removed,
        n_remap_mismatches: mismatches.len(),
        cuts,
        trigger: trigger_report,
        n_final: table.len(),
        curve,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Event, PeGrid};
    use crv_core::EventId;

    #[test]
    fn test_bad_scan_config_aborts_before_touching_data() {
        let table = EventTable::new(vec![Event::new(EventId::default(), PeGrid::uniform(1.0))]);
        let config = PipelineConfig { scan_steps: 1, ..Default::default() };
        assert!(run(table, &config).is_err());
    }

    #[test]
    fn test_runs_to_completion_on_empty_table() {
        let summary = run(EventTable::default(), &PipelineConfig::default()).unwrap();
        assert_eq!(summary.n_input, 0);
        assert_eq!(summary.n_final, 0);
        assert!(summary.curve.inefficiency[0].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_default_config_round_trips_through_serde() {
        let config = PipelineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: PipelineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scan_steps, config.scan_steps);
        assert_eq!(back.t_readout, config.t_readout);
    }
}
