//! Threshold-sweep inefficiency scan.
//!
//! For each threshold and each sort rank, the inefficiency is the
//! fraction of events whose rank-th sorted layer sum fails the
//! threshold, with a Wilson-interval uncertainty. Two interchangeable
//! inputs over the same threshold grid: the per-event sorted sums, or
//! pre-aggregated histograms of them.

use crate::hist::LayerHistograms;
use crate::stats::{wilson_interval, DEFAULT_CONF_LEVEL};
use crate::table::{EventTable, N_LAYERS};
use crv_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default scan start threshold in PEs.
pub const DEFAULT_SCAN_START: f64 = 10.0;
/// Default scan stop threshold in PEs.
pub const DEFAULT_SCAN_STOP: f64 = 150.0;
/// Default number of scan points.
pub const DEFAULT_SCAN_STEPS: usize = 29;

/// Inefficiency vs threshold, per sort rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InefficiencyCurve {
    /// Scan thresholds, linearly spaced, both ends inclusive.
    pub thresholds: Vec<f64>,
    /// Inefficiency per rank (0 = weakest layer) per threshold.
    pub inefficiency: [Vec<f64>; N_LAYERS],
    /// Uncertainty per rank per threshold.
    pub uncertainty: [Vec<f64>; N_LAYERS],
}

/// Threshold-sweep inefficiency scanner.
#[derive(Debug, Clone, Copy)]
pub struct InefficiencyScanner {
    start: f64,
    stop: f64,
    steps: usize,
    conf_level: f64,
    conservative: bool,
}

impl InefficiencyScanner {
    /// Scanner over `steps` thresholds from `start` to `stop` inclusive.
    ///
    /// `stop <= start` or `steps < 2` is a configuration error. The
    /// uncertainty defaults to the conservative (upper-bound) half
    /// interval at 95% confidence.
    pub fn new(start: f64, stop: f64, steps: usize) -> Result<Self> {
        if !(start.is_finite() && stop.is_finite()) || stop <= start {
            return Err(Error::Validation(format!(
                "scan bounds must satisfy stop > start, got start={start}, stop={stop}"
            )));
        }
        if steps < 2 {
            return Err(Error::Validation(format!("scan requires steps >= 2, got {steps}")));
        }
        Ok(Self { start, stop, steps, conf_level: DEFAULT_CONF_LEVEL, conservative: true })
    }

    /// Use the lower-bound half interval instead of the upper.
    pub fn conservative(mut self, conservative: bool) -> Self {
        self.conservative = conservative;
        self
    }

    /// Override the Wilson confidence level.
    pub fn conf_level(mut self, conf_level: f64) -> Self {
        self.conf_level = conf_level;
        self
    }

    /// The scan thresholds: `steps` linearly spaced values from `start`
    /// to `stop`, both ends inclusive.
    pub fn thresholds(&self) -> Vec<f64> {
        let step = (self.stop - self.start) / (self.steps - 1) as f64;
        (0..self.steps).map(|i| self.start + i as f64 * step).collect()
    }

    fn ineff(k: f64, n: f64) -> f64 {
        if n > 0.0 {
            k / n
        } else {
            0.0
        }
    }

    /// Half the distance between the point estimate and the requested
    /// Wilson bound. Zero denominator degenerates to zero, never NaN.
    fn ineff_err(&self, k: f64, n: f64) -> Result<f64> {
        if n == 0.0 {
            return Ok(0.0);
        }
        let (lower, upper) = wilson_interval(k, n, self.conf_level)?;
        let point = k / n;
        let bound = if self.conservative { upper } else { lower };
        Ok(((bound - point) / 2.0).abs())
    }

    /// Scan per-event sorted layer sums.
    ///
    /// A failure at threshold `t` and rank `r` is an event whose `r`-th
    /// sorted sum satisfies `0 <= value <= t`. The denominator is the
    /// table length, fixed across ranks and thresholds.
    pub fn scan_table(&self, table: &EventTable) -> Result<InefficiencyCurve> {
        if table.iter().any(|e| e.sorted_layer_sums.is_none()) {
            return Err(Error::Validation(
                "inefficiency scan requires sorted layer sums; run the sorter first".into(),
            ));
        }
        let thresholds = self.thresholds();
        let n = table.len() as f64;
        let mut inefficiency: [Vec<f64>; N_LAYERS] = Default::default();
        let mut uncertainty: [Vec<f64>; N_LAYERS] = Default::default();

        for &thres in &thresholds {
            for rank in 0..N_LAYERS {
                let k = table
                    .iter()
                    .filter(|e| {
                        let v = e.sorted_layer_sums.expect("checked above")[rank];
                        v >= 0.0 && v <= thres
                    })
                    .count() as f64;
                inefficiency[rank].push(Self::ineff(k, n));
                uncertainty[rank].push(self.ineff_err(k, n)?);
            }
        }
        Ok(InefficiencyCurve { thresholds, inefficiency, uncertainty })
    }

    /// Scan pre-aggregated histograms of sorted layer sums.
    ///
    /// The denominator is the total entry count of the rank-3
    /// (strongest-layer) histogram, shared across all ranks; the failure
    /// count at threshold `t` is the cumulative count of bins whose left
    /// edge is strictly below `t`.
    pub fn scan_hists(&self, hists: &LayerHistograms) -> Result<InefficiencyCurve> {
        let thresholds = self.thresholds();
        let n = hists.entries(N_LAYERS - 1);
        let edges = hists.bin_edges();
        let mut inefficiency: [Vec<f64>; N_LAYERS] = Default::default();
        let mut uncertainty: [Vec<f64>; N_LAYERS] = Default::default();

        for rank in 0..N_LAYERS {
            let counts = hists.counts(rank);
            for &thres in &thresholds {
                let k: f64 = counts
                    .iter()
                    .zip(&edges)
                    .filter(|&(_, &left)| left < thres)
                    .map(|(&c, _)| c)
                    .sum();
                inefficiency[rank].push(Self::ineff(k, n));
                uncertainty[rank].push(self.ineff_err(k, n)?);
            }
        }
        Ok(InefficiencyCurve { thresholds, inefficiency, uncertainty })
    }
}
