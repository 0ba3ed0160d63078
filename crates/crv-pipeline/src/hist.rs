//! Fixed-binning histograms of sorted layer sums.
//!
//! One histogram per sort rank, accumulating across tables so a run split
//! over many files can be scanned without keeping every event in memory.
//! Binning is uniform over `[lo, hi]`; values outside the range are
//! dropped and a value exactly at the upper bound lands in the last bin.

use crate::table::{EventTable, N_LAYERS};
use crv_core::{Error, Result};
use serde::Serialize;

/// Default number of bins.
pub const DEFAULT_NBINS: usize = 100;
/// Default histogram range in PEs.
pub const DEFAULT_RANGE: (f64, f64) = (0.0, 500.0);

/// Per-rank histograms of sorted layer sums.
#[derive(Debug, Clone, Serialize)]
pub struct LayerHistograms {
    nbins: usize,
    lo: f64,
    hi: f64,
    counts: [Vec<f64>; N_LAYERS],
    n_fills: usize,
}

impl LayerHistograms {
    /// Empty histograms with `nbins` uniform bins over `range`.
    pub fn new(nbins: usize, range: (f64, f64)) -> Result<Self> {
        let (lo, hi) = range;
        if nbins == 0 {
            return Err(Error::Validation("histogram requires at least 1 bin".into()));
        }
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(Error::Validation(format!(
                "invalid histogram range: expected lo < hi, got ({lo}, {hi})"
            )));
        }
        Ok(Self {
            nbins,
            lo,
            hi,
            counts: std::array::from_fn(|_| vec![0.0; nbins]),
            n_fills: 0,
        })
    }

    /// Histograms with the default binning.
    pub fn with_defaults() -> Self {
        // Constructed from validated constants.
        Self::new(DEFAULT_NBINS, DEFAULT_RANGE).expect("default binning is valid")
    }

    fn bin_index(&self, value: f64) -> Option<usize> {
        if !value.is_finite() || value < self.lo || value > self.hi {
            return None;
        }
        let width = (self.hi - self.lo) / self.nbins as f64;
        let idx = ((value - self.lo) / width) as usize;
        Some(idx.min(self.nbins - 1))
    }

    /// Fill every rank's histogram from the table's sorted layer sums.
    ///
    /// Counts accumulate across calls. Requires the sorted sums; a table
    /// without them is a configuration error.
    pub fn accumulate(&mut self, table: &EventTable) -> Result<()> {
        if table.iter().any(|e| e.sorted_layer_sums.is_none()) {
            return Err(Error::Validation(
                "histogram accumulation requires sorted layer sums; run the sorter first".into(),
            ));
        }
        for event in table.iter() {
            let sums = event.sorted_layer_sums.expect("checked above");
            for (rank, &value) in sums.iter().enumerate() {
                if let Some(bin) = self.bin_index(value) {
                    self.counts[rank][bin] += 1.0;
                }
            }
        }
        self.n_fills += 1;
        Ok(())
    }

    /// Bin counts for one sort rank.
    pub fn counts(&self, rank: usize) -> &[f64] {
        &self.counts[rank]
    }

    /// Total entries in one rank's histogram.
    pub fn entries(&self, rank: usize) -> f64 {
        self.counts[rank].iter().sum()
    }

    /// Bin edges, `nbins + 1` values from `lo` to `hi`.
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = (self.hi - self.lo) / self.nbins as f64;
        (0..=self.nbins).map(|i| self.lo + i as f64 * width).collect()
    }

    /// Number of accumulate calls so far.
    pub fn n_fills(&self) -> usize {
        self.n_fills
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Event, PeGrid};
    use crv_core::EventId;

    fn table_with_sorted(sums: &[[f64; N_LAYERS]]) -> EventTable {
        let events = sums
            .iter()
            .map(|&s| {
                let mut e = Event::new(EventId::default(), PeGrid::uniform(0.0));
                e.sorted_layer_sums = Some(s);
                e
            })
            .collect();
        EventTable::new(events)
    }

    #[test]
    fn test_binning_and_edges() {
        let hists = LayerHistograms::new(10, (0.0, 100.0)).unwrap();
        assert_eq!(hists.bin_index(0.0), Some(0));
        assert_eq!(hists.bin_index(9.999), Some(0));
        assert_eq!(hists.bin_index(10.0), Some(1));
        // Right edge goes into the last bin.
        assert_eq!(hists.bin_index(100.0), Some(9));
        assert_eq!(hists.bin_index(100.1), None);
        assert_eq!(hists.bin_index(-0.1), None);

        let edges = hists.bin_edges();
        assert_eq!(edges.len(), 11);
        assert!((edges[0] - 0.0).abs() < 1e-12);
        assert!((edges[10] - 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_accumulate_across_tables() {
        let mut hists = LayerHistograms::new(10, (0.0, 100.0)).unwrap();
        let t1 = table_with_sorted(&[[5.0, 15.0, 25.0, 35.0]]);
        let t2 = table_with_sorted(&[[5.0, 15.0, 25.0, 95.0]]);
        hists.accumulate(&t1).unwrap();
        hists.accumulate(&t2).unwrap();
        assert_eq!(hists.n_fills(), 2);
        assert_eq!(hists.counts(0)[0], 2.0);
        assert_eq!(hists.counts(1)[1], 2.0);
        assert_eq!(hists.counts(3)[3], 1.0);
        assert_eq!(hists.counts(3)[9], 1.0);
        assert_eq!(hists.entries(3), 2.0);
    }

    #[test]
    fn test_requires_sorted_sums() {
        let mut hists = LayerHistograms::with_defaults();
        let table = EventTable::new(vec![Event::new(EventId::default(), PeGrid::uniform(0.0))]);
        assert!(hists.accumulate(&table).is_err());
    }

    #[test]
    fn test_invalid_binning_rejected() {
        assert!(LayerHistograms::new(0, (0.0, 1.0)).is_err());
        assert!(LayerHistograms::new(10, (1.0, 1.0)).is_err());
        assert!(LayerHistograms::new(10, (2.0, 1.0)).is_err());
    }
}
