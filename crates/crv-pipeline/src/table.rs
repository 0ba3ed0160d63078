//! In-memory event table: raw readout grids plus derived per-event fields.
//!
//! The table is the unit of work for every pipeline stage. Stages take a
//! table by value and return a new one with fields added or events
//! filtered; nothing is mutated behind the caller's back. Filters always
//! preserve event order.

use crv_core::{Error, EventId, Result};

/// Number of front-end boards per event.
pub const N_BOARDS: usize = 8;
/// Number of channels per board.
pub const N_CHANNELS: usize = 64;
/// Number of layers per module.
pub const N_LAYERS: usize = 4;
/// Number of channels per layer after remapping.
pub const N_CHANNELS_PER_LAYER: usize = 32;

/// Detector module with its own channel-to-layer mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleKind {
    /// L-end module (boards 6-7, direct reshape)
    LEnd,
    /// Test module (boards 2-3, optionally summed with 4-5)
    T,
    /// DS module (boards 0-1, interleave with channel reversal)
    Ds,
}

impl std::fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModuleKind::LEnd => write!(f, "L-end"),
            ModuleKind::T => write!(f, "T"),
            ModuleKind::Ds => write!(f, "DS"),
        }
    }
}

/// Raw per-event amplitude grid: temperature-corrected photoelectron
/// counts, board-major. Immutable once read; negative values are readout
/// noise, never a valid measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct PeGrid {
    values: [[f64; N_CHANNELS]; N_BOARDS],
}

impl PeGrid {
    /// Wrap a fully materialized grid.
    pub fn new(values: [[f64; N_CHANNELS]; N_BOARDS]) -> Self {
        Self { values }
    }

    /// Grid with every channel set to `value`. Handy for fixtures.
    pub fn uniform(value: f64) -> Self {
        Self { values: [[value; N_CHANNELS]; N_BOARDS] }
    }

    /// Build a grid from row vectors, validating the 8x64 shape.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        if rows.len() != N_BOARDS {
            return Err(Error::Validation(format!(
                "raw grid must have {} boards, got {}",
                N_BOARDS,
                rows.len()
            )));
        }
        let mut values = [[0.0; N_CHANNELS]; N_BOARDS];
        for (b, row) in rows.iter().enumerate() {
            if row.len() != N_CHANNELS {
                return Err(Error::Validation(format!(
                    "board {} must have {} channels, got {}",
                    b,
                    N_CHANNELS,
                    row.len()
                )));
            }
            values[b].copy_from_slice(row);
        }
        Ok(Self { values })
    }

    /// Value at (board, channel).
    pub fn channel(&self, board: usize, channel: usize) -> f64 {
        self.values[board][channel]
    }

    /// All 64 channels of one board.
    pub fn board(&self, board: usize) -> &[f64; N_CHANNELS] {
        &self.values[board]
    }

    /// Mutable channel access, for fixture construction.
    pub fn channel_mut(&mut self, board: usize, channel: usize) -> &mut f64 {
        &mut self.values[board][channel]
    }

    /// Whether any channel on any board is negative.
    pub fn has_negative(&self) -> bool {
        self.values.iter().flatten().any(|&v| v < 0.0)
    }

    /// Number of channel slots with a value above zero, over all boards.
    pub fn hit_count(&self) -> usize {
        self.values.iter().flatten().filter(|&&v| v > 0.0).count()
    }
}

/// Remapped per-module grid: 4 layers of 32 channels. A `None` channel is
/// fiducially masked and excluded (not zero) from every aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGrid {
    channels: [[Option<f64>; N_CHANNELS_PER_LAYER]; N_LAYERS],
}

impl LayerGrid {
    /// Build an unmasked grid from dense layer rows.
    pub fn from_layers(layers: [[f64; N_CHANNELS_PER_LAYER]; N_LAYERS]) -> Self {
        let mut channels = [[None; N_CHANNELS_PER_LAYER]; N_LAYERS];
        for (l, row) in layers.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                channels[l][c] = Some(v);
            }
        }
        Self { channels }
    }

    /// One layer of 32 (possibly masked) channels.
    pub fn layer(&self, layer: usize) -> &[Option<f64>; N_CHANNELS_PER_LAYER] {
        &self.channels[layer]
    }

    /// Sum of unmasked channels in one layer. Masked channels are
    /// skipped, not coerced to zero.
    pub fn layer_sum(&self, layer: usize) -> f64 {
        self.channels[layer].iter().flatten().sum()
    }

    /// Per-layer sums.
    pub fn layer_sums(&self) -> [f64; N_LAYERS] {
        std::array::from_fn(|l| self.layer_sum(l))
    }

    /// Sum over all unmasked channels of all layers.
    pub fn total(&self) -> f64 {
        (0..N_LAYERS).map(|l| self.layer_sum(l)).sum()
    }

    /// Mask every channel outside `[lo, hi]` (inclusive) in every layer.
    pub fn mask_outside(&mut self, lo: usize, hi: usize) {
        for row in &mut self.channels {
            for (c, v) in row.iter_mut().enumerate() {
                if c < lo || c > hi {
                    *v = None;
                }
            }
        }
    }
}

/// One event: raw grid, identifiers, and the derived fields stages attach.
#[derive(Debug, Clone)]
pub struct Event {
    /// Pass-through identifiers.
    pub id: EventId,
    /// Raw 8x64 amplitude grid.
    pub pes: PeGrid,
    /// Remapped L-end layer grid.
    pub layers_l_end: Option<LayerGrid>,
    /// Remapped T layer grid.
    pub layers_t: Option<LayerGrid>,
    /// Remapped DS layer grid.
    pub layers_ds: Option<LayerGrid>,
    /// Trigger flags, once evaluated.
    pub triggers: Option<crate::trigger::TriggerFlags>,
    /// Ascending per-layer sums of the sorted module.
    pub sorted_layer_sums: Option<[f64; N_LAYERS]>,
}

impl Event {
    /// New event with no derived fields.
    pub fn new(id: EventId, pes: PeGrid) -> Self {
        Self {
            id,
            pes,
            layers_l_end: None,
            layers_t: None,
            layers_ds: None,
            triggers: None,
            sorted_layer_sums: None,
        }
    }

    /// The remapped grid for a module, if attached.
    pub fn layers(&self, module: ModuleKind) -> Option<&LayerGrid> {
        match module {
            ModuleKind::LEnd => self.layers_l_end.as_ref(),
            ModuleKind::T => self.layers_t.as_ref(),
            ModuleKind::Ds => self.layers_ds.as_ref(),
        }
    }
}

/// Ordered sequence of events. Filtering keeps order and never reorders.
#[derive(Debug, Clone, Default)]
pub struct EventTable {
    events: Vec<Event>,
}

impl EventTable {
    /// Table over the given events, in order.
    pub fn new(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Events in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate events in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Append one event.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Keep events satisfying `pred`, preserving order. Returns the
    /// filtered table and the number of removed events.
    pub fn filter(self, pred: impl Fn(&Event) -> bool) -> (Self, usize) {
        let n_before = self.events.len();
        let events: Vec<Event> = self.events.into_iter().filter(|e| pred(e)).collect();
        let n_removed = n_before - events.len();
        (Self { events }, n_removed)
    }

    /// Transform every event in place, preserving order.
    pub fn map(self, f: impl Fn(Event) -> Event) -> Self {
        Self { events: self.events.into_iter().map(f).collect() }
    }

    /// Concatenate tables, keeping each table's events contiguous.
    pub fn concat(tables: impl IntoIterator<Item = EventTable>) -> Self {
        let mut events = Vec::new();
        for t in tables {
            events.extend(t.events);
        }
        Self { events }
    }
}

impl IntoIterator for EventTable {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pe_grid_from_rows_shape_checks() {
        let rows = vec![vec![0.0; N_CHANNELS]; N_BOARDS];
        assert!(PeGrid::from_rows(&rows).is_ok());

        let short = vec![vec![0.0; N_CHANNELS]; N_BOARDS - 1];
        assert!(PeGrid::from_rows(&short).is_err());

        let mut ragged = vec![vec![0.0; N_CHANNELS]; N_BOARDS];
        ragged[3].pop();
        assert!(PeGrid::from_rows(&ragged).is_err());
    }

    #[test]
    fn test_pe_grid_negative_and_hits() {
        let mut grid = PeGrid::uniform(0.0);
        assert!(!grid.has_negative());
        assert_eq!(grid.hit_count(), 0);

        *grid.channel_mut(2, 10) = 5.0;
        *grid.channel_mut(7, 63) = -0.5;
        assert!(grid.has_negative());
        assert_eq!(grid.hit_count(), 1);
    }

    #[test]
    fn test_layer_sum_skips_masked_channels() {
        let mut layers = [[0.0; N_CHANNELS_PER_LAYER]; N_LAYERS];
        layers[0][12] = 5.0;
        layers[0][0] = -3.0; // outside fiducial region
        let mut grid = LayerGrid::from_layers(layers);
        assert!((grid.layer_sum(0) - 2.0).abs() < 1e-12);

        grid.mask_outside(12, 19);
        // The -3 at channel 0 is masked out, not zeroed; the sum must be
        // exactly the one surviving channel.
        assert!((grid.layer_sum(0) - 5.0).abs() < 1e-12);
        assert_eq!(grid.layer(0)[0], None);
        assert_eq!(grid.layer(0)[12], Some(5.0));
    }

    #[test]
    fn test_filter_preserves_order() {
        let events: Vec<Event> = (0..6)
            .map(|i| Event::new(EventId::new(1, 0, 0, i), PeGrid::uniform(i as f64)))
            .collect();
        let table = EventTable::new(events);
        let (kept, removed) = table.filter(|e| e.id.event % 2 == 0);
        assert_eq!(removed, 3);
        let ids: Vec<u32> = kept.iter().map(|e| e.id.event).collect();
        assert_eq!(ids, vec![0, 2, 4]);
    }
}
