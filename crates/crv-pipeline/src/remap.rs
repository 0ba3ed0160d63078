//! Channel-to-layer remapping for the three module geometries.
//!
//! Every module reduces to the same contract: the raw 8x64 board grid
//! becomes a 4x32 layer grid, but each geometry gets there with its own
//! index arithmetic:
//!
//! - L-end: boards 6-7 split into 32-channel halves (pure reindexing).
//! - T: boards 2-3 likewise; in double-ended readout the mirror boards
//!   4-5 are summed in elementwise first and then split.
//! - DS: each layer is 16 channels of board 1 followed by the matching
//!   16 channels of board 0 in reversed order.
//!
//! A self-check mode reconstructs each layer by direct slicing and
//! compares against the bulk remap. Bulk and manual are mathematically
//! required to agree, so a mismatch is an implementation bug; it is
//! reported per layer and returned as a diagnostic, never a hard failure.

use crate::table::{
    EventTable, LayerGrid, ModuleKind, PeGrid, N_CHANNELS, N_CHANNELS_PER_LAYER, N_LAYERS,
};

/// T-module readout mode. Only meaningful for [`ModuleKind::T`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TReadout {
    /// Boards 2-3 only.
    SingleEnded,
    /// Boards 2-3 summed elementwise with mirror boards 4-5.
    DoubleEnded,
}

/// A bulk-vs-manual disagreement for one layer of one event.
#[derive(Debug, Clone)]
pub struct LayerMismatch {
    /// Module whose remap disagreed.
    pub module: ModuleKind,
    /// Index of the event within the table.
    pub event_index: usize,
    /// Layer index (0..4).
    pub layer: usize,
    /// Manually reconstructed channel values.
    pub expected: Vec<f64>,
    /// Bulk-remapped channel values.
    pub actual: Vec<f64>,
}

type LayerRows = [[f64; N_CHANNELS_PER_LAYER]; N_LAYERS];

/// Remap one event's raw grid into a module's 4x32 layer grid.
pub fn remap(pes: &PeGrid, module: ModuleKind, readout: TReadout) -> LayerGrid {
    LayerGrid::from_layers(bulk_rows(pes, module, readout))
}

/// Bulk remap via flat index arithmetic (the reshape path).
fn bulk_rows(pes: &PeGrid, module: ModuleKind, readout: TReadout) -> LayerRows {
    match (module, readout) {
        (ModuleKind::LEnd, _) => bulk_split_boards(pes.board(6), pes.board(7)),
        (ModuleKind::T, TReadout::SingleEnded) => bulk_split_boards(pes.board(2), pes.board(3)),
        (ModuleKind::T, TReadout::DoubleEnded) => {
            let near = board_sum(pes.board(2), pes.board(4));
            let far = board_sum(pes.board(3), pes.board(5));
            bulk_split_boards(&near, &far)
        }
        (ModuleKind::Ds, _) => bulk_ds(pes),
    }
}

/// Two 64-channel boards concatenated and reshaped into 4 layers of 32.
fn bulk_split_boards(lo: &[f64; N_CHANNELS], hi: &[f64; N_CHANNELS]) -> LayerRows {
    let mut rows = [[0.0; N_CHANNELS_PER_LAYER]; N_LAYERS];
    for flat in 0..(2 * N_CHANNELS) {
        let v = if flat < N_CHANNELS { lo[flat] } else { hi[flat - N_CHANNELS] };
        rows[flat / N_CHANNELS_PER_LAYER][flat % N_CHANNELS_PER_LAYER] = v;
    }
    rows
}

fn board_sum(a: &[f64; N_CHANNELS], b: &[f64; N_CHANNELS]) -> [f64; N_CHANNELS] {
    std::array::from_fn(|c| a[c] + b[c])
}

/// DS interleave: one flat 128-channel concatenation, then reshape.
///
/// For layer `k`, board 1 channels `[16k, 16k+16)` are followed by board
/// 0 channels `16k+15` down to `16k`.
fn bulk_ds(pes: &PeGrid) -> LayerRows {
    let mut flat = Vec::with_capacity(N_LAYERS * N_CHANNELS_PER_LAYER);
    for k in 0..N_LAYERS {
        let base = 16 * k;
        flat.extend_from_slice(&pes.board(1)[base..base + 16]);
        flat.extend(pes.board(0)[base..base + 16].iter().rev());
    }
    let mut rows = [[0.0; N_CHANNELS_PER_LAYER]; N_LAYERS];
    for (i, chunk) in flat.chunks_exact(N_CHANNELS_PER_LAYER).enumerate() {
        rows[i].copy_from_slice(chunk);
    }
    rows
}

/// Manual per-layer reconstruction by direct slicing, used by the
/// self-check to cross-validate the bulk path.
fn manual_rows(pes: &PeGrid, module: ModuleKind, readout: TReadout) -> LayerRows {
    let mut rows = [[0.0; N_CHANNELS_PER_LAYER]; N_LAYERS];
    match (module, readout) {
        (ModuleKind::LEnd, _) => {
            for layer in 0..N_LAYERS {
                let board = 6 + layer / 2;
                let offset = (layer % 2) * N_CHANNELS_PER_LAYER;
                for c in 0..N_CHANNELS_PER_LAYER {
                    rows[layer][c] = pes.channel(board, offset + c);
                }
            }
        }
        (ModuleKind::T, TReadout::SingleEnded) => {
            for layer in 0..N_LAYERS {
                let board = 2 + layer / 2;
                let offset = (layer % 2) * N_CHANNELS_PER_LAYER;
                for c in 0..N_CHANNELS_PER_LAYER {
                    rows[layer][c] = pes.channel(board, offset + c);
                }
            }
        }
        (ModuleKind::T, TReadout::DoubleEnded) => {
            for layer in 0..N_LAYERS {
                let (board, mirror) = if layer < 2 { (2, 4) } else { (3, 5) };
                let offset = (layer % 2) * N_CHANNELS_PER_LAYER;
                for c in 0..N_CHANNELS_PER_LAYER {
                    rows[layer][c] =
                        pes.channel(board, offset + c) + pes.channel(mirror, offset + c);
                }
            }
        }
        (ModuleKind::Ds, _) => {
            for layer in 0..N_LAYERS {
                let base = 16 * layer;
                for c in 0..16 {
                    rows[layer][c] = pes.channel(1, base + c);
                    rows[layer][16 + c] = pes.channel(0, base + 15 - c);
                }
            }
        }
    }
    rows
}

/// Compare bulk and manual remaps for one event, one mismatch per
/// disagreeing layer.
fn check_event(
    pes: &PeGrid,
    module: ModuleKind,
    readout: TReadout,
    event_index: usize,
) -> Vec<LayerMismatch> {
    let bulk = bulk_rows(pes, module, readout);
    let manual = manual_rows(pes, module, readout);
    let mut mismatches = Vec::new();
    for layer in 0..N_LAYERS {
        if bulk[layer] != manual[layer] {
            tracing::warn!(
                module = %module,
                event_index,
                layer,
                "bulk remap disagrees with manual layer reconstruction"
            );
            mismatches.push(LayerMismatch {
                module,
                event_index,
                layer,
                expected: manual[layer].to_vec(),
                actual: bulk[layer].to_vec(),
            });
        }
    }
    mismatches
}

/// Attach all three module layer grids to every event.
///
/// With `self_check` enabled every remap is cross-validated against the
/// manual reconstruction; diagnostics are returned alongside the table
/// and never abort processing.
pub fn map_all(
    table: EventTable,
    readout: TReadout,
    self_check: bool,
) -> (EventTable, Vec<LayerMismatch>) {
    let mut mismatches = Vec::new();
    let mut events = Vec::with_capacity(table.len());
    for (i, mut event) in table.into_iter().enumerate() {
        if self_check {
            for module in [ModuleKind::LEnd, ModuleKind::T, ModuleKind::Ds] {
                mismatches.extend(check_event(&event.pes, module, readout, i));
            }
        }
        event.layers_l_end = Some(remap(&event.pes, ModuleKind::LEnd, readout));
        event.layers_t = Some(remap(&event.pes, ModuleKind::T, readout));
        event.layers_ds = Some(remap(&event.pes, ModuleKind::Ds, readout));
        events.push(event);
    }
    (EventTable::new(events), mismatches)
}
