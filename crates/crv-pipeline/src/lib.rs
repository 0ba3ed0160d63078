//! CRV aging analysis core.
//!
//! Event-level transformation and statistics pipeline for a segmented
//! cosmic-ray veto instrument: per-channel readout is remapped into
//! physical detector layers for three module geometries, quality- and
//! fiducially-filtered, turned into trigger decisions, reduced to sorted
//! per-layer sums, and swept over a threshold grid to estimate the
//! layer-coincidence inefficiency with Wilson-interval uncertainties.
//!
//! Stages are pure transformations over an in-memory [`table::EventTable`]:
//! each takes a table and returns a new one with fields added or events
//! filtered, so composition order is explicit and testable. File ingestion
//! and plotting are external collaborators.

pub mod clean;
pub mod cuts;
pub mod hist;
pub mod pipeline;
pub mod remap;
pub mod scan;
pub mod sort;
pub mod stats;
pub mod table;
pub mod trigger;

pub use cuts::{CutEngine, CutReport};
pub use hist::LayerHistograms;
pub use pipeline::{run, PipelineConfig, PipelineSummary};
pub use remap::{map_all, remap, LayerMismatch, TReadout};
pub use scan::{InefficiencyCurve, InefficiencyScanner};
pub use table::{Event, EventTable, LayerGrid, ModuleKind, PeGrid};
pub use trigger::{TriggerFlags, TriggerReport};
