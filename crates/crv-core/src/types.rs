//! Common data types for the CRV aging analysis.

use serde::{Deserialize, Serialize};

/// Event-identifying integers, passed through the pipeline untouched.
///
/// Serde names match the readout-file branch names so records deserialize
/// directly from ingested tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventId {
    /// Run number
    #[serde(rename = "runNumber")]
    pub run: u32,

    /// Subrun number
    #[serde(rename = "subrunNumber")]
    pub subrun: u32,

    /// Spill number within the subrun
    #[serde(rename = "spillNumber")]
    pub spill: u32,

    /// Event number within the spill
    #[serde(rename = "eventNumber")]
    pub event: u32,
}

impl EventId {
    /// Create a new event identifier.
    pub fn new(run: u32, subrun: u32, spill: u32, event: u32) -> Self {
        Self { run, subrun, spill, event }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} subrun {} spill {} event {}", self.run, self.subrun, self.spill, self.event)
    }
}
