//! Core types and errors for the CRV aging analysis.
//!
//! This crate holds the pieces shared by every other crate in the
//! workspace: the error/result types and the event-identifying record.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::EventId;
