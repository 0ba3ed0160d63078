//! Thin ingestion collaborator: JSON event files into an [`EventTable`].
//!
//! The analysis core assumes a fully materialized table; this module is
//! the stand-in for the external file reader that produces one. Files
//! are read in parallel, a failed file is logged and skipped without
//! aborting its siblings, and surviving tables are concatenated with
//! each file's events contiguous.

use crv_core::{Error, EventId, Result};
use crv_pipeline::table::{Event, EventTable, PeGrid};
use rayon::prelude::*;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// One event record as stored in the input files.
#[derive(Debug, Deserialize)]
struct EventRecord {
    #[serde(flatten)]
    id: EventId,
    /// 8 boards of 64 temperature-corrected PE values.
    #[serde(rename = "PEsTemperatureCorrected")]
    pes: Vec<Vec<f64>>,
}

/// Read one JSON event file (an array of event records).
pub fn load_file(path: &Path) -> Result<EventTable> {
    let text = fs::read_to_string(path)?;
    let records: Vec<EventRecord> = serde_json::from_str(&text)?;
    let mut table = EventTable::default();
    for record in records {
        let grid = PeGrid::from_rows(&record.pes).map_err(|e| {
            Error::Validation(format!("{}: event {}: {e}", path.display(), record.id))
        })?;
        table.push(Event::new(record.id, grid));
    }
    Ok(table)
}

/// Read many event files in parallel and concatenate the results.
///
/// An unreadable file is skipped with a warning; only a fully failed
/// batch is an error.
pub fn load_files(paths: &[PathBuf]) -> Result<EventTable> {
    if paths.is_empty() {
        return Err(Error::Validation("no input files given".into()));
    }
    let tables: Vec<EventTable> = paths
        .par_iter()
        .filter_map(|path| match load_file(path) {
            Ok(table) => {
                tracing::info!(path = %path.display(), n_events = table.len(), "loaded event file");
                Some(table)
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable event file");
                None
            }
        })
        .collect();
    if tables.is_empty() {
        return Err(Error::Validation(format!(
            "none of the {} input files could be read",
            paths.len()
        )));
    }
    let merged = EventTable::concat(tables);
    tracing::info!(n_events = merged.len(), n_files = paths.len(), "ingest complete");
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_event_file(dir: &Path, name: &str, value: f64, n_events: usize) -> PathBuf {
        let records: Vec<serde_json::Value> = (0..n_events)
            .map(|i| {
                serde_json::json!({
                    "runNumber": 2101,
                    "subrunNumber": 0,
                    "spillNumber": 1,
                    "eventNumber": i,
                    "PEsTemperatureCorrected": vec![vec![value; 64]; 8],
                })
            })
            .collect();
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        write!(f, "{}", serde_json::Value::Array(records)).unwrap();
        path
    }

    #[test]
    fn test_load_file_parses_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_event_file(dir.path(), "a.json", 5.0, 3);
        let table = load_file(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.events()[0].id.run, 2101);
        assert_eq!(table.events()[0].pes.channel(4, 10), 5.0);
    }

    #[test]
    fn test_load_file_rejects_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"[{"runNumber":1,"subrunNumber":0,"spillNumber":0,"eventNumber":0,
                "PEsTemperatureCorrected":[[1.0,2.0]]}]"#,
        )
        .unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_load_files_skips_unreadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_event_file(dir.path(), "a.json", 1.0, 2);
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "not json").unwrap();
        let b = write_event_file(dir.path(), "b.json", 2.0, 3);

        let table = load_files(&[a, broken, b]).unwrap();
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn test_load_files_errors_when_all_fail() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        fs::write(&broken, "not json").unwrap();
        assert!(load_files(&[broken]).is_err());
        assert!(load_files(&[]).is_err());
    }
}
