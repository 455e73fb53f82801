use std::path::{Path, PathBuf};

use checker_core::{Payload, ResultEvent};

use crate::persist::{write_atomically, PersistError};

const RESULTS_HEADER: [&str; 4] = ["timestamp", "key", "status", "message"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Writes the found-set as CSV, one original row per line, in completion order.
///
/// The header is the union of all payload columns in first-seen order; a row
/// lacking a column gets an empty cell. An empty found-set yields an empty file.
pub fn export_found(path: &Path, payloads: &[Payload]) -> Result<ExportSummary, ExportError> {
    let columns = stable_columns(payloads);

    let mut writer = csv::Writer::from_writer(Vec::new());
    if !columns.is_empty() {
        writer.write_record(&columns)?;
    }
    for payload in payloads {
        writer.write_record(columns.iter().map(|column| payload.get(column).unwrap_or("")))?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    write_atomically(path, &bytes)?;

    Ok(ExportSummary {
        rows: payloads.len(),
        columns,
        path: path.to_path_buf(),
    })
}

/// Writes the results log (most recent first) as CSV.
pub fn export_results(path: &Path, events: &[ResultEvent]) -> Result<ExportSummary, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(RESULTS_HEADER)?;
    for event in events {
        writer.write_record([
            event.timestamp.to_rfc3339(),
            event.key.clone().unwrap_or_default(),
            event.status.to_string(),
            event.message.clone(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    write_atomically(path, &bytes)?;

    Ok(ExportSummary {
        rows: events.len(),
        columns: RESULTS_HEADER.iter().map(|c| c.to_string()).collect(),
        path: path.to_path_buf(),
    })
}

fn stable_columns(payloads: &[Payload]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for payload in payloads {
        for column in payload.columns() {
            if !columns.iter().any(|known| known == column) {
                columns.push(column.to_string());
            }
        }
    }
    columns
}
