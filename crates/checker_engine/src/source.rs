use std::io;
use std::path::Path;

use checker_core::{resolve_records, InputError, InputRecord};

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read input table: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Input(#[from] InputError),
}

/// Reads a headered CSV file into records keyed by `key_column` (or the
/// first recognised handle column).
pub fn read_records(path: &Path, key_column: Option<&str>) -> Result<Vec<InputRecord>, SourceError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;
    collect_records(reader, key_column)
}

pub fn read_records_from<R: io::Read>(
    input: R,
    key_column: Option<&str>,
) -> Result<Vec<InputRecord>, SourceError> {
    let reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(input);
    collect_records(reader, key_column)
}

fn collect_records<R: io::Read>(
    mut reader: csv::Reader<R>,
    key_column: Option<&str>,
) -> Result<Vec<InputRecord>, SourceError> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let rows = reader
        .records()
        .map(|row| row.map(|cells| cells.iter().map(str::to_string).collect()))
        .collect::<Result<Vec<Vec<String>>, _>>()?;
    Ok(resolve_records(&headers, rows, key_column)?)
}
