use crate::{InputRecord, Payload};

/// Header names tried, in order, when no key column is given.
const KEY_COLUMN_CANDIDATES: &[&str] = &["username", "user", "handle", "account", "login"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("input has no header row")]
    NoHeaders,
    #[error("key column {0:?} not found in input headers")]
    UnknownKeyColumn(String),
    #[error("input contains no usable records")]
    NoUsableRecords,
}

/// Turns a header row plus data rows into checkable records.
///
/// Rows whose key cell is blank are dropped. Short rows are padded so every
/// payload carries every header; extra cells beyond the header are ignored.
pub fn resolve_records(
    headers: &[String],
    rows: Vec<Vec<String>>,
    key_column: Option<&str>,
) -> Result<Vec<InputRecord>, InputError> {
    if headers.is_empty() {
        return Err(InputError::NoHeaders);
    }
    let key_index = key_column_index(headers, key_column)?;

    let records: Vec<InputRecord> = rows
        .into_iter()
        .filter_map(|row| {
            let key = row.get(key_index).map(|cell| normalize_key(cell))?;
            if key.is_empty() {
                return None;
            }
            let payload = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    (
                        header.clone(),
                        row.get(i).cloned().unwrap_or_default(),
                    )
                })
                .collect::<Payload>();
            Some(InputRecord::new(key, payload))
        })
        .collect();

    if records.is_empty() {
        return Err(InputError::NoUsableRecords);
    }
    Ok(records)
}

fn key_column_index(headers: &[String], key_column: Option<&str>) -> Result<usize, InputError> {
    let position = |wanted: &str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(wanted.trim()))
    };

    if let Some(name) = key_column {
        return position(name).ok_or_else(|| InputError::UnknownKeyColumn(name.to_string()));
    }
    Ok(KEY_COLUMN_CANDIDATES
        .iter()
        .find_map(|candidate| position(candidate))
        .unwrap_or(0))
}

/// Trims whitespace and a leading `@` from a handle.
pub fn normalize_key(raw: &str) -> String {
    raw.trim().trim_start_matches('@').trim().to_string()
}
