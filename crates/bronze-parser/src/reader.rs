use csv::{ReaderBuilder, StringRecord};

use crate::errors::ParserError;
use crate::model::RawTable;

/// Cell values decoded as missing, matching the usual CSV export conventions
/// for numeric and date gaps.
const NULL_SENTINELS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null", "NaT",
];

pub fn is_null_sentinel(cell: &str) -> bool {
    let trimmed = cell.trim();
    NULL_SENTINELS.iter().any(|sentinel| *sentinel == trimmed)
}

/// Decodes a comma-separated file with a header row.
///
/// A zero-byte or header-only input produces a table without rows. Short rows
/// are padded with nulls; rows wider than the header are rejected.
pub fn read_table(table: &'static str, contents: &[u8]) -> Result<RawTable, ParserError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(contents);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|source| ParserError::Csv { table, source })?
        .iter()
        .map(|header| header.trim_start_matches('\u{feff}').to_string())
        .collect();

    if headers.iter().all(|header| header.trim().is_empty()) && !headers.is_empty() {
        return Err(ParserError::InvalidHeader {
            table,
            message: "header row has no column names".to_string(),
        });
    }

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|source| ParserError::Csv { table, source })?;
        rows.push(decode_record(table, &headers, &record, idx)?);
    }

    Ok(RawTable { headers, rows })
}

fn decode_record(
    table: &'static str,
    headers: &[String],
    record: &StringRecord,
    idx: usize,
) -> Result<Vec<Option<String>>, ParserError> {
    if record.len() > headers.len() {
        let line_index = record
            .position()
            .map(|pos| pos.line() as usize)
            .unwrap_or(idx + 2);
        return Err(ParserError::DataRow {
            table,
            line_index,
            message: format!(
                "expected at most {} fields, found {}",
                headers.len(),
                record.len()
            ),
        });
    }

    let mut cells: Vec<Option<String>> = record
        .iter()
        .map(|cell| {
            if is_null_sentinel(cell) {
                None
            } else {
                Some(cell.to_string())
            }
        })
        .collect();
    cells.resize(headers.len(), None);
    Ok(cells)
}
