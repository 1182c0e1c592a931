use serde_json::Map;

use crate::coerce::infer_scalar;
use crate::errors::ParserError;
use crate::formats::schema::LGA_CODE_PREFIX;
use crate::model::{CanonicalRow, RawTable, TableSchema, Value};
use crate::normalize::{is_storage_artifact, normalize_header};
use crate::registry::TableTransform;

/// When the LGA identifier column of a census table is located.
///
/// G01 loads check the header before reading any row. G02 loads only look the
/// column up while packaging the first row, so a header-only G02 file passes
/// even without an identifier column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierCheck {
    Upfront,
    Deferred,
}

pub fn find_identifier_column(headers: &[String], prefix: &str) -> Option<usize> {
    headers
        .iter()
        .position(|header| normalize_header(header).starts_with(prefix))
}

/// Packs every non-identifier column of a wide census row into one JSON
/// object, dropping null-valued keys.
pub fn package_wide_rows(
    raw: &RawTable,
    schema: &TableSchema,
    check: IdentifierCheck,
    source_file: &str,
) -> Result<Vec<CanonicalRow>, ParserError> {
    let identifier = find_identifier_column(&raw.headers, LGA_CODE_PREFIX);

    if check == IdentifierCheck::Upfront && identifier.is_none() {
        return Err(ParserError::MissingIdentifier {
            table: schema.table,
            column: LGA_CODE_PREFIX,
        });
    }

    let mut rows = Vec::with_capacity(raw.rows.len());
    for (row_index, cells) in raw.rows.iter().enumerate() {
        let code_index = identifier.ok_or_else(|| ParserError::DataRow {
            table: schema.table,
            line_index: row_index + 2,
            message: format!("row has no '{LGA_CODE_PREFIX}' field"),
        })?;

        let code = cells
            .get(code_index)
            .and_then(|cell| cell.as_deref())
            .map(|cell| Value::Text(cell.trim().to_string()))
            .unwrap_or(Value::Null);

        let mut payload = Map::new();
        for (idx, header) in raw.headers.iter().enumerate() {
            if idx == code_index || is_storage_artifact(&normalize_header(header)) {
                continue;
            }
            if let Some(Some(cell)) = cells.get(idx) {
                payload.insert(header.trim().to_string(), infer_scalar(cell).to_json());
            }
        }

        rows.push(CanonicalRow::new(vec![
            code,
            Value::Json(payload),
            Value::Text(source_file.to_string()),
        ]));
    }

    Ok(rows)
}

#[derive(Debug, Clone, Copy)]
pub struct CensusTransform {
    pub schema: TableSchema,
    pub check: IdentifierCheck,
}

impl TableTransform for CensusTransform {
    fn name(&self) -> &'static str {
        "census_wide"
    }

    fn schema(&self) -> TableSchema {
        self.schema
    }

    fn transform(&self, raw: &RawTable, source_file: &str) -> Result<Vec<CanonicalRow>, ParserError> {
        package_wide_rows(raw, &self.schema, self.check, source_file)
    }
}
