use crate::errors::ParserError;
use crate::formats::census::find_identifier_column;
use crate::formats::schema::{LGA_CODE_PREFIX, LGA_CODE_SCHEMA, LGA_NAME_PREFIX, LGA_SUBURB_SCHEMA};
use crate::model::{CanonicalRow, RawTable, TableSchema, Value};
use crate::normalize::{is_storage_artifact, normalize_header};
use crate::registry::TableTransform;

fn text_cell(cells: &[Option<String>], index: usize) -> Value {
    cells
        .get(index)
        .and_then(|cell| cell.as_deref())
        .map_or(Value::Null, |cell| Value::Text(cell.trim().to_string()))
}

fn build_rows(
    raw: &RawTable,
    first: usize,
    second: usize,
    source_file: &str,
) -> Vec<CanonicalRow> {
    raw.rows
        .iter()
        .map(|cells| {
            CanonicalRow::new(vec![
                text_cell(cells, first),
                text_cell(cells, second),
                Value::Text(source_file.to_string()),
            ])
        })
        .collect()
}

/// Code → name pairs from the columns starting `lga_code` and `lga_name`.
pub fn reconcile_lga_codes(
    raw: &RawTable,
    source_file: &str,
) -> Result<Vec<CanonicalRow>, ParserError> {
    let missing = |column| ParserError::MissingIdentifier {
        table: LGA_CODE_SCHEMA.table,
        column,
    };
    let code = find_identifier_column(&raw.headers, LGA_CODE_PREFIX)
        .ok_or_else(|| missing(LGA_CODE_PREFIX))?;
    let name = find_identifier_column(&raw.headers, LGA_NAME_PREFIX)
        .ok_or_else(|| missing(LGA_NAME_PREFIX))?;

    Ok(build_rows(raw, code, name, source_file))
}

/// Name → suburb pairs. The LGA column is any header mentioning both `lga`
/// and `name`; the suburb column is any header mentioning `suburb`.
pub fn reconcile_lga_suburbs(
    raw: &RawTable,
    source_file: &str,
) -> Result<Vec<CanonicalRow>, ParserError> {
    let mut lga_name = None;
    let mut suburb_name = None;

    for (idx, header) in raw.headers.iter().enumerate() {
        let lower = normalize_header(header);
        if is_storage_artifact(&lower) {
            continue;
        }
        if lower.contains("lga") && lower.contains("name") {
            lga_name.get_or_insert(idx);
        } else if lower.contains("suburb") {
            suburb_name.get_or_insert(idx);
        }
    }

    let missing = |column| ParserError::MissingIdentifier {
        table: LGA_SUBURB_SCHEMA.table,
        column,
    };
    let lga_name = lga_name.ok_or_else(|| missing("lga_name"))?;
    let suburb_name = suburb_name.ok_or_else(|| missing("suburb_name"))?;

    Ok(build_rows(raw, lga_name, suburb_name, source_file))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LgaCodeTransform;

impl TableTransform for LgaCodeTransform {
    fn name(&self) -> &'static str {
        "lga_code"
    }

    fn schema(&self) -> TableSchema {
        LGA_CODE_SCHEMA
    }

    fn transform(&self, raw: &RawTable, source_file: &str) -> Result<Vec<CanonicalRow>, ParserError> {
        reconcile_lga_codes(raw, source_file)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LgaSuburbTransform;

impl TableTransform for LgaSuburbTransform {
    fn name(&self) -> &'static str {
        "lga_suburb"
    }

    fn schema(&self) -> TableSchema {
        LGA_SUBURB_SCHEMA
    }

    fn transform(&self, raw: &RawTable, source_file: &str) -> Result<Vec<CanonicalRow>, ParserError> {
        reconcile_lga_suburbs(raw, source_file)
    }
}
