use crate::coerce::coerce_cell;
use crate::formats::schema::{ColumnAlias, SOURCE_FILE_COLUMN};
use crate::model::{CanonicalRow, RawTable, TableSchema, Value};

/// Where a canonical column takes its values from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Read from the input column at this index.
    Input(usize),
    /// Read from an aliased input column at this index.
    Alias { index: usize, alias: &'static str },
    /// Absent from the input; filled with nulls.
    Missing,
    /// Stamped with the source file identifier.
    SourceFile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnPlan {
    pub sources: Vec<ColumnSource>,
    /// Normalized names of input columns that do not reach the output.
    pub dropped: Vec<String>,
}

impl ColumnPlan {
    pub fn missing(&self, schema: &TableSchema) -> Vec<&'static str> {
        schema
            .columns
            .iter()
            .zip(&self.sources)
            .filter(|(_, source)| **source == ColumnSource::Missing)
            .map(|(column, _)| column.name)
            .collect()
    }
}

pub fn normalize_header(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Index columns written by dataframe exports, and blank header cells.
pub fn is_storage_artifact(normalized: &str) -> bool {
    normalized.is_empty() || normalized.starts_with("unnamed")
}

/// Maps the columns of an input file onto a table's canonical column set.
pub fn reconcile_columns(
    actual: &[String],
    schema: &TableSchema,
    aliases: &[ColumnAlias],
) -> ColumnPlan {
    let normalized: Vec<String> = actual.iter().map(|name| normalize_header(name)).collect();

    let find = |name: &str| {
        normalized
            .iter()
            .position(|candidate| !is_storage_artifact(candidate) && candidate == name)
    };

    let sources: Vec<ColumnSource> = schema
        .columns
        .iter()
        .map(|column| {
            if column.name == SOURCE_FILE_COLUMN {
                return ColumnSource::SourceFile;
            }
            if let Some(index) = find(column.name) {
                return ColumnSource::Input(index);
            }
            aliases
                .iter()
                .filter(|alias| alias.canonical == column.name)
                .find_map(|alias| {
                    find(alias.alias).map(|index| ColumnSource::Alias {
                        index,
                        alias: alias.alias,
                    })
                })
                .unwrap_or(ColumnSource::Missing)
        })
        .collect();

    let used: Vec<usize> = sources
        .iter()
        .filter_map(|source| match source {
            ColumnSource::Input(index) | ColumnSource::Alias { index, .. } => Some(*index),
            ColumnSource::Missing | ColumnSource::SourceFile => None,
        })
        .collect();

    let dropped = normalized
        .iter()
        .enumerate()
        .filter(|(idx, _)| !used.contains(idx))
        .map(|(_, name)| name.clone())
        .collect();

    ColumnPlan { sources, dropped }
}

/// Produces canonical rows for a fixed-schema table, stamping every row with
/// `source_file`.
pub fn normalize_table(
    raw: &RawTable,
    schema: &TableSchema,
    aliases: &[ColumnAlias],
    source_file: &str,
) -> Vec<CanonicalRow> {
    let plan = reconcile_columns(&raw.headers, schema, aliases);

    raw.rows
        .iter()
        .map(|cells| {
            let values = schema
                .columns
                .iter()
                .zip(&plan.sources)
                .map(|(column, source)| match source {
                    ColumnSource::Input(index) | ColumnSource::Alias { index, .. } => {
                        let cell = cells.get(*index).and_then(|cell| cell.as_deref());
                        coerce_cell(column.kind, cell)
                    }
                    ColumnSource::Missing => Value::Null,
                    ColumnSource::SourceFile => Value::Text(source_file.to_string()),
                })
                .collect();
            CanonicalRow::new(values)
        })
        .collect()
}
