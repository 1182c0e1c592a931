use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("{table} CSV error: {source}")]
    Csv {
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{table} header row invalid: {message}")]
    InvalidHeader {
        table: &'static str,
        message: String,
    },

    #[error("{table} line {line_index} invalid: {message}")]
    DataRow {
        table: &'static str,
        /// 1-based file line; the header is line 1.
        line_index: usize,
        message: String,
    },

    #[error("{table} has no column matching '{column}'")]
    MissingIdentifier {
        table: &'static str,
        column: &'static str,
    },

    #[error("{table} row width {found} does not match the {expected} canonical columns")]
    SchemaMismatch {
        table: &'static str,
        expected: usize,
        found: usize,
    },
}
