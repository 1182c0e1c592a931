use crate::errors::ParserError;
use crate::formats::schema::{LISTINGS_SCHEMA, LISTING_ALIASES};
use crate::model::{CanonicalRow, RawTable, TableSchema};
use crate::normalize::normalize_table;
use crate::registry::TableTransform;

/// Fixed-schema transform for airbnb listing exports.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListingsTransform;

impl TableTransform for ListingsTransform {
    fn name(&self) -> &'static str {
        "listings"
    }

    fn schema(&self) -> TableSchema {
        LISTINGS_SCHEMA
    }

    fn transform(&self, raw: &RawTable, source_file: &str) -> Result<Vec<CanonicalRow>, ParserError> {
        Ok(normalize_table(
            raw,
            &LISTINGS_SCHEMA,
            LISTING_ALIASES,
            source_file,
        ))
    }
}
