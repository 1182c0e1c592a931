use crate::errors::ParserError;
use crate::formats::schema::{CENSUS_G01_SCHEMA, CENSUS_G02_SCHEMA};
use crate::formats::{
    CensusTransform, IdentifierCheck, LgaCodeTransform, LgaSuburbTransform, ListingsTransform,
};
use crate::model::{CanonicalRow, RawTable, TableBatch, TableSchema};
use crate::reader::read_table;

pub trait TableTransform: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> TableSchema;
    fn transform(&self, raw: &RawTable, source_file: &str) -> Result<Vec<CanonicalRow>, ParserError>;
}

pub static LISTINGS: ListingsTransform = ListingsTransform;

pub static CENSUS_G01: CensusTransform = CensusTransform {
    schema: CENSUS_G01_SCHEMA,
    check: IdentifierCheck::Upfront,
};

pub static CENSUS_G02: CensusTransform = CensusTransform {
    schema: CENSUS_G02_SCHEMA,
    check: IdentifierCheck::Deferred,
};

pub static LGA_CODES: LgaCodeTransform = LgaCodeTransform;

pub static LGA_SUBURBS: LgaSuburbTransform = LgaSuburbTransform;

/// Runs a transform over an already decoded table.
pub fn transform_table(
    transform: &dyn TableTransform,
    raw: &RawTable,
    source_file: &str,
) -> Result<TableBatch, ParserError> {
    let rows = transform.transform(raw, source_file)?;
    TableBatch::new(transform.schema(), source_file, rows)
}

/// Decodes and transforms one file in a single step.
pub fn parse_file(
    transform: &dyn TableTransform,
    contents: &[u8],
    source_file: &str,
) -> Result<TableBatch, ParserError> {
    let raw = read_table(transform.schema().table, contents)?;
    transform_table(transform, &raw, source_file)
}
