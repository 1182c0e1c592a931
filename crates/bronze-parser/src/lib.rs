pub mod coerce;
pub mod errors;
pub mod formats;
pub mod model;
pub mod normalize;
pub mod reader;
mod registry;

pub use errors::ParserError;
pub use model::{
    CanonicalRow, ColumnKind, ColumnSpec, RawTable, TableBatch, TableSchema, Value,
};
pub use reader::read_table;
pub use registry::{
    parse_file, transform_table, TableTransform, CENSUS_G01, CENSUS_G02, LGA_CODES, LGA_SUBURBS,
    LISTINGS,
};
