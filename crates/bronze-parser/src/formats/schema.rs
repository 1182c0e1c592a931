use crate::model::{ColumnKind, ColumnSpec, TableSchema};

pub const SOURCE_FILE_COLUMN: &str = "source_file";
pub const LGA_CODE_PREFIX: &str = "lga_code";
pub const LGA_NAME_PREFIX: &str = "lga_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnAlias {
    pub alias: &'static str,
    pub canonical: &'static str,
}

const fn text(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnKind::Text)
}

const fn integer(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnKind::Integer)
}

const fn float(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnKind::Float)
}

const fn date(name: &'static str) -> ColumnSpec {
    ColumnSpec::new(name, ColumnKind::Date)
}

pub const LISTING_COLUMNS: [ColumnSpec; 23] = [
    integer("listing_id"),
    integer("scrape_id"),
    date("scraped_date"),
    integer("host_id"),
    text("host_name"),
    date("host_since"),
    text("host_is_superhost"),
    text("host_neighbourhood"),
    text("listing_neighbourhood"),
    text("property_type"),
    text("room_type"),
    integer("accommodates"),
    float("price"),
    text("has_availability"),
    integer("availability_30"),
    integer("number_of_reviews"),
    float("review_scores_rating"),
    float("review_scores_accuracy"),
    float("review_scores_cleanliness"),
    float("review_scores_checkin"),
    float("review_scores_communication"),
    float("review_scores_value"),
    text(SOURCE_FILE_COLUMN),
];

pub const LISTING_ALIASES: &[ColumnAlias] = &[ColumnAlias {
    alias: "neighbourhood_cleansed",
    canonical: "listing_neighbourhood",
}];

pub const LISTINGS_SCHEMA: TableSchema = TableSchema {
    table: "bronze.airbnb_listings_raw",
    columns: &LISTING_COLUMNS,
};

const CENSUS_COLUMNS: [ColumnSpec; 3] = [
    text(LGA_CODE_PREFIX),
    ColumnSpec::new("payload", ColumnKind::Json),
    text(SOURCE_FILE_COLUMN),
];

pub const CENSUS_G01_SCHEMA: TableSchema = TableSchema {
    table: "bronze.census_g01_raw",
    columns: &CENSUS_COLUMNS,
};

pub const CENSUS_G02_SCHEMA: TableSchema = TableSchema {
    table: "bronze.census_g02_raw",
    columns: &CENSUS_COLUMNS,
};

const LGA_CODE_COLUMNS: [ColumnSpec; 3] = [
    text(LGA_CODE_PREFIX),
    text(LGA_NAME_PREFIX),
    text(SOURCE_FILE_COLUMN),
];

pub const LGA_CODE_SCHEMA: TableSchema = TableSchema {
    table: "bronze.nsw_lga_code_raw",
    columns: &LGA_CODE_COLUMNS,
};

const LGA_SUBURB_COLUMNS: [ColumnSpec; 3] = [
    text("lga_name"),
    text("suburb_name"),
    text(SOURCE_FILE_COLUMN),
];

pub const LGA_SUBURB_SCHEMA: TableSchema = TableSchema {
    table: "bronze.nsw_lga_suburb_raw",
    columns: &LGA_SUBURB_COLUMNS,
};
