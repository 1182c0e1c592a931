mod census;
mod listings;
mod lookup;
pub mod schema;

pub use census::{find_identifier_column, package_wide_rows, CensusTransform, IdentifierCheck};
pub use listings::ListingsTransform;
pub use lookup::{reconcile_lga_codes, reconcile_lga_suburbs, LgaCodeTransform, LgaSuburbTransform};
