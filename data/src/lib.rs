//! Archnemesis item catalog and recipe resolution.
//!
//! The catalog is static and ordered; the resolver allocates scanned item
//! instances against requested combos in caller order.

mod catalog;
pub use catalog::*;
mod resolve;
pub use resolve::*;

pub type Result<T, E = CatalogError> = std::result::Result<T, E>;
