//! Library index: known libraries, their releases and dependency edges.

mod catalog;
mod release;

pub use catalog::{IndexCatalog, Library};
pub use release::{sanitize_name, Dependency, LibraryRelease, Resource, UsageTag};
