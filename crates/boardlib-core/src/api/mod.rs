//! API implementation submodules.
//!
//! Each submodule contains `impl LibraryManager` blocks that extend the
//! public API. The struct definition remains in `lib.rs`.

mod builder;
mod install;
mod listing;

pub use builder::LibraryManagerBuilder;
pub use install::InstallOptions;
pub use listing::{LibraryExamples, LibraryListing, ListFilter};
