//! Installed library registry and `library.properties` handling.

mod examples;
mod installed;
mod manifest;

pub use examples::find_examples;
pub use installed::{InstalledLibrary, InstalledRegistry, LibraryLocation, Namespace, Scope};
pub use manifest::{validate_library_dir, LibraryContents, Manifest};
