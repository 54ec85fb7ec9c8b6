//! Version parsing and constraint matching.

mod constraint;
mod relaxed;

pub use constraint::VersionConstraint;
pub use relaxed::Version;
