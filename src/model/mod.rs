pub mod assignment;
pub mod project;
pub mod resource;
pub mod scope;
pub mod task;
pub mod value;

pub use assignment::Assignment;
pub use project::{ParsedCounts, ParsedProject, Sections};
pub use resource::Resource;
pub use scope::Scope;
pub use task::{DependencyKind, PredecessorLink, Task};

use crate::store::Row;

/// A record matched across imports by its external UID.
pub trait Tracked {
    /// Columns compared as instants rather than as text.
    const TIMESTAMP_FIELDS: &'static [&'static str] = &[];

    fn uid(&self) -> Option<&str>;

    /// Name shown in summaries and mirrored onto the metadata-list row.
    fn display_label(&self) -> Option<&str>;

    /// Mapped column values compared by the update check, excluding the UID.
    fn field_values(&self) -> Row;
}
