//! Import MS Project exports into a project-management store, and
//! reconcile re-imports of the same file against what is already stored.

pub mod batch;
pub mod config;
pub mod error;
pub mod model;
pub mod parse;
pub mod reconcile;
pub mod report;
pub mod snapshot;
pub mod store;
pub mod usage;

pub use batch::BatchWriter;
pub use config::ImportConfig;
pub use error::{ImportError, Result};
pub use model::{ParsedProject, Scope};
pub use parse::parse_file;
pub use reconcile::{reconcile, ReconcileOutcome, ReconcileSummary, Reconciler};
pub use report::export_summary_csv;
pub use store::{MemoryStore, Store};
