//! Structured store interface.
//!
//! Rows are JSON objects keyed by column name. Implementations decide how the
//! rows are persisted; the reconciliation engine only relies on the four
//! operations and the three filter predicates below.

pub mod file;
pub mod memory;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use file::{load_store, save_store};
pub use memory::{MemoryStore, StoreCall, StoreOp};

/// A single row, keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the request.
    #[error("{0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed store data: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Row predicate understood by every store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn is_in(column: &str, values: Vec<Value>) -> Self {
        Filter::In(column.to_string(), values)
    }

    pub fn is_null(column: &str) -> Self {
        Filter::IsNull(column.to_string())
    }

    pub fn matches(&self, row: &Row) -> bool {
        match self {
            Filter::Eq(col, wanted) => row.get(col).is_some_and(|v| same_key(v, wanted)),
            Filter::In(col, wanted) => row
                .get(col)
                .is_some_and(|v| wanted.iter().any(|w| same_key(v, w))),
            Filter::IsNull(col) => row.get(col).map_or(true, Value::is_null),
        }
    }
}

/// The four operations the reconciliation engine issues.
///
/// Each call commits on its own; there is no transaction spanning calls.
pub trait Store {
    fn select(&mut self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;

    /// Insert rows and return them as stored (with generated ids), in input order.
    fn insert(&mut self, table: &str, rows: Vec<Row>) -> Result<Vec<Row>, StoreError>;

    fn update(&mut self, table: &str, patch: &Row, filters: &[Filter])
        -> Result<Vec<Row>, StoreError>;

    fn delete(&mut self, table: &str, filters: &[Filter]) -> Result<Vec<Row>, StoreError>;
}

/// Canonical text form of a key value, usable as a map key.
///
/// Integral numbers lose any fractional suffix so `7` and `7.0` agree.
pub fn id_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Some(i.to_string()),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => Some((f as i64).to_string()),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

fn same_key(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => id_key(a) == id_key(b),
        _ => a == b,
    }
}
