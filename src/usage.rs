//! Finds metadata-list rows that other features still reference.

use std::collections::HashSet;

use serde_json::Value;

use crate::batch::BatchWriter;
use crate::config::ImportConfig;
use crate::error::Result;
use crate::model::Scope;
use crate::store::id_key;

/// Which of `candidate_ids` appear in the usage table for `scope`.
///
/// Read-only. Returned ids are in [`id_key`] form.
pub fn find_used_metadata_ids(
    batch: &mut BatchWriter<'_>,
    config: &ImportConfig,
    candidate_ids: &[Value],
    scope: &Scope,
) -> Result<HashSet<String>> {
    let rows = batch.select_in(
        &config.tables.usage,
        "metadata_list_id",
        candidate_ids,
        &scope.filters(),
    )?;
    Ok(rows
        .iter()
        .filter_map(|row| row.get("metadata_list_id").and_then(id_key))
        .collect())
}
