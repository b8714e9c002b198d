use std::path::Path;

use super::{MemoryStore, StoreError};

/// Save a store to a JSON file.
pub fn save_store(store: &MemoryStore, path: &Path) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(store)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a store from a JSON file. A missing file yields an empty store.
pub fn load_store(path: &Path) -> Result<MemoryStore, StoreError> {
    if !path.exists() {
        return Ok(MemoryStore::new());
    }
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
