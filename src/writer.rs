use crate::error::EnrichResult;
use crate::types::EnrichmentBundle;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Write the evaluator hand-off (enriched data, parser output, tree) as JSON
pub fn write_bundle<T: Serialize>(path: &Path, bundle: &EnrichmentBundle<T>) -> EnrichResult<()> {
    write_json(path, bundle)
}

/// Pretty JSON, written only once serialization has fully succeeded
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> EnrichResult<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content)?;
    Ok(())
}
