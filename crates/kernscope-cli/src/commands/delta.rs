use std::path::Path;

use anyhow::{Context, Result};

use kernscope_engine::{DeltaEngine, DeltaRequest};
use kernscope_store::DocumentStore;

/// Execute the `delta` command: compute (or fetch) one delta.
pub fn execute(store: &dyn DocumentStore, request_file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(request_file)
        .with_context(|| format!("failed to read {}", request_file.display()))?;
    let request: DeltaRequest = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", request_file.display()))?;

    let record = DeltaEngine::new(store)
        .compute(&request)
        .context("delta computation failed")?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
