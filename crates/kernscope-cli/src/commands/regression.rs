use anyhow::{Context, Result};

use kernscope_engine::RegressionIndex;
use kernscope_store::DocumentStore;
use kernscope_types::ResultId;

/// Execute the `regression` command: index one failing result.
pub fn execute(store: &dyn DocumentStore, result_id: &str) -> Result<()> {
    let result_id = ResultId::new(result_id);
    let record = RegressionIndex::new(store)
        .find(&result_id)
        .with_context(|| format!("regression indexing failed for '{result_id}'"))?;

    match record {
        Some(record) => {
            println!(
                "Lane '{}' has {} consecutive failure(s).",
                record.key,
                record.failures.len()
            );
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        None => println!("Result '{result_id}' passed; no regression to index."),
    }
    Ok(())
}
