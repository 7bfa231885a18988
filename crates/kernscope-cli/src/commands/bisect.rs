use anyhow::{bail, Context, Result};

use kernscope_engine::BisectionEngine;
use kernscope_store::DocumentStore;
use kernscope_types::ResultId;

/// Execute the `bisect` command in one of its three modes.
pub fn execute(
    store: &dyn DocumentStore,
    result_id: &str,
    build: bool,
    compare_to: Option<&str>,
) -> Result<()> {
    if build && compare_to.is_some() {
        bail!("--build and --compare-to are mutually exclusive");
    }

    let result_id = ResultId::new(result_id);
    let engine = BisectionEngine::new(store);
    let record = if build {
        engine.bisect_build(&result_id)
    } else if let Some(other_job) = compare_to {
        engine.bisect_compared_to(&result_id, other_job)
    } else {
        engine.bisect(&result_id)
    }
    .with_context(|| format!("bisection failed for '{result_id}'"))?;

    match (&record.good_commit, &record.compare_to) {
        (_, Some(other)) => println!(
            "Collected {} result(s) from tree '{other}'.",
            record.bisect_data.len()
        ),
        (Some(good), None) => println!(
            "Good commit {} -> bad commit {} over {} result(s).",
            good,
            record.bad_commit.as_deref().unwrap_or("<unknown>"),
            record.bisect_data.len()
        ),
        (None, None) => println!(
            "No passing result in the scanned history ({} result(s)).",
            record.bisect_data.len()
        ),
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
