use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use kernscope_store::{Collection, DocumentStore};

/// Execute the `import` command: load a JSON file into a collection.
///
/// The file may hold a single document object or an array of them.
pub fn execute(store: &dyn DocumentStore, collection: Collection, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let parsed: Value = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", file.display()))?;

    let docs = match parsed {
        Value::Array(docs) => docs,
        doc @ Value::Object(_) => vec![doc],
        _ => bail!("{} must hold a JSON object or array", file.display()),
    };

    let mut created = 0u64;
    let mut updated = 0u64;
    for doc in &docs {
        let outcome = store
            .save(collection, doc)
            .with_context(|| format!("failed to save document into {collection}"))?;
        if outcome.created {
            created += 1;
        } else {
            updated += 1;
        }
    }

    tracing::info!(
        collection = collection.as_str(),
        created,
        updated,
        "import finished"
    );
    println!("Imported {} document(s) into '{collection}'.", docs.len());
    println!("  Created: {created}");
    println!("  Updated: {updated}");
    Ok(())
}
