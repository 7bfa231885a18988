//! Small shared helpers for the engine modules.

use chrono::{DateTime, Utc};
use serde_json::Value;

use kernscope_store::{Collection, DocumentStore, QuerySpec};
use kernscope_types::{ResultDocument, ResultId};

use crate::errors::{EngineError, Result};

/// Load one result document by id, or fail with `NotFound`.
pub(crate) fn load_document(
    store: &dyn DocumentStore,
    collection: Collection,
    id: &ResultId,
) -> Result<ResultDocument> {
    let value = store
        .find_one(collection, &QuerySpec::new().eq("id", id.as_str()))?
        .ok_or_else(|| EngineError::not_found(format!("{collection} document '{id}'")))?;
    Ok(serde_json::from_value(value)?)
}

/// Spec value for an optional field: `null` selects documents where the
/// field is absent, keeping lanes with and without the field distinct.
pub(crate) fn opt_value(field: Option<&str>) -> Value {
    field.map_or(Value::Null, |s| Value::String(s.to_string()))
}

/// Spec value for a timestamp, serialized the same way document
/// timestamp fields are.
pub(crate) fn time_value(t: &DateTime<Utc>) -> Result<Value> {
    Ok(serde_json::to_value(t)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn opt_value_maps_none_to_null() {
        assert_eq!(opt_value(None), Value::Null);
        assert_eq!(opt_value(Some("x")), Value::String("x".into()));
    }

    #[test]
    fn time_value_is_a_string() {
        let t = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert!(time_value(&t).unwrap().is_string());
    }
}
