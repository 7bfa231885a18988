//! Typed, ordered query specifications.
//!
//! A [`QuerySpec`] is an ordered list of (field, condition) pairs built
//! fluently, never an untyped mutable mapping. Field names may be
//! dotted paths into nested documents. A missing field matches as JSON
//! `null`, so equality against `null` selects documents where the field
//! is absent.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;

/// One comparison applied to a document field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Field equals the value (missing field equals `null`).
    Eq(Value),
    /// Field is strictly less than the value.
    Lt(Value),
    /// Field is greater than or equal to the value.
    Gte(Value),
    /// Field equals one of the values.
    In(Vec<Value>),
}

/// Ordered conjunction of field conditions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    conditions: Vec<(String, Condition)>,
}

impl QuerySpec {
    /// Empty spec: matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Eq(value.into())));
        self
    }

    /// Require `field < value`.
    #[must_use]
    pub fn lt(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Lt(value.into())));
        self
    }

    /// Require `field >= value`.
    #[must_use]
    pub fn gte(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((field.into(), Condition::Gte(value.into())));
        self
    }

    /// Require `field` to equal one of `values`.
    #[must_use]
    pub fn within(mut self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push((field.into(), Condition::In(values)));
        self
    }

    /// Borrow the ordered conditions.
    #[must_use]
    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    /// True when every condition holds for `doc`.
    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            let actual = lookup_path(doc, field).unwrap_or(&Value::Null);
            match condition {
                Condition::Eq(expected) => values_equal(actual, expected),
                Condition::Lt(bound) => {
                    value_cmp(actual, bound) == Some(Ordering::Less)
                }
                Condition::Gte(bound) => matches!(
                    value_cmp(actual, bound),
                    Some(Ordering::Greater | Ordering::Equal)
                ),
                Condition::In(values) => values.iter().any(|v| values_equal(actual, v)),
            }
        })
    }
}

/// Sort direction for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Cursor options for a find: sort keys, window, projection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub skip: usize,
    pub limit: Option<usize>,
    /// Top-level fields to keep; `id` is always retained.
    pub fields: Option<Vec<String>>,
}

impl FindOptions {
    /// Default options: no sort, no window, full documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an ascending sort key.
    #[must_use]
    pub fn sort_asc(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortOrder::Ascending));
        self
    }

    /// Append a descending sort key.
    #[must_use]
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push((field.into(), SortOrder::Descending));
        self
    }

    /// Skip the first `n` matches.
    #[must_use]
    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    /// Return at most `n` documents.
    #[must_use]
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Project to the named top-level fields (plus `id`).
    #[must_use]
    pub fn project(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(ToString::to_string).collect());
        self
    }
}

/// Resolve a dotted path inside a document.
#[must_use]
pub fn lookup_path<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = doc;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Equality with `null` standing in for missing fields. Timestamp
/// strings compare by instant, matching the ordering below.
fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => tx == ty,
            _ => x == y,
        },
        _ => actual == expected,
    }
}

/// Type-aware partial ordering over scalar JSON values.
///
/// Numbers compare numerically and booleans as false < true. Strings
/// that both parse as RFC 3339 timestamps compare chronologically, so
/// `...Z`, `...+00:00` and fractional-second renderings all order by
/// instant; other strings compare lexicographically. Mixed or
/// non-scalar types are incomparable.
#[must_use]
pub fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.as_str().cmp(y.as_str())),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Stable multi-key sort used by store implementations.
pub(crate) fn sort_documents(docs: &mut [Value], sort: &[(String, SortOrder)]) {
    docs.sort_by(|a, b| {
        for (field, order) in sort {
            let va = lookup_path(a, field).unwrap_or(&Value::Null);
            let vb = lookup_path(b, field).unwrap_or(&Value::Null);
            let cmp = value_cmp(va, vb).unwrap_or(Ordering::Equal);
            let cmp = match order {
                SortOrder::Ascending => cmp,
                SortOrder::Descending => cmp.reverse(),
            };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_spec_matches_everything() {
        let spec = QuerySpec::new();
        assert!(spec.matches(&json!({"a": 1})));
        assert!(spec.matches(&json!({})));
    }

    #[test]
    fn eq_on_missing_field_matches_null() {
        let spec = QuerySpec::new().eq("board_instance", Value::Null);
        assert!(spec.matches(&json!({"board": "qemu"})));
        assert!(!spec.matches(&json!({"board_instance": "i1"})));
    }

    #[test]
    fn conditions_preserve_insertion_order() {
        let spec = QuerySpec::new().eq("job", "mainline").lt("n", 5);
        let fields: Vec<&str> = spec.conditions().iter().map(|(f, _)| f.as_str()).collect();
        assert_eq!(fields, ["job", "n"]);
    }

    #[test]
    fn lt_and_gte_on_timestamps() {
        let doc = json!({"created_on": "2024-03-05T00:00:00Z"});
        let before = QuerySpec::new().lt("created_on", "2024-03-10T00:00:00Z");
        let at_or_after = QuerySpec::new().gte("created_on", "2024-03-05T00:00:00Z");
        assert!(before.matches(&doc));
        assert!(at_or_after.matches(&doc));
        let too_early = QuerySpec::new().gte("created_on", "2024-03-06T00:00:00Z");
        assert!(!too_early.matches(&doc));
    }

    #[test]
    fn within_matches_any_listed_value() {
        let spec = QuerySpec::new().within("status", vec![json!("FAIL"), json!("UNKNOWN")]);
        assert!(spec.matches(&json!({"status": "FAIL"})));
        assert!(!spec.matches(&json!({"status": "PASS"})));
    }

    #[test]
    fn timestamp_bounds_compare_by_instant_across_renderings() {
        // Same instant rendered with an explicit offset: not strictly
        // before, so it stays outside an lt window.
        let before = QuerySpec::new().lt("created_on", "2024-03-10T08:00:00Z");
        assert!(!before.matches(&json!({"created_on": "2024-03-10T08:00:00+00:00"})));

        // Fractional seconds order chronologically, not by byte value.
        let at_or_after = QuerySpec::new().gte("created_on", "2024-03-10T08:00:00.900Z");
        assert!(at_or_after.matches(&json!({"created_on": "2024-03-10T08:00:01Z"})));
        assert!(!at_or_after.matches(&json!({"created_on": "2024-03-10T08:00:00Z"})));
    }

    #[test]
    fn timestamp_equality_ignores_rendering() {
        let spec = QuerySpec::new().eq("created_on", "2024-03-10T08:00:00Z");
        assert!(spec.matches(&json!({"created_on": "2024-03-10T08:00:00+00:00"})));
        assert!(!spec.matches(&json!({"created_on": "2024-03-10T08:00:01Z"})));
    }

    #[test]
    fn sort_orders_mixed_timestamp_renderings_chronologically() {
        // Lexicographic order would be 2, 1, 3 ('+' < '.' < 'Z').
        let mut docs = vec![
            json!({"t": "2024-03-10T08:00:00.900Z", "i": 2}),
            json!({"t": "2024-03-10T08:00:01+00:00", "i": 3}),
            json!({"t": "2024-03-10T08:00:00Z", "i": 1}),
        ];
        sort_documents(&mut docs, &[("t".into(), SortOrder::Ascending)]);
        let order: Vec<i64> = docs.iter().map(|d| d["i"].as_i64().unwrap()).collect();
        assert_eq!(order, [1, 2, 3]);
    }

    #[test]
    fn non_timestamp_strings_still_compare_lexicographically() {
        let spec = QuerySpec::new().lt("defconfig", "defconfig-b");
        assert!(spec.matches(&json!({"defconfig": "defconfig-a"})));
        assert!(!spec.matches(&json!({"defconfig": "defconfig-c"})));
    }

    #[test]
    fn dotted_path_traverses_nested_objects() {
        let doc = json!({"a": {"b": {"c": 3}}});
        assert_eq!(lookup_path(&doc, "a.b.c"), Some(&json!(3)));
        assert_eq!(lookup_path(&doc, "a.x.c"), None);
    }

    #[test]
    fn incomparable_types_never_match_range_conditions() {
        let spec = QuerySpec::new().lt("n", 5);
        assert!(!spec.matches(&json!({"n": "five"})));
        assert!(!spec.matches(&json!({})));
    }

    #[test]
    fn sort_is_stable_across_equal_keys() {
        let mut docs = vec![
            json!({"k": "b", "i": 1}),
            json!({"k": "a", "i": 2}),
            json!({"k": "b", "i": 3}),
        ];
        sort_documents(&mut docs, &[("k".into(), SortOrder::Ascending)]);
        assert_eq!(docs[0]["i"], json!(2));
        assert_eq!(docs[1]["i"], json!(1));
        assert_eq!(docs[2]["i"], json!(3));
    }

    #[test]
    fn descending_sort_reverses() {
        let mut docs = vec![json!({"t": "2024-01-01"}), json!({"t": "2024-03-01"})];
        sort_documents(&mut docs, &[("t".into(), SortOrder::Descending)]);
        assert_eq!(docs[0]["t"], json!("2024-03-01"));
    }
}
