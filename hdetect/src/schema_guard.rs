//! JSON Schema guards and the compiled-validator cache.
//!
//! Schemas are compiled with Draft 2020-12 semantics. Compilation also checks
//! the schema against its meta-schema, so a document that is not itself a
//! valid schema is rejected at construction time with
//! [`DetectError::InvalidSchema`].
//!
//! The cache key is a canonical serialization of the schema (object keys
//! sorted at every level, compact separators), so two documents that differ
//! only in key order or whitespace share one compiled validator.

use std::collections::HashMap;
#[cfg(feature = "schema")]
use std::sync::Arc;

#[cfg(feature = "schema")]
use jsonschema::error::ValidationErrorKind;
use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::detection::Severity;
#[cfg(feature = "schema")]
use crate::detection::Detection;
#[cfg(feature = "schema")]
use crate::detector::Detector;
use crate::detector::SharedDetector;
use crate::error::DetectError;

#[cfg(feature = "schema")]
type CompiledSchema = Arc<jsonschema::Validator>;
#[cfg(not(feature = "schema"))]
type CompiledSchema = ();

/// Compiled validators keyed by canonical schema text.
///
/// Owned by the caller and shared by reference (or `Arc`). Entries are added
/// lazily on first use of a schema and removed only by [`ValidatorCache::clear`].
#[derive(Default)]
pub struct ValidatorCache {
    entries: RwLock<HashMap<String, CompiledSchema>>,
}

impl std::fmt::Debug for ValidatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorCache")
            .field("entries", &self.len())
            .finish_non_exhaustive()
    }
}

impl ValidatorCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct compiled schemas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every compiled validator.
    pub fn clear(&self) {
        self.entries.write().clear();
        tracing::debug!("schema validator cache cleared");
    }

    /// Build a guard for `schema`; see [`make_schema_guard`].
    ///
    /// # Errors
    ///
    /// Returns [`DetectError::SchemaUnavailable`] when built without the
    /// `schema` feature, or [`DetectError::InvalidSchema`] when `schema` does
    /// not satisfy the Draft 2020-12 meta-schema.
    #[cfg(feature = "schema")]
    pub fn guard(&self, schema: &Value, severity: Severity) -> Result<SharedDetector, DetectError> {
        let validator = self.compiled(schema)?;
        Ok(Arc::new(SchemaGuard {
            validator,
            severity,
        }))
    }

    /// Build a guard for `schema`; see [`make_schema_guard`].
    ///
    /// # Errors
    ///
    /// Always returns [`DetectError::SchemaUnavailable`]: this build has no
    /// JSON Schema support.
    #[cfg(not(feature = "schema"))]
    pub fn guard(&self, schema: &Value, severity: Severity) -> Result<SharedDetector, DetectError> {
        let _ = (schema, severity);
        Err(DetectError::SchemaUnavailable)
    }

    #[cfg(feature = "schema")]
    fn compiled(&self, schema: &Value) -> Result<CompiledSchema, DetectError> {
        let key = canonical_key(schema);
        if let Some(hit) = self.entries.read().get(&key) {
            tracing::debug!("schema validator cache hit");
            return Ok(Arc::clone(hit));
        }

        let validator = jsonschema::draft202012::new(schema).map_err(|e| {
            DetectError::InvalidSchema {
                reason: e.to_string(),
            }
        })?;
        tracing::debug!(key_len = key.len(), "compiled new schema validator");

        // Another thread may have compiled the same schema meanwhile; keep the first.
        let mut entries = self.entries.write();
        let entry = entries.entry(key).or_insert_with(|| Arc::new(validator));
        Ok(Arc::clone(entry))
    }
}

/// Build a detector that validates JSON input against `schema`.
///
/// The returned detector reports `invalid_json` at `block` when the input
/// does not parse, and `schema_validation_failed` at `severity` when it
/// parses but does not conform. A non-conforming result carries the JSON
/// Pointer of the first failing location as the `missing_fields` patch
/// (`["/b/c"]`). For a missing `required` property the pointer names the
/// property itself; the whole document is `""`.
///
/// # Errors
///
/// Returns [`DetectError::SchemaUnavailable`] when built without the `schema`
/// feature, or [`DetectError::InvalidSchema`] when `schema` is not a valid
/// JSON Schema.
pub fn make_schema_guard(
    cache: &ValidatorCache,
    schema: &Value,
    severity: Severity,
) -> Result<SharedDetector, DetectError> {
    cache.guard(schema, severity)
}

/// Canonical text of a JSON document: keys sorted at every depth, compact.
#[must_use]
pub fn canonical_key(schema: &Value) -> String {
    canonicalize(schema).to_string()
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(feature = "schema")]
fn escape_pointer_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Detector produced by [`make_schema_guard`].
#[cfg(feature = "schema")]
struct SchemaGuard {
    validator: CompiledSchema,
    severity: Severity,
}

#[cfg(feature = "schema")]
impl SchemaGuard {
    fn first_failing_path(&self, data: &Value) -> Option<String> {
        let error = self.validator.validate(data).err()?;
        let mut path = error.instance_path().as_str().to_owned();
        if let ValidationErrorKind::Required { property } = error.kind()
            && let Some(name) = property.as_str()
        {
            path.push('/');
            path.push_str(&escape_pointer_token(name));
        }
        Some(path)
    }
}

#[cfg(feature = "schema")]
impl Detector for SchemaGuard {
    fn detect(&self, text: &str) -> Detection {
        let Ok(data) = serde_json::from_str::<Value>(text) else {
            return Detection::fail(["invalid_json"], Severity::Block);
        };
        if self.validator.is_valid(&data) {
            return Detection::pass();
        }

        let failed = Detection::fail(["schema_validation_failed"], self.severity);
        match self.first_failing_path(&data) {
            Some(path) => failed.with_patch("missing_fields", vec![path]),
            None => failed,
        }
    }

    fn name(&self) -> &str {
        "schema"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_key_ignores_key_order() {
        let a = json!({"type": "object", "required": ["a"], "properties": {"b": {}, "a": {}}});
        let b: Value = serde_json::from_str(
            r#"{ "properties": { "a": {}, "b": {} },
                 "required": ["a"],   "type": "object" }"#,
        )
        .unwrap();
        assert_eq!(canonical_key(&a), canonical_key(&b));
        assert_eq!(
            canonical_key(&json!({"b": 1, "a": [{"d": 1, "c": 2}]})),
            r#"{"a":[{"c":2,"d":1}],"b":1}"#
        );
    }

    #[test]
    fn test_array_order_is_significant() {
        assert_ne!(
            canonical_key(&json!({"required": ["a", "b"]})),
            canonical_key(&json!({"required": ["b", "a"]}))
        );
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_guard_reports_schema_failure() {
        let cache = ValidatorCache::new();
        let guard = make_schema_guard(
            &cache,
            &json!({"type": "object", "required": ["a"]}),
            Severity::Block,
        )
        .unwrap();

        let d = guard.detect("{}");
        assert!(!d.ok());
        assert_eq!(d.reasons(), ["schema_validation_failed"]);
        assert_eq!(d.severity(), Severity::Block);
        assert_eq!(d.patch("missing_fields"), Some(&json!(["/a"])));

        assert!(guard.detect(r#"{"a": 1}"#).ok());

        let bad = guard.detect("not json");
        assert_eq!(bad.reasons(), ["invalid_json"]);
        assert_eq!(bad.severity(), Severity::Block);
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_guard_uses_configured_severity() {
        let cache = ValidatorCache::new();
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}},
            "required": ["a"],
            "additionalProperties": false
        });
        let guard = make_schema_guard(&cache, &schema, Severity::Warn).unwrap();

        let d = guard.detect(r#"{"a": "not number"}"#);
        assert_eq!(d.severity(), Severity::Warn);
        assert_eq!(d.patch("missing_fields"), Some(&json!(["/a"])));
        assert!(guard.detect(r#"{"a": 1}"#).ok());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_patch_points_at_nested_failure() {
        let cache = ValidatorCache::new();
        let schema = json!({
            "properties": {
                "b": {"type": "object", "required": ["c"]},
                "n": {"type": "array", "items": {"type": "number"}}
            }
        });
        let guard = make_schema_guard(&cache, &schema, Severity::Warn).unwrap();

        let d = guard.detect(r#"{"b": {}}"#);
        assert_eq!(d.reasons(), ["schema_validation_failed"]);
        assert_eq!(d.patch("missing_fields"), Some(&json!(["/b/c"])));

        let d = guard.detect(r#"{"n": [1, "two"]}"#);
        assert_eq!(d.patch("missing_fields"), Some(&json!(["/n/1"])));

        let root = make_schema_guard(&cache, &json!({"type": "object"}), Severity::Warn).unwrap();
        assert_eq!(root.detect("[]").patch("missing_fields"), Some(&json!([""])));
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_pointer_tokens_are_escaped() {
        assert_eq!(escape_pointer_token("a/b~c"), "a~1b~0c");
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_invalid_schema_is_rejected() {
        let cache = ValidatorCache::new();
        let err = make_schema_guard(&cache, &json!({"type": 12}), Severity::Block)
            .err()
            .unwrap();
        assert!(matches!(err, DetectError::InvalidSchema { .. }), "got: {err}");
        assert!(cache.is_empty());
    }

    #[cfg(feature = "schema")]
    #[test]
    fn test_structurally_equal_schemas_share_one_validator() {
        let cache = ValidatorCache::new();
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "number"}},
            "required": ["a"]
        });
        let reordered = json!({
            "required": ["a"],
            "properties": {"a": {"type": "number"}},
            "type": "object"
        });

        let g1 = make_schema_guard(&cache, &schema, Severity::Block).unwrap();
        assert_eq!(cache.len(), 1);
        let g2 = make_schema_guard(&cache, &reordered, Severity::Warn).unwrap();
        assert_eq!(cache.len(), 1);

        assert_eq!(g1.detect("{}").severity(), Severity::Block);
        assert_eq!(g2.detect("{}").severity(), Severity::Warn);

        cache.clear();
        assert!(cache.is_empty());
        let _ = make_schema_guard(&cache, &schema, Severity::Block).unwrap();
        assert_eq!(cache.len(), 1);
    }

    #[cfg(not(feature = "schema"))]
    #[test]
    fn test_guard_unavailable_without_feature() {
        let cache = ValidatorCache::new();
        let err = make_schema_guard(&cache, &json!({"type": "object"}), Severity::Block)
            .err()
            .unwrap();
        assert!(matches!(err, DetectError::SchemaUnavailable));
    }
}
