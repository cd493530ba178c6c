/* 📖 # Why single-flight validation?

Validation looks at the whole document, and the answer only changes when a merge happens. The
result is cached on the document together with the epoch it was computed for. When the cache is
empty, one caller claims the flight and validates a snapshot; callers that arrive meanwhile wait
for that flight to land and then read the cached answer instead of validating again.

The outcome is only stored if the document is still at the snapshot's epoch. A merge that raced
with the validation has already reset the cache, and its result must not be overwritten with an
answer for an older document.
*/

use parking_lot::{Condvar, Mutex, RwLock};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::AggregateDocument;

/// One schema violation, located by a JSON pointer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidityOutcome {
    Valid,
    Invalid(Vec<ValidationIssue>),
}

impl ValidityOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidityOutcome::Valid)
    }

    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ValidityOutcome::Valid => &[],
            ValidityOutcome::Invalid(issues) => issues,
        }
    }
}

/// Cached validation state of a document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Validity {
    #[default]
    Unknown,
    Known(ValidityOutcome),
}

/// Checks a document against a schema. An empty list means the document is valid.
pub trait SchemaValidator: std::fmt::Debug + Send + Sync + 'static {
    fn validate(&self, document: &Value) -> Vec<ValidationIssue>;
}

/// Caches validation results per document epoch and collapses concurrent validations into one.
#[derive(Debug)]
pub struct ValidityCache {
    validator: Box<dyn SchemaValidator>,
    in_flight: Mutex<bool>,
    landed: Condvar,
}

impl ValidityCache {
    pub fn new(validator: Box<dyn SchemaValidator>) -> Self {
        Self {
            validator,
            in_flight: Mutex::new(false),
            landed: Condvar::new(),
        }
    }

    /// Return the cached outcome, or validate the current document exactly once.
    pub fn ensure_valid(&self, document: &RwLock<AggregateDocument>) -> ValidityOutcome {
        loop {
            if let Validity::Known(outcome) = document.read().validity() {
                return outcome.clone();
            }

            let mut in_flight = self.in_flight.lock();
            if *in_flight {
                self.landed.wait(&mut in_flight);
                continue;
            }
            *in_flight = true;
            drop(in_flight);
            let _flight = Flight(self);

            let (epoch, snapshot) = {
                let document = document.read();
                if let Validity::Known(outcome) = document.validity() {
                    return outcome.clone();
                }
                (document.epoch(), document.to_value())
            };

            let issues = self.validator.validate(&snapshot);
            let outcome = if issues.is_empty() {
                ValidityOutcome::Valid
            } else {
                ValidityOutcome::Invalid(issues)
            };
            debug!(epoch, valid = outcome.is_valid(), "validated document");

            let mut document = document.write();
            if document.epoch() == epoch {
                document.set_validity(Validity::Known(outcome.clone()));
            } else {
                debug!(epoch, current = document.epoch(), "document changed during validation");
            }
            return outcome;
        }
    }
}

/// Clears the in-flight flag when the validating caller leaves, even by panic.
struct Flight<'a>(&'a ValidityCache);

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        *self.0.in_flight.lock() = false;
        self.0.landed.notify_all();
    }
}

const OPERATION_KEYS: [&str; 7] = ["get", "put", "post", "delete", "options", "head", "patch"];

/// Structural checks for a Swagger 2.0 document.
#[derive(Debug, Clone, Default)]
pub struct SwaggerSchemaValidator;

impl SchemaValidator for SwaggerSchemaValidator {
    fn validate(&self, document: &Value) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        let Some(root) = document.as_object() else {
            issues.push(ValidationIssue::new("", "document must be an object"));
            return issues;
        };

        if root.get("swagger").and_then(Value::as_str) != Some("2.0") {
            issues.push(ValidationIssue::new("/swagger", "must be \"2.0\""));
        }
        check_info(root.get("info"), &mut issues);
        check_paths(root.get("paths"), &mut issues);

        if let Some(tags) = root.get("tags") {
            check_tags(tags, &mut issues);
        }
        if let Some(definitions) = root.get("definitions") {
            check_definitions(definitions, &mut issues);
        }
        if let Some(host) = root.get("host") {
            match host.as_str() {
                Some(host) if !host.contains("://") && !host.contains('/') => {}
                Some(_) => issues.push(ValidationIssue::new(
                    "/host",
                    "must be a host name without scheme or path",
                )),
                None => issues.push(ValidationIssue::new("/host", "must be a string")),
            }
        }
        if let Some(base_path) = root.get("basePath") {
            if !base_path.as_str().is_some_and(|p| p.starts_with('/')) {
                issues.push(ValidationIssue::new(
                    "/basePath",
                    "must be a string starting with '/'",
                ));
            }
        }
        issues
    }
}

fn check_info(info: Option<&Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(info) = info.and_then(Value::as_object) else {
        issues.push(ValidationIssue::new("/info", "is required and must be an object"));
        return;
    };
    for field in ["title", "version"] {
        if !info.get(field).is_some_and(Value::is_string) {
            issues.push(ValidationIssue::new(
                format!("/info/{}", field),
                "is required and must be a string",
            ));
        }
    }
}

fn check_paths(paths: Option<&Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(paths) = paths.and_then(Value::as_object) else {
        issues.push(ValidationIssue::new("/paths", "is required and must be an object"));
        return;
    };
    for (route, item) in paths {
        let pointer = format!("/paths/{}", escape_pointer(route));
        if route.starts_with("x-") {
            continue;
        }
        if !route.starts_with('/') {
            issues.push(ValidationIssue::new(&pointer, "path must start with '/'"));
        }
        match item.as_object() {
            Some(item) => check_path_item(&pointer, item, issues),
            None => issues.push(ValidationIssue::new(&pointer, "path item must be an object")),
        }
    }
}

fn check_path_item(pointer: &str, item: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    for (key, value) in item {
        let key_pointer = format!("{}/{}", pointer, escape_pointer(key));
        if OPERATION_KEYS.contains(&key.as_str()) {
            match value.as_object() {
                Some(operation) => {
                    if !operation.get("responses").is_some_and(Value::is_object) {
                        issues.push(ValidationIssue::new(
                            format!("{}/responses", key_pointer),
                            "is required and must be an object",
                        ));
                    }
                    if operation.get("parameters").is_some_and(|p| !p.is_array()) {
                        issues.push(ValidationIssue::new(
                            format!("{}/parameters", key_pointer),
                            "must be an array",
                        ));
                    }
                }
                None => {
                    issues.push(ValidationIssue::new(key_pointer, "operation must be an object"))
                }
            }
        } else if key == "parameters" {
            if !value.is_array() {
                issues.push(ValidationIssue::new(key_pointer, "must be an array"));
            }
        } else if key != "$ref" && !key.starts_with("x-") {
            issues.push(ValidationIssue::new(key_pointer, "unexpected key in path item"));
        }
    }
}

fn check_tags(tags: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(tags) = tags.as_array() else {
        issues.push(ValidationIssue::new("/tags", "must be an array"));
        return;
    };
    for (index, tag) in tags.iter().enumerate() {
        if !tag.get("name").is_some_and(Value::is_string) {
            issues.push(ValidationIssue::new(
                format!("/tags/{}/name", index),
                "is required and must be a string",
            ));
        }
    }
}

fn check_definitions(definitions: &Value, issues: &mut Vec<ValidationIssue>) {
    let Some(definitions) = definitions.as_object() else {
        issues.push(ValidationIssue::new("/definitions", "must be an object"));
        return;
    };
    for (name, schema) in definitions {
        if !schema.is_object() {
            issues.push(ValidationIssue::new(
                format!("/definitions/{}", escape_pointer(name)),
                "schema must be an object",
            ));
        }
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::SectionKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct CountingValidator {
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl SchemaValidator for CountingValidator {
        fn validate(&self, document: &Value) -> Vec<ValidationIssue> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            SwaggerSchemaValidator.validate(document)
        }
    }

    fn valid_document() -> AggregateDocument {
        let mut document = AggregateDocument::new();
        let header = json!({"info": {"title": "Pets", "version": "1.0"}});
        if let Value::Object(header) = header {
            document.merge(SectionKind::Header, header).unwrap();
        }
        document
    }

    fn counting_cache(delay: Duration) -> (ValidityCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let validator = CountingValidator {
            calls: Arc::clone(&calls),
            delay,
        };
        (ValidityCache::new(Box::new(validator)), calls)
    }

    #[test]
    fn test_skeleton_is_invalid() {
        let issues = SwaggerSchemaValidator.validate(&AggregateDocument::new().to_value());
        assert_eq!(
            issues,
            vec![
                ValidationIssue::new("/info/title", "is required and must be a string"),
                ValidationIssue::new("/info/version", "is required and must be a string"),
            ]
        );
    }

    #[test]
    fn test_structural_rules() {
        let issues = SwaggerSchemaValidator.validate(&json!({
            "swagger": "1.2",
            "info": {"title": "Pets", "version": "1"},
            "host": "http://example.com",
            "basePath": "v1",
            "tags": [{"description": "no name"}],
            "definitions": {"Pet": "object"},
            "paths": {
                "pets": {},
                "/pet": {
                    "get": {"responses": {"200": {"description": "OK"}}},
                    "post": {"summary": "missing responses"},
                    "path": "/activity-streams",
                    "x-internal": true,
                },
            },
        }));

        let rendered: Vec<String> = issues.iter().map(ToString::to_string).collect();
        assert_eq!(
            rendered,
            vec![
                "/swagger: must be \"2.0\"",
                "/paths/pets: path must start with '/'",
                "/paths/~1pet/post/responses: is required and must be an object",
                "/paths/~1pet/path: unexpected key in path item",
                "/tags/0/name: is required and must be a string",
                "/definitions/Pet: schema must be an object",
                "/host: must be a host name without scheme or path",
                "/basePath: must be a string starting with '/'",
            ]
        );
    }

    #[test]
    fn test_consecutive_calls_validate_once() {
        let (cache, calls) = counting_cache(Duration::ZERO);
        let document = RwLock::new(valid_document());

        assert_eq!(cache.ensure_valid(&document), ValidityOutcome::Valid);
        assert_eq!(cache.ensure_valid(&document), ValidityOutcome::Valid);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_forces_revalidation_even_when_empty() {
        let (cache, calls) = counting_cache(Duration::ZERO);
        let document = RwLock::new(valid_document());
        cache.ensure_valid(&document);

        document
            .write()
            .merge(SectionKind::Path, Map::new())
            .unwrap();
        assert_eq!(document.read().validity(), &Validity::Unknown);

        cache.ensure_valid(&document);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_callers_share_one_validation() {
        let (cache, calls) = counting_cache(Duration::from_millis(50));
        let document = RwLock::new(valid_document());

        let (cache, document) = (&cache, &document);
        let outcomes: Vec<ValidityOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(move || cache.ensure_valid(document)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(outcomes.iter().all(ValidityOutcome::is_valid));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_outcome_is_not_cached() {
        #[derive(Debug)]
        struct MutatingValidator(Arc<RwLock<AggregateDocument>>);

        impl SchemaValidator for MutatingValidator {
            fn validate(&self, _document: &Value) -> Vec<ValidationIssue> {
                self.0
                    .write()
                    .merge(SectionKind::Definitions, Map::new())
                    .unwrap();
                vec![]
            }
        }

        let document = Arc::new(RwLock::new(valid_document()));
        let cache = ValidityCache::new(Box::new(MutatingValidator(Arc::clone(&document))));

        assert_eq!(cache.ensure_valid(&document), ValidityOutcome::Valid);
        assert_eq!(document.read().validity(), &Validity::Unknown);
    }

    #[test]
    fn test_invalid_outcome_is_cached_with_issues() {
        let (cache, calls) = counting_cache(Duration::ZERO);
        let document = RwLock::new(AggregateDocument::new());

        let outcome = cache.ensure_valid(&document);
        assert!(!outcome.is_valid());
        assert_eq!(outcome.issues().len(), 2);
        assert_eq!(document.read().validity(), &Validity::Known(outcome));
        cache.ensure_valid(&document);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
