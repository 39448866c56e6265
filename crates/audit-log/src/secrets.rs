//! Structural redaction of Kubernetes Secret and ConfigMap payloads and of
//! sensitive command-line arguments.
//!
//! Key-based rules cannot catch these: a Secret's `data` map holds arbitrary
//! user-chosen keys, and a `--token` flag carries its value in the next array
//! element rather than under a key.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value};

use crate::entry::LogEntry;
use crate::redactor::{marker, RedactError, Redactor};

const LAST_APPLIED_ANNOTATION: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Fields kept on a flattened Secret/ConfigMap that has no `data` field.
const FLATTENED_KEEP: &[&str] = &["id", "created", "baseType"];

const BASE_TYPE_PATTERN: &str = "secret|configmap";

// ---------------------------------------------------------------------------
// Secret / ConfigMap objects
// ---------------------------------------------------------------------------

/// Blanks the payload of Secret- and ConfigMap-like objects.
///
/// A body is treated as one when the request URI names the `secrets` or
/// `configmaps` resource, or when a `baseType` anywhere inside it looks like
/// one. List bodies then have every element redacted.
#[derive(Debug, Clone)]
pub struct SecretRedactor {
    base_type: Regex,
}

impl SecretRedactor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            base_type: RegexBuilder::new(BASE_TYPE_PATTERN)
                .case_insensitive(true)
                .build()?,
        })
    }

    /// Whether any `baseType` field at any depth names a Secret or ConfigMap.
    fn has_secret_base_type(&self, value: &Value) -> bool {
        match value {
            Value::Object(object) => object.iter().any(|(key, value)| {
                let names_secret = key == "baseType"
                    && value.as_str().is_some_and(|base| self.base_type.is_match(base));
                names_secret || self.has_secret_base_type(value)
            }),
            Value::Array(items) => items.iter().any(|item| self.has_secret_base_type(item)),
            _ => false,
        }
    }

    fn redact_body(&self, body: &mut Value, uri_is_secret: bool) {
        if !uri_is_secret && !self.has_secret_base_type(body) {
            return;
        }
        let Value::Object(object) = body else {
            return;
        };

        if let Some(items) = list_items(object) {
            for item in items.iter_mut().filter_map(Value::as_object_mut) {
                redact_single(item);
            }
            return;
        }

        redact_single(object);
    }
}

impl Redactor for SecretRedactor {
    fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError> {
        let uri_is_secret = uri_names_secret(&entry.request_uri);
        for body in entry.bodies_mut() {
            self.redact_body(body, uri_is_secret);
        }
        Ok(())
    }
}

fn uri_names_secret(uri: &str) -> bool {
    uri.contains("secrets") || uri.contains("configmaps")
}

/// The elements of a norman collection (`{"type":"collection","data":[..]}`)
/// or of a Kubernetes list (`{"kind":"SecretList","items":[..]}`).
fn list_items(object: &mut Map<String, Value>) -> Option<&mut Vec<Value>> {
    let is_collection = object.get("type").and_then(Value::as_str) == Some("collection");
    let is_kube_list = object
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.ends_with("List"));

    let field = if is_collection {
        "data"
    } else if is_kube_list {
        "items"
    } else {
        return None;
    };
    object.get_mut(field).and_then(Value::as_array_mut)
}

fn redact_single(object: &mut Map<String, Value>) {
    let mut had_payload = false;
    for field in ["data", "stringData"] {
        if let Some(value) = object.get_mut(field) {
            *value = marker();
            had_payload = true;
        }
    }

    if had_payload {
        let annotation = object
            .get_mut("metadata")
            .and_then(|m| m.get_mut("annotations"))
            .and_then(|a| a.get_mut(LAST_APPLIED_ANNOTATION));
        if let Some(annotation) = annotation {
            *annotation = marker();
        }
        return;
    }

    for (key, value) in object.iter_mut() {
        if !FLATTENED_KEEP.contains(&key.as_str()) {
            *value = marker();
        }
    }
}

// ---------------------------------------------------------------------------
// Command-line arguments
// ---------------------------------------------------------------------------

/// Blanks the value following a sensitive `--flag` in any string array.
#[derive(Debug, Clone)]
pub struct ArgRedactor {
    sensitive: Regex,
}

impl ArgRedactor {
    /// `sensitive` is matched against flag names with the leading `--`
    /// removed.
    pub fn new(sensitive: Regex) -> Self {
        Self { sensitive }
    }

    fn redact_value(&self, node: &mut Value) {
        match node {
            Value::Array(items) => {
                let mut blank_next = false;
                for item in items.iter_mut() {
                    if blank_next {
                        *item = marker();
                        blank_next = false;
                        continue;
                    }
                    match item {
                        Value::String(arg) => blank_next = self.is_sensitive_flag(arg),
                        other => self.redact_value(other),
                    }
                }
            }
            Value::Object(map) => map.values_mut().for_each(|v| self.redact_value(v)),
            _ => {}
        }
    }

    fn is_sensitive_flag(&self, arg: &str) -> bool {
        arg.strip_prefix("--")
            .is_some_and(|name| !name.is_empty() && self.sensitive.is_match(name))
    }
}

impl Redactor for ArgRedactor {
    fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError> {
        for body in entry.bodies_mut() {
            self.redact_value(body);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redactor::REDACTED;
    use serde_json::json;

    fn redact_secrets(uri: &str, body: Value) -> Value {
        let mut entry = LogEntry::new("GET", uri);
        entry.response_body = Some(body);
        SecretRedactor::new().unwrap().redact(&mut entry).unwrap();
        entry.response_body.unwrap()
    }

    fn redact_args(body: Value) -> Value {
        let mut entry = LogEntry::new("POST", "/v3/clusters");
        entry.request_body = Some(body);
        ArgRedactor::new(Regex::new("[tT]oken|[pP]assword").unwrap())
            .redact(&mut entry)
            .unwrap();
        entry.request_body.unwrap()
    }

    // -- secrets --------------------------------------------------------------

    #[test]
    fn secret_data_is_blanked_wholesale() {
        let got = redact_secrets("/api/v1/secrets", json!({"type": "Opaque", "data": {"foo": "bar"}}));
        assert_eq!(got, json!({"type": "Opaque", "data": REDACTED}));
    }

    #[test]
    fn unrelated_uri_leaves_data_alone() {
        let body = json!({"type": "Opaque", "data": {"foo": "bar"}});
        assert_eq!(redact_secrets("/v3/clusters", body.clone()), body);
    }

    #[test]
    fn base_type_marks_whole_collection() {
        let got = redact_secrets(
            "/v3/project/local:p-1/namespacedcertificates",
            json!({"type": "collection", "data": [
                {"baseType": "namespacedSecret", "id": "a", "data": {"k": "v"}},
                {"baseType": "certificate", "id": "b", "data": {"k": "v"}}
            ]}),
        );
        assert_eq!(got["data"][0]["data"], json!(REDACTED));
        assert_eq!(got["data"][1]["data"], json!(REDACTED));
        assert_eq!(got["data"][1]["id"], json!("b"));
    }

    #[test]
    fn nested_base_type_marks_body() {
        let got = redact_secrets(
            "/v3/things",
            json!({"wrapper": {"baseType": "secret"}, "data": {"k": "v"}}),
        );
        assert_eq!(got, json!({"wrapper": {"baseType": "secret"}, "data": REDACTED}));
    }

    #[test]
    fn unrelated_base_type_leaves_body_alone() {
        let body = json!({"type": "collection", "data": [{"baseType": "certificate", "data": {"k": "v"}}]});
        assert_eq!(redact_secrets("/v3/certificates", body.clone()), body);
    }

    #[test]
    fn kube_list_items_are_redacted() {
        let got = redact_secrets(
            "/k8s/clusters/local/api/v1/configmaps",
            json!({"kind": "ConfigMapList", "items": [{"metadata": {"name": "a"}, "data": {"x": "1"}}]}),
        );
        assert_eq!(
            got,
            json!({"kind": "ConfigMapList", "items": [{"metadata": {"name": "a"}, "data": REDACTED}]})
        );
    }

    #[test]
    fn flattened_objects_keep_only_identity_fields() {
        let got = redact_secrets(
            "/v3/secrets",
            json!({"id": "p:s", "created": "now", "baseType": "secret", "type": "Opaque", "foo": "x"}),
        );
        assert_eq!(
            got,
            json!({"id": "p:s", "created": "now", "baseType": "secret", "type": REDACTED, "foo": REDACTED})
        );
    }

    #[test]
    fn last_applied_annotation_is_blanked() {
        let got = redact_secrets(
            "/secrets",
            json!({
                "stringData": {"s": "1"},
                "metadata": {"name": "n", "annotations": {LAST_APPLIED_ANNOTATION: "{}", "other": "kept"}}
            }),
        );
        assert_eq!(got["stringData"], json!(REDACTED));
        assert_eq!(got["metadata"]["annotations"][LAST_APPLIED_ANNOTATION], json!(REDACTED));
        assert_eq!(got["metadata"]["annotations"]["other"], json!("kept"));
        assert_eq!(got["metadata"]["name"], json!("n"));
    }

    #[test]
    fn non_object_bodies_are_ignored() {
        assert_eq!(redact_secrets("/secrets", json!(["a", "b"])), json!(["a", "b"]));
    }

    // -- args -----------------------------------------------------------------

    #[test]
    fn value_after_sensitive_flag_is_blanked() {
        let got = redact_args(json!({"data": {"commands": ["--user", "user", "--token", "sometoken"]}}));
        assert_eq!(got, json!({"data": {"commands": ["--user", "user", "--token", REDACTED]}}));
    }

    #[test]
    fn trailing_sensitive_flag_is_left_alone() {
        let body = json!({"commands": ["--user", "user", "--token"]});
        assert_eq!(redact_args(body.clone()), body);
    }

    #[test]
    fn nested_arrays_are_scanned() {
        let got = redact_args(json!([["--password", "pw"], {"args": ["--name", "n"]}]));
        assert_eq!(got, json!([["--password", REDACTED], {"args": ["--name", "n"]}]));
    }
}
