use std::fmt;

use audit_policy::RedactionSpec;
use path_expr::{ParseError, PathExpr};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use crate::entry::LogEntry;

/// The literal every redacted header value and body field is replaced with.
pub const REDACTED: &str = "[redacted]";

pub(crate) fn marker() -> Value {
    Value::String(REDACTED.to_string())
}

/// A rule that blanks parts of a [`LogEntry`] in place.
///
/// Redactors only ever write [`REDACTED`], so applying several in any order,
/// or one of them twice, gives the same result.
pub trait Redactor: Send + Sync {
    fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError>;
}

/// A redactor failed while rewriting an entry.
#[derive(Debug, thiserror::Error)]
#[error("redactor '{name}' failed: {reason}")]
pub struct RedactError {
    pub name: String,
    pub reason: String,
}

/// Adapts a plain function into a [`Redactor`].
pub struct RedactorFn<F> {
    name: &'static str,
    f: F,
}

impl<F> RedactorFn<F>
where
    F: Fn(&mut LogEntry) -> Result<(), RedactError> + Send + Sync,
{
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<F> Redactor for RedactorFn<F>
where
    F: Fn(&mut LogEntry) -> Result<(), RedactError> + Send + Sync,
{
    fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError> {
        (self.f)(entry)
    }
}

impl<F> fmt::Debug for RedactorFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedactorFn").field("name", &self.name).finish()
    }
}

// ---------------------------------------------------------------------------
// Declarative redaction
// ---------------------------------------------------------------------------

/// Which entry of a [`RedactionSpec`] failed to compile.
#[derive(Debug, thiserror::Error)]
pub enum RedactorError {
    #[error("failed to compile header pattern {index} '{pattern}': {source}")]
    Header {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to compile key pattern {index} '{pattern}': {source}")]
    Key {
        index: usize,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("failed to parse path {index} '{pattern}': {source}")]
    Path {
        index: usize,
        pattern: String,
        #[source]
        source: ParseError,
    },
}

/// A compiled [`RedactionSpec`]: header-name regexes, body-key regexes and
/// path expressions.
#[derive(Debug, Clone, Default)]
pub struct Redaction {
    headers: Vec<Regex>,
    keys: Vec<Regex>,
    paths: Vec<PathExpr>,
}

impl Redaction {
    /// Compile every pattern in `spec`.
    ///
    /// Header patterns ignore case since header names do.
    pub fn new(spec: &RedactionSpec) -> Result<Self, RedactorError> {
        let headers = spec
            .headers
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RedactorError::Header {
                        index,
                        pattern: pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<_, _>>()?;

        let keys = spec
            .keys
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                Regex::new(pattern).map_err(|source| RedactorError::Key {
                    index,
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;

        let paths = spec
            .paths
            .iter()
            .enumerate()
            .map(|(index, pattern)| {
                PathExpr::parse(pattern).map_err(|source| RedactorError::Path {
                    index,
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { headers, keys, paths })
    }

    fn header_matches(&self, name: &str) -> bool {
        self.headers.iter().any(|re| re.is_match(name))
    }

    fn key_matches(&self, key: &str) -> bool {
        self.keys.iter().any(|re| re.is_match(key))
    }

    fn redact_keys(&self, node: &mut Value) {
        match node {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if self.key_matches(key) {
                        *value = marker();
                    } else {
                        self.redact_keys(value);
                    }
                }
            }
            Value::Array(items) => items.iter_mut().for_each(|item| self.redact_keys(item)),
            _ => {}
        }
    }
}

impl Redactor for Redaction {
    fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError> {
        if !self.headers.is_empty() {
            for headers in entry.headers_mut() {
                for (name, values) in headers.iter_mut() {
                    if self.header_matches(name) {
                        *values = vec![REDACTED.to_string()];
                    }
                }
            }
        }

        let marker = marker();
        for body in entry.bodies_mut() {
            for path in &self.paths {
                path.set(body, &marker);
            }
            if !self.keys.is_empty() {
                self.redact_keys(body);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(headers: &[&str], keys: &[&str], paths: &[&str]) -> RedactionSpec {
        let owned = |v: &[&str]| v.iter().map(|s| s.to_string()).collect();
        RedactionSpec {
            headers: owned(headers),
            keys: owned(keys),
            paths: owned(paths),
        }
    }

    fn entry_with(body: Value) -> LogEntry {
        let mut entry = LogEntry::new("POST", "/v3/tokens");
        entry.request_body = Some(body);
        entry
    }

    #[test]
    fn password_key_is_redacted() {
        let redaction = Redaction::new(&spec(&[], &["[pP]assword"], &[])).unwrap();
        let mut entry = entry_with(json!({"password": "x", "user": "y"}));
        redaction.redact(&mut entry).unwrap();
        assert_eq!(entry.request_body, Some(json!({"password": REDACTED, "user": "y"})));
    }

    #[test]
    fn keys_are_redacted_at_any_depth() {
        let redaction = Redaction::new(&spec(&[], &["^token$"], &[])).unwrap();
        let mut entry = entry_with(json!({"items": [{"token": "a"}, {"nested": {"token": "b"}}]}));
        entry.response_body = Some(json!({"token": "c"}));
        redaction.redact(&mut entry).unwrap();

        assert_eq!(
            entry.request_body,
            Some(json!({"items": [{"token": REDACTED}, {"nested": {"token": REDACTED}}]}))
        );
        assert_eq!(entry.response_body, Some(json!({"token": REDACTED})));
    }

    #[test]
    fn headers_match_ignoring_case() {
        let redaction = Redaction::new(&spec(&["^x-custom-.*$"], &[], &[])).unwrap();
        let mut entry = LogEntry::new("GET", "/");
        entry
            .request_headers
            .insert("X-Custom-Secret".into(), vec!["a".into(), "b".into()]);
        entry.response_headers.insert("Accept".into(), vec!["*/*".into()]);
        redaction.redact(&mut entry).unwrap();

        assert_eq!(entry.request_headers["X-Custom-Secret"], vec![REDACTED.to_string()]);
        assert_eq!(entry.response_headers["Accept"], vec!["*/*".to_string()]);
    }

    #[test]
    fn paths_are_set_on_both_bodies() {
        let redaction = Redaction::new(&spec(&[], &[], &["$.spec.secret"])).unwrap();
        let mut entry = entry_with(json!({"spec": {"secret": "s", "name": "n"}}));
        entry.response_body = Some(json!({"spec": {"secret": {"deep": true}}}));
        redaction.redact(&mut entry).unwrap();

        assert_eq!(entry.request_body, Some(json!({"spec": {"secret": REDACTED, "name": "n"}})));
        assert_eq!(entry.response_body, Some(json!({"spec": {"secret": REDACTED}})));
    }

    #[test]
    fn redaction_is_idempotent() {
        let redaction =
            Redaction::new(&spec(&["authorization"], &["[tT]oken"], &["$..['key','cert']"])).unwrap();
        let mut entry = entry_with(json!({"a": {"key": 1, "cert": [1, 2]}, "accessToken": "t"}));
        entry
            .request_headers
            .insert("authorization".into(), vec!["Bearer x".into()]);

        redaction.redact(&mut entry).unwrap();
        let once = serde_json::to_value(&entry).unwrap();
        redaction.redact(&mut entry).unwrap();
        assert_eq!(serde_json::to_value(&entry).unwrap(), once);
    }

    #[test]
    fn compile_errors_name_the_failing_entry() {
        let err = Redaction::new(&spec(&["ok", "("], &[], &[])).unwrap_err();
        assert!(matches!(err, RedactorError::Header { index: 1, .. }), "got {err:?}");

        let err = Redaction::new(&spec(&[], &["[z-a]"], &[])).unwrap_err();
        assert!(err.to_string().starts_with("failed to compile key pattern 0"), "got {err}");

        let err = Redaction::new(&spec(&[], &[], &["spec.secret"])).unwrap_err();
        assert!(matches!(err, RedactorError::Path { index: 0, .. }), "got {err:?}");
    }

    #[test]
    fn function_adapter_runs_closure() {
        let redactor = RedactorFn::new("drop-method", |entry: &mut LogEntry| {
            entry.method.clear();
            Ok(())
        });
        let mut entry = LogEntry::new("DELETE", "/v3/clusters/c-1");
        redactor.redact(&mut entry).unwrap();
        assert!(entry.method.is_empty());
        assert_eq!(redactor.name(), "drop-method");
    }
}
