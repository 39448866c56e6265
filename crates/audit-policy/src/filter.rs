use regex::Regex;

use crate::schema::{FilterAction, FilterSpec};

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("failed to compile request URI pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// A compiled [`FilterSpec`].
#[derive(Debug, Clone)]
pub struct Filter {
    action: FilterAction,
    uri: Regex,
}

impl Filter {
    pub fn new(spec: &FilterSpec) -> Result<Self, FilterError> {
        let uri = Regex::new(&spec.request_uri).map_err(|source| FilterError::InvalidPattern {
            pattern: spec.request_uri.clone(),
            source,
        })?;
        Ok(Self {
            action: spec.action,
            uri,
        })
    }

    pub fn action(&self) -> FilterAction {
        self.action
    }

    /// Whether the URI pattern matches, regardless of the action.
    pub fn matches(&self, uri: &str) -> bool {
        self.uri.is_match(uri)
    }

    /// True only for a matching `allow` filter.
    pub fn allowed(&self, uri: &str) -> bool {
        self.action == FilterAction::Allow && self.matches(uri)
    }
}
