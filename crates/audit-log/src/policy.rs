use std::fmt;
use std::sync::Arc;

use audit_policy::{Action, AuditPolicy, Filter, FilterError, Verbosity};

use crate::entry::LogEntry;
use crate::redactor::{RedactError, Redaction, Redactor, RedactorError};

/// An [`AuditPolicy`] failed to compile.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to create filter {index}: {source}")]
    Filter {
        index: usize,
        #[source]
        source: FilterError,
    },

    #[error("failed to create redaction {index}: {source}")]
    Redaction {
        index: usize,
        #[source]
        source: RedactorError,
    },

    #[error("failed to compile built-in pattern: {0}")]
    Builtin(#[from] regex::Error),
}

/// A compiled policy: URI filters, the redactors to run on entries it
/// allows, and the verbosity it asks for.
pub struct Policy {
    name: String,
    filters: Vec<Filter>,
    redactors: Vec<Arc<dyn Redactor>>,
    verbosity: Verbosity,
}

impl Policy {
    /// Compile `spec`. Fails on the first filter or redaction that does not
    /// compile.
    pub fn new(spec: &AuditPolicy) -> Result<Self, PolicyError> {
        let filters = spec
            .filters
            .iter()
            .enumerate()
            .map(|(index, f)| Filter::new(f).map_err(|source| PolicyError::Filter { index, source }))
            .collect::<Result<Vec<_>, _>>()?;

        let redactors = spec
            .additional_redactions
            .iter()
            .enumerate()
            .map(|(index, r)| {
                Redaction::new(r)
                    .map(|r| Arc::new(r) as Arc<dyn Redactor>)
                    .map_err(|source| PolicyError::Redaction { index, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: spec.key(),
            filters,
            redactors,
            verbosity: spec.verbosity.effective(),
        })
    }

    /// Assemble a policy from already compiled parts.
    pub fn from_parts(
        name: impl Into<String>,
        filters: Vec<Filter>,
        redactors: Vec<Arc<dyn Redactor>>,
        verbosity: Verbosity,
    ) -> Self {
        Self {
            name: name.into(),
            filters,
            redactors,
            verbosity: verbosity.effective(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verbosity(&self) -> &Verbosity {
        &self.verbosity
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn redactors(&self) -> &[Arc<dyn Redactor>] {
        &self.redactors
    }

    pub fn action_for_uri(&self, uri: &str) -> Action {
        Action::from_filters(&self.filters, uri)
    }

    pub fn action_for_log(&self, entry: &LogEntry) -> Action {
        self.action_for_uri(&entry.request_uri)
    }

    /// Run every redactor of this policy over `entry`.
    pub fn redact(&self, entry: &mut LogEntry) -> Result<(), RedactError> {
        for redactor in &self.redactors {
            redactor.redact(entry)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Policy")
            .field("name", &self.name)
            .field("filters", &self.filters.len())
            .field("redactors", &self.redactors.len())
            .field("verbosity", &self.verbosity)
            .finish()
    }
}
