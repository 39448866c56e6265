use std::collections::BTreeMap;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use audit_policy::{Action, AuditPolicy, Level, Verbosity};

use crate::catalog::ProviderCatalog;
use crate::defaults::default_policies;
use crate::entry::LogEntry;
use crate::policy::{Policy, PolicyError};
use crate::redactor::RedactError;

/// Errors that can occur while building a writer or writing an entry.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("failed to build default policies: {0}")]
    DefaultPolicy(#[source] PolicyError),

    #[error("failed to redact audit entry: {0}")]
    Redact(#[from] RedactError),

    #[error("failed to serialize audit entry: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write to audit log: {0}")]
    Write(std::io::Error),

    #[error("failed to flush audit log: {0}")]
    Flush(std::io::Error),
}

#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Level every request is recorded at before policies add to it.
    pub default_policy_level: Level,
    /// Skip the built-in sensitive-data policies.
    pub disable_default_policies: bool,
    /// Credential fields to treat as sensitive in the default policies.
    pub catalog: ProviderCatalog,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            default_policy_level: Level::Null,
            disable_default_policies: false,
            catalog: ProviderCatalog::builtin(),
        }
    }
}

/// Policy registry plus the redacting JSON-lines write path.
///
/// Request-path calls ([`resolve_verbosity`](Self::resolve_verbosity),
/// [`write`](Self::write), [`get_policy`](Self::get_policy)) share a read
/// lock on the registry; [`update_policy`](Self::update_policy) and
/// [`remove_policy`](Self::remove_policy) take the write lock. Output lines
/// are serialized through their own mutex so concurrent writes never
/// interleave.
pub struct Writer {
    policies: RwLock<BTreeMap<String, Arc<Policy>>>,
    defaults: Vec<Policy>,
    default_verbosity: Verbosity,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Writer {
    pub fn new(output: impl Write + Send + 'static, options: WriterOptions) -> Result<Self, WriteError> {
        let defaults = if options.disable_default_policies {
            Vec::new()
        } else {
            default_policies(&options.catalog).map_err(WriteError::DefaultPolicy)?
        };

        tracing::debug!(
            level = %options.default_policy_level,
            defaults = defaults.len(),
            "audit writer created"
        );

        Ok(Self {
            policies: RwLock::new(BTreeMap::new()),
            defaults,
            default_verbosity: Verbosity::for_level(options.default_policy_level),
            output: Mutex::new(Box::new(output)),
        })
    }

    // -----------------------------------------------------------------------
    // Registry
    // -----------------------------------------------------------------------

    /// Compile `spec` and register it, replacing any policy with the same
    /// key. On a compile error the registry is left untouched.
    pub fn update_policy(&self, spec: &AuditPolicy) -> Result<(), PolicyError> {
        let policy = Arc::new(Policy::new(spec)?);
        let key = policy.name().to_string();

        let replaced = self
            .policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), policy)
            .is_some();

        tracing::debug!(policy = %key, replaced, "audit policy registered");
        Ok(())
    }

    /// Unregister the policy with `spec`'s key. Returns whether one existed.
    pub fn remove_policy(&self, spec: &AuditPolicy) -> bool {
        let key = spec.key();
        let removed = self
            .policies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();

        tracing::debug!(policy = %key, removed, "audit policy removed");
        removed
    }

    pub fn get_policy(&self, name: &str) -> Option<Arc<Policy>> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    // -----------------------------------------------------------------------
    // Request path
    // -----------------------------------------------------------------------

    pub fn default_verbosity(&self) -> Verbosity {
        self.default_verbosity
    }

    /// The verbosity a request to `uri` is recorded at: the default level
    /// merged with every registered policy whose filters allow `uri`.
    pub fn resolve_verbosity(&self, uri: &str) -> Verbosity {
        let policies = self.policies.read().unwrap_or_else(PoisonError::into_inner);
        policies
            .values()
            .filter(|policy| policy.action_for_uri(uri) == Action::Allow)
            .fold(self.default_verbosity, |acc, policy| acc.merge(policy.verbosity()))
    }

    /// Redact `entry` and append it to the output as one JSON line.
    ///
    /// Entries denied by the registered policies are dropped without error.
    /// The default policies always run; registered policies only contribute
    /// their redactors when they allow the entry.
    pub fn write(&self, entry: &mut LogEntry) -> Result<(), WriteError> {
        let (action, matched) = {
            let policies = self.policies.read().unwrap_or_else(PoisonError::into_inner);
            let mut action = Action::Unknown;
            let mut matched = Vec::new();
            for policy in policies.values() {
                let verdict = policy.action_for_log(entry);
                if verdict == Action::Allow {
                    matched.push(Arc::clone(policy));
                }
                action = action.combine(verdict);
            }
            (action, matched)
        };

        if action.is_deny() {
            tracing::trace!(uri = %entry.request_uri, "audit entry denied by policy");
            return Ok(());
        }

        entry.prepare();

        for policy in &self.defaults {
            if policy.action_for_log(entry) == Action::Allow {
                policy.redact(entry)?;
            }
        }
        for policy in &matched {
            policy.redact(entry)?;
        }

        let mut line = serde_json::to_vec(&*entry)?;
        line.push(b'\n');

        let mut output = self.output.lock().unwrap_or_else(PoisonError::into_inner);
        output.write_all(&line).map_err(WriteError::Write)?;
        output.flush().map_err(WriteError::Flush)?;

        tracing::trace!(audit_id = %entry.audit_id, bytes = line.len(), "audit entry written");
        Ok(())
    }
}

impl std::fmt::Debug for Writer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Writer")
            .field("policies", &self.policy_names())
            .field("defaults", &self.defaults.len())
            .field("default_verbosity", &self.default_verbosity)
            .finish_non_exhaustive()
    }
}
