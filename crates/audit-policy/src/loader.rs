use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::schema::AuditPolicy;

/// Load an [`AuditPolicy`] from a YAML file on disk.
pub fn load_policy(path: impl AsRef<Path>) -> Result<AuditPolicy> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read policy file: {}", path.display()))?;
    load_policy_from_str(&contents)
        .with_context(|| format!("failed to parse policy file: {}", path.display()))
}

/// Parse and validate an [`AuditPolicy`] from a YAML string.
///
/// Patterns are not compiled here; that happens when the policy is
/// registered with a writer.
pub fn load_policy_from_str(yaml: &str) -> Result<AuditPolicy> {
    let policy: AuditPolicy = serde_yml::from_str(yaml).context("YAML deserialization failed")?;
    validate(&policy)?;
    Ok(policy)
}

/// List the policy files (`*.yaml`, `*.yml`) in `dir`, sorted by name.
pub fn policy_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read policy directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("failed to list policy directory: {}", dir.display()))?
            .path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    tracing::debug!(dir = %dir.display(), count = files.len(), "found policy files");
    Ok(files)
}

fn validate(policy: &AuditPolicy) -> Result<()> {
    if policy.name.trim().is_empty() {
        bail!("policy name must not be empty");
    }

    let mut seen = HashSet::new();
    for (index, filter) in policy.filters.iter().enumerate() {
        if filter.request_uri.is_empty() {
            bail!("filter {index} has an empty requestURI pattern");
        }
        if !seen.insert((filter.action, &filter.request_uri)) {
            bail!(
                "duplicate filter: {:?} '{}'",
                filter.action,
                filter.request_uri
            );
        }
    }

    Ok(())
}
