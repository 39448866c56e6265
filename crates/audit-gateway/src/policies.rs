use std::path::{Path, PathBuf};

use anyhow::Result;
use audit_log::Writer;
use audit_policy::{loader, AuditPolicy, PolicyStatus};
use tracing::{info, warn};

/// Outcome of reconciling one policy file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyReport {
    pub file: PathBuf,
    /// Registration key, absent when the file could not be parsed.
    pub key: Option<String>,
    pub status: PolicyStatus,
}

/// Bring the writer in line with a single policy object.
///
/// Enabled policies are compiled and installed; a policy that fails to compile
/// is reported invalid and whatever was installed under its key stays in
/// place. Disabled policies are removed.
pub fn reconcile(writer: &Writer, policy: &AuditPolicy) -> PolicyStatus {
    let key = policy.key();

    if !policy.enabled {
        let removed = writer.remove_policy(policy);
        info!(policy = %key, removed, "audit policy disabled");
        return PolicyStatus::disabled();
    }

    match writer.update_policy(policy) {
        Ok(()) => {
            info!(
                policy = %key,
                filters = policy.filters.len(),
                redactions = policy.additional_redactions.len(),
                level = %policy.verbosity.level,
                "audit policy active"
            );
            PolicyStatus::active()
        }
        Err(err) => {
            warn!(policy = %key, %err, "audit policy rejected");
            PolicyStatus::invalid(err.to_string())
        }
    }
}

/// Reconcile every policy file in `dir` against `writer`.
///
/// Only a missing or unreadable directory is an error; bad files are reported
/// invalid and skipped.
pub fn load_dir(writer: &Writer, dir: &Path) -> Result<Vec<PolicyReport>> {
    let files = loader::policy_files(dir)?;
    let mut reports = Vec::with_capacity(files.len());

    for file in files {
        let report = match loader::load_policy(&file) {
            Ok(policy) => PolicyReport {
                key: Some(policy.key()),
                status: reconcile(writer, &policy),
                file,
            },
            Err(err) => {
                warn!(file = %file.display(), err = format!("{err:#}"), "skipping policy file");
                PolicyReport {
                    key: None,
                    status: PolicyStatus::invalid(format!("{err:#}")),
                    file,
                }
            }
        };
        reports.push(report);
    }

    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audit_log::{MemorySink, WriterOptions};
    use audit_policy::{loader::load_policy_from_str, PolicyCondition};

    fn writer() -> Writer {
        Writer::new(
            MemorySink::new(),
            WriterOptions {
                disable_default_policies: true,
                ..WriterOptions::default()
            },
        )
        .unwrap()
    }

    const SECRETS: &str = r#"
name: secrets
namespace: cattle-system
filters:
  - action: allow
    requestURI: "/api/v1/secrets.*"
verbosity:
  level: 3
"#;

    // -- reconcile ---------------------------------------------------------

    #[test]
    fn enabled_policy_becomes_active() {
        let writer = writer();
        let policy = load_policy_from_str(SECRETS).unwrap();

        let status = reconcile(&writer, &policy);

        assert_eq!(status, PolicyStatus::active());
        assert!(writer.get_policy("cattle-system/secrets").is_some());
    }

    #[test]
    fn disabling_removes_installed_policy() {
        let writer = writer();
        let mut policy = load_policy_from_str(SECRETS).unwrap();
        reconcile(&writer, &policy);

        policy.enabled = false;
        let status = reconcile(&writer, &policy);

        assert_eq!(status.condition, PolicyCondition::Disabled);
        assert!(writer.policy_names().is_empty());
    }

    #[test]
    fn bad_pattern_is_invalid_and_keeps_previous() {
        let writer = writer();
        let mut policy = load_policy_from_str(SECRETS).unwrap();
        reconcile(&writer, &policy);

        policy.filters[0].request_uri = "([".to_string();
        let status = reconcile(&writer, &policy);

        assert_eq!(status.condition, PolicyCondition::Invalid);
        assert!(status.message.is_some());
        let kept = writer.get_policy("cattle-system/secrets").unwrap();
        assert_eq!(kept.filters().len(), 1);
    }

    // -- load_dir ----------------------------------------------------------

    #[test]
    fn directory_reports_each_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a-secrets.yaml"), SECRETS).unwrap();
        std::fs::write(dir.path().join("b-broken.yaml"), "name: [unclosed").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let writer = writer();
        let reports = load_dir(&writer, dir.path()).unwrap();

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].key.as_deref(), Some("cattle-system/secrets"));
        assert_eq!(reports[0].status, PolicyStatus::active());
        assert!(reports[1].key.is_none());
        assert_eq!(reports[1].status.condition, PolicyCondition::Invalid);
        assert_eq!(writer.policy_names(), vec!["cattle-system/secrets".to_string()]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let writer = writer();
        assert!(load_dir(&writer, Path::new("/does/not/exist")).is_err());
    }
}
