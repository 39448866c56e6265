//! The baseline policies every writer applies unless told otherwise.

use std::sync::Arc;

use audit_policy::{Filter, FilterAction, FilterSpec, RedactionSpec, Verbosity};
use regex::Regex;

use crate::catalog::ProviderCatalog;
use crate::policy::{Policy, PolicyError};
use crate::redactor::{Redaction, Redactor};
use crate::secrets::{ArgRedactor, SecretRedactor};

pub const SENSITIVE_POLICY: &str = "default-sensitive";
pub const KUBECONFIG_POLICY: &str = "default-kubeconfig";

/// Header names whose values are never logged.
pub const SENSITIVE_HEADERS: &[&str] = &[
    "Cookie",
    "Set-Cookie",
    "X-Api-Set-Cookie-Header",
    "Authorization",
    "X-Api-Tunnel-Params",
    "X-Api-Tunnel-Token",
    "X-Api-Auth-Header",
    "X-Amz-Security-Token",
];

/// Body key patterns whose values are never logged.
const SENSITIVE_KEY_PATTERNS: &[&str] = &[
    "[pP]assword",
    "[tT]oken",
    "[kK]ube[cC]onfig",
    "^([iI]nsecure)?([wW]indows)?([nN]ode)?[cC]ommand$",
    "^[mM]anifest[uU]rl$",
    "^secretsEncryptionConfig$",
    "^(credentials|applicationSecret|oauthCredential|serviceAccountCredential|spKey|spCert|certificate|privateKey)$",
];

const KUBECONFIG_ACTION_PATTERN: &str = r"[?&]action=generateKubeconfig";

/// One regex matching every sensitive body key, including the sensitive
/// credential fields declared by `catalog`.
pub fn sensitive_key_pattern(catalog: &ProviderCatalog) -> String {
    let mut patterns: Vec<String> = SENSITIVE_KEY_PATTERNS.iter().map(|p| p.to_string()).collect();

    let fields = catalog.sensitive_fields();
    if !fields.is_empty() {
        let names: Vec<String> = fields.iter().map(|f| regex::escape(f)).collect();
        patterns.push(format!("^({})$", names.join("|")));
    }

    patterns.join("|")
}

fn header_patterns() -> Vec<String> {
    SENSITIVE_HEADERS
        .iter()
        .map(|h| format!("^{}$", regex::escape(h)))
        .collect()
}

/// Build the default policy set against `catalog`.
///
/// * `default-sensitive` applies to every URI and blanks sensitive headers,
///   sensitive keys, Secret/ConfigMap payloads and sensitive `--flag` values.
/// * `default-kubeconfig` blanks `config` in `generateKubeconfig` action
///   responses.
pub fn default_policies(catalog: &ProviderCatalog) -> Result<Vec<Policy>, PolicyError> {
    let key_pattern = sensitive_key_pattern(catalog);

    let sensitive = Redaction::new(&RedactionSpec {
        headers: header_patterns(),
        keys: vec![key_pattern.clone()],
        paths: Vec::new(),
    })
    .map_err(|source| PolicyError::Redaction { index: 0, source })?;

    let redactors: Vec<Arc<dyn Redactor>> = vec![
        Arc::new(sensitive),
        Arc::new(SecretRedactor::new()?),
        Arc::new(ArgRedactor::new(Regex::new(&key_pattern)?)),
    ];
    let sensitive = Policy::from_parts(SENSITIVE_POLICY, Vec::new(), redactors, Verbosity::default());

    let filter = Filter::new(&FilterSpec {
        action: FilterAction::Allow,
        request_uri: KUBECONFIG_ACTION_PATTERN.to_string(),
    })
    .map_err(|source| PolicyError::Filter { index: 0, source })?;
    let config = Redaction::new(&RedactionSpec {
        paths: vec!["$.config".to_string()],
        ..RedactionSpec::default()
    })
    .map_err(|source| PolicyError::Redaction { index: 0, source })?;
    let kubeconfig = Policy::from_parts(
        KUBECONFIG_POLICY,
        vec![filter],
        vec![Arc::new(config)],
        Verbosity::default(),
    );

    Ok(vec![sensitive, kubeconfig])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_pattern_includes_catalog_fields() {
        let re = Regex::new(&sensitive_key_pattern(&ProviderCatalog::builtin())).unwrap();
        for key in ["password", "newPassword", "accessToken", "kubeconfigContent", "apiKey", "secretKey"] {
            assert!(re.is_match(key), "{key} should be sensitive");
        }
        for key in ["accessKey", "user", "commands", "normalField", "secretName", "tenantId"] {
            assert!(!re.is_match(key), "{key} should not be sensitive");
        }
    }

    #[test]
    fn command_pattern_covers_node_variants() {
        let re = Regex::new(&sensitive_key_pattern(&ProviderCatalog::default())).unwrap();
        for key in ["command", "nodeCommand", "insecureWindowsNodeCommand", "windowsNodeCommand"] {
            assert!(re.is_match(key), "{key} should be sensitive");
        }
    }

    #[test]
    fn catalog_fields_are_escaped() {
        let mut catalog = ProviderCatalog::default();
        catalog.insert("odd", "privateCredentialFields", vec!["a.b".into()]);
        let re = Regex::new(&sensitive_key_pattern(&catalog)).unwrap();
        assert!(re.is_match("a.b"));
        assert!(!re.is_match("axb"));
    }

    #[test]
    fn builds_both_default_policies() {
        let policies = default_policies(&ProviderCatalog::builtin()).unwrap();
        let names: Vec<_> = policies.iter().map(Policy::name).collect();
        assert_eq!(names, vec![SENSITIVE_POLICY, KUBECONFIG_POLICY]);
        assert_eq!(policies[0].redactors().len(), 3);
        assert!(policies[1]
            .action_for_uri("/v3/clusters/c-1?action=generateKubeconfig")
            .eq(&audit_policy::Action::Allow));
        assert!(policies[1].action_for_uri("/v3/clusters/c-1").is_deny());
    }
}
