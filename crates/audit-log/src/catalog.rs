//! Provider credential-field catalogue.
//!
//! Maps a provider (machine driver) name to named lists of the credential
//! fields its configuration objects carry. Lists whose name starts with
//! `public` or `optional` hold fields that are safe to log; every other list
//! holds fields the default policy must blank.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const PUBLIC_CREDENTIAL_FIELDS: &str = "publicCredentialFields";
pub const PRIVATE_CREDENTIAL_FIELDS: &str = "privateCredentialFields";
pub const PASSWORD_FIELDS: &str = "passwordFields";
pub const OPTIONAL_CREDENTIAL_FIELDS: &str = "optionalCredentialFields";

// ---------------------------------------------------------------------------
// Builtin driver table
// ---------------------------------------------------------------------------

struct DriverFields {
    name: &'static str,
    public: &'static [&'static str],
    private: &'static [&'static str],
    password: &'static [&'static str],
    optional: &'static [&'static str],
}

const fn driver(
    name: &'static str,
    public: &'static [&'static str],
    private: &'static [&'static str],
) -> DriverFields {
    DriverFields {
        name,
        public,
        private,
        password: &[],
        optional: &[],
    }
}

static BUILTIN_DRIVERS: &[DriverFields] = &[
    driver("amazonec2", &["accessKey"], &["secretKey"]),
    DriverFields {
        optional: &["tenantId"],
        ..driver(
            "azure",
            &["clientId", "subscriptionId", "tenantId", "environment"],
            &["clientSecret"],
        )
    },
    driver("digitalocean", &[], &["accessToken"]),
    driver("exoscale", &[], &["apiSecretKey"]),
    DriverFields {
        optional: &["clusterId"],
        ..driver("harvester", &["clusterType", "clusterId"], &["kubeconfigContent"])
    },
    DriverFields {
        password: &["rootPass"],
        ..driver("linode", &[], &["token"])
    },
    driver("nutanix", &["endpoint", "username", "port"], &["password"]),
    DriverFields {
        password: &["privateKeyPassphrase"],
        ..driver("oci", &["tenancyId", "userId", "fingerprint"], &["privateKeyContents"])
    },
    driver("otc", &["accessKey", "username"], &["secretKey", "password", "token"]),
    driver("openstack", &[], &["password"]),
    driver("packet", &[], &["apiKey"]),
    driver("pnap", &["clientIdentifier"], &["clientSecret"]),
    driver("rackspace", &[], &["apiKey"]),
    driver("softlayer", &[], &["apiKey"]),
    driver("vmwarevsphere", &["username", "vcenter", "vcenterPort"], &["password"]),
    driver("google", &[], &["authEncodedJson"]),
    driver("outscale", &["accessKey", "region"], &["secretKey"]),
];

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Provider name to list name to field names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderCatalog(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl ProviderCatalog {
    /// The catalogue of the machine drivers shipped with the server.
    pub fn builtin() -> Self {
        let mut providers = BTreeMap::new();
        for d in BUILTIN_DRIVERS {
            let mut lists = BTreeMap::new();
            for (list, fields) in [
                (PUBLIC_CREDENTIAL_FIELDS, d.public),
                (PRIVATE_CREDENTIAL_FIELDS, d.private),
                (PASSWORD_FIELDS, d.password),
                (OPTIONAL_CREDENTIAL_FIELDS, d.optional),
            ] {
                if !fields.is_empty() {
                    lists.insert(
                        list.to_string(),
                        fields.iter().map(|f| f.to_string()).collect(),
                    );
                }
            }
            providers.insert(d.name.to_string(), lists);
        }
        Self(providers)
    }

    /// Read a catalogue from a YAML file shaped like
    /// `{provider: {listName: [field, ...]}}`.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read provider catalog: {}", path.display()))?;
        serde_yml::from_str(&contents)
            .with_context(|| format!("failed to parse provider catalog: {}", path.display()))
    }

    /// Overlay `other` on top of this catalogue. A provider present in both
    /// keeps its own lists except those `other` redefines.
    pub fn merge(&mut self, other: ProviderCatalog) {
        for (provider, lists) in other.0 {
            self.0.entry(provider).or_default().extend(lists);
        }
    }

    pub fn insert(&mut self, provider: impl Into<String>, list: impl Into<String>, fields: Vec<String>) {
        self.0
            .entry(provider.into())
            .or_default()
            .insert(list.into(), fields);
    }

    pub fn providers(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Every field name listed under a sensitive list, deduplicated and
    /// sorted.
    pub fn sensitive_fields(&self) -> Vec<String> {
        let fields: BTreeSet<&String> = self
            .0
            .values()
            .flat_map(|lists| lists.iter())
            .filter(|(list, _)| is_sensitive_list(list))
            .flat_map(|(_, fields)| fields)
            .collect();
        fields.into_iter().cloned().collect()
    }
}

fn is_sensitive_list(name: &str) -> bool {
    !(name.starts_with("public") || name.starts_with("optional"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_sensitive_fields() {
        let fields = ProviderCatalog::builtin().sensitive_fields();
        for expected in ["secretKey", "clientSecret", "rootPass", "privateKeyPassphrase", "authEncodedJson"] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}");
        }
        for public in ["accessKey", "tenantId", "clusterId", "username", "region"] {
            assert!(!fields.iter().any(|f| f == public), "{public} should not be sensitive");
        }
    }

    #[test]
    fn sensitive_fields_are_deduplicated() {
        let fields = ProviderCatalog::builtin().sensitive_fields();
        let passwords = fields.iter().filter(|f| *f == "password").count();
        assert_eq!(passwords, 1);
    }

    #[test]
    fn merge_adds_and_replaces_lists() {
        let mut catalog = ProviderCatalog::builtin();
        let mut extra = ProviderCatalog::default();
        extra.insert("custom", PRIVATE_CREDENTIAL_FIELDS, vec!["customSecret".into()]);
        extra.insert("amazonec2", PRIVATE_CREDENTIAL_FIELDS, vec!["sessionKey".into()]);
        catalog.merge(extra);

        let fields = catalog.sensitive_fields();
        assert!(fields.contains(&"customSecret".to_string()));
        assert!(fields.contains(&"sessionKey".to_string()));
        assert!(catalog.providers().any(|p| p == "custom"));
    }

    #[test]
    fn load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(
            &path,
            "acme:\n  publicCredentialFields: [apiUser]\n  privateCredentialFields: [apiSecret]\n",
        )
        .unwrap();

        let catalog = ProviderCatalog::from_yaml_file(&path).unwrap();
        assert_eq!(catalog.sensitive_fields(), vec!["apiSecret".to_string()]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ProviderCatalog::from_yaml_file("/does/not/exist.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read provider catalog"));
    }
}
