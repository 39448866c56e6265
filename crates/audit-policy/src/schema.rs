use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named audit policy as supplied by an operator or a reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditPolicy {
    /// Unique name within the namespace.
    pub name: String,
    /// Optional namespace; the registry key is `namespace/name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Disabled policies are removed from the writer instead of compiled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// URI filters deciding which requests this policy applies to.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    /// Redactions applied on top of the built-in defaults.
    #[serde(default)]
    pub additional_redactions: Vec<RedactionSpec>,
    /// How much of each matching request/response is recorded.
    #[serde(default)]
    pub verbosity: Verbosity,
}

impl AuditPolicy {
    /// The key this policy is registered under.
    pub fn key(&self) -> String {
        match &self.namespace {
            Some(namespace) if !namespace.is_empty() => format!("{namespace}/{}", self.name),
            _ => self.name.clone(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// A request-URI regex paired with the action to take when it matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    pub action: FilterAction,
    #[serde(rename = "requestURI")]
    pub request_uri: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Allow,
    Deny,
}

/// Header-name regexes, body-key regexes and path expressions to blank.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RedactionSpec {
    #[serde(default)]
    pub headers: Vec<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub paths: Vec<String>,
}

// ---------------------------------------------------------------------------
// Verbosity
// ---------------------------------------------------------------------------

/// Shorthand for a preset [`Verbosity`].
///
/// Accepts either the level name or its numeric value (`0..=3`) when
/// deserialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "LevelRepr")]
pub enum Level {
    #[default]
    Null,
    Metadata,
    Request,
    RequestResponse,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LevelRepr {
    Number(u8),
    Name(String),
}

impl TryFrom<LevelRepr> for Level {
    type Error = String;

    fn try_from(repr: LevelRepr) -> Result<Self, Self::Error> {
        match repr {
            LevelRepr::Number(n) => Level::try_from(n),
            LevelRepr::Name(name) => name.parse(),
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            0 => Ok(Level::Null),
            1 => Ok(Level::Metadata),
            2 => Ok(Level::Request),
            3 => Ok(Level::RequestResponse),
            other => Err(format!("invalid audit level {other}; expected 0 to 3")),
        }
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(n) = s.parse::<u8>() {
            return Level::try_from(n);
        }
        match s.to_ascii_lowercase().as_str() {
            "null" => Ok(Level::Null),
            "metadata" => Ok(Level::Metadata),
            "request" => Ok(Level::Request),
            "requestresponse" => Ok(Level::RequestResponse),
            _ => Err(format!(
                "invalid audit level '{s}'; expected Null, Metadata, Request or RequestResponse"
            )),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Null => "Null",
            Level::Metadata => "Metadata",
            Level::Request => "Request",
            Level::RequestResponse => "RequestResponse",
        };
        f.write_str(name)
    }
}

/// What to keep from a request/response pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verbosity {
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub request: LogVerbosity,
    #[serde(default)]
    pub response: LogVerbosity,
}

/// Per-side switches of a [`Verbosity`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogVerbosity {
    #[serde(default)]
    pub headers: bool,
    #[serde(default)]
    pub body: bool,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Condition a reconciler reports back for a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyCondition {
    Active,
    Invalid,
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatus {
    pub condition: PolicyCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PolicyStatus {
    pub fn active() -> Self {
        Self {
            condition: PolicyCondition::Active,
            message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            condition: PolicyCondition::Invalid,
            message: Some(message.into()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            condition: PolicyCondition::Disabled,
            message: None,
        }
    }
}
