//! Policy-driven, redacting JSON-lines audit log for HTTP API traffic.
//!
//! A [`Writer`] holds a registry of compiled [`Policy`] values keyed by name.
//! For every [`LogEntry`] it decides whether the exchange is recorded at all,
//! decodes the captured bodies, runs the built-in and policy-supplied
//! [`Redactor`]s, and appends the result as a single newline-terminated JSON
//! object to its output.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use audit_log::{FileSink, LogEntry, Writer, WriterOptions};
//! use audit_policy::Level;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sink = FileSink::open("/var/log/auditlog/rancher-api-audit.log")?;
//! let writer = Writer::new(
//!     sink,
//!     WriterOptions {
//!         default_policy_level: Level::Metadata,
//!         ..WriterOptions::default()
//!     },
//! )?;
//!
//! let policy = audit_policy::loader::load_policy("policies/secrets.yaml")?;
//! writer.update_policy(&policy)?;
//!
//! let mut entry = LogEntry::new("GET", "/v3/clusters");
//! entry.response_code = 200;
//! writer.write(&mut entry)?;
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod defaults;
mod entry;
mod policy;
mod redactor;
mod secrets;
mod sink;
mod writer;

// Re-export primary public types at the crate root for convenience.
pub use catalog::ProviderCatalog;
pub use entry::{header_value, Headers, LogEntry, User, AUDIT_LOG_ERROR_KEY};
pub use policy::{Policy, PolicyError};
pub use redactor::{RedactError, Redaction, Redactor, RedactorError, RedactorFn, REDACTED};
pub use secrets::{ArgRedactor, SecretRedactor};
pub use sink::{FileSink, MemorySink, SinkError};
pub use writer::{WriteError, Writer, WriterOptions};
