//! # audit-policy
//!
//! The audit policy model: the serde schema operators write in YAML, the
//! verbosity presets and their merge rule, and compiled request-URI filters
//! with the allow/deny combination rules used by the writer.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use audit_policy::{loader, Action, Filter};
//!
//! let policy = loader::load_policy("policies/secrets.yaml").unwrap();
//! let filters = policy
//!     .filters
//!     .iter()
//!     .map(Filter::new)
//!     .collect::<Result<Vec<_>, _>>()
//!     .unwrap();
//! let action = Action::from_filters(&filters, "/api/v1/secrets");
//! println!("{action:?}");
//! ```

mod decision;
mod filter;
pub mod loader;
mod schema;
mod verbosity;

// Re-export primary public API at crate root.
pub use decision::Action;
pub use filter::{Filter, FilterError};
pub use schema::{
    AuditPolicy, FilterAction, FilterSpec, Level, LogVerbosity, PolicyCondition, PolicyStatus,
    RedactionSpec, Verbosity,
};
