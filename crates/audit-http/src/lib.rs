//! HTTP capture middleware for the audit log.
//!
//! [`AuditLayer`] is a tower [`Layer`](tower::Layer) that records every
//! request/response exchange passing through it into an
//! [`audit_log::Writer`].
//!
//! # Lifecycle
//!
//! ```text
//! request ──> resolve verbosity ──> (read body if needed) ──> inner service
//!                                                                  │
//!            101 Switching Protocols: no entry  <──────────────────┤
//!                                                                  │
//! client <── CaptureBody (forwards frames, copies only if kept) <──┘
//!                 │
//!                 └─ on end / error / drop: trim, redact, write
//! ```
//!
//! The verbosity for a URI is resolved before the inner service runs, so the
//! decision to buffer a response body is made before any byte is produced.
//! Write failures never affect the response; they are logged through an
//! [`ErrorDebouncer`] so a broken sink cannot flood the logs.

mod capture;
mod debounce;
pub mod identity;
mod layer;

// Re-export the primary public types at the crate root for convenience.
pub use capture::CaptureBody;
pub use debounce::{ErrorDebouncer, DEFAULT_WINDOW};
pub use identity::AUDIT_ID_HEADER;
pub use layer::{AuditLayer, AuditService};
