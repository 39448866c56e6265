use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Identical error messages are surfaced at most once per this window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// Rate-limits error reporting by message text.
#[derive(Debug)]
pub struct ErrorDebouncer {
    window: Duration,
    last_reported: Mutex<HashMap<String, Instant>>,
}

impl ErrorDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_reported: Mutex::new(HashMap::new()),
        }
    }

    /// Whether `message` should be surfaced at `now`. Records `now` as the
    /// last report time when it should.
    pub fn should_report_at(&self, message: &str, now: Instant) -> bool {
        let mut last = self
            .last_reported
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if let Some(at) = last.get(message) {
            if now.saturating_duration_since(*at) < self.window {
                return false;
            }
        }

        let window = self.window;
        last.retain(|_, at| now.saturating_duration_since(*at) < window);
        last.insert(message.to_string(), now);
        true
    }

    /// Log `err` unless the same message was logged within the window.
    pub fn report(&self, err: &dyn fmt::Display) {
        let message = err.to_string();
        if self.should_report_at(&message, Instant::now()) {
            tracing::error!(error = %message, "failed to write audit log entry");
        } else {
            tracing::trace!(error = %message, "suppressed repeated audit error");
        }
    }
}

impl Default for ErrorDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
