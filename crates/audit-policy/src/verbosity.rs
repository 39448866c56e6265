use crate::schema::{Level, LogVerbosity, Verbosity};

impl Verbosity {
    /// Expand a level into its preset switches.
    ///
    /// * `Null`: nothing
    /// * `Metadata`: request and response headers
    /// * `Request`: `Metadata` plus the request body
    /// * `RequestResponse`: `Request` plus the response body
    pub fn for_level(level: Level) -> Self {
        let request_body = level >= Level::Request;
        let response_body = level >= Level::RequestResponse;
        let headers = level >= Level::Metadata;
        Self {
            level,
            request: LogVerbosity {
                headers,
                body: request_body,
            },
            response: LogVerbosity {
                headers,
                body: response_body,
            },
        }
    }

    /// The switches this verbosity stands for: a non-`Null` level replaces the
    /// explicit booleans with its preset.
    pub fn effective(&self) -> Self {
        match self.level {
            Level::Null => *self,
            level => Self::for_level(level),
        }
    }

    /// Field-by-field OR of two verbosities. Commutative.
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            level: self.level.max(other.level),
            request: self.request.merge(&other.request),
            response: self.response.merge(&other.response),
        }
    }
}

impl LogVerbosity {
    fn merge(&self, other: &Self) -> Self {
        Self {
            headers: self.headers || other.headers,
            body: self.body || other.body,
        }
    }
}
