//! Structured errors surfaced across the scheduler's public API.

use std::fmt;

/// The closed set of error codes the scheduler can surface.
///
/// Marked `#[non_exhaustive]` so new variants can be added in a minor
/// release without breaking callers that match exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[non_exhaustive]
pub enum CronErrorCode {
    /// A handler invocation exceeded its effective timeout.
    ETimeout,
    /// A run was canceled explicitly, by shutdown, or by timeout.
    ECanceled,
    /// The scheduler is draining or stopped; the operation was refused.
    EShutdown,
    /// Retry attempts were exhausted without success.
    ERetryLimit,
    /// Invalid configuration (limits, duplicate job, missing handler, ...).
    EConfiguration,
    /// A referenced job, trigger, or run does not exist.
    ENotFound,
    /// A job or trigger with the same identity is already registered.
    EDuplicate,
    /// The operation is not valid in the current state (e.g. unregistering
    /// a job with active runs without `force`).
    EState,
    /// The requested capability is not supported by this build.
    EUnsupported,
    /// An internal invariant violation (e.g. a critical-path store write
    /// failure) that the caller cannot remedy directly.
    EInternal,
}

impl fmt::Display for CronErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CronErrorCode::ETimeout => "E_TIMEOUT",
            CronErrorCode::ECanceled => "E_CANCELED",
            CronErrorCode::EShutdown => "E_SHUTDOWN",
            CronErrorCode::ERetryLimit => "E_RETRY_LIMIT",
            CronErrorCode::EConfiguration => "E_CONFIGURATION",
            CronErrorCode::ENotFound => "E_NOT_FOUND",
            CronErrorCode::EDuplicate => "E_DUPLICATE",
            CronErrorCode::EState => "E_STATE",
            CronErrorCode::EUnsupported => "E_UNSUPPORTED",
            CronErrorCode::EInternal => "E_INTERNAL",
        };
        f.write_str(s)
    }
}

/// A structured scheduler error.
///
/// Every fallible public operation returns this type (or a `Result` of it)
/// rather than an ad-hoc `String` or `anyhow::Error`, so callers can match
/// on [`CronErrorCode`] instead of parsing messages.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct CronError {
    pub code: CronErrorCode,
    pub message: String,
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub details: Option<serde_json::Value>,
    /// Cleanup errors suppressed during shutdown unwind, attached rather
    /// than silently dropped.
    pub suppressed: Vec<CronError>,
}

impl CronError {
    pub fn new(code: CronErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
            details: None,
            suppressed: Vec::new(),
        }
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suppressed(mut self, suppressed: Vec<CronError>) -> Self {
        self.suppressed = suppressed;
        self
    }

    pub fn duplicate(what: impl fmt::Display) -> Self {
        Self::new(CronErrorCode::EDuplicate, format!("'{what}' already registered"))
    }

    pub fn not_found(what: impl fmt::Display) -> Self {
        Self::new(CronErrorCode::ENotFound, format!("'{what}' not found"))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::EConfiguration, message)
    }

    pub fn shutdown() -> Self {
        Self::new(CronErrorCode::EShutdown, "scheduler is draining or stopped")
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::EState, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::EInternal, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::ETimeout, message)
    }

    pub fn canceled(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::ECanceled, message)
    }

    pub fn retry_limit(message: impl Into<String>) -> Self {
        Self::new(CronErrorCode::ERetryLimit, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_message() {
        let e = CronError::duplicate("daily-report");
        assert_eq!(e.to_string(), "E_DUPLICATE: 'daily-report' already registered");
    }

    #[test]
    fn not_found_contains_identifier() {
        let e = CronError::not_found("nope");
        assert!(e.to_string().contains("nope"));
        assert_eq!(e.code, CronErrorCode::ENotFound);
    }

    #[test]
    fn suppressed_errors_are_attached_not_dropped() {
        let cleanup_failure = CronError::internal("flush failed");
        let primary = CronError::shutdown().with_suppressed(vec![cleanup_failure]);
        assert_eq!(primary.suppressed.len(), 1);
        assert_eq!(primary.suppressed[0].code, CronErrorCode::EInternal);
    }

    #[test]
    fn code_display_matches_spec_names() {
        assert_eq!(CronErrorCode::ETimeout.to_string(), "E_TIMEOUT");
        assert_eq!(CronErrorCode::ERetryLimit.to_string(), "E_RETRY_LIMIT");
    }
}
