//! Error types for the assessment session controller.
//!
//! Errors are grouped by the category a presentation layer needs to react to:
//! load failures end the session before it starts, rejected actions and
//! execution failures are recoverable and surface inline, and configuration
//! errors stop the CLI before a session is created.

use std::path::PathBuf;

/// A specialized `Result` type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors that can occur while loading or driving an assessment session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your assess.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Load Failures
    // ========================================================================
    /// The assessment or its questions could not be loaded or started.
    ///
    /// Fatal to session start.
    #[error("Failed to {stage} assessment '{assessment_id}': {source}")]
    LoadFailure {
        /// Which load step failed ("load", "start", "load questions for").
        stage: &'static str,
        /// The assessment that was being loaded.
        assessment_id: String,
        /// Underlying collaborator error.
        source: BackendError,
    },

    /// The loaded assessment data violates an invariant.
    #[error("Assessment '{assessment_id}' is malformed: {message}")]
    MalformedAssessment {
        /// The assessment that was being loaded.
        assessment_id: String,
        /// Description of the violated invariant.
        message: String,
    },

    // ========================================================================
    // Recoverable Action Errors
    // ========================================================================
    /// A candidate action was rejected without altering state.
    #[error("Action rejected: {0}")]
    ActionRejected(#[from] Rejection),

    /// The execution collaborator returned an error outcome.
    #[error("Execution failed: {0}")]
    ExecutionFailure(BackendError),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SessionError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `LoadFailure` for the given load stage.
    #[must_use]
    pub fn load_failure(
        stage: &'static str,
        assessment_id: impl Into<String>,
        source: BackendError,
    ) -> Self {
        Self::LoadFailure {
            stage,
            assessment_id: assessment_id.into(),
            source,
        }
    }

    /// Creates a new `MalformedAssessment` error.
    #[must_use]
    pub fn malformed(assessment_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedAssessment {
            assessment_id: assessment_id.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error ends the session (or prevents it from starting).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. }
                | Self::ConfigValidationError { .. }
                | Self::LoadFailure { .. }
                | Self::MalformedAssessment { .. }
                | Self::InvalidStateTransition { .. }
        )
    }

    /// Returns `true` if the session continues after this error.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::ActionRejected(_) | Self::ExecutionFailure(_))
    }
}

// ============================================================================
// Rejection
// ============================================================================

/// Reasons a run/test/submit or editing action is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    /// Another request is already in flight for this session.
    #[error("another request is still running")]
    Busy,
    /// The deadline has passed.
    #[error("the assessment has expired")]
    Expired,
    /// The assessment has been submitted.
    #[error("the assessment has already been submitted")]
    Submitted,
    /// The assessment has not been started yet.
    #[error("the assessment has not been started")]
    NotStarted,
    /// The code buffer is empty or whitespace-only.
    #[error("please write some code first")]
    EmptyCode,
    /// The code buffer exceeds the configured length limit.
    #[error("code exceeds the maximum length of {limit} characters")]
    CodeTooLong {
        /// The configured limit.
        limit: usize,
    },
    /// The language is not allowed for the current question.
    #[error("language is not allowed for this question")]
    LanguageNotAllowed,
    /// The question index does not exist.
    #[error("question {index} does not exist")]
    QuestionOutOfRange {
        /// The requested index (0-based).
        index: usize,
    },
    /// The question already has a final submission.
    #[error("this question already has a final submission")]
    AlreadySubmitted,
}

// ============================================================================
// BackendError
// ============================================================================

/// Categories of collaborator failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// The backend could not be reached or the connection failed.
    Network,
    /// The backend rejected the request payload (bad language, empty code).
    Validation,
    /// The requested resource does not exist.
    NotFound,
    /// The backend failed internally (5xx responses).
    Server,
}

impl std::fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Server => write!(f, "server"),
        }
    }
}

impl BackendErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Network => "Check your network connection and the apiBaseUrl setting",
            Self::Validation => "Check the selected language and that the code is not empty",
            Self::NotFound => "Check the assessment id and candidate id",
            Self::Server => "Retry later; the assessment service may be experiencing issues",
        }
    }
}

/// An error reported by a backend collaborator.
///
/// Carries a machine-readable kind and a human-readable detail string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize, serde::Deserialize)]
#[error("{kind} error: {detail}")]
pub struct BackendError {
    /// Machine-readable category.
    pub kind: BackendErrorKind,
    /// Human-readable detail.
    pub detail: String,
}

impl BackendError {
    /// Creates a new backend error.
    #[must_use]
    pub fn new(kind: BackendErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Creates a `Network` error.
    #[must_use]
    pub fn network(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Network, detail)
    }

    /// Creates a `Validation` error.
    #[must_use]
    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Validation, detail)
    }

    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::NotFound, detail)
    }

    /// Creates a `Server` error.
    #[must_use]
    pub fn server(detail: impl Into<String>) -> Self {
        Self::new(BackendErrorKind::Server, detail)
    }

    /// Returns `true` if retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            BackendErrorKind::Network | BackendErrorKind::Server
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = SessionError::load_failure("load", "42", BackendError::not_found("Assessment not found"));
        let msg = err.to_string();
        assert!(msg.contains("Failed to load assessment '42'"));
        assert!(msg.contains("not_found error: Assessment not found"));
    }

    #[test]
    fn test_backend_error_kind_display() {
        assert_eq!(BackendErrorKind::NotFound.to_string(), "not_found");
        assert_eq!(BackendErrorKind::Network.to_string(), "network");
        assert_eq!(BackendErrorKind::Validation.to_string(), "validation");
        assert_eq!(BackendErrorKind::Server.to_string(), "server");
    }

    #[test]
    fn test_backend_error_is_transient() {
        assert!(BackendError::network("refused").is_transient());
        assert!(BackendError::server("boom").is_transient());
        assert!(!BackendError::validation("bad language").is_transient());
        assert!(!BackendError::not_found("nope").is_transient());
    }

    #[test]
    fn test_is_fatal() {
        let load = SessionError::load_failure("start", "1", BackendError::server("down"));
        assert!(load.is_fatal());
        assert!(!load.is_recoverable());

        let rejected: SessionError = Rejection::Busy.into();
        assert!(!rejected.is_fatal());
        assert!(rejected.is_recoverable());

        let exec = SessionError::ExecutionFailure(BackendError::network("timeout"));
        assert!(exec.is_recoverable());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(Rejection::EmptyCode.to_string(), "please write some code first");
        assert_eq!(
            Rejection::CodeTooLong { limit: 10 }.to_string(),
            "code exceeds the maximum length of 10 characters"
        );
        assert_eq!(
            Rejection::QuestionOutOfRange { index: 3 }.to_string(),
            "question 3 does not exist"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SessionError = io_err.into();
        assert!(matches!(err, SessionError::Io(_)));
    }

    #[test]
    fn test_backend_error_kind_serialization() {
        assert_eq!(
            serde_json::to_string(&BackendErrorKind::NotFound).unwrap_or_default(),
            r#""not_found""#
        );
    }
}
