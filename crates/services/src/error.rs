//! Shared error types for the services crate.

use thiserror::Error;

use exam_core::model::{AnswerError, ConfigError, JobHandle, TestError, TestResultError};

use crate::controller::PageKind;
use crate::sessions::SessionPhase;

/// User-facing category of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The content generation service was unreachable or sent a malformed test.
    Generation,
    /// Configuration or input was incomplete or inconsistent.
    Validation,
    /// Grading failed or returned an invalid result.
    Submission,
    /// An operation was attempted in a state that forbids it.
    InvalidState,
}

/// Transport-level failures talking to an external service.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    #[error("request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("unexpected response: {0}")]
    Protocol(String),
}

/// Errors emitted by `TestBuilder`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("content generation failed: {0}")]
    Service(#[from] ClientError),
    #[error("generated test is malformed: {0}")]
    Malformed(#[from] TestError),
    #[error("no topics could be extracted from the syllabus")]
    NoTopics,
    #[error("generation was superseded by a newer request")]
    Superseded,
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl GenerationError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Validation,
            _ => ErrorKind::Generation,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Generation
    }
}

/// Errors emitted by the session state machine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("cannot {operation} while the session is {phase}")]
    InvalidState {
        operation: &'static str,
        phase: SessionPhase,
    },
    #[error(transparent)]
    Answer(#[from] AnswerError),
}

impl SessionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::Answer(_) => ErrorKind::Validation,
        }
    }
}

/// Errors emitted by `GradingPipeline`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SubmissionError {
    #[error("grading request failed: {0}")]
    Service(#[from] ClientError),
    #[error("grading returned an invalid result: {0}")]
    InvalidResult(#[from] TestResultError),
    #[error("grading job {handle} failed: {message}")]
    JobFailed { handle: JobHandle, message: String },
    #[error("grading job {handle} was still pending after {attempts} checks")]
    TimedOut { handle: JobHandle, attempts: u32 },
}

impl SubmissionError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Submission
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Errors emitted by `ExamController`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ControllerError {
    #[error("cannot {operation} on the {page} page")]
    WrongPage {
        operation: &'static str,
        page: PageKind,
    },
    #[error("no generated test is ready to start")]
    NoTest,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ControllerError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::WrongPage { .. } | Self::NoTest => ErrorKind::InvalidState,
            Self::Config(_) => ErrorKind::Validation,
            Self::Generation(err) => err.kind(),
            Self::Session(err) => err.kind(),
        }
    }
}

/// Errors raised while reading service configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigLoadError {
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be an http(s) URL, got {raw}")]
    UnsupportedScheme { var: &'static str, raw: String },
    #[error("{var} must be a positive integer, got {raw}")]
    InvalidNumber { var: &'static str, raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_failures_are_validation_errors() {
        let err = GenerationError::from(ConfigError::EmptyName);
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn malformed_tests_are_retryable_generation_errors() {
        let err = GenerationError::from(TestError::NoQuestions);
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "generated test is malformed: test has no questions");
    }

    #[test]
    fn invalid_state_message_names_phase() {
        let err = SessionError::InvalidState {
            operation: "set an answer",
            phase: SessionPhase::Submitted,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            err.to_string(),
            "cannot set an answer while the session is submitted"
        );
    }
}
