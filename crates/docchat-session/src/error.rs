//! Error types for session orchestration.

use docchat_client::ServiceError;
use docchat_core::error::DocChatError;

use crate::activity::Activity;

/// Errors from the session layer.
///
/// The `Display` text of every variant is what the user sees in the error
/// line, so validation variants carry their full sentence.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Backend base URL is not configured. Set DOCCHAT_API_BASE_URL or [backend].base_url.")]
    NotConfigured,
    #[error("Create or select a chat session first.")]
    NoActiveSession,
    #[error("Create or select a chat session before attaching files.")]
    NoSessionForAttachment,
    #[error("Type a question before asking.")]
    EmptyQuestion,
    #[error("Choose at least one file to attach.")]
    NoFilesSelected,
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error("Another operation is still running.")]
    Busy,
    #[error("invalid activity transition: {from} -> {to}")]
    InvalidTransition { from: Activity, to: Activity },
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("Failed to read {name}: {source}")]
    FileRead {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Service(ServiceError),
}

impl SessionError {
    /// Whether this is a user mistake caught before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SessionError::NoActiveSession
                | SessionError::NoSessionForAttachment
                | SessionError::EmptyQuestion
                | SessionError::NoFilesSelected
                | SessionError::UnsupportedFile(_)
                | SessionError::Busy
        )
    }
}

impl From<ServiceError> for SessionError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotConfigured => SessionError::NotConfigured,
            other => SessionError::Service(other),
        }
    }
}

impl From<SessionError> for DocChatError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::NotConfigured => DocChatError::Config(message),
            SessionError::Service(_) => DocChatError::Service(message),
            SessionError::FileRead { source, .. } => DocChatError::Io(source),
            e if e.is_validation() => DocChatError::Validation(message),
            _ => DocChatError::Session(message),
        }
    }
}

/// A specialized `Result` type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_client::{StatusCode, Step};

    fn status_error() -> ServiceError {
        ServiceError::Status {
            step: Step::UploadSlot,
            context: "Failed to get upload URL for notes.txt".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    #[test]
    fn test_session_error_display() {
        assert_eq!(
            SessionError::NoActiveSession.to_string(),
            "Create or select a chat session first."
        );
        assert_eq!(
            SessionError::EmptyQuestion.to_string(),
            "Type a question before asking."
        );
        assert_eq!(
            SessionError::NoSessionForAttachment.to_string(),
            "Create or select a chat session before attaching files."
        );
        assert_eq!(
            SessionError::InvalidTransition {
                from: Activity::Idle,
                to: Activity::Idle
            }
            .to_string(),
            "invalid activity transition: Idle -> Idle"
        );
    }

    #[test]
    fn test_service_error_is_transparent() {
        let err = SessionError::from(status_error());
        assert_eq!(
            err.to_string(),
            "Failed to get upload URL for notes.txt: 500 Internal Server Error"
        );
        assert!(!err.is_validation());
    }

    #[test]
    fn test_not_configured_maps_through() {
        let err = SessionError::from(ServiceError::NotConfigured);
        assert!(matches!(err, SessionError::NotConfigured));
        assert!(matches!(DocChatError::from(err), DocChatError::Config(_)));
    }

    #[test]
    fn test_validation_classification() {
        assert!(SessionError::EmptyQuestion.is_validation());
        assert!(SessionError::Busy.is_validation());
        assert!(SessionError::UnsupportedFile("a.docx".to_string()).is_validation());
        assert!(!SessionError::SessionNotFound("x".to_string()).is_validation());
        assert!(matches!(
            DocChatError::from(SessionError::EmptyQuestion),
            DocChatError::Validation(_)
        ));
        assert!(matches!(
            DocChatError::from(SessionError::SessionNotFound("x".to_string())),
            DocChatError::Session(_)
        ));
    }

    #[test]
    fn test_file_read_maps_to_io() {
        let err = SessionError::FileRead {
            name: "notes.txt".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "Failed to read notes.txt: gone");
        assert!(matches!(DocChatError::from(err), DocChatError::Io(_)));
    }
}
