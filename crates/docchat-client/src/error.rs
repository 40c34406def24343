//! Error types for remote service calls.

use docchat_core::error::DocChatError;
use reqwest::StatusCode;

/// The remote operation a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    CreateSession,
    ListMessages,
    UploadSlot,
    Transfer,
    Ingest,
    Query,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Step::CreateSession => "create session",
            Step::ListMessages => "list messages",
            Step::UploadSlot => "upload slot",
            Step::Transfer => "transfer",
            Step::Ingest => "ingest",
            Step::Query => "query",
        };
        f.write_str(name)
    }
}

/// Errors from the remote retrieval service.
///
/// `context` is the user-facing description of the failed step, e.g.
/// `Failed to get upload URL for notes.txt`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("backend base URL is not configured")]
    NotConfigured,
    #[error("{context}: {status}")]
    Status {
        step: Step,
        context: String,
        status: StatusCode,
    },
    #[error("{context}: {message}")]
    Transport {
        step: Step,
        context: String,
        message: String,
    },
    #[error("{context}: unexpected response body ({message})")]
    Decode {
        step: Step,
        context: String,
        message: String,
    },
}

impl ServiceError {
    /// The step that failed, if the failure happened on the wire.
    pub fn step(&self) -> Option<Step> {
        match self {
            ServiceError::NotConfigured => None,
            ServiceError::Status { step, .. }
            | ServiceError::Transport { step, .. }
            | ServiceError::Decode { step, .. } => Some(*step),
        }
    }

    /// HTTP status of a rejected request.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ServiceError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<ServiceError> for DocChatError {
    fn from(err: ServiceError) -> Self {
        let message = err.to_string();
        match err {
            ServiceError::NotConfigured => DocChatError::Config(message),
            _ => DocChatError::Service(message),
        }
    }
}

/// A specialized `Result` type for service calls.
pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_display() {
        let err = ServiceError::Status {
            step: Step::UploadSlot,
            context: "Failed to get upload URL for notes.txt".to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(
            err.to_string(),
            "Failed to get upload URL for notes.txt: 500 Internal Server Error"
        );
        assert_eq!(err.step(), Some(Step::UploadSlot));
        assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[test]
    fn test_transport_error_display() {
        let err = ServiceError::Transport {
            step: Step::Ingest,
            context: "Ingest failed".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "Ingest failed: connection refused");
        assert!(err.status().is_none());
    }

    #[test]
    fn test_not_configured_has_no_step() {
        assert!(ServiceError::NotConfigured.step().is_none());
    }

    #[test]
    fn test_into_docchat_error() {
        let err: DocChatError = ServiceError::NotConfigured.into();
        assert!(matches!(err, DocChatError::Config(_)));

        let err: DocChatError = ServiceError::Decode {
            step: Step::Query,
            context: "Query failed".to_string(),
            message: "missing field".to_string(),
        }
        .into();
        assert!(matches!(err, DocChatError::Service(_)));
        assert!(err.to_string().contains("Query failed"));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Transfer.to_string(), "transfer");
        assert_eq!(Step::CreateSession.to_string(), "create session");
    }
}
