//! The remote operations the client depends on.

use std::collections::HashMap;

use async_trait::async_trait;
use docchat_core::types::{
    CreateSessionRequest, IngestResponse, MessagesResponse, QueryAnswer, Session, UploadSlot,
};

use crate::error::Result;

/// Outcome of a query that reached the service.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
    /// The service answered.
    Answered(QueryAnswer),
    /// No ingested index exists for the session yet (HTTP 404). Carries the
    /// service's own explanation when it sent one.
    NotIndexed { message: Option<String> },
}

/// Typed request/response access to the retrieval service.
///
/// Implementations hold no conversation state and never retry; a failed
/// call surfaces immediately as a [`ServiceError`](crate::ServiceError).
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Whether a backend address is available. Every other method fails with
    /// `ServiceError::NotConfigured` when this is false.
    fn is_configured(&self) -> bool;

    /// `POST /sessions`.
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session>;

    /// `GET /sessions/{id}/messages`.
    async fn list_messages(&self, session_id: &str) -> Result<MessagesResponse>;

    /// `POST /upload-url`.
    async fn get_upload_slot(
        &self,
        session_id: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadSlot>;

    /// `PUT` the file bytes to a slot URL.
    ///
    /// `headers` replaces the default `Content-Type: <content_type>` header
    /// when the slot specified its own.
    async fn transfer_file(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()>;

    /// `POST /ingest`.
    async fn trigger_ingest(&self, session_id: &str) -> Result<IngestResponse>;

    /// `POST /query`.
    async fn run_query(&self, session_id: &str, question: &str) -> Result<QueryOutcome>;
}
