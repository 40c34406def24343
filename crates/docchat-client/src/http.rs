//! reqwest-backed implementation of [`RemoteService`].

use std::collections::HashMap;

use async_trait::async_trait;
use docchat_core::config::{BackendConfig, DocChatConfig};
use docchat_core::types::{
    CreateSessionRequest, ErrorBody, IngestRequest, IngestResponse, MessagesResponse, QueryAnswer,
    QueryRequest, Session, UploadSlot, UploadSlotRequest,
};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::error::{Result, ServiceError, Step};
use crate::service::{QueryOutcome, RemoteService};

/// HTTP client for the retrieval service REST API.
#[derive(Clone)]
pub struct HttpRemoteService {
    client: Client,
    base_url: Option<Url>,
    top_k: Option<u32>,
}

impl HttpRemoteService {
    /// Create a client for the given base address.
    ///
    /// An unset or unparsable address yields an unconfigured client whose
    /// calls all fail with `ServiceError::NotConfigured`.
    pub fn new(backend: &BackendConfig) -> Self {
        let base_url = match backend.base_url() {
            Ok(url) => Some(url),
            Err(_) if !backend.is_set() => {
                tracing::info!("No backend base URL set; remote calls are disabled");
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Remote service is not configured");
                None
            }
        };
        Self {
            client: Client::new(),
            base_url,
            top_k: None,
        }
    }

    /// Create a client from the full application configuration.
    pub fn from_config(config: &DocChatConfig) -> Self {
        Self::new(&config.backend).with_top_k(config.query.top_k)
    }

    /// Number of evidence chunks to request per query.
    pub fn with_top_k(mut self, top_k: Option<u32>) -> Self {
        self.top_k = top_k;
        self
    }

    /// The resolved base address, if any.
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone().ok_or(ServiceError::NotConfigured)?;
        // http(s) URLs always have a path, so this only fails for cannot-be-a-base URLs,
        // which BackendConfig rejects up front.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

fn transport(step: Step, context: impl Into<String>, err: reqwest::Error) -> ServiceError {
    ServiceError::Transport {
        step,
        context: context.into(),
        message: err.to_string(),
    }
}

/// Reject non-success statuses, then decode the JSON body.
async fn decode<T: DeserializeOwned>(step: Step, context: &str, response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::Status {
            step,
            context: context.to_string(),
            status,
        });
    }
    response.json::<T>().await.map_err(|e| ServiceError::Decode {
        step,
        context: context.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl RemoteService for HttpRemoteService {
    fn is_configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        const CONTEXT: &str = "Failed to create session";
        let url = self.endpoint(&["sessions"])?;
        tracing::debug!(%url, "Creating session");

        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport(Step::CreateSession, CONTEXT, e))?;
        decode(Step::CreateSession, CONTEXT, response).await
    }

    async fn list_messages(&self, session_id: &str) -> Result<MessagesResponse> {
        const CONTEXT: &str = "Failed to load messages";
        let url = self.endpoint(&["sessions", session_id, "messages"])?;
        tracing::debug!(session_id, "Listing messages");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport(Step::ListMessages, CONTEXT, e))?;
        decode(Step::ListMessages, CONTEXT, response).await
    }

    async fn get_upload_slot(
        &self,
        session_id: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadSlot> {
        let context = format!("Failed to get upload URL for {}", filename);
        let url = self.endpoint(&["upload-url"])?;
        tracing::debug!(session_id, filename, content_type, "Requesting upload slot");

        let response = self
            .client
            .post(url)
            .json(&UploadSlotRequest {
                session_id,
                filename,
                content_type,
            })
            .send()
            .await
            .map_err(|e| transport(Step::UploadSlot, context.as_str(), e))?;
        decode(Step::UploadSlot, &context, response).await
    }

    async fn transfer_file(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        if !self.is_configured() {
            return Err(ServiceError::NotConfigured);
        }
        let context = format!("PUT to storage failed for {}", filename);
        tracing::debug!(filename, size = bytes.len(), "Transferring file");

        let mut request = self.client.put(url).body(bytes);
        match headers {
            Some(headers) => {
                for (name, value) in headers {
                    request = request.header(name.as_str(), value.as_str());
                }
            }
            None => request = request.header(CONTENT_TYPE, content_type),
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport(Step::Transfer, context.as_str(), e))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ServiceError::Status {
                step: Step::Transfer,
                context,
                status,
            })
        }
    }

    async fn trigger_ingest(&self, session_id: &str) -> Result<IngestResponse> {
        const CONTEXT: &str = "Ingest failed";
        let url = self.endpoint(&["ingest"])?;
        tracing::debug!(session_id, "Triggering ingest");

        let response = self
            .client
            .post(url)
            .json(&IngestRequest { session_id })
            .send()
            .await
            .map_err(|e| transport(Step::Ingest, CONTEXT, e))?;
        decode(Step::Ingest, CONTEXT, response).await
    }

    async fn run_query(&self, session_id: &str, question: &str) -> Result<QueryOutcome> {
        const CONTEXT: &str = "Query failed";
        let url = self.endpoint(&["query"])?;
        tracing::debug!(session_id, "Running query");

        let response = self
            .client
            .post(url)
            .json(&QueryRequest {
                question,
                session_id,
                k: self.top_k,
            })
            .send()
            .await
            .map_err(|e| transport(Step::Query, CONTEXT, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            // The body is informational only; an unreadable one still means NotIndexed.
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|b| b.error);
            return Ok(QueryOutcome::NotIndexed { message });
        }

        let answer: QueryAnswer = decode(Step::Query, CONTEXT, response).await?;
        Ok(QueryOutcome::Answered(answer))
    }
}
