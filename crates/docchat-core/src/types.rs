use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

// =============================================================================
// Domain types
// =============================================================================

/// Open-ended session metadata. Only `title` has a meaning client-side.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl SessionMetadata {
    /// Metadata carrying only a title.
    pub fn with_title(title: impl Into<String>) -> Self {
        let mut fields = serde_json::Map::new();
        fields.insert("title".to_string(), serde_json::Value::String(title.into()));
        Self { fields }
    }

    /// The title, if present and a string.
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(|v| v.as_str())
    }
}

/// One server-tracked conversation. Identity is `session_id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Session {
    /// A session known only by its id.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            created_at: None,
            manifest_key: None,
            metadata: None,
            namespace: None,
        }
    }

    /// Non-blank title from the metadata.
    pub fn title(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(SessionMetadata::title)
            .filter(|t| !t.trim().is_empty())
    }

    /// Human-readable label used in status lines: the title, or
    /// `chat <first 8 chars of the id>`.
    pub fn label(&self) -> String {
        match self.title() {
            Some(title) => title.to_string(),
            None => format!("chat {}", short_id(&self.session_id)),
        }
    }
}

/// First eight characters of a session id.
pub fn short_id(session_id: &str) -> &str {
    match session_id.char_indices().nth(8) {
        Some((idx, _)) => &session_id[..idx],
        None => session_id,
    }
}

/// Retrieved evidence attached to an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryChunk {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A single conversation message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    /// ISO-8601 timestamp; together with the list position it is the display key.
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<QueryChunk>>,
}

impl Message {
    /// A user message stamped with the current time.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: now_iso8601(),
            chunks: None,
        }
    }

    /// An assistant message stamped with the current time.
    pub fn assistant(content: impl Into<String>, chunks: Vec<QueryChunk>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: now_iso8601(),
            chunks: if chunks.is_empty() { None } else { Some(chunks) },
        }
    }
}

/// Current UTC time as an ISO-8601 string with millisecond precision.
pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// =============================================================================
// Wire types (camelCase JSON)
// =============================================================================

/// Body of `POST /sessions`.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateSessionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<SessionMetadata>,
}

/// Response of `GET /sessions/{id}/messages`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesResponse {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub count: usize,
}

/// Body of `POST /upload-url`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlotRequest<'a> {
    pub session_id: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
}

/// A pre-authorized upload location returned by `POST /upload-url`.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub url: String,
    #[serde(default)]
    pub put_headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub key: String,
}

/// Body of `POST /ingest`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest<'a> {
    pub session_id: &'a str,
}

/// Response of `POST /ingest`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub stats: Option<IngestStats>,
}

impl IngestResponse {
    /// Number of chunks the server reports, zero when absent.
    pub fn chunk_count(&self) -> u64 {
        self.stats.as_ref().and_then(|s| s.chunks).unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IngestStats {
    #[serde(default)]
    pub chunks: Option<u64>,
}

/// Body of `POST /query`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest<'a> {
    pub question: &'a str,
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<u32>,
}

/// Successful response of `POST /query`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct QueryAnswer {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub chunks: Vec<QueryChunk>,
    #[serde(default)]
    pub messages: Option<Vec<Message>>,
}

/// Error payload the service attaches to non-success responses.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

// =============================================================================
// Tests
// =============================================================================
