//! In-memory [`RemoteService`] for tests and offline runs.
//!
//! Behaves like the real backend closely enough for workflow tests: sessions
//! get fresh ids, uploads are remembered per session, ingest marks a session
//! as indexed, queries against un-indexed sessions come back `NotIndexed`,
//! and answered queries append the exchange to the stored history. Every
//! call is recorded so tests can assert on ordering and counts.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use docchat_core::types::{
    CreateSessionRequest, IngestResponse, IngestStats, Message, MessagesResponse, QueryAnswer,
    QueryChunk, Session, UploadSlot,
};
use reqwest::StatusCode;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::error::{Result, ServiceError, Step};
use crate::service::{QueryOutcome, RemoteService};

/// One recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreateSession {
        title: Option<String>,
    },
    ListMessages {
        session_id: String,
    },
    UploadSlot {
        session_id: String,
        filename: String,
        content_type: String,
    },
    Transfer {
        url: String,
        filename: String,
        headers: Vec<(String, String)>,
        size: usize,
    },
    Ingest {
        session_id: String,
    },
    Query {
        session_id: String,
        question: String,
    },
}

impl Call {
    /// The operation this call belongs to.
    pub fn step(&self) -> Step {
        match self {
            Call::CreateSession { .. } => Step::CreateSession,
            Call::ListMessages { .. } => Step::ListMessages,
            Call::UploadSlot { .. } => Step::UploadSlot,
            Call::Transfer { .. } => Step::Transfer,
            Call::Ingest { .. } => Step::Ingest,
            Call::Query { .. } => Step::Query,
        }
    }
}

/// Holds a call in flight until the test releases it.
#[derive(Debug, Default)]
pub struct Gate {
    entered: Notify,
    release: Notify,
}

impl Gate {
    /// Wait until a gated call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let one gated call finish.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

#[derive(Default)]
struct MockInner {
    calls: Vec<Call>,
    history: HashMap<String, Vec<Message>>,
    uploads: HashMap<String, Vec<String>>,
    indexed: HashSet<String>,
    failing: HashSet<Step>,
    failing_files: HashSet<(Step, String)>,
    gates: HashMap<Step, Arc<Gate>>,
    put_headers: Option<HashMap<String, String>>,
    not_indexed_message: Option<String>,
    reply_with_history: bool,
    chunks: Vec<QueryChunk>,
    unconfigured: bool,
}

/// Recording, scriptable stand-in for the retrieval service.
#[derive(Clone)]
pub struct MockRemoteService {
    inner: Arc<Mutex<MockInner>>,
}

impl Default for MockRemoteService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemoteService {
    /// A configured mock whose queries return the full session history.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockInner {
                reply_with_history: true,
                ..MockInner::default()
            })),
        }
    }

    /// A mock that reports a missing backend address.
    pub fn unconfigured() -> Self {
        let mock = Self::new();
        mock.lock().unconfigured = true;
        mock
    }

    fn lock(&self) -> MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Scripting --

    /// Make every call of `step` fail with HTTP 500.
    pub fn fail(&self, step: Step) -> &Self {
        self.lock().failing.insert(step);
        self
    }

    /// Make `step` fail with HTTP 500 for one file name only.
    pub fn fail_file(&self, step: Step, filename: &str) -> &Self {
        self.lock()
            .failing_files
            .insert((step, filename.to_string()));
        self
    }

    /// Hold calls of `step` until the returned gate is released.
    pub fn hold(&self, step: Step) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        self.lock().gates.insert(step, Arc::clone(&gate));
        gate
    }

    /// Seed the stored history of a session.
    pub fn set_history(&self, session_id: &str, messages: Vec<Message>) -> &Self {
        self.lock()
            .history
            .insert(session_id.to_string(), messages);
        self
    }

    /// Pretend a session has already been ingested.
    pub fn mark_indexed(&self, session_id: &str) -> &Self {
        self.lock().indexed.insert(session_id.to_string());
        self
    }

    /// Headers returned with every upload slot.
    pub fn with_put_headers(&self, headers: HashMap<String, String>) -> &Self {
        self.lock().put_headers = Some(headers);
        self
    }

    /// Explanation sent with `NotIndexed` responses.
    pub fn with_not_indexed_message(&self, message: &str) -> &Self {
        self.lock().not_indexed_message = Some(message.to_string());
        self
    }

    /// Evidence chunks attached to every answer.
    pub fn with_chunks(&self, chunks: Vec<QueryChunk>) -> &Self {
        self.lock().chunks = chunks;
        self
    }

    /// Answer queries without a `messages` list.
    pub fn without_history_in_replies(&self) -> &Self {
        self.lock().reply_with_history = false;
        self
    }

    // -- Inspection --

    /// Every call made so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    /// The step of every call made so far, oldest first.
    pub fn steps(&self) -> Vec<Step> {
        self.lock().calls.iter().map(Call::step).collect()
    }

    /// Number of calls made for `step`.
    pub fn count(&self, step: Step) -> usize {
        self.lock().calls.iter().filter(|c| c.step() == step).count()
    }

    /// File names transferred for a session, in upload order.
    pub fn uploaded(&self, session_id: &str) -> Vec<String> {
        self.lock()
            .uploads
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored server-side history of a session.
    pub fn history(&self, session_id: &str) -> Vec<Message> {
        self.lock()
            .history
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    // -- Internals --

    /// Record the call, then fail it if scripted to. Returns the gate to wait on.
    fn begin(&self, call: Call, filename: Option<&str>) -> Result<Option<Arc<Gate>>> {
        let mut inner = self.lock();
        if inner.unconfigured {
            return Err(ServiceError::NotConfigured);
        }
        let step = call.step();
        inner.calls.push(call);

        let file_fails = filename
            .is_some_and(|name| inner.failing_files.contains(&(step, name.to_string())));
        if inner.failing.contains(&step) || file_fails {
            return Err(ServiceError::Status {
                step,
                context: context_for(step, filename),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(inner.gates.get(&step).cloned())
    }

    async fn pass_gate(gate: Option<Arc<Gate>>) {
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

fn context_for(step: Step, filename: Option<&str>) -> String {
    let name = filename.unwrap_or("file");
    match step {
        Step::CreateSession => "Failed to create session".to_string(),
        Step::ListMessages => "Failed to load messages".to_string(),
        Step::UploadSlot => format!("Failed to get upload URL for {}", name),
        Step::Transfer => format!("PUT to storage failed for {}", name),
        Step::Ingest => "Ingest failed".to_string(),
        Step::Query => "Query failed".to_string(),
    }
}

#[async_trait]
impl RemoteService for MockRemoteService {
    fn is_configured(&self) -> bool {
        !self.lock().unconfigured
    }

    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session> {
        let title = request
            .metadata
            .as_ref()
            .and_then(|m| m.title())
            .map(str::to_string);
        let gate = self.begin(Call::CreateSession { title }, None)?;
        Self::pass_gate(gate).await;

        let session_id = Uuid::new_v4().to_string();
        Ok(Session {
            manifest_key: Some(format!("default/sessions/{}/manifest.json", session_id)),
            created_at: Some(docchat_core::types::now_iso8601()),
            metadata: request.metadata.clone(),
            namespace: Some("default".to_string()),
            session_id,
        })
    }

    async fn list_messages(&self, session_id: &str) -> Result<MessagesResponse> {
        let gate = self.begin(
            Call::ListMessages {
                session_id: session_id.to_string(),
            },
            None,
        )?;
        Self::pass_gate(gate).await;

        let messages = self.history(session_id);
        Ok(MessagesResponse {
            session_id: Some(session_id.to_string()),
            count: messages.len(),
            messages,
        })
    }

    async fn get_upload_slot(
        &self,
        session_id: &str,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadSlot> {
        let gate = self.begin(
            Call::UploadSlot {
                session_id: session_id.to_string(),
                filename: filename.to_string(),
                content_type: content_type.to_string(),
            },
            Some(filename),
        )?;
        Self::pass_gate(gate).await;

        Ok(UploadSlot {
            url: format!("https://storage.mock/{}/{}", session_id, filename),
            put_headers: self.lock().put_headers.clone(),
            key: format!("default/sessions/{}/uploads/{}", session_id, filename),
        })
    }

    async fn transfer_file(
        &self,
        url: &str,
        headers: Option<&HashMap<String, String>>,
        filename: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let mut sent: Vec<(String, String)> = match headers {
            Some(h) => h.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            None => vec![("Content-Type".to_string(), content_type.to_string())],
        };
        sent.sort();
        let gate = self.begin(
            Call::Transfer {
                url: url.to_string(),
                filename: filename.to_string(),
                headers: sent,
                size: bytes.len(),
            },
            Some(filename),
        )?;
        Self::pass_gate(gate).await;

        // Slot URLs are https://storage.mock/<session>/<file>.
        if let Some(session_id) = url
            .strip_prefix("https://storage.mock/")
            .and_then(|rest| rest.split('/').next())
        {
            self.lock()
                .uploads
                .entry(session_id.to_string())
                .or_default()
                .push(filename.to_string());
        }
        Ok(())
    }

    async fn trigger_ingest(&self, session_id: &str) -> Result<IngestResponse> {
        let gate = self.begin(
            Call::Ingest {
                session_id: session_id.to_string(),
            },
            None,
        )?;
        Self::pass_gate(gate).await;

        let mut inner = self.lock();
        let files = inner.uploads.get(session_id).map_or(0, Vec::len) as u64;
        inner.indexed.insert(session_id.to_string());
        Ok(IngestResponse {
            stats: Some(IngestStats {
                chunks: Some(files * 7),
            }),
        })
    }

    async fn run_query(&self, session_id: &str, question: &str) -> Result<QueryOutcome> {
        let gate = self.begin(
            Call::Query {
                session_id: session_id.to_string(),
                question: question.to_string(),
            },
            None,
        )?;
        Self::pass_gate(gate).await;

        let mut inner = self.lock();
        if !inner.indexed.contains(session_id) {
            return Ok(QueryOutcome::NotIndexed {
                message: inner.not_indexed_message.clone(),
            });
        }

        let answer = format!("Answer to: {}", question);
        let chunks = inner.chunks.clone();
        let reply_with_history = inner.reply_with_history;
        let history = inner.history.entry(session_id.to_string()).or_default();
        history.push(Message::user(question));
        history.push(Message::assistant(answer.clone(), chunks.clone()));
        let messages = reply_with_history.then(|| history.clone());

        Ok(QueryOutcome::Answered(QueryAnswer {
            answer: Some(answer),
            chunks,
            messages,
        }))
    }
}
