//! Chat client: central coordinator wiring the registry, history cache,
//! upload pipeline, and submit workflow around one shared state.

use std::sync::Arc;

use docchat_client::RemoteService;
use docchat_core::config::UploadConfig;
use docchat_core::types::{Message, Session};

use crate::activity::Activity;
use crate::error::Result;
use crate::history::MessageHistoryCache;
use crate::pending::{FileKey, PendingFile};
use crate::registry::{SessionRegistry, SwitchOutcome};
use crate::store::SharedState;
use crate::upload::{StageReport, UploadPipeline};
use crate::workflow::{SubmitOutcome, SubmitWorkflow};

/// A pending file as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingView {
    pub name: String,
    pub size: u64,
    pub key: FileKey,
}

/// Read-only snapshot of everything the presentation layer renders.
#[derive(Debug, Clone)]
pub struct ChatView {
    pub sessions: Vec<Session>,
    pub active: Option<Session>,
    pub messages: Vec<Message>,
    pub uploaded_files: Vec<String>,
    pub pending: Vec<PendingView>,
    pub input: String,
    pub status: Option<String>,
    pub error: Option<String>,
    pub activity: Activity,
    pub loading_history: bool,
}

impl ChatView {
    pub fn is_busy(&self) -> bool {
        self.activity.is_busy()
    }
}

/// Entry point for the presentation layer. Every user intent goes through
/// one of these methods; state is only ever read back via [`ChatClient::view`].
#[derive(Clone)]
pub struct ChatClient {
    state: SharedState,
    registry: SessionRegistry,
    history: MessageHistoryCache,
    uploads: UploadPipeline,
    workflow: SubmitWorkflow,
}

impl ChatClient {
    pub fn new(service: Arc<dyn RemoteService>, upload_config: UploadConfig) -> Self {
        let state = SharedState::new();
        let history = MessageHistoryCache::new(state.clone(), Arc::clone(&service));
        let registry =
            SessionRegistry::new(state.clone(), Arc::clone(&service), history.clone());
        let uploads = UploadPipeline::new(state.clone(), Arc::clone(&service), upload_config);
        let workflow = SubmitWorkflow::new(
            state.clone(),
            service,
            history.clone(),
            uploads.clone(),
        );
        Self {
            state,
            registry,
            history,
            uploads,
            workflow,
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn history(&self) -> &MessageHistoryCache {
        &self.history
    }

    pub fn uploads(&self) -> &UploadPipeline {
        &self.uploads
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> ChatView {
        self.state.read(|s| {
            let active_id = s.active_id();
            ChatView {
                sessions: s.sessions().to_vec(),
                active: s.active_session().cloned(),
                messages: active_id.map(|id| s.messages(id).to_vec()).unwrap_or_default(),
                uploaded_files: active_id
                    .map(|id| s.uploaded_files(id).to_vec())
                    .unwrap_or_default(),
                pending: s
                    .pending()
                    .iter()
                    .map(|f| PendingView {
                        name: f.name.clone(),
                        size: f.size,
                        key: f.key(),
                    })
                    .collect(),
                input: s.input().to_string(),
                status: s.status().map(str::to_string),
                error: s.error().map(str::to_string),
                activity: s.activity(),
                loading_history: s.is_loading_history(),
            }
        })
    }

    /// Create the first session if none exists yet. See [`SessionRegistry::bootstrap`].
    pub async fn bootstrap(&self, title: Option<String>) -> Result<Option<Session>> {
        self.registry.bootstrap(title).await
    }

    pub async fn new_session(&self, title: Option<String>) -> Result<Session> {
        self.registry.create_session(title).await
    }

    pub async fn select_session(&self, session_id: &str) -> Result<SwitchOutcome> {
        self.registry.select_session(session_id).await
    }

    pub fn stage_files(&self, files: Vec<PendingFile>) -> Result<StageReport> {
        self.uploads.stage(files)
    }

    pub fn unstage_file(&self, key: &FileKey) -> bool {
        self.uploads.unstage(key)
    }

    /// Replace the input buffer.
    pub fn set_input(&self, text: &str) {
        self.state.update(|s| s.input = text.to_string());
    }

    /// Submit the input buffer. See [`SubmitWorkflow::submit`].
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        self.workflow.submit().await
    }

    /// Set the input buffer to `question` and submit it.
    pub async fn ask(&self, question: &str) -> Result<SubmitOutcome> {
        self.workflow.ask(question).await
    }
}
