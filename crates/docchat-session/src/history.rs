//! Per-session message history with optimistic local writes.
//!
//! Local writes bump a revision counter; a history load that started before
//! a local write is discarded instead of overwriting it. Query replies carry
//! a [`RequestToken`] and only the newest token issued for a session may
//! replace its history.

use std::sync::Arc;

use docchat_client::RemoteService;
use docchat_core::types::Message;

use crate::store::SharedState;

/// Whether a session's server history has been fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    /// The last fetch failed; the view shows only local messages.
    Unavailable,
}

/// Cached history of one session.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    status: HistoryStatus,
    messages: Vec<Message>,
    revision: u64,
    issued: u64,
}

impl SessionHistory {
    /// History of a session that was just created and has no messages yet.
    pub(crate) fn fresh() -> Self {
        Self {
            status: HistoryStatus::Loaded,
            ..Self::default()
        }
    }

    pub fn status(&self) -> HistoryStatus {
        self.status
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub(crate) fn append(&mut self, message: Message) {
        self.messages.push(message);
        self.revision += 1;
    }

    pub(crate) fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.status = HistoryStatus::Loaded;
        self.revision += 1;
    }
}

/// Ticket for one query; see [`MessageHistoryCache::replace_if_current`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    session_id: String,
    generation: u64,
}

impl RequestToken {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Lazily loaded, cached conversation history keyed by session id.
#[derive(Clone)]
pub struct MessageHistoryCache {
    state: SharedState,
    service: Arc<dyn RemoteService>,
}

impl MessageHistoryCache {
    pub fn new(state: SharedState, service: Arc<dyn RemoteService>) -> Self {
        Self { state, service }
    }

    /// Fetch a session's history from the service.
    ///
    /// Best effort: a failure leaves the session `Unavailable` and is only
    /// logged. Returns the status after the load settles.
    pub async fn load(&self, session_id: &str) -> HistoryStatus {
        if !self.service.is_configured() {
            return self.status(session_id);
        }

        let started = self.state.update(|s| {
            let history = s.history_mut(session_id);
            if history.status == HistoryStatus::Loading {
                return None;
            }
            history.status = HistoryStatus::Loading;
            Some(history.revision)
        });
        let Some(start_revision) = started else {
            return HistoryStatus::Loading;
        };

        let result = self.service.list_messages(session_id).await;

        self.state.update(|s| {
            let history = s.history_mut(session_id);
            if history.revision != start_revision {
                tracing::debug!(session_id, "Discarded history load overtaken by local writes");
                // A replace in the meantime already settled the status.
                if history.status == HistoryStatus::Loading {
                    history.status = HistoryStatus::NotLoaded;
                }
                return history.status;
            }
            match result {
                Ok(response) => {
                    tracing::info!(session_id, count = response.messages.len(), "Loaded history");
                    history.messages = response.messages;
                    history.status = HistoryStatus::Loaded;
                }
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "History unavailable");
                    history.status = HistoryStatus::Unavailable;
                }
            }
            history.status
        })
    }

    /// Overwrite a session's history with the server's list.
    pub fn replace(&self, session_id: &str, messages: Vec<Message>) {
        self.state
            .update(|s| s.history_mut(session_id).replace(messages));
    }

    /// Issue a token for a query about to be sent.
    pub fn begin_request(&self, session_id: &str) -> RequestToken {
        self.state.update(|s| {
            let history = s.history_mut(session_id);
            history.issued += 1;
            RequestToken {
                session_id: session_id.to_string(),
                generation: history.issued,
            }
        })
    }

    /// Replace the history only if `token` is the newest issued for its
    /// session. Returns whether the replace was applied.
    pub fn replace_if_current(&self, token: &RequestToken, messages: Vec<Message>) -> bool {
        self.state.update(|s| {
            let history = s.history_mut(&token.session_id);
            if history.issued != token.generation {
                tracing::debug!(
                    session_id = %token.session_id,
                    generation = token.generation,
                    newest = history.issued,
                    "Discarded stale query reply"
                );
                return false;
            }
            history.replace(messages);
            true
        })
    }

    /// Append a message locally without contacting the service.
    pub fn append_local(&self, session_id: &str, message: Message) {
        self.state
            .update(|s| s.history_mut(session_id).append(message));
    }

    /// The session's messages, oldest first.
    pub fn get(&self, session_id: &str) -> Vec<Message> {
        self.state.read(|s| s.messages(session_id).to_vec())
    }

    pub fn status(&self, session_id: &str) -> HistoryStatus {
        self.state.read(|s| s.history_status(session_id))
    }
}
