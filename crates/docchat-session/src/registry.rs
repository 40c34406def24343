//! Known sessions, the active session, and switching between them.

use std::sync::Arc;

use docchat_client::RemoteService;
use docchat_core::types::{CreateSessionRequest, Session, SessionMetadata};

use crate::activity::Activity;
use crate::error::{Result, SessionError};
use crate::history::{HistoryStatus, MessageHistoryCache, SessionHistory};
use crate::store::SharedState;

/// What a session switch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    /// The session was already active; nothing changed.
    AlreadyActive,
    /// Switched; `history` is the history status after the switch settled.
    Switched { history: HistoryStatus },
}

/// Ordered list of sessions plus the active session id.
#[derive(Clone)]
pub struct SessionRegistry {
    state: SharedState,
    service: Arc<dyn RemoteService>,
    history: MessageHistoryCache,
}

impl SessionRegistry {
    pub fn new(
        state: SharedState,
        service: Arc<dyn RemoteService>,
        history: MessageHistoryCache,
    ) -> Self {
        Self {
            state,
            service,
            history,
        }
    }

    /// Sessions, most recently created first.
    pub fn sessions(&self) -> Vec<Session> {
        self.state.read(|s| s.sessions().to_vec())
    }

    pub fn active(&self) -> Option<Session> {
        self.state.read(|s| s.active_session().cloned())
    }

    /// Create a session on the service and make it active.
    pub async fn create_session(&self, title: Option<String>) -> Result<Session> {
        if !self.service.is_configured() {
            let err = SessionError::NotConfigured;
            self.state.update(|s| s.fail(&err));
            return Err(err);
        }

        self.state.update(|s| {
            s.activity.transition(Activity::CreatingSession)?;
            s.error = None;
            s.set_status("Creating new chat...");
            Ok::<_, SessionError>(())
        })?;

        let request = CreateSessionRequest {
            metadata: title
                .filter(|t| !t.trim().is_empty())
                .map(SessionMetadata::with_title),
        };
        let result = self.service.create_session(&request).await;

        self.state.update(|s| {
            s.activity.reset();
            match result {
                Ok(session) => {
                    let session_id = session.session_id.clone();
                    s.sessions.retain(|existing| existing.session_id != session_id);
                    s.sessions.insert(0, session.clone());
                    s.active_id = Some(session_id.clone());
                    s.uploaded.entry(session_id.clone()).or_default();
                    s.histories.insert(session_id.clone(), SessionHistory::fresh());
                    s.pending.clear();
                    s.input.clear();
                    s.set_status(format!("Created {}.", session.label()));
                    tracing::info!(session_id = %session_id, "Created session");
                    Ok(session)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Session creation failed");
                    s.session_attempted = true;
                    let err = SessionError::from(e);
                    s.fail(&err);
                    Err(err)
                }
            }
        })
    }

    /// Make `session_id` the active session.
    ///
    /// Rejected with `Busy` while an operation is in flight. Loads the
    /// session's history the first time it is shown.
    pub async fn select_session(&self, session_id: &str) -> Result<SwitchOutcome> {
        let needs_load = self.state.update(|s| {
            if s.active_id.as_deref() == Some(session_id) {
                return Ok(None);
            }
            if s.is_busy() {
                return Err(SessionError::Busy);
            }
            let label = s
                .session(session_id)
                .map(Session::label)
                .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;

            s.active_id = Some(session_id.to_string());
            s.input.clear();
            s.pending.clear();
            s.error = None;
            s.ensure_substate(session_id);
            s.set_status(format!("Switched to {}.", label));
            tracing::debug!(session_id, "Switched session");
            Ok(Some(s.history_status(session_id) == HistoryStatus::NotLoaded))
        })?;

        match needs_load {
            None => Ok(SwitchOutcome::AlreadyActive),
            Some(true) => Ok(SwitchOutcome::Switched {
                history: self.history.load(session_id).await,
            }),
            Some(false) => Ok(SwitchOutcome::Switched {
                history: self.history.status(session_id),
            }),
        }
    }

    /// Create the first session automatically, at most once per process.
    ///
    /// Does nothing when a session exists or is active, when an earlier
    /// attempt was made, or while busy.
    pub async fn bootstrap(&self, title: Option<String>) -> Result<Option<Session>> {
        let should_create = self.state.update(|s| {
            if !s.sessions.is_empty()
                || s.active_id.is_some()
                || s.session_attempted
                || s.is_busy()
            {
                return false;
            }
            s.session_attempted = true;
            true
        });
        if !should_create {
            return Ok(None);
        }
        tracing::debug!("Bootstrapping first session");
        self.create_session(title).await.map(Some)
    }
}
