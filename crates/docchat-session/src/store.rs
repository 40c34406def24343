//! The single client-side state container.
//!
//! Every component holds a [`SharedState`] handle. Mutations go through
//! [`SharedState::update`] with a synchronous closure, so the lock can never
//! be held across an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use docchat_core::types::{Message, Session};

use crate::activity::{Activity, ActivityMachine};
use crate::history::{HistoryStatus, SessionHistory};
use crate::pending::PendingFiles;

/// Everything the presentation layer renders.
#[derive(Debug, Default)]
pub struct ChatState {
    /// Most recently created first.
    pub(crate) sessions: Vec<Session>,
    pub(crate) active_id: Option<String>,
    /// File names confirmed ingested, per session, in upload order.
    pub(crate) uploaded: HashMap<String, Vec<String>>,
    pub(crate) histories: HashMap<String, SessionHistory>,
    pub(crate) pending: PendingFiles,
    pub(crate) input: String,
    pub(crate) status: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) activity: ActivityMachine,
    /// Set once the automatic first session has been tried. Never reset.
    pub(crate) session_attempted: bool,
}

impl ChatState {
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_id(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active_id.as_deref().and_then(|id| self.session(id))
    }

    pub fn session(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }

    /// Cached messages of a session, empty when never loaded.
    pub fn messages(&self, session_id: &str) -> &[Message] {
        self.histories
            .get(session_id)
            .map(SessionHistory::messages)
            .unwrap_or_default()
    }

    pub fn history_status(&self, session_id: &str) -> HistoryStatus {
        self.histories
            .get(session_id)
            .map(SessionHistory::status)
            .unwrap_or_default()
    }

    /// Whether the active session's history is being fetched.
    pub fn is_loading_history(&self) -> bool {
        self.active_id
            .as_deref()
            .is_some_and(|id| self.history_status(id) == HistoryStatus::Loading)
    }

    pub fn uploaded_files(&self, session_id: &str) -> &[String] {
        self.uploaded
            .get(session_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn pending(&self) -> &PendingFiles {
        &self.pending
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn activity(&self) -> Activity {
        self.activity.current()
    }

    pub fn is_busy(&self) -> bool {
        self.activity.is_busy()
    }

    pub fn session_attempted(&self) -> bool {
        self.session_attempted
    }

    // -- Internal mutation helpers --

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    /// Replace the status line with an error.
    pub(crate) fn fail(&mut self, error: impl ToString) {
        self.status = None;
        self.error = Some(error.to_string());
    }

    pub(crate) fn history_mut(&mut self, session_id: &str) -> &mut SessionHistory {
        self.histories.entry(session_id.to_string()).or_default()
    }

    /// Make sure per-session substate exists.
    pub(crate) fn ensure_substate(&mut self, session_id: &str) {
        self.uploaded.entry(session_id.to_string()).or_default();
        self.histories.entry(session_id.to_string()).or_default();
    }

    /// Merge names into a session's ingested set, keeping order and dropping
    /// names already present.
    pub(crate) fn record_uploaded(&mut self, session_id: &str, names: &[String]) {
        let uploaded = self.uploaded.entry(session_id.to_string()).or_default();
        for name in names {
            if !uploaded.contains(name) {
                uploaded.push(name.clone());
            }
        }
    }
}

/// Cloneable handle to the shared [`ChatState`].
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<ChatState>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the state.
    pub fn read<R>(&self, f: impl FnOnce(&ChatState) -> R) -> R {
        f(&self.lock())
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        f(&mut self.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state() {
        let state = SharedState::new();
        state.read(|s| {
            assert!(s.sessions().is_empty());
            assert!(s.active_session().is_none());
            assert!(s.messages("missing").is_empty());
            assert_eq!(s.history_status("missing"), HistoryStatus::NotLoaded);
            assert!(s.uploaded_files("missing").is_empty());
            assert!(!s.is_busy());
            assert!(!s.is_loading_history());
        });
    }

    #[test]
    fn test_record_uploaded_dedups_in_order() {
        let state = SharedState::new();
        state.update(|s| {
            s.record_uploaded("s1", &["a.txt".to_string(), "b.pdf".to_string()]);
            s.record_uploaded("s1", &["b.pdf".to_string(), "c.txt".to_string()]);
        });
        state.read(|s| assert_eq!(s.uploaded_files("s1"), ["a.txt", "b.pdf", "c.txt"]));
    }

    #[test]
    fn test_fail_clears_status() {
        let state = SharedState::new();
        state.update(|s| {
            s.set_status("Searching...");
            s.fail("Query failed: 500 Internal Server Error");
        });
        state.read(|s| {
            assert!(s.status().is_none());
            assert_eq!(s.error(), Some("Query failed: 500 Internal Server Error"));
        });
    }

    #[test]
    fn test_ensure_substate_keeps_existing() {
        let state = SharedState::new();
        state.update(|s| {
            s.record_uploaded("s1", &["a.txt".to_string()]);
            s.ensure_substate("s1");
        });
        state.read(|s| {
            assert_eq!(s.uploaded_files("s1"), ["a.txt"]);
            assert!(s.histories.contains_key("s1"));
        });
    }

    #[test]
    fn test_clones_share_state() {
        let state = SharedState::new();
        let other = state.clone();
        other.update(|s| s.input = "hello".to_string());
        assert_eq!(state.read(|s| s.input().to_string()), "hello");
    }
}
