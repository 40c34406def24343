//! The "ask a question" workflow: validate, optionally upload and ingest the
//! staged files, run the query, reconcile history.

use std::sync::Arc;

use docchat_client::{QueryOutcome, RemoteService};
use docchat_core::types::{Message, QueryAnswer, Session};

use crate::activity::Activity;
use crate::error::{Result, SessionError};
use crate::history::MessageHistoryCache;
use crate::pending::PendingFile;
use crate::store::{ChatState, SharedState};
use crate::upload::{UploadOutcome, UploadPipeline};

/// Shown when the service has no index for the session and sent no
/// explanation of its own.
pub const NOT_INDEXED_MESSAGE: &str =
    "No index found for this chat. Upload documents and ingest first.";

/// How a submit that reached the query step ended.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Answered {
        answer: QueryAnswer,
        upload: Option<UploadOutcome>,
    },
    /// Nothing has been ingested for the session yet. `message` is the text
    /// shown to the user.
    NotIndexed {
        message: String,
        upload: Option<UploadOutcome>,
    },
}

/// Orchestrates one submit at a time across the other components.
#[derive(Clone)]
pub struct SubmitWorkflow {
    state: SharedState,
    service: Arc<dyn RemoteService>,
    history: MessageHistoryCache,
    uploads: UploadPipeline,
}

impl SubmitWorkflow {
    pub fn new(
        state: SharedState,
        service: Arc<dyn RemoteService>,
        history: MessageHistoryCache,
        uploads: UploadPipeline,
    ) -> Self {
        Self {
            state,
            service,
            history,
            uploads,
        }
    }

    /// Replace the input buffer, then submit it.
    pub async fn ask(&self, question: &str) -> Result<SubmitOutcome> {
        self.state.update(|s| s.input = question.to_string());
        self.submit().await
    }

    /// Submit the current input buffer as a question about the active
    /// session, uploading any staged files first.
    ///
    /// The optimistic user message is appended before the first await and is
    /// never retracted. Pending files and the busy state are cleared however
    /// the submit ends, once it got past validation.
    pub async fn submit(&self) -> Result<SubmitOutcome> {
        let (session, question, files) = self.begin()?;
        let session_id = session.session_id.clone();
        let label = session.label();

        let upload = if files.is_empty() {
            None
        } else {
            let result = match self.uploads.run(&session, &files).await {
                Ok(outcome) => self
                    .state
                    .update(|s| s.activity.transition(Activity::Querying))
                    .map(|()| outcome),
                Err(e) => Err(e),
            };
            match result {
                Ok(outcome) => Some(outcome),
                Err(e) => {
                    tracing::error!(session_id = %session_id, error = %e, "Upload failed");
                    self.finish(|s| s.fail(&e));
                    return Err(e);
                }
            }
        };

        self.state.update(|s| {
            s.error = None;
            s.set_status(format!("Searching {}...", label));
        });
        let token = self.history.begin_request(&session_id);
        let result = self.service.run_query(&session_id, &question).await;

        match result {
            Ok(QueryOutcome::NotIndexed { message }) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| NOT_INDEXED_MESSAGE.to_string());
                tracing::info!(session_id = %session_id, "Session has no index yet");
                self.finish(|s| s.fail(&message));
                Ok(SubmitOutcome::NotIndexed { message, upload })
            }
            Ok(QueryOutcome::Answered(answer)) => {
                match answer.messages.as_ref().filter(|m| !m.is_empty()) {
                    Some(messages) => {
                        self.history.replace_if_current(&token, messages.clone());
                    }
                    None => {
                        if let Some(text) = answer.answer.as_deref().filter(|a| !a.trim().is_empty()) {
                            self.history.append_local(
                                &session_id,
                                Message::assistant(text, answer.chunks.clone()),
                            );
                        }
                    }
                }
                tracing::info!(
                    session_id = %session_id,
                    chunks = answer.chunks.len(),
                    "Question answered"
                );
                self.finish(|s| s.status = None);
                Ok(SubmitOutcome::Answered { answer, upload })
            }
            Err(e) => {
                let err = SessionError::from(e);
                tracing::error!(session_id = %session_id, error = %err, "Query failed");
                self.finish(|s| s.fail(&err));
                Err(err)
            }
        }
    }

    /// Validate and take ownership of the input and pending files in one
    /// critical section.
    fn begin(&self) -> Result<(Session, String, Vec<PendingFile>)> {
        let configured = self.service.is_configured();
        self.state.update(|s| {
            if !configured {
                return reject(s, SessionError::NotConfigured);
            }
            let Some(session) = s.active_session().cloned() else {
                return reject(s, SessionError::NoActiveSession);
            };
            if s.is_busy() {
                return reject(s, SessionError::Busy);
            }
            let question = s.input.trim().to_string();
            if question.is_empty() {
                return reject(s, SessionError::EmptyQuestion);
            }

            let files = s.pending.to_vec();
            let target = if files.is_empty() {
                Activity::Querying
            } else {
                Activity::Uploading
            };
            s.activity.transition(target)?;

            s.error = None;
            s.history_mut(&session.session_id)
                .append(Message::user(question.clone()));
            s.input.clear();
            tracing::debug!(
                session_id = %session.session_id,
                files = files.len(),
                "Submitting question"
            );
            Ok((session, question, files))
        })
    }

    /// Apply the final state change, then clear pending files and busy.
    fn finish(&self, f: impl FnOnce(&mut ChatState)) {
        self.state.update(|s| {
            f(s);
            s.pending.clear();
            s.activity.reset();
        });
    }
}

/// Record a rejected submit. `Busy` leaves the error line alone since the
/// running operation owns it.
fn reject<T>(s: &mut ChatState, err: SessionError) -> Result<T> {
    tracing::debug!(error = %err, "Rejected submit");
    if !matches!(err, SessionError::Busy) {
        s.fail(&err);
    }
    Err(err)
}
