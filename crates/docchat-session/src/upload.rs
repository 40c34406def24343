//! Staging attachments and running the transfer-then-ingest sequence.

use std::sync::Arc;

use docchat_client::RemoteService;
use docchat_core::config::UploadConfig;
use docchat_core::types::Session;

use crate::error::{Result, SessionError};
use crate::pending::{FileKey, PendingFile};
use crate::store::SharedState;

/// Content type sent with a transfer when none could be guessed.
const FALLBACK_TRANSFER_TYPE: &str = "application/octet-stream";

/// Result of staging a batch of selected files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub added: Vec<String>,
    /// Already staged with the same identity key.
    pub duplicates: Vec<String>,
    /// Extension not accepted.
    pub rejected: Vec<String>,
}

/// Result of a completed upload run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub uploaded_names: Vec<String>,
    pub chunks: u64,
}

/// Stages files and uploads them into a session's document set.
#[derive(Clone)]
pub struct UploadPipeline {
    state: SharedState,
    service: Arc<dyn RemoteService>,
    config: UploadConfig,
}

impl UploadPipeline {
    pub fn new(state: SharedState, service: Arc<dyn RemoteService>, config: UploadConfig) -> Self {
        Self {
            state,
            service,
            config,
        }
    }

    /// Add files to the pending set.
    ///
    /// Requires an active session. Files already staged are skipped; files
    /// with an unaccepted extension are reported and not staged. Fails with
    /// `UnsupportedFile` only when nothing in the batch could be staged
    /// because of its type.
    pub fn stage(&self, files: Vec<PendingFile>) -> Result<StageReport> {
        self.state.update(|s| {
            if s.active_id.is_none() {
                let err = SessionError::NoSessionForAttachment;
                tracing::debug!(error = %err, "Rejected staging");
                s.fail(&err);
                return Err(err);
            }
            if files.is_empty() {
                return Err(SessionError::NoFilesSelected);
            }

            s.status = None;
            s.error = None;

            let mut report = StageReport::default();
            for file in files {
                let name = file.name.clone();
                if !self.config.accepts(&name) {
                    report.rejected.push(name);
                } else if s.pending.insert(file) {
                    report.added.push(name);
                } else {
                    report.duplicates.push(name);
                }
            }

            if !report.rejected.is_empty() {
                let err = SessionError::UnsupportedFile(format!(
                    "{} (accepted: {})",
                    report.rejected.join(", "),
                    self.config.accepted_extensions.join(", ")
                ));
                tracing::debug!(error = %err, "Rejected attachments");
                s.error = Some(err.to_string());
                if report.added.is_empty() && report.duplicates.is_empty() {
                    return Err(err);
                }
            }
            tracing::debug!(added = report.added.len(), pending = s.pending.len(), "Staged files");
            Ok(report)
        })
    }

    /// Remove one pending file. Returns whether it was staged.
    pub fn unstage(&self, key: &FileKey) -> bool {
        self.state.update(|s| s.pending.remove(key))
    }

    /// File names confirmed ingested for a session.
    pub fn uploaded_files(&self, session_id: &str) -> Vec<String> {
        self.state.read(|s| s.uploaded_files(session_id).to_vec())
    }

    /// Upload `files` one at a time, then ingest them.
    ///
    /// The first failure aborts the run: later files are not attempted and
    /// the session's ingested set is left untouched. Activity transitions
    /// belong to the caller.
    pub async fn run(&self, session: &Session, files: &[PendingFile]) -> Result<UploadOutcome> {
        let session_id = session.session_id.as_str();
        let label = session.label();
        self.state
            .update(|s| s.set_status(format!("Uploading files for {}...", label)));

        for file in files {
            self.state
                .update(|s| s.set_status(format!("Uploading {} to {}...", file.name, label)));

            let slot_type = file
                .content_type
                .as_deref()
                .unwrap_or(&self.config.default_content_type);
            let slot = self
                .service
                .get_upload_slot(session_id, &file.name, slot_type)
                .await?;

            let bytes = file.read().await?;
            let transfer_type = file
                .content_type
                .as_deref()
                .unwrap_or(FALLBACK_TRANSFER_TYPE);
            self.service
                .transfer_file(
                    &slot.url,
                    slot.put_headers.as_ref(),
                    &file.name,
                    transfer_type,
                    bytes,
                )
                .await?;
            tracing::info!(session_id, file = %file.name, key = %slot.key, "Uploaded file");
        }

        self.state.update(|s| {
            s.set_status(format!(
                "All files uploaded for {}. Triggering ingest...",
                label
            ))
        });
        let ingest = self.service.trigger_ingest(session_id).await?;
        let chunks = ingest.chunk_count();

        let uploaded_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        self.state.update(|s| {
            s.record_uploaded(session_id, &uploaded_names);
            s.set_status(format!(
                "Ingest complete for {}: {} chunks. Asking your question...",
                label, chunks
            ));
        });
        tracing::info!(session_id, files = uploaded_names.len(), chunks, "Ingest complete");

        Ok(UploadOutcome {
            uploaded_names,
            chunks,
        })
    }
}
