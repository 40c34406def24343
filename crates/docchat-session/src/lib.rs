//! Session orchestration for docchat.
//!
//! Keeps several document-grounded conversations independently resumable:
//! a session registry, a per-session history cache with optimistic writes,
//! an upload pipeline for staged attachments, and the submit workflow that
//! ties them together. All components share one [`SharedState`] container.

pub mod activity;
pub mod client;
pub mod error;
pub mod history;
pub mod pending;
pub mod registry;
pub mod store;
pub mod upload;
pub mod workflow;

pub use activity::Activity;
pub use client::{ChatClient, ChatView, PendingView};
pub use error::SessionError;
pub use history::{HistoryStatus, MessageHistoryCache, RequestToken};
pub use pending::{FileKey, FileSource, PendingFile, PendingFiles};
pub use registry::{SessionRegistry, SwitchOutcome};
pub use store::{ChatState, SharedState};
pub use upload::{StageReport, UploadOutcome, UploadPipeline};
pub use workflow::{SubmitOutcome, SubmitWorkflow, NOT_INDEXED_MESSAGE};
