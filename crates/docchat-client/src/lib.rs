//! Remote service access for docchat.
//!
//! Provides the [`RemoteService`] trait over the retrieval service's REST
//! API, an [`HttpRemoteService`] built on reqwest, and a recording
//! [`MockRemoteService`] for tests.

pub mod error;
pub mod http;
pub mod mock;
pub mod service;

pub use error::{ServiceError, Step};
pub use http::HttpRemoteService;
pub use mock::{Call, Gate, MockRemoteService};
pub use service::{QueryOutcome, RemoteService};

pub use reqwest::StatusCode;
