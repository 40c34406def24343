//! CLI argument definitions for the docchat client.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use docchat_core::config::DocChatConfig;

/// docchat: ask questions about your documents, one chat session per document set.
#[derive(Parser, Debug)]
#[command(name = "docchat", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the retrieval service (e.g. https://api.example.com/prod).
    #[arg(short = 'u', long = "api-base-url")]
    pub api_base_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Number of evidence chunks to request per question.
    #[arg(short = 'k', long = "top-k")]
    pub top_k: Option<u32>,

    /// Title for the first chat session.
    #[arg(short = 't', long = "title")]
    pub title: Option<String>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > DOCCHAT_CONFIG env var > platform default (~/.docchat/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("DOCCHAT_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the backend base URL.
    ///
    /// Priority: --api-base-url flag > DOCCHAT_API_BASE_URL env var > config file value.
    pub fn resolve_base_url(&self, config_value: Option<&str>) -> Option<String> {
        let env = std::env::var("DOCCHAT_API_BASE_URL").ok();
        pick_non_blank([self.api_base_url.as_deref(), env.as_deref(), config_value])
    }

    /// Resolve the log filter directive.
    ///
    /// Priority: --log-level flag > RUST_LOG env var > config file value.
    pub fn resolve_log_level(&self, config_value: &str) -> String {
        let env = std::env::var("RUST_LOG").ok();
        pick_non_blank([self.log_level.as_deref(), env.as_deref(), Some(config_value)])
            .unwrap_or_else(|| "info".to_string())
    }

    /// Apply the overrides that live in the config file.
    pub fn apply(&self, config: &mut DocChatConfig) {
        config.backend.base_url = self.resolve_base_url(config.backend.base_url.as_deref());
        if self.top_k.is_some() {
            config.query.top_k = self.top_k;
        }
    }
}

/// First candidate that is set and not blank, trimmed.
fn pick_non_blank<const N: usize>(candidates: [Option<&str>; N]) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".docchat").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".docchat").join("config.toml");
    }
    PathBuf::from("config.toml")
}
