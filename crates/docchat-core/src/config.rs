use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{DocChatError, Result};

/// Top-level configuration for the docchat client.
///
/// Loaded from `~/.docchat/config.toml` by default. Every section falls back
/// to its defaults when absent, except `backend.base_url`, which has no
/// sensible default and is checked by [`DocChatConfig::validate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocChatConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub uploads: UploadConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

impl DocChatConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DocChatConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check the settings every remote operation depends on.
    pub fn validate(&self) -> Result<()> {
        self.backend.base_url()?;
        if self.uploads.accepted_extensions.is_empty() {
            return Err(DocChatError::Config(
                "uploads.accepted_extensions must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Remote service location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base address of the REST API, e.g. `https://api.example.com/prod`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl BackendConfig {
    /// Parsed base address with any trailing slash removed.
    pub fn base_url(&self) -> Result<url::Url> {
        let raw = self
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DocChatError::Config("backend.base_url is not set".to_string()))?;

        let parsed = url::Url::parse(raw.trim_end_matches('/')).map_err(|e| {
            DocChatError::Config(format!("backend.base_url '{}' is invalid: {}", raw, e))
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            other => Err(DocChatError::Config(format!(
                "backend.base_url must use http or https, got '{}'",
                other
            ))),
        }
    }

    /// Whether a base address has been provided at all.
    pub fn is_set(&self) -> bool {
        self.base_url
            .as_deref()
            .is_some_and(|s| !s.trim().is_empty())
    }
}

/// Attachment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// File extensions (without the dot, case-insensitive) that may be staged.
    pub accepted_extensions: Vec<String>,
    /// Content type announced to `/upload-url` when none can be guessed.
    pub default_content_type: String,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            accepted_extensions: vec!["txt".to_string(), "pdf".to_string()],
            default_content_type: "text/plain".to_string(),
        }
    }
}

impl UploadConfig {
    /// Whether a file name carries one of the accepted extensions.
    pub fn accepts(&self, file_name: &str) -> bool {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.accepted_extensions
            .iter()
            .any(|accepted| accepted.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }
}

/// Query settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Number of evidence chunks to request; the service default applies when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = DocChatConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert!(config.backend.base_url.is_none());
        assert_eq!(config.uploads.accepted_extensions, vec!["txt", "pdf"]);
        assert_eq!(config.uploads.default_content_type, "text/plain");
        assert!(config.query.top_k.is_none());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
log_level = "debug"

[backend]
base_url = "https://api.example.com/prod/"

[uploads]
accepted_extensions = ["txt"]

[query]
top_k = 8
"#;
        let file = create_temp_config(content);
        let config = DocChatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.uploads.accepted_extensions, vec!["txt"]);
        assert_eq!(config.query.top_k, Some(8));
        assert_eq!(
            config.backend.base_url().unwrap().as_str(),
            "https://api.example.com/prod"
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[backend]
base_url = "http://localhost:3000"
"#;
        let file = create_temp_config(content);
        let config = DocChatConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.uploads.default_content_type, "text/plain");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("backend = [[[");
        let result = DocChatConfig::load(file.path());
        assert!(matches!(result, Err(DocChatError::Config(_))));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = DocChatConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.general.log_level, "info");
        assert!(!config.backend.is_set());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = DocChatConfig::default();
        config.backend.base_url = Some("https://rag.internal".to_string());
        config.query.top_k = Some(3);
        config.save(&path).unwrap();

        let reloaded = DocChatConfig::load(&path).unwrap();
        assert_eq!(reloaded.backend.base_url, config.backend.base_url);
        assert_eq!(reloaded.query.top_k, Some(3));
    }

    #[test]
    fn test_validate_requires_base_url() {
        let config = DocChatConfig::default();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("backend.base_url is not set"));
    }

    #[test]
    fn test_blank_base_url_is_unset() {
        let backend = BackendConfig {
            base_url: Some("   ".to_string()),
        };
        assert!(!backend.is_set());
        assert!(backend.base_url().is_err());
    }

    #[test]
    fn test_base_url_rejects_other_schemes() {
        let backend = BackendConfig {
            base_url: Some("ftp://files.example.com".to_string()),
        };
        let err = backend.base_url().unwrap_err();
        assert!(err.to_string().contains("http or https"));
    }

    #[test]
    fn test_base_url_rejects_garbage() {
        let backend = BackendConfig {
            base_url: Some("not a url".to_string()),
        };
        assert!(matches!(backend.base_url(), Err(DocChatError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_empty_extension_list() {
        let mut config = DocChatConfig::default();
        config.backend.base_url = Some("http://localhost:3000".to_string());
        config.uploads.accepted_extensions.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_upload_config_accepts() {
        let uploads = UploadConfig::default();
        assert!(uploads.accepts("notes.txt"));
        assert!(uploads.accepts("REPORT.PDF"));
        assert!(uploads.accepts("archive.2024.txt"));
        assert!(!uploads.accepts("slides.pptx"));
        assert!(!uploads.accepts("README"));
    }

    #[test]
    fn test_upload_config_accepts_dotted_entries() {
        let uploads = UploadConfig {
            accepted_extensions: vec![".md".to_string()],
            ..UploadConfig::default()
        };
        assert!(uploads.accepts("notes.md"));
        assert!(!uploads.accepts("notes.txt"));
    }
}
