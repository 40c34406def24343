//! Locally selected files waiting to be uploaded.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Result, SessionError};

/// Identity of a pending file: two selections with the same key are the
/// same file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileKey {
    pub name: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
}

/// Where the bytes of a pending file come from.
#[derive(Debug, Clone)]
pub enum FileSource {
    /// Read from disk when the transfer starts.
    Path(PathBuf),
    /// Already in memory.
    Memory(Arc<[u8]>),
}

/// A file chosen by the user but not uploaded yet.
#[derive(Debug, Clone)]
pub struct PendingFile {
    pub name: String,
    pub size: u64,
    pub last_modified: i64,
    /// MIME type guessed from the extension, if any.
    pub content_type: Option<String>,
    pub source: FileSource,
}

impl PendingFile {
    /// Stat a file on disk.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| SessionError::FileRead {
                name: name.clone(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(SessionError::FileRead {
                name,
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a regular file"),
            });
        }
        let last_modified = metadata
            .modified()
            .map(|t| DateTime::<Utc>::from(t).timestamp_millis())
            .unwrap_or_default();

        Ok(Self {
            content_type: guess_content_type(&name),
            size: metadata.len(),
            last_modified,
            source: FileSource::Path(path.to_path_buf()),
            name,
        })
    }

    /// A file whose bytes are already in memory.
    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, last_modified: i64) -> Self {
        let name = name.into();
        let bytes = bytes.into();
        Self {
            content_type: guess_content_type(&name),
            size: bytes.len() as u64,
            last_modified,
            source: FileSource::Memory(bytes),
            name,
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey {
            name: self.name.clone(),
            size: self.size,
            last_modified: self.last_modified,
        }
    }

    /// Load the file's bytes.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Memory(bytes) => Ok(bytes.to_vec()),
            FileSource::Path(path) => {
                tokio::fs::read(path)
                    .await
                    .map_err(|source| SessionError::FileRead {
                        name: self.name.clone(),
                        source,
                    })
            }
        }
    }
}

fn guess_content_type(name: &str) -> Option<String> {
    mime_guess::from_path(name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// Insertion-ordered set of pending files, unique by [`FileKey`].
#[derive(Debug, Clone, Default)]
pub struct PendingFiles {
    files: Vec<PendingFile>,
}

impl PendingFiles {
    /// Add a file unless one with the same key is already staged.
    /// Returns whether it was added.
    pub fn insert(&mut self, file: PendingFile) -> bool {
        let key = file.key();
        if self.files.iter().any(|f| f.key() == key) {
            return false;
        }
        self.files.push(file);
        true
    }

    /// Remove the file with `key`. Returns whether one was removed.
    pub fn remove(&mut self, key: &FileKey) -> bool {
        let before = self.files.len();
        self.files.retain(|f| &f.key() != key);
        self.files.len() != before
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingFile> {
        self.files.iter()
    }

    /// Snapshot of the staged files in selection order.
    pub fn to_vec(&self) -> Vec<PendingFile> {
        self.files.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(name: &str, bytes: &[u8], last_modified: i64) -> PendingFile {
        PendingFile::in_memory(name, bytes.to_vec(), last_modified)
    }

    #[test]
    fn test_dedup_by_identity_key() {
        let mut pending = PendingFiles::default();
        assert!(pending.insert(file("a.txt", b"abc", 1)));
        assert!(pending.insert(file("b.txt", b"xyz", 1)));
        assert!(!pending.insert(file("a.txt", b"abc", 1)));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_same_name_different_size_or_time_is_distinct() {
        let mut pending = PendingFiles::default();
        assert!(pending.insert(file("a.txt", b"abc", 1)));
        assert!(pending.insert(file("a.txt", b"abcd", 1)));
        assert!(pending.insert(file("a.txt", b"abc", 2)));
        assert_eq!(pending.len(), 3);
    }

    #[test]
    fn test_remove_by_key() {
        let mut pending = PendingFiles::default();
        let a = file("a.txt", b"abc", 1);
        pending.insert(a.clone());
        pending.insert(file("b.txt", b"xyz", 1));

        assert!(pending.remove(&a.key()));
        assert!(!pending.remove(&a.key()));
        let names: Vec<_> = pending.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b.txt"]);
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(file("a.txt", b"", 0).content_type.as_deref(), Some("text/plain"));
        assert_eq!(
            file("report.PDF", b"", 0).content_type.as_deref(),
            Some("application/pdf")
        );
        assert!(file("README", b"", 0).content_type.is_none());
    }

    #[tokio::test]
    async fn test_from_path_reads_metadata_and_bytes() {
        let mut tmp = NamedTempFile::with_suffix(".txt").unwrap();
        tmp.write_all(b"hello world").unwrap();
        tmp.flush().unwrap();

        let pending = PendingFile::from_path(tmp.path()).await.unwrap();
        assert_eq!(pending.size, 11);
        assert!(pending.name.ends_with(".txt"));
        assert!(pending.last_modified > 0);
        assert_eq!(pending.read().await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = PendingFile::from_path("/nonexistent/notes.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::FileRead { ref name, .. } if name == "notes.txt"));
    }

    #[tokio::test]
    async fn test_read_after_file_removed() {
        let tmp = NamedTempFile::with_suffix(".txt").unwrap();
        let pending = PendingFile::from_path(tmp.path()).await.unwrap();
        drop(tmp);
        assert!(matches!(
            pending.read().await,
            Err(SessionError::FileRead { .. })
        ));
    }
}
