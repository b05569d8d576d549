//! Local file fetcher.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;

use super::Fetcher;
use crate::error::FetchError;

/// Reads the whole document from a file on every fetch.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    path: PathBuf,
}

impl FileFetcher {
    /// Create a fetcher for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Fetcher for FileFetcher {
    async fn fetch(&self) -> Result<Bytes, FetchError> {
        tokio::fs::read(&self.path)
            .await
            .map(Bytes::from)
            .map_err(|source| FetchError::Io {
                path: self.path.clone(),
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_reads_current_contents() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{\"caches\":{}}").unwrap();

        let fetcher = FileFetcher::new(file.path());
        assert_eq!(fetcher.fetch().await.unwrap(), Bytes::from_static(b"{\"caches\":{}}"));

        file.write_all(b" ").unwrap();
        assert_eq!(fetcher.fetch().await.unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = FileFetcher::new(dir.path().join("absent.json"));

        let err = fetcher.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Io { .. }));
    }
}
