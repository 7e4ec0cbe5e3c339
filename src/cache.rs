//! Content-addressed cache for metadata fetches.
//!
//! Entries live at `<root>/<sha256-hex of name>` with no extension. Presence
//! on disk is validity: nothing expires, nothing is checksummed. Writes go to
//! `<key>.tmp` first and are renamed into place, so readers never see a
//! half-written entry.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors raised by the cache itself (never by the compute closure).
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading, writing or renaming under the cache root failed.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A stored structured entry no longer deserializes.
    #[error("cache entry {path} is not valid JSON for the requested type: {source}")]
    Corrupt {
        /// The entry on disk.
        path: PathBuf,
        /// The deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A computed value could not be serialized for storage.
    #[error("cannot serialize value for cache entry '{name}': {source}")]
    Serialize {
        /// Cache name being stored.
        name: String,
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },
}

impl CacheError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Lowercase hex SHA-256 of `name`, the on-disk key.
#[must_use]
pub fn cache_key(name: &str) -> String {
    format!("{:x}", Sha256::digest(name.as_bytes()))
}

/// Filesystem-backed memoization keyed by request identity.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    /// Cache rooted at `root`; the directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the entry for `name`, whether or not it exists.
    #[must_use]
    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.root.join(cache_key(name))
    }

    /// Returns the stored text for `name`, or computes, stores and returns it.
    ///
    /// `compute` runs only on a miss. Its error is returned unchanged and
    /// nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns the compute error, or a [`CacheError`] (converted into `E`) when
    /// the cache root cannot be read or written.
    #[instrument(skip(self, compute), fields(key = tracing::field::Empty))]
    pub async fn get_or_compute<F, Fut, E>(&self, name: &str, compute: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
        E: From<CacheError>,
    {
        let path = self.entry_path(name);
        tracing::Span::current().record("key", path.file_name().and_then(|n| n.to_str()));

        if let Some(hit) = read_if_present(&path).await? {
            debug!("cache hit");
            return Ok(hit);
        }

        debug!("cache miss");
        let value = compute().await?;
        self.store(&path, value.as_bytes()).await?;
        Ok(value)
    }

    /// Structured variant of [`Self::get_or_compute`]; values are stored as JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::get_or_compute`], plus [`CacheError::Corrupt`] for a stored
    /// entry that does not deserialize into `T`.
    #[instrument(skip(self, compute))]
    pub async fn get_or_compute_json<T, F, Fut, E>(&self, name: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CacheError>,
    {
        let path = self.entry_path(name);

        if let Some(hit) = read_if_present(&path).await? {
            debug!("cache hit");
            return serde_json::from_str(&hit)
                .map_err(|source| CacheError::Corrupt { path, source }.into());
        }

        debug!("cache miss");
        let value = compute().await?;
        let encoded = serde_json::to_vec(&value).map_err(|source| CacheError::Serialize {
            name: name.to_string(),
            source,
        })?;
        self.store(&path, &encoded).await?;
        Ok(value)
    }

    async fn store(&self, path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| CacheError::io(&self.root, e))?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| CacheError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| CacheError::io(path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "cache entry stored");
        Ok(())
    }
}

async fn read_if_present(path: &Path) -> Result<Option<String>, CacheError> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Error)]
    enum TestError {
        #[error("compute failed")]
        Compute,
        #[error(transparent)]
        Cache(#[from] CacheError),
    }

    #[test]
    fn test_cache_key_is_sha256_hex() {
        let key = cache_key("https://mangalib.me/berserk");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(
            cache_key(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path().join("nested/cache"));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: String = cache
                .get_or_compute::<_, _, TestError>("work", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("<html>".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "<html>");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.entry_path("work").exists());
    }

    #[tokio::test]
    async fn test_existing_entry_is_returned_without_compute() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path());
        std::fs::write(cache.entry_path("name"), "stored").unwrap();

        let value: String = cache
            .get_or_compute("name", || async { Err(TestError::Compute) })
            .await
            .unwrap();
        assert_eq!(value, "stored");
    }

    #[tokio::test]
    async fn test_compute_error_propagates_and_stores_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path());

        let result: Result<String, TestError> = cache
            .get_or_compute("bad", || async { Err(TestError::Compute) })
            .await;

        assert!(matches!(result, Err(TestError::Compute)));
        assert!(!cache.entry_path("bad").exists());
    }

    #[tokio::test]
    async fn test_no_tmp_file_left_behind() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path());
        let _: String = cache
            .get_or_compute::<_, _, TestError>("x", || async { Ok("v".to_string()) })
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![cache_key("x")]);
    }

    #[tokio::test]
    async fn test_json_variant_round_trips_through_disk() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Info {
            slug: String,
            pages: u32,
        }

        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path());
        let make = || async {
            Ok::<_, TestError>(Info {
                slug: "berserk".to_string(),
                pages: 3,
            })
        };

        let first: Info = cache.get_or_compute_json("info", make).await.unwrap();
        let second: Info = cache
            .get_or_compute_json("info", || async { Err(TestError::Compute) })
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_json_variant_reports_corrupt_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache = ContentCache::new(dir.path());
        std::fs::write(cache.entry_path("info"), "not json").unwrap();

        let result: Result<Vec<u32>, TestError> = cache
            .get_or_compute_json("info", || async { Ok(vec![1]) })
            .await;
        assert!(matches!(
            result,
            Err(TestError::Cache(CacheError::Corrupt { .. }))
        ));
    }
}
