//! Metadata retrieval: raw markup of the work page and chapter pages.
//!
//! [`MetadataSource`] is the seam between the pipeline and the network. The
//! HTTP implementation memoizes every page in the [`ContentCache`] by URL, so
//! a rerun of the same volume touches the network only for missing assets.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::cache::{CacheError, ContentCache};
use crate::download::{DownloadError, HttpClient};

/// Errors from a metadata fetch.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The page could not be fetched.
    #[error(transparent)]
    Fetch(#[from] DownloadError),

    /// The cache root could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Source of raw work and chapter markup.
///
/// # Object Safety
///
/// Uses `async_trait` so the pipeline can hold a `dyn MetadataSource`.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Markup of the work page at `base_url`.
    async fn work_markup(&self, base_url: &Url) -> Result<String, MetadataError>;

    /// Markup of one chapter page.
    async fn chapter_markup(&self, chapter_url: &str) -> Result<String, MetadataError>;
}

/// HTTP [`MetadataSource`] backed by the content cache.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    client: HttpClient,
    cache: ContentCache,
}

impl HttpMetadataSource {
    /// Creates a source using `client` for misses and `cache` for memoization.
    #[must_use]
    pub fn new(client: HttpClient, cache: ContentCache) -> Self {
        Self { client, cache }
    }

    async fn cached_get(&self, url: &str) -> Result<String, MetadataError> {
        self.cache
            .get_or_compute(url, || async {
                debug!(%url, "fetching markup");
                self.client
                    .get_text(url)
                    .await
                    .map_err(MetadataError::from)
            })
            .await
    }
}

#[async_trait]
impl MetadataSource for HttpMetadataSource {
    #[instrument(skip(self), fields(url = %base_url))]
    async fn work_markup(&self, base_url: &Url) -> Result<String, MetadataError> {
        self.cached_get(base_url.as_str()).await
    }

    #[instrument(skip(self))]
    async fn chapter_markup(&self, chapter_url: &str) -> Result<String, MetadataError> {
        self.cached_get(chapter_url).await
    }
}
