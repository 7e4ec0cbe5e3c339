//! Mirror-aware asset fetching with completion markers.
//!
//! A page is served by several interchangeable hosts. [`MirrorDownloader`]
//! walks them in priority order, one at a time, and stops at the first mirror
//! whose bytes pass image validation. Success is recorded with a zero-byte
//! `<asset>.done` marker; the asset file alone never counts as complete.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::constants::DONE_MARKER_SUFFIX;
use super::error::{AcquisitionError, DownloadError, MirrorFailure};
use super::HttpClient;
use crate::image_tool::ImageTool;

/// Returns the completion marker path for `asset` (`<asset>.done`).
#[must_use]
pub fn marker_path(asset: &Path) -> PathBuf {
    let mut name: OsString = asset.as_os_str().to_owned();
    name.push(".");
    name.push(DONE_MARKER_SUFFIX);
    PathBuf::from(name)
}

/// True when both the asset and its completion marker exist.
pub async fn is_complete(asset: &Path) -> bool {
    let exists = |path: PathBuf| async move { tokio::fs::try_exists(path).await.unwrap_or(false) };
    exists(asset.to_path_buf()).await && exists(marker_path(asset)).await
}

/// Fetches one asset through an ordered list of mirrors.
#[derive(Clone)]
pub struct MirrorDownloader {
    client: HttpClient,
    validator: Arc<dyn ImageTool>,
}

impl std::fmt::Debug for MirrorDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorDownloader")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

impl MirrorDownloader {
    /// Creates a downloader that validates every body with `validator`.
    pub fn new(client: HttpClient, validator: Arc<dyn ImageTool>) -> Self {
        Self { client, validator }
    }

    /// Makes sure `destination` holds a validated copy of the asset.
    ///
    /// Returns immediately, without network access, when the asset and its
    /// marker already exist. Otherwise each mirror is tried in order; bad
    /// statuses, network errors and invalid images move on to the next mirror.
    /// A body rejected by validation stays on disk for inspection until a
    /// later mirror overwrites it.
    ///
    /// # Errors
    ///
    /// - [`AcquisitionError::NoMirrors`] for an empty mirror list
    /// - [`AcquisitionError::MirrorsExhausted`] when every mirror failed
    /// - [`AcquisitionError::Destination`] when the target directory or marker
    ///   cannot be written
    /// - [`AcquisitionError::Validator`] when the image tool cannot run at all
    #[instrument(skip(self, mirrors), fields(asset = %destination.display(), mirrors = mirrors.len()))]
    pub async fn fetch_asset(
        &self,
        mirrors: &[String],
        destination: &Path,
    ) -> Result<(), AcquisitionError> {
        if is_complete(destination).await {
            info!("already downloaded");
            return Ok(());
        }

        if mirrors.is_empty() {
            return Err(AcquisitionError::NoMirrors {
                asset: destination.to_path_buf(),
            });
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| AcquisitionError::Destination {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let mut failures = Vec::with_capacity(mirrors.len());
        for (priority, url) in mirrors.iter().enumerate() {
            debug!(priority, %url, "trying mirror");
            match self.try_mirror(url, destination).await {
                Ok(()) => {
                    let marker = marker_path(destination);
                    tokio::fs::write(&marker, b"")
                        .await
                        .map_err(|source| AcquisitionError::Destination {
                            path: marker,
                            source,
                        })?;
                    info!(%url, "asset acquired");
                    return Ok(());
                }
                Err(MirrorAttempt::Failed(error)) => {
                    warn!(%url, error = %error, "mirror failed; trying next");
                    failures.push(MirrorFailure {
                        url: url.clone(),
                        reason: error.to_string(),
                    });
                }
                Err(MirrorAttempt::Fatal(error)) => return Err(error),
            }
        }

        Err(AcquisitionError::MirrorsExhausted {
            asset: destination.to_path_buf(),
            failures,
        })
    }

    async fn try_mirror(&self, url: &str, destination: &Path) -> Result<(), MirrorAttempt> {
        let bytes = self
            .client
            .download_to_path(url, destination)
            .await
            .map_err(MirrorAttempt::Failed)?;

        let valid = self
            .validator
            .identify(destination)
            .await
            .map_err(|e| {
                MirrorAttempt::Fatal(AcquisitionError::Validator {
                    path: destination.to_path_buf(),
                    message: e.to_string(),
                })
            })?;

        if !valid {
            return Err(MirrorAttempt::Failed(DownloadError::invalid_image(
                url,
                destination,
            )));
        }

        debug!(bytes, "image validated");
        Ok(())
    }
}

enum MirrorAttempt {
    Failed(DownloadError),
    Fatal(AcquisitionError),
}
