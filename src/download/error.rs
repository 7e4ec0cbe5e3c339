//! Error types for the download module.
//!
//! [`DownloadError`] describes why one mirror attempt failed. It is never fatal
//! on its own: the mirror downloader logs it and moves on to the next mirror.
//! [`AcquisitionError`] is what escapes once every mirror has been tried.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Errors from a single mirror attempt.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect timeout or total deadline elapsed.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the asset or its marker.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The body was written but the image tool rejected it.
    #[error("image validation failed for {path} (from {url})")]
    InvalidImage {
        /// Mirror the bytes came from.
        url: String,
        /// Where the rejected bytes were left for inspection.
        path: PathBuf,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an image validation error.
    pub fn invalid_image(url: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::InvalidImage {
            url: url.into(),
            path: path.into(),
        }
    }
}

/// One failed mirror attempt, kept for the final report.
#[derive(Debug)]
pub struct MirrorFailure {
    /// Mirror URL that was tried.
    pub url: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for MirrorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.reason)
    }
}

/// An asset could not be acquired from any mirror.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// Every mirror failed or produced an invalid image.
    #[error("could not acquire {asset} from any of {} mirror(s): {}", .failures.len(), join_failures(.failures))]
    MirrorsExhausted {
        /// Destination path naming the asset.
        asset: PathBuf,
        /// One entry per attempted mirror, in priority order.
        failures: Vec<MirrorFailure>,
    },

    /// The page carried no mirror URLs at all.
    #[error("no mirrors configured for {asset}")]
    NoMirrors {
        /// Destination path naming the asset.
        asset: PathBuf,
    },

    /// The destination directory could not be prepared.
    #[error("cannot prepare destination {path}: {source}")]
    Destination {
        /// Directory or file that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The validation tool itself could not run (not a per-mirror failure).
    #[error("image tool failed while validating {path}: {message}")]
    Validator {
        /// File being validated.
        path: PathBuf,
        /// Error reported by the tool wrapper.
        message: String,
    },
}

fn join_failures(failures: &[MirrorFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
