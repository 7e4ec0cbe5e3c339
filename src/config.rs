//! Resolved run configuration threaded through the pipeline.
//!
//! The binary layers defaults, the config file and CLI flags into one
//! [`RunConfig`]; library code never reads the environment for settings.

use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::assemble::ExtensionPolicy;
use crate::auth::Session;
use crate::download::RequestContext;
use crate::download::constants::{CONNECT_TIMEOUT, REQUEST_TIMEOUT};
use crate::image_tool::ConversionPolicy;
use crate::scheduler::default_concurrency;

/// Application directory name under the user cache and config roots.
pub const APP_DIR_NAME: &str = "mangapdf";

/// Default image tool executable.
pub const DEFAULT_MAGICK: &str = "magick";

/// Everything one pipeline run needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Work page URL; its origin is the referer for every request.
    pub base_url: Url,
    /// Requested volume; `None` auto-selects a single volume.
    pub volume: Option<String>,
    /// Credential attached to requests.
    pub session: Session,
    /// Metadata cache root.
    pub cache_dir: PathBuf,
    /// Per-chapter download directories live here.
    pub work_dir: PathBuf,
    /// Output document directory.
    pub output_dir: PathBuf,
    /// Worker limit for page tasks.
    pub concurrency: usize,
    /// Connect timeout per request.
    pub connect_timeout: Duration,
    /// Total deadline per request.
    pub request_timeout: Duration,
    /// Image tool executable.
    pub magick: PathBuf,
    /// Conversion target for render-ready images.
    pub conversion: ConversionPolicy,
    /// Page extension policy.
    pub extensions: ExtensionPolicy,
    /// TrueType font for title text; `None` uses the built-in Helvetica,
    /// which only covers Latin-1.
    pub font: Option<PathBuf>,
}

impl RunConfig {
    /// Default settings for the work at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        let root = default_cache_root();
        Self {
            base_url,
            volume: None,
            session: Session::Anonymous,
            cache_dir: root.join("cache"),
            work_dir: root.join("tmp"),
            output_dir: PathBuf::from("."),
            concurrency: default_concurrency(),
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
            magick: PathBuf::from(DEFAULT_MAGICK),
            conversion: ConversionPolicy::default(),
            extensions: ExtensionPolicy::default(),
            font: None,
        }
    }

    /// Request settings for the HTTP client.
    #[must_use]
    pub fn request_context(&self) -> RequestContext {
        RequestContext::for_work(&self.base_url, self.session.clone())
            .with_timeouts(self.connect_timeout, self.request_timeout)
    }
}

/// `<user cache dir>/mangapdf`.
///
/// Priority:
/// 1. `$XDG_CACHE_HOME/mangapdf`
/// 2. `$HOME/.cache/mangapdf`
/// 3. `<system temp dir>/mangapdf`
#[must_use]
pub fn default_cache_root() -> PathBuf {
    if let Some(xdg_cache_home) = env_var_non_empty_os("XDG_CACHE_HOME") {
        return PathBuf::from(xdg_cache_home).join(APP_DIR_NAME);
    }
    if let Some(home) = env_var_non_empty_os("HOME") {
        return PathBuf::from(home).join(".cache").join(APP_DIR_NAME);
    }
    env::temp_dir().join(APP_DIR_NAME)
}

/// Returns the variable's value unless it is unset or empty.
#[must_use]
pub fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
