//! External image tool: integrity checks and format conversion.
//!
//! The pipeline never decodes downloaded bytes itself to decide whether they
//! are a usable image. It asks an [`ImageTool`]; the shipped implementation
//! shells out to ImageMagick.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Default JPEG/PNG quality passed to the converter.
pub const DEFAULT_QUALITY: u8 = 75;

/// Target format for render-ready images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConversionFormat {
    /// Keep the downloaded file as-is (validation only).
    Original,
    /// Convert to JPEG.
    #[default]
    Jpeg,
    /// Convert to PNG.
    Png,
}

impl ConversionFormat {
    /// Extension appended to converted files, `None` for [`Self::Original`].
    #[must_use]
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Jpeg => Some("jpg"),
            Self::Png => Some("png"),
        }
    }

    /// Stable config/CLI label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

impl fmt::Display for ConversionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" | "none" => Ok(Self::Original),
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            other => Err(format!(
                "unknown conversion format '{other}' (expected original, jpeg or png)"
            )),
        }
    }
}

/// How downloaded pages are turned into renderer-compatible images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionPolicy {
    /// Target format.
    pub format: ConversionFormat,
    /// Quality in 1..=100.
    pub quality: u8,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self {
            format: ConversionFormat::default(),
            quality: DEFAULT_QUALITY,
        }
    }
}

impl ConversionPolicy {
    /// Path of the converted sibling of `source` (`1.webp` → `1.webp.jpg`).
    #[must_use]
    pub fn target_path(&self, source: &Path) -> Option<PathBuf> {
        let ext = self.format.extension()?;
        let mut name = source.as_os_str().to_owned();
        name.push(".");
        name.push(ext);
        Some(PathBuf::from(name))
    }
}

/// Errors from running the image tool itself.
///
/// A tool that runs and reports "invalid" is not an error; see [`ImageTool`].
#[derive(Debug, thiserror::Error)]
pub enum ImageToolError {
    /// The executable could not be started.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program that was invoked.
        program: String,
        /// The underlying spawn error.
        #[source]
        source: std::io::Error,
    },

    /// Conversion exited unsuccessfully.
    #[error("error converting image {path}")]
    ConversionFailed {
        /// Source image.
        path: PathBuf,
    },
}

/// Image validation and conversion capability.
#[async_trait]
pub trait ImageTool: Send + Sync {
    /// Returns `Ok(true)` when `path` is a readable, uncorrupted image.
    async fn identify(&self, path: &Path) -> Result<bool, ImageToolError>;

    /// Converts `source` into `destination` per `policy`; `Ok(false)` on tool failure.
    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        policy: &ConversionPolicy,
    ) -> Result<bool, ImageToolError>;
}

/// ImageMagick-backed [`ImageTool`] (`magick identify`, `magick convert`).
#[derive(Debug, Clone)]
pub struct MagickTool {
    program: PathBuf,
}

impl Default for MagickTool {
    fn default() -> Self {
        Self::new("magick")
    }
}

impl MagickTool {
    /// Uses the executable at `program` (a bare name is looked up on `PATH`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: Vec<OsString>) -> Result<bool, ImageToolError> {
        let program = self.program.display().to_string();
        debug!(%program, ?args, "running image tool");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .await
            .map_err(|source| ImageToolError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stdout.trim().is_empty() {
            debug!(%program, stdout = %stdout.trim(), "image tool output");
        }
        if !stderr.trim().is_empty() {
            warn!(%program, stderr = %stderr.trim(), "image tool diagnostics");
        }

        if !output.status.success() {
            warn!(%program, code = ?output.status.code(), "bad command exit code");
        }
        Ok(output.status.success())
    }
}

#[async_trait]
impl ImageTool for MagickTool {
    async fn identify(&self, path: &Path) -> Result<bool, ImageToolError> {
        self.run(vec!["identify".into(), path.as_os_str().to_owned()])
            .await
    }

    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        policy: &ConversionPolicy,
    ) -> Result<bool, ImageToolError> {
        // `[0]` keeps only the first frame of animated sources.
        let mut first_frame = source.as_os_str().to_owned();
        first_frame.push("[0]");
        self.run(vec![
            first_frame,
            "-quality".into(),
            policy.quality.to_string().into(),
            destination.as_os_str().to_owned(),
        ])
        .await
    }
}

/// Produces the render-ready image for a validated download.
///
/// With [`ConversionFormat::Original`] the source is returned unchanged. An
/// existing converted file that still passes `identify` is reused.
///
/// # Errors
///
/// Returns [`ImageToolError::ConversionFailed`] when the tool rejects the
/// conversion, or a spawn error when it cannot run.
#[instrument(skip(tool, policy), fields(path = %source.display(), format = %policy.format))]
pub async fn render_ready(
    tool: &dyn ImageTool,
    source: &Path,
    policy: &ConversionPolicy,
) -> Result<PathBuf, ImageToolError> {
    let Some(target) = policy.target_path(source) else {
        return Ok(source.to_path_buf());
    };

    if tokio::fs::try_exists(&target).await.unwrap_or(false) && tool.identify(&target).await? {
        debug!(target = %target.display(), "reusing converted image");
        return Ok(target);
    }

    info!(target = %target.display(), "converting image");
    if !tool.convert(source, &target, policy).await? {
        return Err(ImageToolError::ConversionFailed {
            path: source.to_path_buf(),
        });
    }
    Ok(target)
}
