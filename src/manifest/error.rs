//! Error types for manifest extraction and resolution.

use thiserror::Error;

/// Malformed or unusable work metadata. Always fatal to the run.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// No `<script>` assigned the expected global.
    #[error("no script assigns {variable} in {context} markup")]
    MissingAssignment {
        /// Global that was searched for, e.g. `window.__DATA__`.
        variable: &'static str,
        /// Which document was searched (work or chapter page).
        context: &'static str,
    },

    /// The assigned literal is not valid JSON for the expected shape.
    #[error("cannot parse {variable} literal: {source}")]
    InvalidLiteral {
        /// Global whose literal failed to parse.
        variable: &'static str,
        /// The JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// Localized name, alternate name and slug are all empty.
    #[error("work has no display name (localized, alternate and slug are all empty)")]
    MissingName,

    /// The work slug is empty; it names every local path.
    #[error("work has no slug")]
    MissingSlug,

    /// The work lists no chapters at all.
    #[error("work has no chapters")]
    NoChapters,

    /// The requested volume does not exist.
    #[error(
        "volume '{requested}' not found (available: {})\n  Suggestion: pass one of the listed volumes with --volume",
        .available.join(", ")
    )]
    VolumeNotFound {
        /// Volume that was asked for.
        requested: String,
        /// Volumes the work actually has, numerically sorted.
        available: Vec<String>,
    },

    /// Several volumes exist and none was selected.
    #[error(
        "work has {} volumes ({}); choose one\n  Suggestion: pass --volume <VOLUME>",
        .available.len(),
        .available.join(", ")
    )]
    VolumeRequired {
        /// Volumes the work has, numerically sorted.
        available: Vec<String>,
    },

    /// A chapter number is not numeric.
    #[error("chapter number '{number}' in volume '{volume}' is not a number")]
    InvalidChapterNumber {
        /// Volume of the chapter.
        volume: String,
        /// The raw chapter number.
        number: String,
    },

    /// The chapter page declares no image servers.
    #[error("chapter declares no image servers")]
    NoServers,

    /// A server entry is not a string URL.
    #[error("image server '{alias}' is not a URL string")]
    InvalidServer {
        /// Server alias.
        alias: String,
    },

    /// The chapter page lists no pages.
    #[error("chapter lists no pages")]
    NoPages,
}
