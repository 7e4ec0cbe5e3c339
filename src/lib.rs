//! mangapdf core library
//!
//! Downloads one volume of a manga from its content site through mirror
//! image hosts and binds it into a single PDF.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`cache`] - Content-addressed cache for metadata fetches
//! - [`download`] - HTTP client and mirror-aware asset downloader
//! - [`scheduler`] - Bounded concurrency with ordered results
//! - [`manifest`] - Script-embedded metadata extraction and resolution
//! - [`assemble`] - Extension policy, title pages and PDF rendering
//! - [`image_tool`] - Image validation and conversion via ImageMagick
//! - [`metadata`] - Work and chapter markup sources
//! - [`auth`] - Session strategies and cookie loading
//! - [`pipeline`] - The end-to-end run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod assemble;
pub mod auth;
pub mod cache;
pub mod config;
pub mod download;
pub mod image_tool;
pub mod manifest;
pub mod metadata;
pub mod pipeline;
pub mod scheduler;
mod user_agent;

// Re-export commonly used types
pub use assemble::{
    Assembler, DocumentRenderer, ExtensionPolicy, PdfRenderer, RenderError, TitleFont,
};
pub use auth::{Session, SessionStrategy};
pub use cache::{CacheError, ContentCache};
pub use config::RunConfig;
pub use download::{AcquisitionError, DownloadError, HttpClient, MirrorDownloader};
pub use image_tool::{ConversionFormat, ConversionPolicy, ImageTool, MagickTool};
pub use manifest::{Chapter, ManifestError, Page, Work};
pub use metadata::{HttpMetadataSource, MetadataSource};
pub use pipeline::{Pipeline, PipelineError, RunSummary};
pub use scheduler::{SchedulerError, TaskScheduler};
