//! Page asset acquisition over mirror hosts.
//!
//! [`HttpClient`] issues the requests (referer, session cookie, per-attempt
//! timeouts) and [`MirrorDownloader`] turns an ordered list of mirror URLs into
//! one validated file on disk.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use mangapdf_core::auth::Session;
//! use mangapdf_core::download::{HttpClient, MirrorDownloader, RequestContext};
//! use mangapdf_core::image_tool::MagickTool;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let base = Url::parse("https://mangalib.me/berserk")?;
//! let client = HttpClient::new(&RequestContext::for_work(&base, Session::Anonymous))?;
//! let downloader = MirrorDownloader::new(client, Arc::new(MagickTool::default()));
//! let mirrors = vec![
//!     "https://img2.mixlib.me/manga/berserk/chapters/1/01.png".to_string(),
//!     "https://img3.mixlib.me/manga/berserk/chapters/1/01.png".to_string(),
//! ];
//! downloader.fetch_asset(&mirrors, Path::new("work/berserk-v1-c1/1.png")).await?;
//! # Ok(())
//! # }
//! ```

mod client;
pub mod constants;
mod error;
mod mirror;

pub use client::{HttpClient, RequestContext, referer_for};
pub use error::{AcquisitionError, DownloadError, MirrorFailure};
pub use mirror::{MirrorDownloader, is_complete, marker_path};
