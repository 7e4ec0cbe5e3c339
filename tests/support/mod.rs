//! Shared fakes and site fixtures for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use mangapdf_core::assemble::{DocumentPage, DocumentRenderer, PageSize, RenderError};
use mangapdf_core::image_tool::{ConversionPolicy, ImageTool, ImageToolError};
use serde_json::json;

/// Bytes the fake image tool rejects.
pub const CORRUPT_IMAGE: &[u8] = b"CORRUPT";

/// Image tool that accepts any file not starting with [`CORRUPT_IMAGE`] and
/// "converts" by copying.
#[derive(Debug, Default)]
pub struct FakeImageTool {
    pub identify_calls: AtomicUsize,
    pub convert_calls: AtomicUsize,
}

impl FakeImageTool {
    pub fn identified(&self) -> usize {
        self.identify_calls.load(Ordering::SeqCst)
    }

    pub fn converted(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageTool for FakeImageTool {
    async fn identify(&self, path: &Path) -> Result<bool, ImageToolError> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(path).await.unwrap_or_default();
        Ok(!bytes.is_empty() && !bytes.starts_with(CORRUPT_IMAGE))
    }

    async fn convert(
        &self,
        source: &Path,
        destination: &Path,
        _policy: &ConversionPolicy,
    ) -> Result<bool, ImageToolError> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        Ok(tokio::fs::copy(source, destination).await.is_ok())
    }
}

/// Image tool whose executable is missing.
#[derive(Debug, Default)]
pub struct MissingImageTool;

#[async_trait]
impl ImageTool for MissingImageTool {
    async fn identify(&self, _path: &Path) -> Result<bool, ImageToolError> {
        Err(ImageToolError::Spawn {
            program: "magick".to_string(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        })
    }

    async fn convert(
        &self,
        _source: &Path,
        _destination: &Path,
        _policy: &ConversionPolicy,
    ) -> Result<bool, ImageToolError> {
        Ok(false)
    }
}

/// Renderer that records every call instead of writing a document.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub calls: Mutex<Vec<(PathBuf, Vec<DocumentPage>)>>,
}

impl RecordingRenderer {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn pages(&self) -> Vec<DocumentPage> {
        self.calls
            .lock()
            .unwrap()
            .last()
            .map(|(_, pages)| pages.clone())
            .unwrap_or_default()
    }
}

impl DocumentRenderer for RecordingRenderer {
    fn render(
        &self,
        output: &Path,
        pages: &[DocumentPage],
        _size: PageSize,
    ) -> Result<(), RenderError> {
        self.calls
            .lock()
            .unwrap()
            .push((output.to_path_buf(), pages.to_vec()));
        Ok(())
    }
}

/// Work page markup with one `window.__DATA__` script and a sidebar cover.
///
/// `chapters` holds `(volume, number, title)` triples.
pub fn work_markup(
    slug: &str,
    name: &str,
    chapters: &[(&str, &str, &str)],
    cover: Option<&str>,
) -> String {
    let list: Vec<_> = chapters
        .iter()
        .map(|(volume, number, title)| {
            json!({
                "chapter_volume": volume,
                "chapter_number": number,
                "chapter_name": title,
            })
        })
        .collect();
    let data = json!({
        "manga": { "rusName": name, "engName": name, "slug": slug },
        "chapters": { "list": list },
    });
    let cover = cover
        .map(|src| {
            format!(r#"<div class="media-sidebar__cover paper"><img src="{src}" alt=""></div>"#)
        })
        .unwrap_or_default();
    format!(
        "<html><head><script>window.__DATA__ = {data};</script></head>\
         <body>{cover}</body></html>"
    )
}

/// Chapter reader markup listing `keys` under `image_path` on `servers`.
pub fn chapter_markup(servers: &[(&str, String)], image_path: &str, keys: &[&str]) -> String {
    let pages: Vec<_> = keys
        .iter()
        .enumerate()
        .map(|(i, key)| json!({ "p": i + 1, "u": key }))
        .collect();
    let mut server_map = serde_json::Map::new();
    for (alias, base) in servers {
        server_map.insert((*alias).to_string(), json!(base));
    }
    let info = json!({ "servers": server_map, "img": { "url": image_path } });
    format!(
        "<html><body><script>\nwindow.__pg = {};\nwindow.__info = {info};\n</script></body></html>",
        serde_json::Value::Array(pages)
    )
}
