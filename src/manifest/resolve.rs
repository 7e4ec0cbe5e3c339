//! Turns raw metadata into ordered chapters and mirror-ranked pages.
//!
//! Everything here is pure: no I/O, no logging side effects beyond `debug!`.

use std::cmp::Ordering;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use super::error::ManifestError;
use super::model::{Chapter, Page, Work};
use super::raw::{RawChapterData, RawWorkData};

/// Picks the display name: localized, then alternate, then slug.
///
/// # Errors
///
/// [`ManifestError::MissingName`] when all three are empty after trimming.
pub fn display_name(raw: &RawWorkData) -> Result<String, ManifestError> {
    [
        raw.manga.rus_name.as_deref(),
        raw.manga.eng_name.as_deref(),
        Some(raw.manga.slug.as_str()),
    ]
    .into_iter()
    .flatten()
    .map(str::trim)
    .find(|name| !name.is_empty())
    .map(ToString::to_string)
    .ok_or(ManifestError::MissingName)
}

/// Distinct volume labels, numerically sorted (non-numeric labels last).
#[must_use]
pub fn volumes(raw: &RawWorkData) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for entry in &raw.chapters.list {
        let volume = entry.chapter_volume.trim();
        if !found.iter().any(|v| v == volume) {
            found.push(volume.to_string());
        }
    }
    found.sort_by(|a, b| compare_labels(a, b));
    found
}

/// Chooses the volume to build.
///
/// An explicit request is returned as-is (trimmed). Without one, a single
/// volume is auto-selected.
///
/// # Errors
///
/// [`ManifestError::NoChapters`] for a work without chapters and
/// [`ManifestError::VolumeRequired`] when several volumes exist.
pub fn select_volume(raw: &RawWorkData, requested: Option<&str>) -> Result<String, ManifestError> {
    if let Some(volume) = requested {
        return Ok(volume.trim().to_string());
    }
    let mut available = volumes(raw);
    match available.len() {
        0 => Err(ManifestError::NoChapters),
        1 => Ok(available.remove(0)),
        _ => Err(ManifestError::VolumeRequired { available }),
    }
}

/// Resolves the work restricted to `volume`.
///
/// Chapters are ordered by ascending numeric chapter number; equal numbers
/// keep site order.
///
/// # Errors
///
/// - [`ManifestError::MissingName`] / [`ManifestError::MissingSlug`]
/// - [`ManifestError::VolumeNotFound`] when no chapter has that volume
/// - [`ManifestError::InvalidChapterNumber`] for a non-numeric chapter number
pub fn resolve(raw: &RawWorkData, volume: &str) -> Result<Work, ManifestError> {
    let name = display_name(raw)?;
    let slug = raw.manga.slug.trim();
    if slug.is_empty() {
        return Err(ManifestError::MissingSlug);
    }

    let volume = volume.trim();
    let mut chapters = raw
        .chapters
        .list
        .iter()
        .filter(|entry| entry.chapter_volume.trim() == volume)
        .map(|entry| {
            let number = entry.chapter_number.trim();
            let numeric = parse_number(number).ok_or_else(|| ManifestError::InvalidChapterNumber {
                volume: volume.to_string(),
                number: number.to_string(),
            })?;
            Ok(Chapter {
                slug: format!("{slug}-v{volume}-c{number}"),
                volume: volume.to_string(),
                number: number.to_string(),
                numeric,
                title: entry.chapter_name.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>, ManifestError>>()?;

    if chapters.is_empty() {
        return Err(ManifestError::VolumeNotFound {
            requested: volume.to_string(),
            available: volumes(raw),
        });
    }

    chapters.sort_by(|a, b| a.numeric.total_cmp(&b.numeric));
    debug!(slug, volume, chapters = chapters.len(), "resolved work");

    Ok(Work {
        slug: slug.to_string(),
        name,
        volume: volume.to_string(),
        chapters,
        cover_url: None,
    })
}

/// Builds the page list of one chapter.
///
/// Each page gets one URL per server, `server + image path + page key`, in
/// server declaration order.
///
/// # Errors
///
/// [`ManifestError::NoServers`], [`ManifestError::InvalidServer`] or
/// [`ManifestError::NoPages`].
pub fn build_pages(chapter: &RawChapterData) -> Result<Vec<Page>, ManifestError> {
    if chapter.info.servers.is_empty() {
        return Err(ManifestError::NoServers);
    }
    if chapter.pages.is_empty() {
        return Err(ManifestError::NoPages);
    }

    let servers = chapter
        .info
        .servers
        .iter()
        .map(|(alias, value)| match value {
            Value::String(base) => Ok(base.as_str()),
            _ => Err(ManifestError::InvalidServer {
                alias: alias.clone(),
            }),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let image_path = chapter.info.img.url.as_str();
    Ok(chapter
        .pages
        .iter()
        .map(|page| Page {
            seq: page.p,
            mirrors: servers
                .iter()
                .map(|base| format!("{base}{image_path}{}", page.u))
                .collect(),
            extension: key_extension(&page.u),
        })
        .collect())
}

/// Extension of a page key, ignoring any query string or fragment.
fn key_extension(key: &str) -> Option<String> {
    let path = key.split(['?', '#']).next().unwrap_or(key);
    Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(ToString::to_string)
}

fn parse_number(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn compare_labels(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
