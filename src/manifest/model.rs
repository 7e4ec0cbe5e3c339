//! Resolved work, chapter and page types.

use serde::{Deserialize, Serialize};
use url::Url;

/// A resolved work restricted to one volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Work {
    /// URL slug; names every local path.
    pub slug: String,
    /// Display name (localized, then alternate, then slug).
    pub name: String,
    /// Selected volume label.
    pub volume: String,
    /// Chapters of the volume in ascending numeric order.
    pub chapters: Vec<Chapter>,
    /// Cover image URL from the work page, when published.
    pub cover_url: Option<String>,
}

impl Work {
    /// Output document name: `<slug>-v<volume>.pdf`.
    #[must_use]
    pub fn output_file_name(&self) -> String {
        format!("{}-v{}.pdf", self.slug, self.volume)
    }

    /// Label printed under the work name on title pages.
    #[must_use]
    pub fn volume_label(&self) -> String {
        format!("Volume {}", self.volume)
    }
}

/// One chapter of the selected volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    /// Directory name: `<work-slug>-v<volume>-c<number>`.
    pub slug: String,
    /// Volume label as published.
    pub volume: String,
    /// Chapter number as published (used in URLs and labels).
    pub number: String,
    /// Parsed chapter number used for ordering.
    pub numeric: f64,
    /// Chapter title; may be empty.
    pub title: String,
}

impl Chapter {
    /// Chapter page URL: `{base}/v{volume}/c{number}`.
    ///
    /// Query and fragment of `base` are dropped.
    #[must_use]
    pub fn url(&self, base: &Url) -> String {
        let mut base = base.clone();
        base.set_query(None);
        base.set_fragment(None);
        format!(
            "{}/v{}/c{}",
            base.as_str().trim_end_matches('/'),
            self.volume,
            self.number
        )
    }

    /// `Chapter 3: Title`, or `Chapter 3` without a title.
    #[must_use]
    pub fn label(&self) -> String {
        let title = self.title.trim();
        if title.is_empty() {
            format!("Chapter {}", self.number)
        } else {
            format!("Chapter {}: {title}", self.number)
        }
    }
}

/// One page of a chapter with its mirror URLs in priority order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page sequence number.
    pub seq: u32,
    /// One URL per image server, first is preferred.
    pub mirrors: Vec<String>,
    /// Asset extension without the dot, taken from the page key.
    pub extension: Option<String>,
}

impl Page {
    /// Local file name: `<seq>.<ext>` (or `<seq>` without an extension).
    #[must_use]
    pub fn file_name(&self) -> String {
        match &self.extension {
            Some(ext) => format!("{}.{ext}", self.seq),
            None => self.seq.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn chapter(title: &str) -> Chapter {
        Chapter {
            slug: "berserk-v1-c3".to_string(),
            volume: "1".to_string(),
            number: "3".to_string(),
            numeric: 3.0,
            title: title.to_string(),
        }
    }

    #[test]
    fn test_chapter_url() {
        let base = Url::parse("https://mangalib.me/berserk").unwrap();
        assert_eq!(chapter("").url(&base), "https://mangalib.me/berserk/v1/c3");
    }

    #[test]
    fn test_chapter_url_drops_query_and_trailing_slash() {
        let base = Url::parse("https://mangalib.me/berserk/?section=info#top").unwrap();
        assert_eq!(chapter("").url(&base), "https://mangalib.me/berserk/v1/c3");
    }

    #[test]
    fn test_chapter_label() {
        assert_eq!(chapter("The Brand").label(), "Chapter 3: The Brand");
        assert_eq!(chapter("  ").label(), "Chapter 3");
    }

    #[test]
    fn test_page_file_name() {
        let mut page = Page {
            seq: 12,
            mirrors: vec![],
            extension: Some("webp".to_string()),
        };
        assert_eq!(page.file_name(), "12.webp");
        page.extension = None;
        assert_eq!(page.file_name(), "12");
    }
}
