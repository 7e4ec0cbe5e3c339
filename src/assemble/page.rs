//! Document page model: title blocks and image blocks.

use std::path::PathBuf;

use crate::manifest::{Chapter, Work};

/// Font size of the work name on a title page.
pub const WORK_NAME_SIZE: f32 = 48.0;
/// Font size of the volume and chapter labels on a title page.
pub const LABEL_SIZE: f32 = 42.0;

/// One line of a title page.
#[derive(Debug, Clone, PartialEq)]
pub struct Heading {
    /// Text to print.
    pub text: String,
    /// Font size in points.
    pub size: f32,
}

impl Heading {
    /// Creates a heading.
    pub fn new(text: impl Into<String>, size: f32) -> Self {
        Self {
            text: text.into(),
            size,
        }
    }
}

/// Generated chapter title page.
#[derive(Debug, Clone, PartialEq)]
pub struct TitleBlock {
    /// Lines of decreasing prominence.
    pub headings: Vec<Heading>,
    /// Render-ready cover image, when one was acquired.
    pub cover: Option<PathBuf>,
}

impl TitleBlock {
    /// Title page for `chapter`: work name, volume label, chapter label.
    #[must_use]
    pub fn for_chapter(work: &Work, chapter: &Chapter, cover: Option<PathBuf>) -> Self {
        Self {
            headings: vec![
                Heading::new(&work.name, WORK_NAME_SIZE),
                Heading::new(work.volume_label(), LABEL_SIZE),
                Heading::new(chapter.label(), LABEL_SIZE),
            ],
            cover,
        }
    }
}

/// One acquired page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlock {
    /// Render-ready image (possibly a converted sibling of `source`).
    pub path: PathBuf,
    /// The downloaded asset, whose extension the policy judges.
    pub source: PathBuf,
}

/// One physical page of the output document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentPage {
    /// Chapter title page.
    Title(TitleBlock),
    /// Full-page image.
    Image(ImageBlock),
}
