//! Document assembly: filtering, ordering and rendering of output pages.
//!
//! The pipeline hands the [`Assembler`] one [`DocumentPage::Title`] per
//! chapter followed by that chapter's [`DocumentPage::Image`] blocks. The
//! assembler drops image pages the [`ExtensionPolicy`] rejects and renders the
//! rest, in exactly the order given, through a [`DocumentRenderer`].

mod font;
mod page;
mod policy;
mod render;

pub use font::{FontError, TitleFont};
pub use page::{DocumentPage, Heading, ImageBlock, LABEL_SIZE, TitleBlock, WORK_NAME_SIZE};
pub use policy::{DEFAULT_DENY_EXTENSIONS, ExtensionPolicy};
pub use render::{
    DocumentRenderer, IMAGE_MARGIN, PageSize, PdfRenderer, RenderError, TITLE_MARGIN, fit_within,
    wrap_text,
};

use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

/// Page counts of one assembled document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblySummary {
    /// Pages written to the document.
    pub rendered: usize,
    /// Image pages removed by the extension policy.
    pub dropped: usize,
}

/// Combines title and image pages into one rendered document.
#[derive(Clone)]
pub struct Assembler {
    renderer: Arc<dyn DocumentRenderer>,
    policy: ExtensionPolicy,
}

impl std::fmt::Debug for Assembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assembler")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Assembler {
    /// Creates an assembler rendering A4 pages.
    pub fn new(renderer: Arc<dyn DocumentRenderer>, policy: ExtensionPolicy) -> Self {
        Self { renderer, policy }
    }

    /// The active extension policy.
    #[must_use]
    pub fn policy(&self) -> &ExtensionPolicy {
        &self.policy
    }

    /// Applies the extension policy, keeping the order of survivors.
    pub fn filter(&self, pages: Vec<DocumentPage>) -> (Vec<DocumentPage>, usize) {
        let mut dropped = 0;
        let kept = pages
            .into_iter()
            .filter(|page| match page {
                DocumentPage::Image(block) if !self.policy.permits(&block.source) => {
                    warn!(source = %block.source.display(), "page excluded by extension policy");
                    dropped += 1;
                    false
                }
                _ => true,
            })
            .collect();
        (kept, dropped)
    }

    /// Filters `pages` and renders the survivors to `output`.
    ///
    /// # Errors
    ///
    /// Returns the renderer's [`RenderError`]; policy drops never fail.
    #[instrument(skip(self, pages), fields(output = %output.display(), pages = pages.len()))]
    pub fn assemble(
        &self,
        output: &Path,
        pages: Vec<DocumentPage>,
    ) -> Result<AssemblySummary, RenderError> {
        let (kept, dropped) = self.filter(pages);
        self.renderer.render(output, &kept, PageSize::A4)?;
        info!(rendered = kept.len(), dropped, "document assembled");
        Ok(AssemblySummary {
            rendered: kept.len(),
            dropped,
        })
    }
}
