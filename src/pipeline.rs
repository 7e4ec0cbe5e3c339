//! End-to-end run: resolve the work, acquire every page, assemble the volume.
//!
//! # Flow
//!
//! 1. Fetch the work page through the [`MetadataSource`] and resolve the
//!    requested volume into ordered chapters
//! 2. Acquire the cover (best effort)
//! 3. For each chapter, fetch its page list and run one scheduler task per
//!    page: mirror download, validation, conversion
//! 4. Hand title and image pages to the [`Assembler`]
//!
//! The first page that cannot be acquired from any mirror ends the run: the
//! remaining pages of that chapter drain, later chapters never start and no
//! document is written.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::assemble::{
    Assembler, DocumentPage, ImageBlock, PdfRenderer, RenderError, TitleBlock, TitleFont,
};
use crate::cache::ContentCache;
use crate::config::RunConfig;
use crate::download::{AcquisitionError, HttpClient, MirrorDownloader};
use crate::image_tool::{ConversionPolicy, ImageTool, ImageToolError, MagickTool, render_ready};
use crate::manifest::{
    Chapter, ManifestError, Page, Work, build_pages, extract_chapter_data, extract_cover_url,
    extract_work_data, resolve, select_volume, volumes,
};
use crate::metadata::{HttpMetadataSource, MetadataError, MetadataSource};
use crate::scheduler::{SchedulerError, TaskScheduler};

/// Why one page task failed.
#[derive(Debug, Error)]
pub enum PageError {
    /// No mirror produced a valid image.
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    /// The image tool could not convert the page.
    #[error(transparent)]
    Conversion(#[from] ImageToolError),
}

/// Top-level failure of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The HTTP client could not be built.
    #[error("cannot initialize HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Work or chapter markup could not be fetched.
    #[error("metadata fetch failed: {0}")]
    Metadata(#[from] MetadataError),

    /// Metadata was malformed or the volume does not exist.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A page could not be acquired or converted.
    #[error("chapter {chapter}, page {page}: {source}")]
    Page {
        /// Chapter slug.
        chapter: String,
        /// Page sequence number.
        page: u32,
        /// The page failure.
        #[source]
        source: PageError,
    },

    /// A worker panicked.
    #[error("chapter {chapter}: worker panicked: {message}")]
    Panicked {
        /// Chapter slug, or the output path for the render task.
        chapter: String,
        /// Panic message.
        message: String,
    },

    /// The document could not be written.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A working or output directory could not be created.
    #[error("cannot create directory {path}: {source}")]
    Io {
        /// Directory path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Written document.
    pub output: PathBuf,
    /// Selected volume.
    pub volume: String,
    /// Chapters included.
    pub chapters: usize,
    /// Physical pages in the document (title pages included).
    pub pages: usize,
    /// Image pages excluded by the extension policy.
    pub dropped: usize,
}

/// One configured acquisition-and-assembly run.
pub struct Pipeline {
    config: RunConfig,
    metadata: Arc<dyn MetadataSource>,
    downloader: MirrorDownloader,
    tool: Arc<dyn ImageTool>,
    scheduler: TaskScheduler,
    assembler: Assembler,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("scheduler", &self.scheduler)
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Assembles a pipeline from explicit collaborators.
    pub fn new(
        config: RunConfig,
        metadata: Arc<dyn MetadataSource>,
        downloader: MirrorDownloader,
        tool: Arc<dyn ImageTool>,
        assembler: Assembler,
    ) -> Self {
        let scheduler = TaskScheduler::new(config.concurrency);
        Self {
            config,
            metadata,
            downloader,
            tool,
            scheduler,
            assembler,
        }
    }

    /// Production wiring: HTTP metadata with cache, ImageMagick, PDF output.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Client`] if the HTTP client cannot be built and
    /// [`PipelineError::Render`] if the configured title font cannot be loaded.
    pub fn from_config(config: RunConfig) -> Result<Self, PipelineError> {
        let client = HttpClient::new(&config.request_context()).map_err(PipelineError::Client)?;
        let metadata = Arc::new(HttpMetadataSource::new(
            client.clone(),
            ContentCache::new(&config.cache_dir),
        ));
        let tool: Arc<dyn ImageTool> = Arc::new(MagickTool::new(&config.magick));
        let downloader = MirrorDownloader::new(client, Arc::clone(&tool));
        let mut renderer = PdfRenderer::new();
        if let Some(path) = &config.font {
            let font = TitleFont::load(path).map_err(RenderError::from)?;
            info!(path = %path.display(), font = font.name(), "title font loaded");
            renderer = renderer.with_title_font(font);
        }
        let assembler = Assembler::new(Arc::new(renderer), config.extensions.clone());
        Ok(Self::new(config, metadata, downloader, tool, assembler))
    }

    /// Volumes the work publishes, numerically sorted.
    ///
    /// # Errors
    ///
    /// Metadata fetch or extraction failures.
    pub async fn list_volumes(&self) -> Result<Vec<String>, PipelineError> {
        let markup = self.metadata.work_markup(&self.config.base_url).await?;
        Ok(volumes(&extract_work_data(&markup)?))
    }

    /// Resolves the work and the selected volume without downloading pages.
    ///
    /// # Errors
    ///
    /// Metadata fetch, extraction and resolution failures.
    #[instrument(skip(self), fields(url = %self.config.base_url))]
    pub async fn resolve_work(&self) -> Result<Work, PipelineError> {
        let markup = self.metadata.work_markup(&self.config.base_url).await?;
        let raw = extract_work_data(&markup)?;
        let volume = select_volume(&raw, self.config.volume.as_deref())?;
        let mut work = resolve(&raw, &volume)?;
        work.cover_url = extract_cover_url(&markup)
            .and_then(|src| self.config.base_url.join(&src).ok())
            .map(String::from);
        info!(
            name = %work.name,
            volume = %work.volume,
            chapters = work.chapters.len(),
            "work resolved"
        );
        Ok(work)
    }

    /// Runs the whole pipeline and writes `<output_dir>/<slug>-v<volume>.pdf`.
    ///
    /// # Errors
    ///
    /// Any [`PipelineError`]; nothing is rendered after a failure.
    #[instrument(skip(self), fields(url = %self.config.base_url))]
    pub async fn run(&self) -> Result<RunSummary, PipelineError> {
        let work = self.resolve_work().await?;
        let cover = self.acquire_cover(&work).await;

        let mut document = Vec::new();
        let mut dropped = 0;
        for chapter in &work.chapters {
            let (images, skipped) = self.acquire_chapter(chapter).await?;
            dropped += skipped;
            document.push(DocumentPage::Title(TitleBlock::for_chapter(
                &work,
                chapter,
                cover.clone(),
            )));
            document.extend(images.into_iter().map(DocumentPage::Image));
        }

        create_dir(&self.config.output_dir).await?;
        let output = self.config.output_dir.join(work.output_file_name());
        let assembler = self.assembler.clone();
        let target = output.clone();
        let summary = tokio::task::spawn_blocking(move || assembler.assemble(&target, document))
            .await
            .map_err(|e| PipelineError::Panicked {
                chapter: output.display().to_string(),
                message: e.to_string(),
            })??;

        info!(output = %output.display(), pages = summary.rendered, "volume complete");
        Ok(RunSummary {
            output,
            volume: work.volume.clone(),
            chapters: work.chapters.len(),
            pages: summary.rendered,
            dropped: dropped + summary.dropped,
        })
    }

    /// Fetches the chapter's page list and acquires every permitted page.
    ///
    /// Returns the image blocks in page order and the number of pages the
    /// extension policy skipped before download.
    #[instrument(skip(self, chapter), fields(chapter = %chapter.slug))]
    async fn acquire_chapter(
        &self,
        chapter: &Chapter,
    ) -> Result<(Vec<ImageBlock>, usize), PipelineError> {
        let url = chapter.url(&self.config.base_url);
        let markup = self.metadata.chapter_markup(&url).await?;
        let pages = build_pages(&extract_chapter_data(&markup)?)?;

        let total = pages.len();
        let policy = self.assembler.policy();
        let (permitted, skipped): (Vec<Page>, Vec<Page>) = pages
            .into_iter()
            .partition(|page| policy.permits_extension(page.extension.as_deref()));
        for page in &skipped {
            warn!(
                seq = page.seq,
                extension = ?page.extension,
                "page excluded by extension policy"
            );
        }

        let dir = self.config.work_dir.join(&chapter.slug);
        create_dir(&dir).await?;
        info!(
            pages = permitted.len(),
            skipped = skipped.len(),
            total,
            "downloading chapter"
        );

        let seqs: Vec<u32> = permitted.iter().map(|page| page.seq).collect();
        let images = self
            .scheduler
            .run_all(permitted, |page| {
                let downloader = self.downloader.clone();
                let tool = Arc::clone(&self.tool);
                let conversion = self.config.conversion;
                let destination = dir.join(page.file_name());
                async move {
                    acquire_page(&downloader, tool.as_ref(), &page, destination, &conversion).await
                }
            })
            .await
            .map_err(|error| match error {
                SchedulerError::Task { index, source } => PipelineError::Page {
                    chapter: chapter.slug.clone(),
                    page: seqs.get(index).copied().unwrap_or_default(),
                    source,
                },
                SchedulerError::Panicked { message, .. } => PipelineError::Panicked {
                    chapter: chapter.slug.clone(),
                    message,
                },
                SchedulerError::SemaphoreClosed => PipelineError::Panicked {
                    chapter: chapter.slug.clone(),
                    message: "scheduler closed".to_string(),
                },
            })?;

        Ok((images, skipped.len()))
    }

    /// Downloads and converts the cover; any failure is logged and ignored.
    async fn acquire_cover(&self, work: &Work) -> Option<PathBuf> {
        let Some(url) = &work.cover_url else {
            info!("cover image not found");
            return None;
        };

        let extension = Url::parse(url)
            .ok()
            .and_then(|u| {
                Path::new(u.path())
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| "jpg".to_string());
        let destination = self
            .config
            .work_dir
            .join(format!("{}_cover.{extension}", work.slug));

        let result = async {
            create_dir(&self.config.work_dir).await.map_err(|e| e.to_string())?;
            self.downloader
                .fetch_asset(std::slice::from_ref(url), &destination)
                .await
                .map_err(|e| e.to_string())?;
            render_ready(self.tool.as_ref(), &destination, &self.config.conversion)
                .await
                .map_err(|e| e.to_string())
        }
        .await;

        match result {
            Ok(path) => {
                debug!(path = %path.display(), "cover ready");
                Some(path)
            }
            Err(error) => {
                warn!(%url, %error, "error loading cover image; continuing without it");
                None
            }
        }
    }
}

async fn acquire_page(
    downloader: &MirrorDownloader,
    tool: &dyn ImageTool,
    page: &Page,
    destination: PathBuf,
    conversion: &ConversionPolicy,
) -> Result<ImageBlock, PageError> {
    downloader.fetch_asset(&page.mirrors, &destination).await?;
    let path = render_ready(tool, &destination, conversion).await?;
    Ok(ImageBlock {
        path,
        source: destination,
    })
}

async fn create_dir(path: &Path) -> Result<(), PipelineError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| PipelineError::Io {
            path: path.to_path_buf(),
            source,
        })
}
