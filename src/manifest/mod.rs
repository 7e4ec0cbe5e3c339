//! Work metadata: extraction from markup and resolution into chapters/pages.
//!
//! # Flow
//!
//! 1. [`extract_work_data`] reads `window.__DATA__` from the work page
//! 2. [`select_volume`] and [`resolve`] produce a [`Work`] with ordered chapters
//! 3. per chapter, [`extract_chapter_data`] and [`build_pages`] produce the
//!    [`Page`] list with mirror URLs in priority order
//!
//! # Example
//!
//! ```
//! use mangapdf_core::manifest::{extract_work_data, resolve};
//!
//! let markup = r#"<script>window.__DATA__ = {
//!     "manga": {"rusName": "", "engName": "Berserk", "slug": "berserk"},
//!     "chapters": {"list": [
//!         {"chapter_volume": 1, "chapter_number": "10", "chapter_name": ""},
//!         {"chapter_volume": 1, "chapter_number": "2", "chapter_name": ""}
//!     ]}
//! };</script>"#;
//! let work = resolve(&extract_work_data(markup).unwrap(), "1").unwrap();
//! assert_eq!(work.name, "Berserk");
//! assert_eq!(work.chapters[0].number, "2");
//! ```

mod error;
mod extract;
mod model;
mod raw;
mod resolve;

pub use error::ManifestError;
pub use extract::{
    IMAGE_INFO_VAR, PAGES_VAR, WORK_DATA_VAR, extract_chapter_data, extract_cover_url,
    extract_work_data, find_assignment, parse_assignment, script_bodies,
};
pub use model::{Chapter, Page, Work};
pub use raw::{
    RawChapterData, RawChapterEntry, RawChapterList, RawImageInfo, RawImagePath, RawManga,
    RawPage, RawWorkData,
};
pub use resolve::{build_pages, display_name, resolve, select_volume, volumes};
