//! Script-embedded metadata extraction without executing any script.
//!
//! The site publishes its metadata as JavaScript assignments such as
//! `window.__DATA__ = {...};` inside `<script>` elements. The extractor finds
//! the assignment, bracket-matches the literal that follows (skipping over
//! string literals), and hands the slice to `serde_json`.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};

use super::error::ManifestError;
use super::raw::{RawChapterData, RawImageInfo, RawPage, RawWorkData};

/// Global holding the work data on the work page.
pub const WORK_DATA_VAR: &str = "window.__DATA__";
/// Global holding the page list on a chapter page.
pub const PAGES_VAR: &str = "window.__pg";
/// Global holding servers and image path on a chapter page.
pub const IMAGE_INFO_VAR: &str = "window.__info";

#[allow(clippy::expect_used)]
static SCRIPT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").expect("script regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static COVER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)class\s*=\s*["'][^"']*\bmedia-sidebar__cover\b[^"']*["'][^>]*>.*?<img\b[^>]*?\bsrc\s*=\s*["']([^"']+)["']"#,
    )
    .expect("cover regex is valid") // Static pattern, safe to panic
});

/// Returns the text of every `<script>` element, in document order.
pub fn script_bodies(markup: &str) -> impl Iterator<Item = &str> {
    SCRIPT_PATTERN
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
}

/// Finds the literal assigned to `variable` in `source`.
///
/// Only a direct assignment (`variable = {...}` or `variable = [...]`) is
/// accepted; member access like `window.__DATA__.manga` is skipped.
#[must_use]
pub fn find_assignment<'a>(source: &'a str, variable: &str) -> Option<&'a str> {
    let mut offset = 0;
    while let Some(found) = source[offset..].find(variable) {
        let after = offset + found + variable.len();
        offset = after;

        if source[after..]
            .chars()
            .next()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            continue;
        }
        let rest = source[after..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        // `==` / `===` comparisons are not assignments.
        if rest.starts_with('=') {
            continue;
        }
        let rest = rest.trim_start();
        if let Some(len) = literal_len(rest) {
            return Some(&rest[..len]);
        }
    }
    None
}

/// Length in bytes of the bracketed literal at the start of `text`.
///
/// Returns `None` when `text` does not start with `{` or `[`, or when the
/// brackets never balance.
fn literal_len(text: &str) -> Option<usize> {
    let first = text.chars().next()?;
    if first != '{' && first != '[' {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, ch) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(pos + ch.len_utf8());
                }
            }
            _ => {}
        }
    }
    None
}

/// Parses the literal assigned to `variable` in any script of `markup`.
///
/// # Errors
///
/// [`ManifestError::MissingAssignment`] when no script assigns it,
/// [`ManifestError::InvalidLiteral`] when the literal is not valid JSON for `T`.
pub fn parse_assignment<T: DeserializeOwned>(
    markup: &str,
    variable: &'static str,
    context: &'static str,
) -> Result<T, ManifestError> {
    let literal = script_bodies(markup)
        .filter(|body| body.contains(variable))
        .find_map(|body| find_assignment(body, variable))
        .ok_or(ManifestError::MissingAssignment { variable, context })?;

    trace!(variable, bytes = literal.len(), "found assignment literal");
    serde_json::from_str(literal).map_err(|source| ManifestError::InvalidLiteral { variable, source })
}

/// Extracts `window.__DATA__` from the work page.
///
/// # Errors
///
/// See [`parse_assignment`].
pub fn extract_work_data(markup: &str) -> Result<RawWorkData, ManifestError> {
    let data: RawWorkData = parse_assignment(markup, WORK_DATA_VAR, "work")?;
    debug!(
        slug = %data.manga.slug,
        chapters = data.chapters.list.len(),
        "extracted work data"
    );
    Ok(data)
}

/// Extracts `window.__pg` and `window.__info` from a chapter page.
///
/// # Errors
///
/// See [`parse_assignment`].
pub fn extract_chapter_data(markup: &str) -> Result<RawChapterData, ManifestError> {
    let pages: Vec<RawPage> = parse_assignment(markup, PAGES_VAR, "chapter")?;
    let info: RawImageInfo = parse_assignment(markup, IMAGE_INFO_VAR, "chapter")?;
    debug!(
        pages = pages.len(),
        servers = info.servers.len(),
        "extracted chapter data"
    );
    Ok(RawChapterData { pages, info })
}

/// Returns the cover image `src` from the work page sidebar, if present.
#[must_use]
pub fn extract_cover_url(markup: &str) -> Option<String> {
    COVER_PATTERN
        .captures(markup)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().replace("&amp;", "&"))
        .filter(|src| !src.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const WORK_PAGE: &str = r#"<html><head>
<script src="/js/app.js"></script>
<script>window.__CONFIG__ = {"a": 1};</script>
<script type="text/javascript">
  window.__DATA__ = {"manga": {"rusName": "Берсерк", "engName": "Berserk", "slug": "berserk"},
    "chapters": {"list": [
      {"chapter_volume": 1, "chapter_number": "2", "chapter_name": "Brand {of} [sacrifice]"},
      {"chapter_volume": 1, "chapter_number": "1", "chapter_name": "Black \"Swordsman\""}
    ]}};
  window._SITE_COLOR_ = '#ff7f00';
</script></head>
<body><div class="media-sidebar__cover paper"><img src="https://cover.example/berserk.jpg?x=1&amp;y=2" alt=""></div></body></html>"#;

    #[test]
    fn test_find_assignment_object() {
        let src = r#"var x = 1; window.__info = {"img": {"url": "/a}b/"}}; more()"#;
        assert_eq!(
            find_assignment(src, IMAGE_INFO_VAR).unwrap(),
            r#"{"img": {"url": "/a}b/"}}"#
        );
    }

    #[test]
    fn test_find_assignment_skips_member_access_and_comparison() {
        let src = r#"if (window.__pg == null) {} window.__pg.length; window.__pg = [{"p":1,"u":"1.jpg"}];"#;
        assert_eq!(find_assignment(src, PAGES_VAR).unwrap(), r#"[{"p":1,"u":"1.jpg"}]"#);
    }

    #[test]
    fn test_find_assignment_requires_exact_name() {
        let src = r#"window.__pgCount = [1]; window.__pg = [2];"#;
        assert_eq!(find_assignment(src, PAGES_VAR).unwrap(), "[2]");
    }

    #[test]
    fn test_find_assignment_handles_escaped_quotes() {
        let src = r#"window.__DATA__ = {"t": "a \"}\" b", "u": 'it\'s ]'};"#;
        assert_eq!(
            find_assignment(src, WORK_DATA_VAR).unwrap(),
            r#"{"t": "a \"}\" b", "u": 'it\'s ]'}"#
        );
    }

    #[test]
    fn test_find_assignment_unbalanced_is_none() {
        assert!(find_assignment("window.__pg = [{\"p\":1}", PAGES_VAR).is_none());
        assert!(find_assignment("window.__pg = null;", PAGES_VAR).is_none());
    }

    #[test]
    fn test_extract_work_data() {
        let data = extract_work_data(WORK_PAGE).unwrap();
        assert_eq!(data.manga.slug, "berserk");
        assert_eq!(data.chapters.list.len(), 2);
        assert_eq!(data.chapters.list[0].chapter_name, "Brand {of} [sacrifice]");
        assert_eq!(data.chapters.list[1].chapter_name, "Black \"Swordsman\"");
    }

    #[test]
    fn test_missing_assignment_is_error() {
        let result = extract_work_data("<script>var a = 1;</script>");
        assert!(matches!(
            result,
            Err(ManifestError::MissingAssignment {
                variable: WORK_DATA_VAR,
                ..
            })
        ));
    }

    #[test]
    fn test_script_text_outside_script_tags_is_ignored() {
        let result = extract_work_data(r#"<p>window.__DATA__ = {"manga": {"slug": "x"}}</p>"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_literal_is_error() {
        let result = extract_work_data("<script>window.__DATA__ = {manga: 1};</script>");
        assert!(matches!(result, Err(ManifestError::InvalidLiteral { .. })));
    }

    #[test]
    fn test_extract_chapter_data() {
        let markup = r#"<script>
window.__info = {"servers": {"main": "https://img2.example", "secondary": "https://img3.example"},
                 "img": {"url": "/manga/berserk/chapters/1/"}};
window.__pg = [{"p": 1, "u": "01.png"}, {"p": 2, "u": "02.gif"}];
</script>"#;
        let data = extract_chapter_data(markup).unwrap();
        assert_eq!(data.pages.len(), 2);
        assert_eq!(data.pages[1].u, "02.gif");
        assert_eq!(data.info.img.url, "/manga/berserk/chapters/1/");
    }

    #[test]
    fn test_extract_cover_url() {
        assert_eq!(
            extract_cover_url(WORK_PAGE).unwrap(),
            "https://cover.example/berserk.jpg?x=1&y=2"
        );
        assert!(extract_cover_url("<div class=\"other\"><img src=\"a.jpg\"></div>").is_none());
    }
}
