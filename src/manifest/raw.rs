//! Raw metadata shapes as embedded in the site's markup.
//!
//! These mirror the JSON literals assigned to `window.__DATA__`, `window.__pg`
//! and `window.__info`. Only the fields the pipeline reads are modelled; the
//! rest are ignored on deserialization.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// `window.__DATA__` on the work page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawWorkData {
    /// Work identity and names.
    pub manga: RawManga,
    /// Chapter listing.
    #[serde(default)]
    pub chapters: RawChapterList,
}

/// Work names as published.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawManga {
    /// Localized (Russian) name.
    #[serde(default)]
    pub rus_name: Option<String>,
    /// Alternate (English) name.
    #[serde(default)]
    pub eng_name: Option<String>,
    /// URL slug.
    #[serde(default)]
    pub slug: String,
}

/// Wrapper around the chapter list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChapterList {
    /// Every chapter across every volume, in site order.
    #[serde(default)]
    pub list: Vec<RawChapterEntry>,
}

/// One chapter entry; volume and number arrive as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChapterEntry {
    /// Volume label.
    #[serde(deserialize_with = "string_or_number")]
    pub chapter_volume: String,
    /// Chapter number, possibly fractional ("10.5").
    #[serde(deserialize_with = "string_or_number")]
    pub chapter_number: String,
    /// Chapter title; may be empty or null.
    #[serde(default, deserialize_with = "nullable_string")]
    pub chapter_name: String,
}

/// One entry of `window.__pg`: page number and relative asset key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPage {
    /// Page sequence number.
    pub p: u32,
    /// Asset key appended to the image base path.
    pub u: String,
}

/// `window.__info` on the chapter page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImageInfo {
    /// Mirror base URLs keyed by alias; key order is mirror priority.
    #[serde(default)]
    pub servers: Map<String, Value>,
    /// Shared image path.
    #[serde(default)]
    pub img: RawImagePath,
}

/// Shared image path between server base and page key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawImagePath {
    /// Path segment such as `/manga/berserk/chapters/123/`.
    #[serde(default)]
    pub url: String,
}

/// Everything a chapter page contributes to page resolution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawChapterData {
    /// Pages in site order.
    pub pages: Vec<RawPage>,
    /// Server and path information.
    pub info: RawImageInfo,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {other}"
        ))),
    }
}

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
