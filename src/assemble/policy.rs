//! Extension allow/deny policy for page assets.

use std::path::Path;

/// Extensions denied unless configured otherwise.
pub const DEFAULT_DENY_EXTENSIONS: &[&str] = &["gif"];

/// Which source asset extensions may enter the document.
///
/// Matching is case-insensitive and a leading dot is optional. The deny list
/// always wins; when an allow list is set, only its entries pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionPolicy {
    deny: Vec<String>,
    allow: Option<Vec<String>>,
}

impl Default for ExtensionPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_EXTENSIONS.iter().copied(), None::<Vec<&str>>)
    }
}

impl ExtensionPolicy {
    /// Builds a policy; empty entries are ignored.
    pub fn new<D, A, S>(deny: D, allow: Option<A>) -> Self
    where
        D: IntoIterator<Item = S>,
        A: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            deny: normalize_all(deny),
            allow: allow.map(normalize_all),
        }
    }

    /// A policy that admits everything.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            deny: Vec::new(),
            allow: None,
        }
    }

    /// Denied extensions, normalized.
    #[must_use]
    pub fn denied(&self) -> &[String] {
        &self.deny
    }

    /// Allowed extensions, normalized, when an allow list is set.
    #[must_use]
    pub fn allowed(&self) -> Option<&[String]> {
        self.allow.as_deref()
    }

    /// Checks a bare extension (`"gif"`, `".GIF"`) or its absence.
    #[must_use]
    pub fn permits_extension(&self, extension: Option<&str>) -> bool {
        let ext = extension.map(normalize).filter(|e| !e.is_empty());
        if let Some(ext) = &ext
            && self.deny.contains(ext)
        {
            return false;
        }
        match (&self.allow, &ext) {
            (None, _) => true,
            (Some(allow), Some(ext)) => allow.contains(ext),
            (Some(_), None) => false,
        }
    }

    /// Checks the extension of `path`.
    #[must_use]
    pub fn permits(&self, path: &Path) -> bool {
        self.permits_extension(path.extension().and_then(|e| e.to_str()))
    }
}

fn normalize(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

fn normalize_all<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| normalize(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect()
}
