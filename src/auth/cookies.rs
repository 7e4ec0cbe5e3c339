//! Netscape cookie export parser and reqwest jar loader.
//!
//! Browser extensions export cookies as 7 TAB-separated fields per line. The
//! interactive session capture accepts such a file so an operator can hand the
//! downloader a logged-in browser session.

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};

/// A single parsed cookie from a Netscape-format cookie file.
///
/// The value is redacted in Debug output.
#[derive(Clone)]
pub struct CookieLine {
    /// The domain the cookie belongs to (e.g., `.mangalib.me`).
    pub domain: String,
    /// The URL path scope for the cookie.
    pub path: String,
    /// Whether the cookie should only be sent over HTTPS.
    pub secure: bool,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl CookieLine {
    /// Cookie value (sensitive, never log).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for CookieLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieLine")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors that can occur while parsing a cookie file.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A line in the cookie file has an invalid format.
    #[error("line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Parses a Netscape-format cookie file from a buffered reader.
///
/// Each data line must contain exactly 7 TAB-separated fields:
/// `domain`, `tailmatch`, `path`, `secure`, `expires`, `name`, `value`.
/// Comment lines (`#`) and blank lines are skipped; malformed lines are
/// logged and skipped.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when a non-empty file yields zero valid cookies.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<Vec<CookieLine>, CookieError> {
    let mut cookies = Vec::new();
    let mut malformed = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(line = line_number, domain = %cookie.domain, name = %cookie.name, "parsed cookie");
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                malformed += 1;
            }
        }
    }

    if cookies.is_empty() && malformed > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: malformed,
        });
    }

    Ok(cookies)
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<CookieLine, CookieError> {
    let fields: Vec<&str> = line.split('\t').collect();
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        reason,
    };

    let [domain, tailmatch, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    };

    parse_bool_field(tailmatch).ok_or_else(|| invalid("tailmatch must be TRUE or FALSE".into()))?;
    let secure =
        parse_bool_field(secure).ok_or_else(|| invalid("secure must be TRUE or FALSE".into()))?;
    expires
        .parse::<u64>()
        .map_err(|_| invalid(format!("expires must be a non-negative integer, got '{expires}'")))?;

    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    Ok(CookieLine {
        domain: (*domain).to_string(),
        path: (*path).to_string(),
        secure,
        name: (*name).to_string(),
        value: (*value).to_string(),
    })
}

fn parse_bool_field(value: &str) -> Option<bool> {
    match value {
        "TRUE" => Some(true),
        "FALSE" => Some(false),
        _ => None,
    }
}

/// Loads parsed cookies into a `reqwest::cookie::Jar`.
///
/// Expiry is not carried over: the jar only lives for one run.
#[instrument(level = "debug", skip(cookies))]
pub fn load_cookies_into_jar(cookies: &[CookieLine]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for cookie in cookies {
        let host = cookie.domain.trim_start_matches('.');
        let scheme = if cookie.secure { "https" } else { "http" };
        let mut set_cookie = format!(
            "{}={}; Domain={}; Path={}",
            cookie.name,
            cookie.value(),
            cookie.domain,
            cookie.path
        );
        if cookie.secure {
            set_cookie.push_str("; Secure");
        }

        match url::Url::parse(&format!("{scheme}://{host}/")) {
            Ok(origin) => jar.add_cookie_str(&set_cookie, &origin),
            Err(_) => warn!(
                domain = %cookie.domain,
                name = %cookie.name,
                "skipping cookie with unparseable domain"
            ),
        }
    }

    jar
}
