//! Session strategies: how requests to the content site are authenticated.
//!
//! A [`SessionStrategy`] is chosen by configuration and turned into a
//! [`Session`] once per run. The HTTP client attaches whatever the session
//! carries to every request.

use std::fmt;
use std::fs;
use std::io::{self, BufRead, Cursor, IsTerminal, Read};
use std::path::Path;
use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{info, instrument, warn};
use url::Url;

use super::cookies::{CookieError, load_cookies_into_jar, parse_netscape_cookies};

/// Errors raised while establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Nothing usable was provided by the operator.
    #[error("no session data provided")]
    NoInput,

    /// Reading operator input or a cookie file failed.
    #[error("failed to read session input: {0}")]
    Io(#[from] io::Error),

    /// The pasted cookie export could not be parsed.
    #[error("invalid cookie export: {0}")]
    Cookies(#[from] CookieError),
}

/// Credential attached to outgoing requests.
#[derive(Clone, Default)]
pub enum Session {
    /// No credential.
    #[default]
    Anonymous,
    /// Raw session token, sent as the site's session cookie.
    Token(String),
    /// Cookies captured from a logged-in browser.
    Jar(Arc<Jar>),
}

impl Session {
    /// Short label for logs; never includes the credential itself.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Token(_) => "token",
            Self::Jar(_) => "cookie-jar",
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.kind())
    }
}

/// How the run obtains its [`Session`].
#[derive(Clone, PartialEq, Eq)]
pub enum SessionStrategy {
    /// Plain requests.
    Anonymous,
    /// Session token from configuration (`session = "..."` or `--session`).
    Cookie {
        /// The token value.
        token: String,
    },
    /// Operator logs in with a browser and pastes the result.
    InteractiveBrowser,
}

impl fmt::Debug for SessionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => f.write_str("Anonymous"),
            Self::Cookie { .. } => f.write_str("Cookie { token: [REDACTED] }"),
            Self::InteractiveBrowser => f.write_str("InteractiveBrowser"),
        }
    }
}

impl SessionStrategy {
    /// Picks a strategy: `--auth` wins, then a configured token, else anonymous.
    #[must_use]
    pub fn select(interactive: bool, token: Option<&str>) -> Self {
        if interactive {
            return Self::InteractiveBrowser;
        }
        match token.map(str::trim).filter(|token| !token.is_empty()) {
            Some(token) => Self::Cookie {
                token: token.to_string(),
            },
            None => Self::Anonymous,
        }
    }

    /// Establishes the session, prompting on the terminal for the interactive strategy.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the interactive capture gets no usable input.
    #[instrument(skip(self), fields(strategy = ?self))]
    pub fn establish(&self, site: &Url) -> Result<Session, AuthError> {
        match self {
            Self::Anonymous => Ok(Session::Anonymous),
            Self::Cookie { token } => Ok(Session::Token(token.clone())),
            Self::InteractiveBrowser => {
                info!("Interactive authorization");
                info!("1. Open {site} in a browser and log in.");
                info!("2. Copy the `mangalib_session` cookie value, the whole Cookie header,");
                info!("   or export cookies in Netscape format to a file.");
                info!("3. Paste the value or the file path below, then press Enter.");
                let input = read_operator_input()?;
                capture_session(&input, site)
            }
        }
    }
}

fn read_operator_input() -> Result<String, AuthError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        Ok(line)
    } else {
        let mut buffer = String::new();
        stdin.lock().read_to_string(&mut buffer)?;
        Ok(buffer)
    }
}

/// Turns operator input into a [`Session`].
///
/// Accepted forms, checked in order:
/// - a path to a Netscape cookie export,
/// - inline Netscape cookie lines (contain TABs),
/// - a `Cookie` header value (`name=value; other=value`), scoped to `site`,
/// - a bare session token.
///
/// # Errors
///
/// Returns [`AuthError::NoInput`] for blank input and [`AuthError::Cookies`]
/// when a cookie export has no valid lines.
pub fn capture_session(input: &str, site: &Url) -> Result<Session, AuthError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(AuthError::NoInput);
    }

    if !trimmed.contains('\n') && Path::new(trimmed).is_file() {
        let contents = fs::read_to_string(trimmed)?;
        return jar_from_export(&contents);
    }

    if trimmed.contains('\t') {
        return jar_from_export(trimmed);
    }

    if trimmed.contains('=') {
        let header = trimmed
            .strip_prefix("Cookie:")
            .or_else(|| trimmed.strip_prefix("cookie:"))
            .unwrap_or(trimmed);
        let jar = Arc::new(Jar::default());
        let mut added = 0;
        for pair in header.split(';').map(str::trim).filter(|p| p.contains('=')) {
            jar.add_cookie_str(pair, site);
            added += 1;
        }
        info!(cookies = added, "captured cookie header");
        return Ok(Session::Jar(jar));
    }

    Ok(Session::Token(trimmed.to_string()))
}

fn jar_from_export(contents: &str) -> Result<Session, AuthError> {
    let cookies = parse_netscape_cookies(Cursor::new(contents))?;
    if cookies.is_empty() {
        warn!("cookie export contained no cookies");
        return Err(AuthError::NoInput);
    }
    info!(count = cookies.len(), "loaded cookies from export");
    Ok(Session::Jar(load_cookies_into_jar(&cookies)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use reqwest::cookie::CookieStore;

    use super::*;

    fn site() -> Url {
        Url::parse("https://mangalib.me/berserk").unwrap()
    }

    #[test]
    fn test_select_prefers_interactive() {
        let strategy = SessionStrategy::select(true, Some("tok"));
        assert_eq!(strategy, SessionStrategy::InteractiveBrowser);
    }

    #[test]
    fn test_select_uses_token_when_present() {
        let strategy = SessionStrategy::select(false, Some("  tok  "));
        assert_eq!(
            strategy,
            SessionStrategy::Cookie {
                token: "tok".to_string()
            }
        );
    }

    #[test]
    fn test_select_blank_token_is_anonymous() {
        assert_eq!(
            SessionStrategy::select(false, Some("   ")),
            SessionStrategy::Anonymous
        );
        assert_eq!(SessionStrategy::select(false, None), SessionStrategy::Anonymous);
    }

    #[test]
    fn test_strategy_debug_redacts_token() {
        let strategy = SessionStrategy::Cookie {
            token: "secret".to_string(),
        };
        assert!(!format!("{strategy:?}").contains("secret"));
    }

    #[test]
    fn test_establish_cookie_strategy_yields_token() {
        let strategy = SessionStrategy::Cookie {
            token: "abc".to_string(),
        };
        let session = strategy.establish(&site()).unwrap();
        assert!(matches!(session, Session::Token(ref t) if t == "abc"));
    }

    #[test]
    fn test_capture_bare_token() {
        let session = capture_session("abc123\n", &site()).unwrap();
        assert!(matches!(session, Session::Token(ref t) if t == "abc123"));
    }

    #[test]
    fn test_capture_cookie_header_scopes_to_site() {
        let session =
            capture_session("Cookie: mangalib_session=abc; theme=dark", &site()).unwrap();
        let Session::Jar(jar) = session else {
            panic!("expected jar session");
        };
        let header = jar.cookies(&site()).unwrap();
        let header = header.to_str().unwrap();
        assert!(header.contains("mangalib_session=abc"), "got: {header}");
        assert!(header.contains("theme=dark"), "got: {header}");
    }

    #[test]
    fn test_capture_netscape_file_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cookies.txt");
        fs::write(
            &path,
            ".mangalib.me\tTRUE\t/\tTRUE\t0\tmangalib_session\tfromfile\n",
        )
        .unwrap();

        let session = capture_session(path.to_str().unwrap(), &site()).unwrap();
        assert_eq!(session.kind(), "cookie-jar");
    }

    #[test]
    fn test_capture_blank_input_is_error() {
        assert!(matches!(
            capture_session("  \n", &site()),
            Err(AuthError::NoInput)
        ));
    }
}
