//! Authentication: session strategies and cookie loading.
//!
//! The site accepts either a bare session token (sent as a cookie) or a full
//! browser cookie set. [`SessionStrategy`] picks between them per run.

mod cookies;
mod session;

pub use cookies::{CookieError, CookieLine, load_cookies_into_jar, parse_netscape_cookies};
pub use session::{AuthError, Session, SessionStrategy, capture_session};
