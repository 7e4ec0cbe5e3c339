//! Constants for the download module (timeouts, marker naming).

use std::time::Duration;

/// Default connect timeout for a single mirror attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default total response deadline for a single mirror attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(5000);

/// Suffix appended to an asset path to form its completion marker.
pub const DONE_MARKER_SUFFIX: &str = "done";

/// Name of the session cookie sent when a session token is configured.
pub const SESSION_COOKIE_NAME: &str = "mangalib_session";
