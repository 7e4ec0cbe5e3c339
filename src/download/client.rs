//! HTTP client wrapper bound to one work's site.
//!
//! Every request carries the referer of the work's origin and, when the run
//! has one, the session credential. Timeouts are per request: a short connect
//! timeout and a total deadline.

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{COOKIE, REFERER};
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT, REQUEST_TIMEOUT, SESSION_COOKIE_NAME};
use super::error::DownloadError;
use crate::auth::Session;
use crate::user_agent;

/// Per-work request settings threaded into the client.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Origin of the work's base URL (`scheme://host[:port]`).
    pub referer: String,
    /// Credential attached to requests.
    pub session: Session,
    /// Connect timeout per request.
    pub connect_timeout: Duration,
    /// Total deadline per request.
    pub request_timeout: Duration,
}

impl RequestContext {
    /// Builds a context for the work at `base_url` with default timeouts.
    #[must_use]
    pub fn for_work(base_url: &Url, session: Session) -> Self {
        Self {
            referer: referer_for(base_url),
            session,
            connect_timeout: CONNECT_TIMEOUT,
            request_timeout: REQUEST_TIMEOUT,
        }
    }

    /// Replaces both timeouts.
    #[must_use]
    pub fn with_timeouts(mut self, connect: Duration, total: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = total;
        self
    }
}

/// Returns the origin of `url`, used as the `Referer` header value.
#[must_use]
pub fn referer_for(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// HTTP client for metadata pages and page assets.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    referer: String,
    session_cookie: Option<String>,
}

impl HttpClient {
    /// Creates a client from a request context.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the TLS backend cannot be initialized.
    #[instrument(level = "debug", skip(context), fields(session = context.session.kind()))]
    pub fn new(context: &RequestContext) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder()
            .connect_timeout(context.connect_timeout)
            .timeout(context.request_timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent());

        let session_cookie = match &context.session {
            Session::Anonymous => None,
            Session::Token(token) => Some(format!("{SESSION_COOKIE_NAME}={token}")),
            Session::Jar(jar) => {
                builder = builder.cookie_provider(jar.clone());
                None
            }
        };

        Ok(Self {
            client: builder.build()?,
            referer: context.referer.clone(),
            session_cookie,
        })
    }

    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for invalid URLs, network failures, timeouts
    /// and non-success statuses.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_text(&self, url: &str) -> Result<String, DownloadError> {
        let response = self.send(url).await?;
        response.text().await.map_err(|e| map_reqwest(url, e))
    }

    /// Streams `url` into `destination`, returning the number of bytes written.
    ///
    /// A body that fails mid-stream is removed; nothing else is cleaned up.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError`] for request failures, non-success statuses and
    /// file-system errors.
    #[instrument(skip(self), fields(url = %url, path = %destination.display()))]
    pub async fn download_to_path(
        &self,
        url: &str,
        destination: &Path,
    ) -> Result<u64, DownloadError> {
        let response = self.send(url).await?;

        let mut file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        let result = stream_to_file(&mut file, response, url, destination).await;
        if result.is_err() {
            debug!("cleaning up partial file after error");
            let _ = tokio::fs::remove_file(destination).await;
        }
        result
    }

    async fn send(&self, url: &str) -> Result<Response, DownloadError> {
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let mut request = self.client.get(url).header(REFERER, &self.referer);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }

        let response = request.send().await.map_err(|e| map_reqwest(url, e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

fn map_reqwest(url: &str, error: reqwest::Error) -> DownloadError {
    if error.is_timeout() {
        DownloadError::timeout(url)
    } else {
        DownloadError::network(url, error)
    }
}

async fn stream_to_file(
    file: &mut File,
    response: Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| map_reqwest(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_referer_is_origin_only() {
        let url = Url::parse("https://mangalib.me/berserk?section=info").unwrap();
        assert_eq!(referer_for(&url), "https://mangalib.me");
    }

    #[test]
    fn test_referer_keeps_non_default_port() {
        let url = Url::parse("http://127.0.0.1:8080/title/v1/c2").unwrap();
        assert_eq!(referer_for(&url), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_request_context_defaults() {
        let url = Url::parse("https://mangalib.me/x").unwrap();
        let ctx = RequestContext::for_work(&url, Session::Anonymous);
        assert_eq!(ctx.connect_timeout, CONNECT_TIMEOUT);
        assert_eq!(ctx.request_timeout, REQUEST_TIMEOUT);
        assert_eq!(ctx.referer, "https://mangalib.me");
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_request() {
        let url = Url::parse("https://mangalib.me/x").unwrap();
        let client = HttpClient::new(&RequestContext::for_work(&url, Session::Anonymous)).unwrap();
        let result = client.get_text("not a url").await;
        assert!(matches!(result, Err(DownloadError::InvalidUrl { .. })));
    }
}
