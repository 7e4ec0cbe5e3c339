//! Integration tests for cached metadata retrieval.

use mangapdf_core::auth::Session;
use mangapdf_core::cache::{ContentCache, cache_key};
use mangapdf_core::download::{HttpClient, RequestContext};
use mangapdf_core::metadata::{HttpMetadataSource, MetadataError, MetadataSource};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer, cache_root: &std::path::Path) -> (HttpMetadataSource, Url) {
    let base = Url::parse(&format!("{}/berserk", server.uri())).expect("base url");
    let client =
        HttpClient::new(&RequestContext::for_work(&base, Session::Anonymous)).expect("client");
    (
        HttpMetadataSource::new(client, ContentCache::new(cache_root)),
        base,
    )
}

#[tokio::test]
async fn test_work_markup_is_fetched_once_and_cached_by_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/berserk"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>work</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("tempdir");
    let (source, base) = source_for(&server, dir.path());

    let first = source.work_markup(&base).await.expect("first fetch");
    let second = source.work_markup(&base).await.expect("cached fetch");

    assert_eq!(first, "<html>work</html>");
    assert_eq!(first, second);
    let entry = dir.path().join(cache_key(base.as_str()));
    assert_eq!(std::fs::read_to_string(entry).expect("cache entry"), first);
}

#[tokio::test]
async fn test_cache_survives_a_new_source_instance() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/berserk/v1/c1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("chapter"))
        .expect(1)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("tempdir");
    let url = format!("{}/berserk/v1/c1", server.uri());

    let (source, _) = source_for(&server, dir.path());
    source.chapter_markup(&url).await.expect("first run");
    let (source, _) = source_for(&server, dir.path());
    assert_eq!(source.chapter_markup(&url).await.expect("second run"), "chapter");
}

#[tokio::test]
async fn test_failed_fetch_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/berserk"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    let dir = TempDir::new().expect("tempdir");
    let (source, base) = source_for(&server, dir.path());

    for _ in 0..2 {
        let err = source.work_markup(&base).await.expect_err("503");
        assert!(matches!(err, MetadataError::Fetch(_)));
        assert!(err.to_string().contains("503"));
    }
    assert!(!dir.path().join(cache_key(base.as_str())).exists());
}
