//! Integration tests for the crawler
//!
//! These tests use wiremock to serve pages and run fetch, crawl and diff
//! end-to-end against a real SQLite file. The crawler is blocking, so it runs
//! on tokio's blocking pool while the mock server stays on the async runtime.

use std::sync::Arc;
use tempfile::TempDir;
use unfurl::config::FetcherConfig;
use unfurl::crawler::{
    CrawlReport, Crawler, CrawlerSettings, ExecutionMode, FetchResult, Fetcher, HttpFetcher,
    LinkFilter, Target,
};
use unfurl::diff::Differ;
use unfurl::storage::{open_store, SnapshotStore, SqliteSnapshotStore};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_page(links: &[&str]) -> ResponseTemplate {
    let anchors: String = links
        .iter()
        .map(|href| format!("<a href=\"{}\">{}</a>\n", href, href))
        .collect();
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>\n{}</body></html>", anchors),
        "text/html; charset=utf-8",
    )
}

async fn serve(server: &MockServer, route: &str, links: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(links))
        .mount(server)
        .await;
}

fn test_fetcher() -> HttpFetcher {
    let config = FetcherConfig {
        user_agent: "unfurl-test".to_string(),
        timeout_secs: 5,
    };
    HttpFetcher::new(&config).expect("Failed to build HTTP client")
}

/// Runs one crawl on the blocking pool
async fn crawl_once(
    store: Arc<SqliteSnapshotStore>,
    settings: CrawlerSettings,
    targets: Vec<Target>,
) -> CrawlReport {
    tokio::task::spawn_blocking(move || {
        let crawler = Crawler::new(settings, Arc::new(test_fetcher()), store);
        crawler.crawl(&targets)
    })
    .await
    .expect("Crawl task panicked")
}

async fn fetch(url: String, filter: LinkFilter) -> FetchResult {
    tokio::task::spawn_blocking(move || test_fetcher().fetch(&url, &filter))
        .await
        .expect("Fetch task panicked")
}

#[tokio::test]
async fn test_fetch_extracts_filtered_links() {
    let mock_server = MockServer::start().await;
    serve(
        &mock_server,
        "/files",
        &["/a.pdf", "/index.html", "", "https://other.test/b.pdf", "/a.pdf"],
    )
    .await;

    let filter = LinkFilter::new(r"\.pdf$").unwrap();
    let result = fetch(format!("{}/files", mock_server.uri()), filter).await;

    assert_eq!(
        result,
        FetchResult::Success {
            links: vec![
                "/a.pdf".to_string(),
                "https://other.test/b.pdf".to_string(),
                "/a.pdf".to_string(),
            ]
        }
    );
}

#[tokio::test]
async fn test_fetch_error_status_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let result = fetch(
        format!("{}/missing", mock_server.uri()),
        LinkFilter::any().unwrap(),
    )
    .await;

    assert_eq!(result, FetchResult::failed("HTTP 404"));
}

#[tokio::test]
async fn test_fetch_non_html_is_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"href": "/x"}"#, "application/json"),
        )
        .mount(&mock_server)
        .await;

    let result = fetch(
        format!("{}/data", mock_server.uri()),
        LinkFilter::any().unwrap(),
    )
    .await;

    assert!(matches!(result, FetchResult::Failed { .. }));
}

#[tokio::test]
async fn test_crawl_store_and_diff_across_changes() {
    let mock_server = MockServer::start().await;
    serve(&mock_server, "/", &["/x", "/a"]).await;

    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("snapshots.sqlite3");
    let store = Arc::new(open_store(&db_path.to_string_lossy()).unwrap());
    let target = Target::new(&format!("{}/", mock_server.uri())).unwrap();
    let resource_id = target.resource_id().to_string();

    let first = crawl_once(
        Arc::clone(&store),
        CrawlerSettings::once(),
        vec![target.clone()],
    )
    .await;
    assert_eq!(first.snapshots_stored, 1);

    // Unchanged content is not stored again
    let second = crawl_once(
        Arc::clone(&store),
        CrawlerSettings::once(),
        vec![target.clone()],
    )
    .await;
    assert_eq!(second.snapshots_stored, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.count(&resource_id, None).unwrap(), 1);

    mock_server.reset().await;
    serve(&mock_server, "/", &["/a", "/x", "/y"]).await;

    let third = crawl_once(Arc::clone(&store), CrawlerSettings::once(), vec![target]).await;
    assert_eq!(third.snapshots_stored, 1);
    assert_eq!(store.count(&resource_id, None).unwrap(), 2);

    let differ = Differ::new(Arc::clone(&store) as Arc<dyn SnapshotStore>);
    let diff = differ.diff(&resource_id, 1, 0).unwrap();

    assert!(diff.starts_with(&format!("--- {}\t", resource_id)));
    assert!(diff.lines().any(|l| l == "+/y"));
    assert!(!diff
        .lines()
        .any(|l| l.starts_with('-') && !l.starts_with("---")));
    assert!(diff.ends_with('\n') && !diff.ends_with("\n\n"));

    // History survives reopening the database file
    drop(differ);
    drop(store);
    let reopened = open_store(&db_path.to_string_lossy()).unwrap();
    let latest = reopened.most_recent(&resource_id, ".+", 0).unwrap().unwrap();
    assert_eq!(latest.links(), &["/a", "/x", "/y"]);
}

#[tokio::test]
async fn test_threaded_crawl_isolates_failures() {
    let mock_server = MockServer::start().await;
    for i in 0..6 {
        let item = format!("/item{}", i);
        serve(&mock_server, &format!("/page{}", i), &[item.as_str()]).await;
    }
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let mut targets: Vec<Target> = (0..6)
        .map(|i| Target::new(&format!("{}/page{}", mock_server.uri(), i)).unwrap())
        .collect();
    targets.insert(3, Target::new(&format!("{}/broken", mock_server.uri())).unwrap());

    let store = Arc::new(SqliteSnapshotStore::new_in_memory().unwrap());
    let settings = CrawlerSettings {
        mode: ExecutionMode::Threaded,
        max_workers: 3,
        ..CrawlerSettings::once()
    };

    let report = crawl_once(Arc::clone(&store), settings, targets.clone()).await;

    assert_eq!(report.rounds, 1);
    assert_eq!(report.snapshots_stored, 6);
    assert_eq!(report.fetch_failures, 1);
    for target in targets.iter().filter(|t| !t.resource_id().ends_with("/broken")) {
        assert_eq!(store.count(target.resource_id(), None).unwrap(), 1);
    }
    assert_eq!(
        store
            .count(&format!("{}/broken", mock_server.uri()), None)
            .unwrap(),
        0
    );
}
