//! Page crawler tests against a mock listing

use crate::common::{empty_page, fetcher, listing_page, test_config, Item, LISTING_PATH};
use kobo_harvest::crawler::{Coordinator, CrawlOutcome};
use kobo_harvest::{Classifier, Period};
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn period() -> Period {
    Period::new(2025, 7).unwrap()
}

/// Three volumes and one cheap single chapter per page
fn page_items(page: u32) -> Vec<Item> {
    let date: &'static str = match page {
        1 => "2025/07/01",
        2 => "2025/07/08",
        3 => "2025/07/15",
        _ => "2025/07/22",
    };
    vec![
        Item::new(date, format!("作品{}A 1巻", page), "660円"),
        Item::new(date, format!("作品{}B 3巻", page), "715円"),
        Item::new(date, format!("作品{}C 第5話", page), "110円"),
        Item::new(date, format!("作品{}D 完全版", page), "1,980円"),
    ]
}

/// Serves pages 1..=last_page and an empty listing beyond
async fn mount_listing(server: &MockServer, last_page: u32) {
    for page in 1..=last_page {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("p", page.to_string()))
            .and(query_param("tid", "2025-07-01"))
            .and(query_param("s", "14"))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&page_items(page))))
            .mount(server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(empty_page()))
        .with_priority(10)
        .mount(server)
        .await;
}

async fn crawl(server: &MockServer, concurrency: u32, retries: Option<u32>) -> CrawlOutcome {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(&server.uri(), temp.path());
    config.crawler.max_concurrency = concurrency;
    config.crawler.max_page_retries = retries;

    let classifier = Arc::new(Classifier::new(&config.classifier).unwrap());
    let coordinator = Coordinator::new(fetcher(), classifier, config.crawler).unwrap();
    coordinator.crawl(period(), CancellationToken::new()).await
}

fn titles(outcome: &CrawlOutcome) -> BTreeSet<String> {
    outcome.records.iter().map(|r| r.title.clone()).collect()
}

fn expected_titles(pages: &[u32]) -> BTreeSet<String> {
    pages
        .iter()
        .flat_map(|&p| page_items(p))
        .filter(|item| !item.title.contains("第5話"))
        .map(|item| item.title)
        .collect()
}

#[tokio::test]
async fn test_crawl_stops_at_first_empty_page_single_worker() {
    let server = MockServer::start().await;
    mount_listing(&server, 4).await;

    let outcome = crawl(&server, 1, None).await;

    assert_eq!(titles(&outcome), expected_titles(&[1, 2, 3, 4]));
    assert_eq!(outcome.records.len(), 12);
    assert_eq!(outcome.summary.loaded, 16);
    assert_eq!(outcome.summary.skipped, 4);
    assert_eq!(outcome.summary.kept, 12);
    assert_eq!(outcome.summary.pages_fetched, 5);
    assert!(!outcome.summary.cancelled);

    // nothing past the first empty page
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 5);
}

#[tokio::test]
async fn test_crawl_stops_at_first_empty_page_four_workers() {
    let server = MockServer::start().await;
    mount_listing(&server, 4).await;

    let outcome = crawl(&server, 4, None).await;

    assert_eq!(titles(&outcome), expected_titles(&[1, 2, 3, 4]));
    assert_eq!(outcome.records.len(), 12);
    assert_eq!(outcome.summary.loaded, 16);
    assert_eq!(outcome.summary.skipped, 4);

    // at most one empty page per worker
    let requests = server.received_requests().await.unwrap();
    assert!(requests.len() >= 5 && requests.len() <= 8, "{} requests", requests.len());
}

#[tokio::test]
async fn test_records_are_normalized() {
    let server = MockServer::start().await;
    mount_listing(&server, 1).await;

    let outcome = crawl(&server, 1, None).await;
    let record = outcome
        .records
        .iter()
        .find(|r| r.title == "作品1A 1巻")
        .unwrap();

    assert_eq!(record.release_date, "2025/07/01");
    assert_eq!(record.author, "著者");
    assert_eq!(record.price, "660円");
    assert_eq!(record.source_link, format!("{}/rk/20250701-0/", server.uri()));
    assert!(!record.reserved);
    assert!(record.cover.is_none());
}

#[tokio::test]
async fn test_transient_page_failure_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_listing(&server, 3).await;

    let outcome = crawl(&server, 1, Some(3)).await;

    assert_eq!(titles(&outcome), expected_titles(&[1, 2, 3]));
}

#[tokio::test]
async fn test_exhausted_page_yields_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(LISTING_PATH))
        .and(query_param("p", "2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    mount_listing(&server, 3).await;

    let outcome = crawl(&server, 1, Some(2)).await;

    assert_eq!(titles(&outcome), expected_titles(&[1, 3]));
    let page_two = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.query().unwrap_or_default().contains("p=2"))
        .count();
    assert_eq!(page_two, 2);
}

#[tokio::test]
async fn test_duplicate_items_across_pages_are_kept_once() {
    let server = MockServer::start().await;
    let item = || Item::new("2025/07/01", "作品 1巻", "660円");
    for page in ["1", "2"] {
        Mock::given(method("GET"))
            .and(path(LISTING_PATH))
            .and(query_param("p", page))
            .respond_with(ResponseTemplate::new(200).set_body_string(listing_page(&[item()])))
            .mount(&server)
            .await;
    }
    mount_listing(&server, 0).await;

    let outcome = crawl(&server, 2, None).await;

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(outcome.summary.loaded, 2);
    assert_eq!(outcome.summary.skipped, 0);
}

#[tokio::test]
async fn test_cancelled_crawl_fetches_nothing() {
    let server = MockServer::start().await;
    mount_listing(&server, 4).await;

    let temp = TempDir::new().unwrap();
    let config = test_config(&server.uri(), temp.path());
    let classifier = Arc::new(Classifier::new(&config.classifier).unwrap());
    let coordinator = Coordinator::new(fetcher(), classifier, config.crawler).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = coordinator.crawl(period(), cancel).await;

    assert!(outcome.records.is_empty());
    assert!(outcome.summary.cancelled);
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unreachable_listing_yields_empty_crawl() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let temp = TempDir::new().unwrap();
    let mut config = test_config(&uri, temp.path());
    config.crawler.max_pages = 3;
    config.crawler.max_page_retries = Some(1);
    let classifier = Arc::new(Classifier::new(&config.classifier).unwrap());
    let coordinator = Coordinator::new(fetcher(), classifier, config.crawler).unwrap();

    let outcome = coordinator.crawl(period(), CancellationToken::new()).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.summary.pages_fetched, 0);
}
