//! Cover acquisition tests against a mock image host

use crate::common::{fetcher, image_config, png_bytes};
use kobo_harvest::images::{codec, ImageAcquirer, ProgressCounters};
use kobo_harvest::{CoverImage, ImageValidator, Record, RecordHandle};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record(image_link: String) -> RecordHandle {
    RecordHandle::new(Record {
        title: "作品 1巻".to_string(),
        release_date: "2025/07/01".to_string(),
        image_link,
        ..Record::default()
    })
}

async fn acquire(acquirer: &ImageAcquirer, records: &[RecordHandle]) -> Arc<ProgressCounters> {
    let counters = Arc::new(ProgressCounters::new(records.len()));
    acquirer
        .acquire_images(records.to_vec(), CancellationToken::new(), Arc::clone(&counters))
        .await;
    counters
}

#[tokio::test]
async fn test_download_resizes_and_captures_validator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/covers/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(png_bytes(1000, 1400))
                .insert_header("content-type", "image/png")
                .insert_header("etag", "\"v1\"")
                .insert_header("last-modified", "Tue, 01 Jul 2025 00:00:00 GMT"),
        )
        .mount(&server)
        .await;

    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    let handle = record(format!("{}/covers/a.png", server.uri()));
    let counters = acquire(&acquirer, &[handle.clone()]).await;

    let record = handle.snapshot();
    let mut cover = record.cover.expect("cover stored");
    assert!(cover.encoded().unwrap().starts_with(codec::DATA_URI_PREFIX));
    assert_eq!(cover.dimensions().unwrap(), (500, 700));

    // the stored portable form decodes to the same dimensions
    let mut reloaded = CoverImage::from_encoded(cover.encoded().unwrap().to_string());
    assert_eq!(reloaded.dimensions().unwrap(), (500, 700));

    assert_eq!(record.image_validator.etag.as_deref(), Some("\"v1\""));
    assert_eq!(
        record.image_validator.last_modified.as_deref(),
        Some("Tue, 01 Jul 2025 00:00:00 GMT")
    );

    let progress = counters.snapshot();
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.percent, 100);
    assert_eq!(progress.images_loaded, 1);
}

#[tokio::test]
async fn test_not_modified_leaves_cover_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/covers/a.png"))
        .and(header("if-none-match", "\"v1\""))
        .respond_with(ResponseTemplate::new(304))
        .expect(1)
        .mount(&server)
        .await;

    let encoded = codec::encode(
        &codec::decode(&png_bytes(20, 28)).unwrap(),
        codec::DEFAULT_JPEG_QUALITY,
    )
    .unwrap();
    let handle = record(format!("{}/covers/a.png", server.uri()));
    {
        let mut r = handle.lock();
        r.cover = Some(CoverImage::from_encoded(encoded.clone()));
        r.image_validator = ImageValidator {
            etag: Some("\"v1\"".to_string()),
            last_modified: None,
        };
    }
    let before = serde_json::to_string(&handle.snapshot()).unwrap();

    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    let counters = acquire(&acquirer, &[handle.clone()]).await;

    let record = handle.snapshot();
    assert_eq!(record.cover.as_ref().and_then(|c| c.encoded()), Some(encoded.as_str()));
    assert_eq!(serde_json::to_string(&record).unwrap(), before);
    assert_eq!(counters.snapshot().completed, 1);
    assert_eq!(counters.snapshot().images_loaded, 0);
}

#[tokio::test]
async fn test_validator_not_sent_without_cover() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("if-none-match", "\"stale\""))
        .respond_with(ResponseTemplate::new(304))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(40, 60)))
        .mount(&server)
        .await;

    let handle = record(format!("{}/covers/b.png", server.uri()));
    handle.lock().image_validator.etag = Some("\"stale\"".to_string());

    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    acquire(&acquirer, &[handle.clone()]).await;

    let mut record = handle.snapshot();
    assert_eq!(record.cover.as_mut().unwrap().dimensions().unwrap(), (20, 30));
    assert!(record.image_validator.etag.is_none());
}

#[tokio::test]
async fn test_undecodable_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>sorry</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let handle = record(format!("{}/covers/c.jpg", server.uri()));
    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    let counters = acquire(&acquirer, &[handle.clone()]).await;

    assert!(handle.snapshot().cover.is_none());
    assert!(handle.snapshot().image_validator.is_empty());
    assert_eq!(counters.snapshot().completed, 1);
}

#[tokio::test]
async fn test_failures_exhaust_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let handle = record(format!("{}/covers/d.jpg", server.uri()));
    let acquirer = ImageAcquirer::new(fetcher(), image_config(3));
    let counters = acquire(&acquirer, &[handle.clone()]).await;

    assert!(handle.snapshot().cover.is_none());
    let progress = counters.snapshot();
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.images_loaded, 0);
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(10, 10)))
        .mount(&server)
        .await;

    let handle = record(format!("{}/covers/e.png", server.uri()));
    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    let counters = acquire(&acquirer, &[handle.clone()]).await;

    assert!(handle.snapshot().cover.is_some());
    assert_eq!(counters.snapshot().images_loaded, 1);
}

#[tokio::test]
async fn test_empty_image_link_completes_without_request() {
    let server = MockServer::start().await;

    let handles = vec![record(String::new()), record(String::new())];
    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));
    let counters = acquire(&acquirer, &handles).await;

    let progress = counters.snapshot();
    assert_eq!(progress.completed, 2);
    assert_eq!(progress.percent, 100);
    assert!(handles.iter().all(|h| h.snapshot().cover.is_none()));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancelled_session_fetches_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png_bytes(10, 10)))
        .mount(&server)
        .await;

    let handles: Vec<_> = (0..5)
        .map(|i| record(format!("{}/covers/{}.png", server.uri(), i)))
        .collect();
    let acquirer = ImageAcquirer::new(fetcher(), image_config(4));

    let cancel = CancellationToken::new();
    cancel.cancel();
    let mut session = acquirer.start_with_cancel(handles.clone(), cancel);
    session.wait().await;

    let progress = session.progress();
    assert_eq!(progress.completed, 0);
    assert_eq!(progress.total, 5);
    assert!(!progress.in_progress);
    assert!(session.is_cancelled());
    assert!(server.received_requests().await.unwrap().is_empty());
    assert!(handles.iter().all(|h| h.snapshot().cover.is_none()));
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let handles: Vec<_> = (0..3)
        .map(|i| record(format!("{}/covers/{}.png", server.uri(), i)))
        .collect();
    let mut config = image_config(10);
    config.max_concurrency = 1;
    config.retry_base_delay_ms = 60_000;
    let acquirer = ImageAcquirer::new(fetcher(), config);

    let mut session = acquirer.start(handles);
    while server.received_requests().await.unwrap().is_empty() {
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    tokio::time::timeout(std::time::Duration::from_secs(5), session.cancel_and_wait())
        .await
        .expect("session stops promptly");

    // the first record was abandoned in its backoff; no other record started
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    assert!(!session.is_running());
    assert_eq!(session.progress().images_loaded, 0);
}
