//! Integration tests for the crawler
//!
//! These tests use wiremock to serve manifests and well-known documents
//! and drive the fetcher, validator, and coordinator end-to-end against a
//! temporary SQLite registry.

use fundwatch::config::{
    Config, CrawlConfig, DatabaseConfig, LifecycleConfig, SchemaConfig, UserAgentConfig,
};
use fundwatch::crawler::{build_http_client, Coordinator, FetchError, FetchOptions, Fetcher, StopSignal};
use fundwatch::output::{MemoryIndex, NullIndex, SearchIndex};
use fundwatch::schema::{LookupTables, ValidationErrorKind};
use fundwatch::storage::{SqliteStorage, Storage};
use fundwatch::{FundwatchError, Manifest, ManifestStatus};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WELL_KNOWN: &str = "/.well-known/funding-manifest-urls";

/// Creates a test configuration backed by a database in `dir`
fn create_test_config(dir: &TempDir) -> Config {
    Config {
        crawl: CrawlConfig {
            workers: 4,
            batch_size: 10,
            max_host_conns: 2,
            request_timeout_ms: 2000,
            attempts: 1,
            retry_backoff_ms: 10,
            max_bytes: 64 * 1024,
            recrawl_age_secs: 0,
            interval_secs: 60,
            claim_lease_secs: 900,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        schema: SchemaConfig::default(),
        lifecycle: LifecycleConfig::default(),
        database: DatabaseConfig {
            path: dir.path().join("registry.db").display().to_string(),
        },
    }
}

fn test_tables() -> LookupTables {
    let mut tables = LookupTables::default();
    tables.licenses.insert("MIT".into(), "MIT License".into());
    tables.languages.insert("rust".into(), "Rust".into());
    tables.currencies.insert("USD".into(), "US Dollar".into());
    tables
}

fn fetcher(options: FetchOptions, timeout: Duration) -> Fetcher {
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    let client = build_http_client(&user_agent, timeout).unwrap();
    Fetcher::new(client, options, StopSignal::new())
}

fn quick_options(attempts: u32) -> FetchOptions {
    FetchOptions {
        max_host_conns: 2,
        attempts,
        retry_backoff: Duration::from_millis(10),
        max_bytes: 64 * 1024,
    }
}

/// A valid manifest whose references all live on `base`
fn manifest_document(base: &str) -> Value {
    json!({
        "version": "v1.0.0",
        "entity": {
            "type": "individual",
            "role": "owner",
            "name": "Jane Doe",
            "email": "jane@example.com",
            "webpageUrl": { "url": format!("{}/", base) }
        },
        "projects": [{
            "name": "Widget",
            "description": "A widget toolkit",
            "webpageUrl": { "url": format!("{}/widget", base) },
            "repositoryUrl": { "url": format!("{}/git/widget", base) },
            "license": "spdx:MIT",
            "frameworks": ["lang:rust"],
            "tags": ["ui"]
        }],
        "funding": {
            "channels": [{ "id": "bank-1", "type": "bank" }],
            "plans": [{
                "id": "supporter",
                "status": "active",
                "name": "Supporter",
                "amount": 10,
                "currency": "USD",
                "frequency": "monthly",
                "channels": ["bank-1"]
            }]
        }
    })
}

async fn serve_manifest(server: &MockServer, document: &Value) {
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(document.to_string()))
        .mount(server)
        .await;
}

/// Stores a manifest for `server` with the given status
fn seed(config: &Config, server: &MockServer, status: ManifestStatus) -> (SqliteStorage, i64) {
    let url = format!("{}/funding.json", server.uri());
    let document = manifest_document(&server.uri());
    let manifest = Manifest::parse(&url, document.to_string().as_bytes()).unwrap();

    let mut storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let id = storage.upsert_manifest(&manifest, status).unwrap().id;
    (storage, id)
}

#[tokio::test]
async fn test_server_error_is_retried_until_attempts_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let fetcher = fetcher(quick_options(3), Duration::from_secs(2));
    let url = url::Url::parse(&format!("{}/funding.json", server.uri())).unwrap();

    let result = fetcher.fetch(&url).await;
    assert_eq!(result, Err(FetchError::BadStatus(503)));
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(quick_options(3), Duration::from_secs(2));
    let url = url::Url::parse(&format!("{}/funding.json", server.uri())).unwrap();

    assert_eq!(fetcher.fetch(&url).await, Err(FetchError::BadStatus(404)));
}

#[tokio::test]
async fn test_transient_failure_then_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let fetcher = fetcher(quick_options(3), Duration::from_secs(2));
    let url = url::Url::parse(&format!("{}/funding.json", server.uri())).unwrap();

    assert_eq!(fetcher.fetch(&url).await.unwrap(), b"{}".to_vec());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher(quick_options(1), Duration::from_millis(200));
    let url = url::Url::parse(&format!("{}/funding.json", server.uri())).unwrap();

    assert_eq!(fetcher.fetch(&url).await, Err(FetchError::Timeout));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .expect(1)
        .mount(&server)
        .await;

    let mut options = quick_options(3);
    options.max_bytes = 1024;
    let fetcher = fetcher(options, Duration::from_secs(2));
    let url = url::Url::parse(&format!("{}/funding.json", server.uri())).unwrap();

    assert_eq!(
        fetcher.fetch(&url).await,
        Err(FetchError::TooLarge { limit: 1024 })
    );
}

#[tokio::test]
async fn test_requests_per_host_are_capped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let fetcher = Arc::new(fetcher(quick_options(1), Duration::from_secs(5)));
    let started = Instant::now();

    let mut tasks = Vec::new();
    for n in 0..6 {
        let fetcher = fetcher.clone();
        let url = url::Url::parse(&format!("{}/m{}.json", server.uri(), n)).unwrap();
        tasks.push(tokio::spawn(async move { fetcher.fetch(&url).await }));
    }
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    // Two at a time means three waves of 300ms
    assert!(started.elapsed() >= Duration::from_millis(900));
    assert_eq!(fetcher.limiter().available("127.0.0.1"), 2);
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old/funding.json"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/funding.json"))
        .expect(1)
        .mount(&server)
        .await;
    serve_manifest(&server, &json!({ "version": "v1.0.0" })).await;

    let fetcher = fetcher(quick_options(1), Duration::from_secs(5));
    let url = url::Url::parse(&format!("{}/old/funding.json", server.uri())).unwrap();
    let body = fetcher.fetch(&url).await.unwrap();
    assert!(String::from_utf8(body).unwrap().contains("v1.0.0"));
}

#[tokio::test]
async fn test_redirect_loop_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop.json"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop.json"))
        .expect(fundwatch::crawler::MAX_REDIRECTS as u64 + 1)
        .mount(&server)
        .await;

    let fetcher = fetcher(quick_options(1), Duration::from_secs(5));
    let url = url::Url::parse(&format!("{}/loop.json", server.uri())).unwrap();
    assert!(matches!(
        fetcher.fetch(&url).await,
        Err(FetchError::Request(_))
    ));
}

#[tokio::test]
async fn test_redirect_target_host_is_capped() {
    let server = MockServer::start().await;
    let port = server.address().port();
    Mock::given(method("GET"))
        .and(path("/hop.json"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("http://127.0.0.1:{}/slow.json", port).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/slow.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("{}")
                .set_delay(Duration::from_millis(400)),
        )
        .expect(2)
        .mount(&server)
        .await;

    let mut options = quick_options(1);
    options.max_host_conns = 1;
    let fetcher = Arc::new(fetcher(options, Duration::from_secs(5)));
    let started = Instant::now();

    // Same listener under two host names: only the hop lands on 127.0.0.1
    let redirected = url::Url::parse(&format!("http://localhost:{}/hop.json", port)).unwrap();
    let direct = url::Url::parse(&format!("http://127.0.0.1:{}/slow.json", port)).unwrap();

    let tasks: Vec<_> = [redirected, direct]
        .into_iter()
        .map(|url| {
            let fetcher = fetcher.clone();
            tokio::spawn(async move { fetcher.fetch(&url).await })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    assert!(started.elapsed() >= Duration::from_millis(800));
    assert_eq!(fetcher.limiter().available("127.0.0.1"), 1);
    assert_eq!(fetcher.limiter().available("localhost"), 1);
}

#[tokio::test]
async fn test_submit_registers_pending_then_cycle_activates() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let server = MockServer::start().await;
    serve_manifest(&server, &manifest_document(&server.uri())).await;

    let index = Arc::new(MemoryIndex::new());
    let storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let coordinator = Coordinator::new(&config, storage, test_tables(), index.clone()).unwrap();

    let url = format!("{}/funding.json", server.uri());
    let record = coordinator.submit(&url).await.unwrap();
    assert_eq!(record.status, ManifestStatus::Pending);
    assert_eq!(record.url, url);
    assert!(index.submitted().is_empty());

    let stats = coordinator.run_cycle().await.unwrap();
    assert_eq!(stats.claimed, 1);
    assert_eq!(stats.succeeded, 1);

    let storage = coordinator.storage();
    let stored = storage.lock().unwrap().get_manifest(record.id).unwrap();
    assert_eq!(stored.status, ManifestStatus::Active);
    assert_eq!(stored.guid, record.guid);
    assert!(stored.crawled_at.is_some());
    assert_eq!(index.submitted(), vec![url]);
}

#[tokio::test]
async fn test_submit_rejects_invalid_manifest() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let server = MockServer::start().await;

    let mut document = manifest_document(&server.uri());
    document["funding"]["plans"][0]["channels"] = json!(["missing"]);
    serve_manifest(&server, &document).await;

    let storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();

    let url = format!("{}/funding.json", server.uri());
    match coordinator.submit(&url).await {
        Err(FundwatchError::Invalid { source, .. }) => {
            assert_eq!(source.path, "plans[0].channels");
            assert!(matches!(
                source.kind,
                ValidationErrorKind::CrossReferenceMissing { ref id } if id == "missing"
            ));
        }
        other => panic!("expected invalid manifest, got {:?}", other.map(|r| r.url)),
    }

    let storage = coordinator.storage();
    assert!(storage.lock().unwrap().get_manifest_by_url(&url).unwrap().is_none());
}

#[tokio::test]
async fn test_cross_origin_reference_with_attestation_is_accepted() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let home = MockServer::start().await;
    let forge = MockServer::start().await;
    let url = format!("{}/funding.json", home.uri());

    let mut document = manifest_document(&home.uri());
    document["projects"][0]["repositoryUrl"] =
        json!({ "url": format!("{}/team/widget", forge.uri()), "wellKnown": true });
    serve_manifest(&home, &document).await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "# funding manifests for this forge\n\n{}\nhttps://other.example.org/funding.json\n",
            url
        )))
        .expect(1)
        .mount(&forge)
        .await;

    let storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();

    let record = coordinator.submit(&url).await.unwrap();
    assert_eq!(record.status, ManifestStatus::Pending);
}

#[tokio::test]
async fn test_cross_origin_reference_without_listing_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let home = MockServer::start().await;
    let forge = MockServer::start().await;
    let url = format!("{}/funding.json", home.uri());

    let mut document = manifest_document(&home.uri());
    document["projects"][0]["repositoryUrl"] =
        json!({ "url": format!("{}/team/widget", forge.uri()), "wellKnown": true });
    serve_manifest(&home, &document).await;

    Mock::given(method("GET"))
        .and(path(WELL_KNOWN))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("https://other.example.org/funding.json\n"),
        )
        .mount(&forge)
        .await;

    let storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();

    match coordinator.submit(&url).await {
        Err(FundwatchError::Invalid { source, .. }) => {
            assert_eq!(source.path, "projects[0].repositoryUrl");
            assert!(matches!(
                source.kind,
                ValidationErrorKind::OwnershipUnverified { .. }
            ));
        }
        other => panic!("expected ownership rejection, got {:?}", other.map(|r| r.url)),
    }
}

#[tokio::test]
async fn test_oversized_manifest_counts_as_failure_without_status_change() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawl.max_bytes = 1024;

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(8192)))
        .mount(&server)
        .await;

    let (storage, id) = seed(&config, &server, ManifestStatus::Active);
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();

    let stats = coordinator.run_cycle().await.unwrap();
    assert_eq!(stats.fetch_failed, 1);
    assert_eq!(stats.newly_expiring, 0);

    let storage = coordinator.storage();
    let record = storage.lock().unwrap().get_manifest(id).unwrap();
    assert_eq!(record.status, ManifestStatus::Active);
    assert_eq!(record.crawl_errors, 1);
    assert!(record.crawl_message.unwrap().contains("1024"));
}

#[tokio::test]
async fn test_failing_manifest_expires_and_recovers() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/funding.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let (storage, id) = seed(&config, &server, ManifestStatus::Active);
    let index = Arc::new(MemoryIndex::new());
    let coordinator = Coordinator::new(&config, storage, test_tables(), index.clone()).unwrap();

    let mut expiring = 0;
    for _ in 0..3 {
        let stats = coordinator.run_cycle().await.unwrap();
        assert_eq!(stats.claimed, 1);
        assert_eq!(stats.fetch_failed, 1);
        expiring += stats.newly_expiring;
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(expiring, 1);

    {
        let storage = coordinator.storage();
        let record = storage.lock().unwrap().get_manifest(id).unwrap();
        assert_eq!(record.status, ManifestStatus::Expiring);
        assert_eq!(record.crawl_errors, 3);
    }

    server.reset().await;
    serve_manifest(&server, &manifest_document(&server.uri())).await;

    for _ in 0..3 {
        let stats = coordinator.run_cycle().await.unwrap();
        assert_eq!(stats.succeeded, 1);

        let storage = coordinator.storage();
        let record = storage.lock().unwrap().get_manifest(id).unwrap();
        assert_eq!(record.status, ManifestStatus::Active);
        assert_eq!(record.crawl_errors, 0);
        assert!(record.crawl_message.is_none());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(index.submitted().len(), 3);
}

#[tokio::test]
async fn test_recently_crawled_manifest_is_not_claimed_again() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawl.recrawl_age_secs = 3600;

    let server = MockServer::start().await;
    serve_manifest(&server, &manifest_document(&server.uri())).await;

    let (storage, _) = seed(&config, &server, ManifestStatus::Active);
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();

    assert_eq!(coordinator.run_cycle().await.unwrap().claimed, 1);
    assert_eq!(coordinator.run_cycle().await.unwrap().claimed, 0);
}

#[tokio::test]
async fn test_cancelled_claims_are_crawled_next_cycle() {
    let dir = TempDir::new().unwrap();
    let mut config = create_test_config(&dir);
    config.crawl.workers = 1;
    config.crawl.recrawl_age_secs = 3600;

    let server = MockServer::start().await;
    let document = manifest_document(&server.uri());
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(document.to_string())
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let mut storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    for name in ["a", "b", "c"] {
        let url = format!("{}/{}/funding.json", server.uri(), name);
        let manifest = Manifest::parse(&url, document.to_string().as_bytes()).unwrap();
        storage
            .upsert_manifest(&manifest, ManifestStatus::Active)
            .unwrap();
    }

    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();
    let stop = coordinator.stop_signal();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.stop();
    });

    let stats = coordinator.run_cycle().await.unwrap();
    assert_eq!(stats.claimed, 3);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.cancelled, 2);
    drop(coordinator);

    let storage = SqliteStorage::new(Path::new(&config.database.path)).unwrap();
    let coordinator =
        Coordinator::new(&config, storage, test_tables(), Arc::new(NullIndex)).unwrap();
    let stats = coordinator.run_cycle().await.unwrap();
    assert_eq!(stats.claimed, 2);
    assert_eq!(stats.succeeded, 2);
}

#[test]
fn test_concurrent_claims_are_disjoint() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let db_path = PathBuf::from(&config.database.path);

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        for n in 0..40 {
            let url = format!("https://host{}.example.com/funding.json", n);
            let body = manifest_document(&format!("https://host{}.example.com", n)).to_string();
            let manifest = Manifest::parse(&url, body.as_bytes()).unwrap();
            storage
                .upsert_manifest(&manifest, ManifestStatus::Active)
                .unwrap();
        }
    }

    let claimers: Vec<_> = (0..2)
        .map(|_| {
            let db_path = db_path.clone();
            std::thread::spawn(move || {
                let mut storage = SqliteStorage::new(&db_path).unwrap();
                let mut ids = Vec::new();
                loop {
                    let jobs = storage
                        .get_for_crawling(0, Duration::from_secs(3600), 5)
                        .unwrap();
                    if jobs.is_empty() {
                        break;
                    }
                    ids.extend(jobs.iter().map(|job| job.id));
                }
                ids
            })
        })
        .collect();

    let mut all: Vec<i64> = claimers
        .into_iter()
        .flat_map(|claimer| claimer.join().unwrap())
        .collect();
    let claimed = all.len();
    all.sort_unstable();
    all.dedup();

    assert_eq!(claimed, 40);
    assert_eq!(all.len(), 40);
}

#[test]
fn test_install_is_repeatable() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir);
    let db_path = PathBuf::from(&config.database.path);

    for _ in 0..2 {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage
            .record_migration_version(fundwatch::storage::get_schema_version())
            .unwrap();
        NullIndex.init_schema().unwrap();
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(
        storage.get_migration_versions().unwrap(),
        vec![fundwatch::storage::get_schema_version().to_string()]
    );
}
