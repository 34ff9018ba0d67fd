//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end against an on-disk database.

use crawl_graph::config::Config;
use crawl_graph::crawler::{run_job, CancelSignal, ProgressSnapshot};
use crawl_graph::storage::{SqliteStorage, TransactionalStorage};
use crawl_graph::{CrawlError, CrawlService, JobStatus};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration writing to `db_path` with no crawl delay
fn create_test_config(db_path: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.default_crawl_delay_ms = 0;
    config.crawler.fetch_timeout_ms = 2000;
    config.user_agent.crawler_name = "TestBot".to_string();
    config.storage.database_path = db_path.to_string_lossy().into_owned();
    config
}

fn setup() -> (TempDir, Config) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = create_test_config(&temp_dir.path().join("crawl.db"));
    (temp_dir, config)
}

fn open(config: &Config) -> SqliteStorage {
    SqliteStorage::new(Path::new(&config.storage.database_path)).expect("Failed to open database")
}

/// Mounts an HTML page at `route`
async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

async fn mount_sitemap(server: &MockServer, urls: &[String]) {
    let entries: String = urls
        .iter()
        .map(|u| format!("<url><loc>{}</loc></url>", u))
        .collect();
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
                    entries
                ))
                .insert_header("content-type", "application/xml"),
        )
        .mount(server)
        .await;
}

/// Creates a job and runs it to completion on the current task
async fn crawl(config: &Config, job_id: &str, seed: &str) -> Result<JobStatus, CrawlError> {
    open(config)
        .autocommit()
        .create_job(job_id, seed)
        .expect("Failed to create job");
    run_job(Arc::new(config.clone()), job_id, CancelSignal::new(), None).await
}

/// Polls until `check` holds or the deadline passes
async fn wait_until<F: Fn() -> bool>(check: F) {
    for _ in 0..250 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Condition not reached in time");
}

#[tokio::test]
async fn test_sitemap_seeded_crawl_builds_graph() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_sitemap(&server, &[format!("{}/", base), format!("{}/a", base)]).await;
    mount_page(
        &server,
        "/",
        format!(
            r#"<html><body><a href="/a">A</a><a href="https://other.com/x">X</a></body></html>"#
        ),
    )
    .await;
    mount_page(&server, "/a", "<html><body>No links</body></html>".to_string()).await;

    let status = crawl(&config, "job-1", &base).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = open(&config);
    let store = storage.autocommit();
    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.finished_at.is_some());
    assert_eq!(job.total_urls, 3);
    assert_eq!(job.processed_urls, 2);

    let home = store.get_node("job-1", &base).unwrap().unwrap();
    let page_a = store
        .get_node("job-1", &format!("{}/a", base))
        .unwrap()
        .unwrap();
    let external = store
        .get_node("job-1", "https://other.com/x")
        .unwrap()
        .unwrap();

    assert!(!home.is_external);
    assert_eq!(home.status_code, Some(200));
    assert_eq!(page_a.status_code, Some(200));
    assert!(external.is_external);
    assert_eq!(external.status_code, None);

    assert_eq!(store.count_nodes("job-1").unwrap(), 3);
    assert_eq!(store.count_edges("job-1").unwrap(), 2);
    let targets: Vec<i64> = store
        .edges_from("job-1", home.id)
        .unwrap()
        .iter()
        .map(|e| e.target_id)
        .collect();
    assert!(targets.contains(&page_a.id));
    assert!(targets.contains(&external.id));
}

#[tokio::test]
async fn test_crawl_without_sitemap_visits_seed() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(
        &server,
        "/",
        r#"<a href="/about">About</a><a href="mailto:hi@example.com">Mail</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/about", r#"<a href="/">Home</a>"#.to_string()).await;

    let status = crawl(&config, "job-1", &base).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = open(&config);
    let store = storage.autocommit();
    let home = store.get_node("job-1", &base).unwrap().unwrap();
    let about = store
        .get_node("job-1", &format!("{}/about", base))
        .unwrap()
        .unwrap();
    assert_eq!(home.status_code, Some(200));
    assert_eq!(about.status_code, Some(200));

    // home -> about and about -> home; the mailto link is dropped
    assert_eq!(store.count_nodes("job-1").unwrap(), 2);
    assert_eq!(store.count_edges("job-1").unwrap(), 2);

    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.processed_urls, 2);
    assert_eq!(job.total_urls, 2);
}

#[tokio::test]
async fn test_robots_disallowed_page_is_never_fetched() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private">Private</a><a href="/public">Public</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/public", "<p>ok</p>".to_string()).await;
    Mock::given(method("GET"))
        .and(path("/private"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/secret">s</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let status = crawl(&config, "job-1", &base).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = open(&config);
    let store = storage.autocommit();
    let private = store
        .get_node("job-1", &format!("{}/private", base))
        .unwrap()
        .expect("Disallowed page is still recorded as discovered");
    assert_eq!(private.status_code, None);
    assert!(store.edges_from("job-1", private.id).unwrap().is_empty());
    assert!(store
        .get_node("job-1", &format!("{}/secret", base))
        .unwrap()
        .is_none());
    assert_eq!(store.count_pending("job-1").unwrap(), 0);
}

#[tokio::test]
async fn test_fetch_timeout_does_not_fail_job() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, mut config) = setup();
    config.crawler.fetch_timeout_ms = 300;

    mount_page(&server, "/", r#"<a href="/slow">Slow</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<a href="/never">never</a>"#)
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let status = crawl(&config, "job-1", &base).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = open(&config);
    let store = storage.autocommit();
    let slow = store
        .get_node("job-1", &format!("{}/slow", base))
        .unwrap()
        .unwrap();
    assert_eq!(slow.status_code, None);
    assert!(store.edges_from("job-1", slow.id).unwrap().is_empty());

    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.processed_urls, 2);
    assert!(job.error_message.is_none());
}

#[tokio::test]
async fn test_invalid_seed_marks_job_failed() {
    let (_temp_dir, config) = setup();

    let result = crawl(&config, "job-1", "not a url").await;
    assert!(result.is_err());

    let storage = open(&config);
    let job = storage.autocommit().get_job("job-1").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error_message.is_some());
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_stop_aborts_running_job() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, mut config) = setup();
    // Long enough that the job is always sleeping when the stop arrives
    config.crawler.default_crawl_delay_ms = 10_000;

    mount_page(&server, "/", r#"<a href="/a">A</a>"#.to_string()).await;

    let service = CrawlService::new(config.clone()).unwrap();
    let job_id = service.submit(&base).unwrap();

    let observer = open(&config);
    wait_until(|| {
        observer
            .autocommit()
            .get_job(&job_id)
            .unwrap()
            .map_or(false, |job| job.status == JobStatus::Running)
    })
    .await;

    assert!(service.stop(&job_id).unwrap());
    let status = tokio::time::timeout(Duration::from_secs(5), service.wait(&job_id))
        .await
        .expect("Job did not stop in time")
        .unwrap();
    assert_eq!(status, JobStatus::Aborted);

    let job = observer.autocommit().get_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Aborted);
    assert!(job.cancel_requested);
    assert!(job.finished_at.is_some());

    // Stopping again does not reopen or change the job
    assert!(service.stop(&job_id).unwrap());
    let job = observer.autocommit().get_job(&job_id).unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Aborted);
}

/// Submits a job that sleeps a long crawl delay and returns once it is running
async fn submit_sleeping_job(server: &MockServer, config: &Config) -> (CrawlService, String) {
    mount_page(server, "/", r#"<a href="/a">A</a>"#.to_string()).await;

    let service = CrawlService::new(config.clone()).unwrap();
    let job_id = service.submit(&server.uri()).unwrap();

    let observer = open(config);
    wait_until(|| {
        observer
            .autocommit()
            .get_job(&job_id)
            .unwrap()
            .map_or(false, |job| job.status == JobStatus::Running)
    })
    .await;

    (service, job_id)
}

#[tokio::test]
async fn test_stop_while_waiting_cuts_crawl_delay_short() {
    let server = MockServer::start().await;
    let (_temp_dir, mut config) = setup();
    config.crawler.default_crawl_delay_ms = 10_000;

    let (service, job_id) = submit_sleeping_job(&server, &config).await;

    let waiting = service.wait(&job_id);
    tokio::pin!(waiting);
    assert!(
        tokio::time::timeout(Duration::from_millis(50), &mut waiting)
            .await
            .is_err(),
        "Job finished before it was stopped"
    );
    assert!(service.is_running(&job_id));

    assert!(service.stop(&job_id).unwrap());
    let status = tokio::time::timeout(Duration::from_secs(3), waiting)
        .await
        .expect("Stop did not interrupt the crawl delay")
        .unwrap();
    assert_eq!(status, JobStatus::Aborted);
    assert!(!service.is_running(&job_id));
}

#[tokio::test]
async fn test_abandoned_wait_keeps_job_stoppable() {
    let server = MockServer::start().await;
    let (_temp_dir, mut config) = setup();
    config.crawler.default_crawl_delay_ms = 10_000;

    let (service, job_id) = submit_sleeping_job(&server, &config).await;

    // The first wait gives up; the job must still be tracked
    assert!(
        tokio::time::timeout(Duration::from_millis(50), service.wait(&job_id))
            .await
            .is_err()
    );
    assert!(service.is_running(&job_id));

    assert!(service.stop(&job_id).unwrap());
    let status = tokio::time::timeout(Duration::from_secs(3), service.wait(&job_id))
        .await
        .expect("Stop did not interrupt the crawl delay")
        .unwrap();
    assert_eq!(status, JobStatus::Aborted);
}

#[tokio::test]
async fn test_undecodable_body_fails_job_mid_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/broken">Broken</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/a", r#"<a href="/after">After</a>"#.to_string()).await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-encoding", "gzip")
                .insert_header("content-type", "text/html")
                .set_body_bytes(b"this is not gzip data".to_vec()),
        )
        .mount(&server)
        .await;

    let result = crawl(&config, "job-1", &base).await;
    assert!(matches!(result, Err(CrawlError::Http { .. })));

    let storage = open(&config);
    let store = storage.autocommit();
    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.finished_at.is_some());
    assert!(job
        .error_message
        .as_deref()
        .map_or(false, |message| message.contains("/broken")));

    // Pages before the failure were committed; the failing one was not
    let broken = store
        .get_node("job-1", &format!("{}/broken", base))
        .unwrap()
        .unwrap();
    assert_eq!(broken.status_code, None);
    assert!(store.edges_from("job-1", broken.id).unwrap().is_empty());
    assert_eq!(job.processed_urls, 2);
    assert!(store.count_pending("job-1").unwrap() > 0);
}

#[tokio::test]
async fn test_storage_failure_rolls_back_page_writes() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/boom">Boom</a>"#.to_string(),
    )
    .await;

    // Schema first, then a trigger that rejects the second edge of the page
    drop(open(&config));
    let conn = rusqlite::Connection::open(&config.storage.database_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_boom_edge BEFORE INSERT ON url_edges
         WHEN NEW.target_id IN (SELECT id FROM url_nodes WHERE url LIKE '%/boom')
         BEGIN SELECT RAISE(ABORT, 'edge rejected'); END;",
    )
    .unwrap();
    drop(conn);

    let result = crawl(&config, "job-1", &base).await;
    assert!(matches!(result, Err(CrawlError::Storage(_))));

    let storage = open(&config);
    let store = storage.autocommit();
    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job
        .error_message
        .as_deref()
        .map_or(false, |message| message.contains("edge rejected")));
    assert_eq!(job.processed_urls, 0);

    // Nothing from the failed page survives: no new nodes, no edges, not visited
    assert_eq!(store.count_nodes("job-1").unwrap(), 1);
    assert_eq!(store.count_edges("job-1").unwrap(), 0);
    assert!(store
        .get_node("job-1", &format!("{}/a", base))
        .unwrap()
        .is_none());
    let home = store.get_node("job-1", &base).unwrap().unwrap();
    assert_eq!(home.status_code, None);
    assert_eq!(store.count_pending("job-1").unwrap(), 1);
}

#[tokio::test]
async fn test_durable_cancel_flag_is_observed() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, mut config) = setup();
    config.crawler.default_crawl_delay_ms = 200;

    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", links).await;
    for i in 0..10 {
        mount_page(&server, &format!("/p{}", i), "<p>leaf</p>".to_string()).await;
    }

    open(&config)
        .autocommit()
        .create_job("job-1", &base)
        .unwrap();
    let task = tokio::spawn(run_job(
        Arc::new(config.clone()),
        "job-1",
        CancelSignal::new(),
        None,
    ));

    // Another connection, as a separate process would use
    let other = open(&config);
    wait_until(|| {
        other
            .autocommit()
            .get_job("job-1")
            .unwrap()
            .map_or(false, |job| job.processed_urls >= 1)
    })
    .await;
    other.autocommit().request_cancel("job-1").unwrap();

    let status = task.await.unwrap().unwrap();
    assert_eq!(status, JobStatus::Aborted);

    let job = other.autocommit().get_job("job-1").unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Aborted);
    assert!(job.processed_urls < job.total_urls);
    assert!(other.autocommit().count_pending("job-1").unwrap() > 0);
}

#[tokio::test]
async fn test_resume_reprocessing_creates_no_duplicates() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(&server, "/", r#"<a href="/a">A</a>"#.to_string()).await;
    mount_page(&server, "/a", r#"<a href="/">Home</a>"#.to_string()).await;
    // A resumed job continues from its frontier and never re-seeds
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    // State left behind by an interrupted run: both pages known, the edge
    // home -> a already written, neither page closed
    let page_a = format!("{}/a", base);
    {
        let mut storage = open(&config);
        storage
            .unit_of_work(|store| {
                store.create_job("job-1", &base)?;
                store.transition_job("job-1", JobStatus::Running, None)?;
                store.seed(
                    "job-1",
                    &[
                        crawl_graph::storage::DiscoveredUrl::new(
                            base.clone(),
                            crawl_graph::LinkScope::Internal,
                        ),
                        crawl_graph::storage::DiscoveredUrl::new(
                            page_a.clone(),
                            crawl_graph::LinkScope::Internal,
                        ),
                    ],
                )?;
                let home = store.upsert_node("job-1", &base, false, None)?;
                let a = store.upsert_node("job-1", &page_a, false, None)?;
                store.upsert_edge("job-1", home, a, crawl_graph::storage::LinkType::Hyperlink)?;
                Ok(())
            })
            .unwrap();
    }

    let status = run_job(Arc::new(config.clone()), "job-1", CancelSignal::new(), None)
        .await
        .unwrap();
    assert_eq!(status, JobStatus::Completed);

    let storage = open(&config);
    let store = storage.autocommit();
    assert_eq!(store.count_nodes("job-1").unwrap(), 2);
    assert_eq!(store.count_edges("job-1").unwrap(), 2);
    let job = store.get_job("job-1").unwrap().unwrap();
    assert_eq!(job.processed_urls, 2);
    assert_eq!(job.total_urls, 2);
}

#[tokio::test]
async fn test_progress_snapshots_never_exceed_total() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a><a href="https://other.com/">O</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/a", r#"<a href="/c">C</a>"#.to_string()).await;
    mount_page(&server, "/b", "<p>b</p>".to_string()).await;
    mount_page(&server, "/c", "<p>c</p>".to_string()).await;

    let snapshots: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&snapshots);

    open(&config)
        .autocommit()
        .create_job("job-1", &base)
        .unwrap();
    let status = run_job(
        Arc::new(config.clone()),
        "job-1",
        CancelSignal::new(),
        Some(Arc::new(move |snapshot: &ProgressSnapshot| {
            sink.lock().unwrap().push(snapshot.clone());
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, JobStatus::Completed);

    let snapshots = snapshots.lock().unwrap();
    assert_eq!(snapshots.len(), 4);
    for (i, snapshot) in snapshots.iter().enumerate() {
        assert_eq!(snapshot.processed, i as u64 + 1);
        assert!(snapshot.processed <= snapshot.total);
        assert!(snapshot.percent <= 100.0);
    }
    assert_eq!(snapshots[0].current_url, base);
    // home, a, b, c and the external link
    assert_eq!(snapshots[3].total, 5);
}

#[tokio::test]
async fn test_service_graph_export() {
    let server = MockServer::start().await;
    let base = server.uri();
    let (_temp_dir, config) = setup();

    mount_page(
        &server,
        "/",
        r#"<a href="/a">A</a><a href="https://other.com/x">X</a>"#.to_string(),
    )
    .await;
    mount_page(&server, "/a", "<p>a</p>".to_string()).await;

    let service = CrawlService::new(config).unwrap();
    let job_id = service.submit_with_id("graph-job", &base).unwrap();
    assert_eq!(job_id, "graph-job");
    assert!(matches!(
        service.submit_with_id("graph-job", &base),
        Err(CrawlError::JobExists(_))
    ));

    let status = service.wait(&job_id).await.unwrap();
    assert_eq!(status, JobStatus::Completed);

    let report = service.status(&job_id).unwrap().unwrap();
    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(report.internal_nodes, 2);
    assert_eq!(report.external_nodes, 1);
    assert_eq!(report.edges, 2);

    let mut buf = Vec::new();
    let export = service.write_graph(&job_id, &mut buf).unwrap();
    assert_eq!(export.nodes, 3);
    assert_eq!(export.edges, 2);

    let json: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    let nodes = json["nodes"].as_array().unwrap();
    let edges = json["edges"].as_array().unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(edges.len(), 2);

    let external = nodes
        .iter()
        .find(|n| n["label"] == "https://other.com/x")
        .unwrap();
    assert_eq!(external["external"], true);
    assert_eq!(external["group"], "0");
    let home = nodes.iter().find(|n| n["label"] == base.as_str()).unwrap();
    assert_eq!(home["group"], "1");
    assert!(edges.iter().all(|e| e["kind"] == "hyperlink"));
    assert!(edges.iter().all(|e| e["from"] == home["id"]));

    let jobs = service.list_jobs().unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].job_id, "graph-job");
}
