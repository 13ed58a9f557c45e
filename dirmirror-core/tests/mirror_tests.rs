// Tests for the download orchestrator end to end

use dirmirror_core::mirror::{MirrorOptions, execute_fetch, execute_listing, execute_mirror};
use dirmirror_core::{MirrorError, RetryPolicy};
use dirmirror_scanner::{ExtensionFilter, NodeKind};
use std::fs;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

fn listing(hrefs: &[&str]) -> String {
    let mut html = String::from("<html><body><h1>Index of /</h1><pre>");
    html.push_str(r#"<a href="?C=N;O=D">Name</a> <a href="../">Parent Directory</a>"#);
    html.push('\n');
    for href in hrefs {
        html.push_str(&format!(r#"<a href="{}">{}</a>"#, href, href));
        html.push('\n');
    }
    html.push_str("</pre></body></html>");
    html
}

async fn mount_listing(server: &MockServer, route: &str, hrefs: &[&str]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(listing(hrefs)),
        )
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, route: &str, body: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(times)
        .mount(server)
        .await;
}

fn options_for(server: &MockServer, dest: &std::path::Path) -> MirrorOptions {
    let mut options = MirrorOptions::new(format!("{}/root/", server.uri()), dest);
    options.retry = RetryPolicy::new(3, Duration::ZERO);
    options
}

// ============================================================================
// End-to-end Mirror Tests
// ============================================================================

#[tokio::test]
async fn test_mirror_builds_local_tree() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["a/", "b.csv"]).await;
    mount_listing(&mock_server, "/root/a/", &["x.tif"]).await;
    mount_file(&mock_server, "/root/a/x.tif", "tif-bytes", 1).await;
    mount_file(&mock_server, "/root/b.csv", "id,area\n1,2\n", 1).await;

    let dest = TempDir::new().unwrap();
    let outcome = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert!(outcome.failures.is_empty());
    assert_eq!(
        fs::read_to_string(dest.path().join("a/x.tif")).unwrap(),
        "tif-bytes"
    );
    assert_eq!(
        fs::read_to_string(dest.path().join("b.csv")).unwrap(),
        "id,area\n1,2\n"
    );
    assert_eq!(outcome.stats.directories_visited, 2);
    assert_eq!(outcome.stats.files_discovered, 2);
    assert_eq!(outcome.stats.files_downloaded, 2);
    assert_eq!(outcome.stats.bytes_downloaded, (9 + 12) as u64);
}

#[tokio::test]
async fn test_second_run_downloads_nothing() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["a/", "b.csv"]).await;
    mount_listing(&mock_server, "/root/a/", &["x.tif"]).await;
    mount_file(&mock_server, "/root/a/x.tif", "tif-bytes", 1).await;
    mount_file(&mock_server, "/root/b.csv", "csv-bytes", 1).await;

    let dest = TempDir::new().unwrap();
    let first = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();
    assert_eq!(first.stats.files_downloaded, 2);

    let second = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();
    assert_eq!(second.stats.files_downloaded, 0);
    assert_eq!(second.stats.bytes_downloaded, 0);
    assert_eq!(second.stats.files_skipped, 2);
    assert_eq!(second.stats.directories_created, 0);
    assert!(second.is_complete());
}

#[tokio::test]
async fn test_existing_files_are_never_overwritten() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["b.csv"]).await;
    mount_file(&mock_server, "/root/b.csv", "remote", 0).await;

    let dest = TempDir::new().unwrap();
    fs::write(dest.path().join("b.csv"), "local").unwrap();

    let outcome = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();

    assert_eq!(outcome.stats.files_skipped, 1);
    assert_eq!(fs::read_to_string(dest.path().join("b.csv")).unwrap(), "local");
}

#[tokio::test]
async fn test_failed_directory_still_gets_local_directory() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["broken/", "ok.nc"]).await;
    Mock::given(method("GET"))
        .and(path("/root/broken/"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/root/ok.nc", "nc", 1).await;

    let dest = TempDir::new().unwrap();
    let outcome = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();

    assert!(dest.path().join("broken").is_dir());
    assert!(dest.path().join("ok.nc").is_file());
    assert!(outcome.is_complete());
}

#[tokio::test]
async fn test_custom_extensions_and_excludes() {
    let mock_server = MockServer::start().await;

    mount_listing(
        &mock_server,
        "/root/",
        &["keep.zip", "scene_s1.zip", "scene.tif"],
    )
    .await;
    mount_file(&mock_server, "/root/keep.zip", "zip", 1).await;
    mount_file(&mock_server, "/root/scene_s1.zip", "zip", 0).await;
    mount_file(&mock_server, "/root/scene.tif", "tif", 0).await;

    let dest = TempDir::new().unwrap();
    let mut options = options_for(&mock_server, dest.path());
    options.extensions = ExtensionFilter::new(["zip"]);
    options.excludes = vec!["_s1".to_string()];

    let outcome = execute_mirror(options).await.unwrap();

    assert_eq!(outcome.stats.files_downloaded, 1);
    assert!(dest.path().join("keep.zip").is_file());
    assert!(!dest.path().join("scene_s1.zip").exists());
}

#[tokio::test]
async fn test_concurrent_workers_download_everything() {
    let mock_server = MockServer::start().await;

    let names: Vec<String> = (0..8).map(|i| format!("tile_{}.tif", i)).collect();
    let hrefs: Vec<&str> = names.iter().map(String::as_str).collect();
    mount_listing(&mock_server, "/root/", &hrefs).await;
    for name in &names {
        Mock::given(method("GET"))
            .and(path(format!("/root/{}", name)))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(name.clone())
                    .set_delay(Duration::from_millis(20)),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let dest = TempDir::new().unwrap();
    let mut options = options_for(&mock_server, dest.path());
    options.workers = 4;

    let outcome = execute_mirror(options).await.unwrap();

    assert_eq!(outcome.stats.files_downloaded, 8);
    for name in &names {
        assert_eq!(fs::read_to_string(dest.path().join(name)).unwrap(), *name);
    }
}

// ============================================================================
// Retry Tests
// ============================================================================

#[tokio::test]
async fn test_flaky_file_recovers_on_third_attempt() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["flaky.tif"]).await;
    Mock::given(method("GET"))
        .and(path("/root/flaky.tif"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/root/flaky.tif", "finally", 1).await;

    let dest = TempDir::new().unwrap();
    let outcome = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();

    assert!(outcome.failures.is_empty());
    assert_eq!(outcome.stats.files_recovered_by_retry, 1);
    assert_eq!(outcome.stats.files_downloaded, 1);
    assert_eq!(
        fs::read_to_string(dest.path().join("flaky.tif")).unwrap(),
        "finally"
    );
}

#[tokio::test]
async fn test_always_failing_file_is_attempted_exactly_max_times() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["dead.csv", "fine.csv"]).await;
    Mock::given(method("GET"))
        .and(path("/root/dead.csv"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;
    mount_file(&mock_server, "/root/fine.csv", "ok", 1).await;

    let dest = TempDir::new().unwrap();
    let outcome = execute_mirror(options_for(&mock_server, dest.path()))
        .await
        .unwrap();

    let dead = format!("{}/root/dead.csv", mock_server.uri());
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures.attempts(&dead), 3);
    assert_eq!(outcome.stats.permanent_failures, 1);
    assert!(!dest.path().join("dead.csv").exists());
    assert!(!dest.path().join("dead.csv.part").exists());
    assert!(dest.path().join("fine.csv").is_file());
}

// ============================================================================
// Fatal Error Tests
// ============================================================================

#[tokio::test]
async fn test_uncreatable_destination_root_is_fatal() {
    let mock_server = MockServer::start().await;
    mount_listing(&mock_server, "/root/", &["b.csv"]).await;

    let dir = TempDir::new().unwrap();
    let blocker = dir.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let result = execute_mirror(options_for(&mock_server, &blocker.join("mirror"))).await;
    assert!(matches!(result, Err(MirrorError::DestinationRoot { .. })));
}

#[tokio::test]
async fn test_invalid_root_url_is_fatal() {
    let dest = TempDir::new().unwrap();
    let result = execute_mirror(MirrorOptions::new("definitely not a url", dest.path())).await;
    assert!(matches!(result, Err(MirrorError::InvalidUrl(_))));
}

// ============================================================================
// Listing and Single-file Fetch Tests
// ============================================================================

#[tokio::test]
async fn test_listing_touches_no_disk() {
    let mock_server = MockServer::start().await;

    mount_listing(&mock_server, "/root/", &["a/", "b.csv"]).await;
    mount_listing(&mock_server, "/root/a/", &["x.tif"]).await;
    mount_file(&mock_server, "/root/b.csv", "", 0).await;

    let dest = TempDir::new().unwrap();
    let target = dest.path().join("never-created");
    let inventory = execute_listing(&options_for(&mock_server, &target))
        .await
        .unwrap();

    assert_eq!(inventory.visited.len(), 2);
    assert_eq!(inventory.files.len(), 2);
    assert_eq!(inventory.visited[1].url, format!("{}/root/a/", mock_server.uri()));
    assert_eq!(inventory.visited[1].kind, NodeKind::Directory);
    assert_eq!(inventory.visited[1].depth, 1);
    assert!(!target.exists());
}

#[tokio::test]
async fn test_fetch_single_file_creates_parents() {
    let mock_server = MockServer::start().await;
    mount_file(&mock_server, "/records/archive.tar.zst", "archive", 1).await;

    let dest = TempDir::new().unwrap();
    let target = dest.path().join("nested/dir/archive.tar.zst");
    let written = execute_fetch(
        &format!("{}/records/archive.tar.zst", mock_server.uri()),
        &target,
        30,
    )
    .await
    .unwrap();

    assert_eq!(written, 7);
    assert_eq!(fs::read_to_string(&target).unwrap(), "archive");
}
