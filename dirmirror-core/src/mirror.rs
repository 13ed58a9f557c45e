use crate::error::{MirrorError, Result};
use crate::layout::MirrorLayout;
use crate::ledger::FailureLedger;
use crate::retry::{RetryPolicy, retry_failures};
use dirmirror_scanner::fetch::{DEFAULT_CHUNK_SIZE, DEFAULT_TIMEOUT_SECS};
use dirmirror_scanner::walker::DEFAULT_MAX_DEPTH;
use dirmirror_scanner::{CrawlInventory, ExtensionFilter, Fetcher, RemoteNode, Walker};
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs;
use tracing::{debug, info, warn};
use url::Url;

/// Options for configuring a mirror run
#[derive(Debug, Clone)]
pub struct MirrorOptions {
    pub root_url: String,
    /// Links must start with this to be followed. Defaults to `root_url`.
    pub base_prefix: Option<String>,
    pub destination: PathBuf,
    pub extensions: ExtensionFilter,
    pub excludes: Vec<String>,
    pub max_depth: usize,
    pub timeout_secs: u64,
    pub chunk_size: usize,
    pub retry: RetryPolicy,
    /// Concurrent file downloads. 1 keeps the download phase strictly sequential.
    pub workers: usize,
    pub show_progress_bars: bool,
}

impl MirrorOptions {
    pub fn new(root_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            root_url: root_url.into(),
            base_prefix: None,
            destination: destination.into(),
            extensions: ExtensionFilter::default(),
            excludes: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            retry: RetryPolicy::default(),
            workers: 1,
            show_progress_bars: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorStats {
    pub directories_visited: usize,
    pub directories_created: usize,
    pub files_discovered: usize,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub bytes_downloaded: u64,
    pub files_recovered_by_retry: usize,
    pub permanent_failures: usize,
    pub elapsed: Duration,
}

/// Result of a completed run. Permanent failures do not make a run fail;
/// they are listed in `failures`.
#[derive(Debug, Clone)]
pub struct MirrorOutcome {
    pub root_url: String,
    pub base_prefix: String,
    pub destination: PathBuf,
    pub stats: MirrorStats,
    pub failures: FailureLedger,
}

impl MirrorOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

enum FileOutcome {
    Downloaded(u64),
    Skipped,
    Failed(MirrorError),
}

/// Parse `url` as a directory URL: query and fragment dropped, trailing slash enforced.
pub fn normalize_directory_url(url: &str) -> Result<String> {
    let mut parsed =
        Url::parse(url.trim()).map_err(|e| MirrorError::InvalidUrl(format!("{}: {}", url, e)))?;
    if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
        return Err(MirrorError::InvalidUrl(format!(
            "{}: not an http(s) directory URL",
            url
        )));
    }
    parsed.set_query(None);
    parsed.set_fragment(None);
    if !parsed.path().ends_with('/') {
        let path = format!("{}/", parsed.path());
        parsed.set_path(&path);
    }
    Ok(parsed.to_string())
}

fn resolve_prefixes(options: &MirrorOptions) -> Result<(String, String)> {
    let root_url = normalize_directory_url(&options.root_url)?;
    let base_prefix = match options.base_prefix {
        Some(ref prefix) => normalize_directory_url(prefix)?,
        None => root_url.clone(),
    };
    Ok((root_url, base_prefix))
}

fn build_walker(
    options: &MirrorOptions,
    fetcher: &Fetcher,
    base_prefix: &str,
    spinner: Option<&ProgressBar>,
) -> Walker {
    let mut walker = Walker::new(fetcher.clone(), base_prefix)
        .with_extensions(options.extensions.clone())
        .with_excludes(options.excludes.clone())
        .with_max_depth(options.max_depth);

    if let Some(pb) = spinner {
        let pb = pb.clone();
        walker = walker.with_progress_callback(Arc::new(move |url: String| {
            pb.set_message(format!("Listing {}", url));
            pb.tick();
        }));
    }

    walker
}

fn listing_spinner() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Starting crawl...");
    pb
}

fn download_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb
}

/// Crawl only: list what a mirror run would fetch without touching disk.
pub async fn execute_listing(options: &MirrorOptions) -> Result<CrawlInventory> {
    let (root_url, base_prefix) = resolve_prefixes(options)?;
    let fetcher = Fetcher::with_timeout(options.timeout_secs)?;
    let spinner = options.show_progress_bars.then(listing_spinner);

    let walker = build_walker(options, &fetcher, &base_prefix, spinner.as_ref());
    let inventory = walker.walk(&root_url).await?;

    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    Ok(inventory)
}

/// Mirror everything below `options.root_url` into `options.destination`.
///
/// Only an invalid URL or an uncreatable destination root aborts the run.
/// Per-file problems end up in the returned outcome's failure ledger.
pub async fn execute_mirror(options: MirrorOptions) -> Result<MirrorOutcome> {
    let started = Instant::now();
    let (root_url, base_prefix) = resolve_prefixes(&options)?;
    let destination = options.destination.clone();

    fs::create_dir_all(&destination)
        .await
        .map_err(|source| MirrorError::DestinationRoot {
            path: destination.clone(),
            source,
        })?;

    info!("Mirroring {} into {}", root_url, destination.display());

    let fetcher = Fetcher::with_timeout(options.timeout_secs)?.with_chunk_size(options.chunk_size);
    let layout = MirrorLayout::new(base_prefix.clone(), destination.clone());

    let spinner = options.show_progress_bars.then(listing_spinner);
    let walker = build_walker(&options, &fetcher, &base_prefix, spinner.as_ref());
    let inventory = walker.walk(&root_url).await?;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let mut stats = MirrorStats {
        directories_visited: inventory.visited.len(),
        files_discovered: inventory.files.len(),
        ..MirrorStats::default()
    };
    info!(
        "Found {} directories and {} files",
        stats.directories_visited, stats.files_discovered
    );

    stats.directories_created = create_directories(&layout, &inventory.visited).await;

    let mut ledger = FailureLedger::new();
    download_inventory(
        &fetcher,
        &layout,
        &inventory.files,
        options.workers,
        options.show_progress_bars,
        &mut stats,
        &mut ledger,
    )
    .await;

    if !ledger.is_empty() {
        info!("{} download(s) failed, starting retries", ledger.len());
    }
    let retried = retry_failures(ledger, &options.retry, |url| {
        download_file(&fetcher, &layout, url)
    })
    .await;

    stats.files_downloaded += retried.recovered.len();
    stats.files_recovered_by_retry = retried.recovered.len();
    stats.bytes_downloaded += retried.bytes;
    stats.permanent_failures = retried.remaining.len();
    stats.elapsed = started.elapsed();

    info!(
        "Mirror complete: {} downloaded, {} skipped, {} failed permanently",
        stats.files_downloaded, stats.files_skipped, stats.permanent_failures
    );

    Ok(MirrorOutcome {
        root_url,
        base_prefix,
        destination,
        stats,
        failures: retried.remaining,
    })
}

/// Download a single URL to `destination`, creating parent directories as needed.
pub async fn execute_fetch(url: &str, destination: &Path, timeout_secs: u64) -> Result<u64> {
    let parsed =
        Url::parse(url).map_err(|e| MirrorError::InvalidUrl(format!("{}: {}", url, e)))?;
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::io(parent, e))?;
    }

    info!("Downloading {} to {}", parsed, destination.display());
    let fetcher = Fetcher::with_timeout(timeout_secs)?;
    let written = fetcher.fetch(parsed.as_str(), destination).await?;
    info!("Downloaded {} bytes", written);
    Ok(written)
}

async fn create_directories(layout: &MirrorLayout, directories: &[RemoteNode]) -> usize {
    let mut created = 0;
    for node in directories {
        let url = &node.url;
        let path = match layout.local_path(url) {
            Ok(path) => path,
            Err(e) => {
                warn!("Not creating a directory for {}: {}", url, e);
                continue;
            }
        };
        let existed = fs::try_exists(&path).await.unwrap_or(false);
        match fs::create_dir_all(&path).await {
            Ok(()) => {
                if !existed {
                    debug!("Created {}", path.display());
                    created += 1;
                }
            }
            Err(e) => warn!("Failed to create directory {}: {}", path.display(), e),
        }
    }
    created
}

async fn download_inventory(
    fetcher: &Fetcher,
    layout: &MirrorLayout,
    files: &[RemoteNode],
    workers: usize,
    show_progress_bars: bool,
    stats: &mut MirrorStats,
    ledger: &mut FailureLedger,
) {
    let progress_bar = show_progress_bars.then(|| download_bar(files.len()));

    let mut results = futures::stream::iter(files.iter().map(|node| {
        let url = node.url.clone();
        async move {
            let outcome = process_file(fetcher, layout, &url).await;
            (url, outcome)
        }
    }))
    .buffered(workers.max(1));

    while let Some((url, outcome)) = results.next().await {
        match outcome {
            FileOutcome::Downloaded(bytes) => {
                stats.files_downloaded += 1;
                stats.bytes_downloaded += bytes;
            }
            FileOutcome::Skipped => stats.files_skipped += 1,
            FileOutcome::Failed(e) => {
                warn!("Failed to download {}: {}", url, e);
                ledger.record_failure(&url, &e, e.is_retryable());
            }
        }
        if let Some(ref pb) = progress_bar {
            pb.inc(1);
        }
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }
}

async fn process_file(fetcher: &Fetcher, layout: &MirrorLayout, url: &str) -> FileOutcome {
    let path = match layout.local_path(url) {
        Ok(path) => path,
        Err(e) => return FileOutcome::Failed(e),
    };

    if fs::try_exists(&path).await.unwrap_or(false) {
        warn!("Skipping {}: {} already exists", url, path.display());
        return FileOutcome::Skipped;
    }

    match fetch_to(fetcher, url, &path).await {
        Ok(bytes) => {
            info!("Downloaded {} ({} bytes)", url, bytes);
            FileOutcome::Downloaded(bytes)
        }
        Err(e) => FileOutcome::Failed(e),
    }
}

async fn download_file(fetcher: &Fetcher, layout: &MirrorLayout, url: String) -> Result<u64> {
    let path = layout.local_path(&url)?;
    fetch_to(fetcher, &url, &path).await
}

async fn fetch_to(fetcher: &Fetcher, url: &str, path: &Path) -> Result<u64> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| MirrorError::io(parent, e))?;
    }
    Ok(fetcher.fetch(url, path).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_adds_trailing_slash() {
        assert_eq!(
            normalize_directory_url("http://host/root").unwrap(),
            "http://host/root/"
        );
        assert_eq!(
            normalize_directory_url("http://host").unwrap(),
            "http://host/"
        );
    }

    #[test]
    fn test_normalize_drops_query_and_fragment() {
        assert_eq!(
            normalize_directory_url("https://host/root/?C=N;O=D#top").unwrap(),
            "https://host/root/"
        );
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(matches!(
            normalize_directory_url("ftp://host/root/"),
            Err(MirrorError::InvalidUrl(_))
        ));
        assert!(matches!(
            normalize_directory_url("not a url"),
            Err(MirrorError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_explicit_prefix_is_normalized_independently() {
        let mut options = MirrorOptions::new("http://host/root/a", "/tmp/x");
        options.base_prefix = Some("http://host/root".to_string());
        let (root, prefix) = resolve_prefixes(&options).unwrap();
        assert_eq!(root, "http://host/root/a/");
        assert_eq!(prefix, "http://host/root/");
    }
}
