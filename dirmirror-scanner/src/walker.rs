use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use crate::inventory::{CrawlInventory, ExtensionFilter, RemoteNode};
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Called with each directory URL just before its listing is requested.
pub type ProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Link {
    Directory(String),
    File(String),
}

/// A directory whose listing has been fetched but whose links are not all consumed.
struct Frame {
    depth: usize,
    links: std::vec::IntoIter<Link>,
}

/// State shared across one whole walk.
#[derive(Default)]
struct Traversal {
    visited: HashSet<String>,
    files_seen: HashSet<String>,
    inventory: CrawlInventory,
}

/// Walks an HTML directory listing depth-first and records every directory
/// and allow-listed file below a URL prefix.
///
/// The walk uses an explicit stack rather than recursion, so the order in which
/// files are discovered matches a recursive descent while the depth is bounded
/// by `max_depth` instead of the call stack.
pub struct Walker {
    fetcher: Fetcher,
    base_prefix: String,
    extensions: ExtensionFilter,
    excludes: Vec<String>,
    max_depth: usize,
    progress_callback: Option<ProgressCallback>,
}

impl Walker {
    pub fn new(fetcher: Fetcher, base_prefix: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_prefix: base_prefix.into(),
            extensions: ExtensionFilter::default(),
            excludes: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            progress_callback: None,
        }
    }

    pub fn with_extensions(mut self, extensions: ExtensionFilter) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_excludes(mut self, excludes: Vec<String>) -> Self {
        self.excludes = excludes.into_iter().filter(|p| !p.is_empty()).collect();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Crawl everything reachable from `root_url`.
    ///
    /// Only an unparseable root URL is an error. Listings that fail to load
    /// are logged, still count as visited, and contribute nothing.
    pub async fn walk(&self, root_url: &str) -> Result<CrawlInventory> {
        let root = Url::parse(root_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", root_url, e)))?;

        info!("Starting walk of {} (prefix {})", root, self.base_prefix);

        let mut traversal = Traversal::default();
        let mut stack: Vec<Frame> = Vec::new();

        if let Some(frame) = self.expand(root.to_string(), 0, &mut traversal).await {
            stack.push(frame);
        }

        while let Some(frame) = stack.last_mut() {
            let depth = frame.depth;
            match frame.links.next() {
                None => {
                    stack.pop();
                }
                Some(Link::File(url)) => {
                    if traversal.files_seen.insert(url.clone()) {
                        debug!("Found file {}", url);
                        traversal.inventory.files.push(RemoteNode::file(url, depth));
                    }
                }
                Some(Link::Directory(url)) => {
                    if let Some(child) = self.expand(url, depth + 1, &mut traversal).await {
                        stack.push(child);
                    }
                }
            }
        }

        let inventory = traversal.inventory;
        info!(
            "Walk complete. {} directories visited, {} files found",
            inventory.visited.len(),
            inventory.files.len()
        );
        Ok(inventory)
    }

    async fn expand(&self, url: String, depth: usize, traversal: &mut Traversal) -> Option<Frame> {
        if traversal.visited.contains(&url) {
            return None;
        }
        if depth > self.max_depth {
            warn!(
                "Not expanding {}: depth {} exceeds limit {}",
                url, depth, self.max_depth
            );
            return None;
        }

        traversal.visited.insert(url.clone());
        traversal
            .inventory
            .visited
            .push(RemoteNode::directory(url.clone(), depth));

        if let Some(ref callback) = self.progress_callback {
            callback(url.clone());
        }

        debug!("Listing {} (depth {})", url, depth);
        let body = match self.fetcher.get_text(&url).await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to list {}: {}", url, e);
                return None;
            }
        };

        let links = match self.extract_links(&body, &url) {
            Ok(links) => links,
            Err(e) => {
                warn!("Could not read listing {}: {}", url, e);
                return None;
            }
        };

        Some(Frame {
            depth,
            links: links.into_iter(),
        })
    }

    fn extract_links(&self, html: &str, current_url: &str) -> Result<Vec<Link>> {
        let base = Url::parse(current_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", current_url, e)))?;
        let document = Html::parse_document(html);
        let link_selector = Selector::parse("a[href]")
            .map_err(|e| ScanError::ParseError(format!("anchor selector: {}", e)))?;

        let mut links = Vec::new();

        for element in document.select(&link_selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let href = href.trim();
            if href.is_empty()
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
                || href.starts_with('#')
            {
                continue;
            }

            let Some(absolute_url) = resolve_url(&base, href) else {
                debug!("  -> Unresolvable href {:?}, skipping", href);
                continue;
            };

            if !absolute_url.starts_with(&self.base_prefix) {
                debug!("  -> {} is outside {}, skipping", absolute_url, self.base_prefix);
                continue;
            }

            if self.excludes.iter().any(|p| absolute_url.contains(p.as_str())) {
                debug!("  -> {} matches an exclude pattern, skipping", absolute_url);
                continue;
            }

            if href.ends_with('/') {
                links.push(Link::Directory(absolute_url));
            } else if self.extensions.matches(href) {
                links.push(Link::File(absolute_url));
            }
        }

        Ok(links)
    }
}

fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);
    Some(resolved.to_string())
}
