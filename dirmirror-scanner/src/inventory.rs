use serde::{Deserialize, Serialize};

/// Extensions mirrored when no explicit list is given.
pub const DEFAULT_EXTENSIONS: &[&str] = &[".tif", ".nc", ".csv", ".gpkg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// A URL discovered while walking a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNode {
    pub url: String,
    pub kind: NodeKind,
    /// Distance from the root listing (root = 0).
    pub depth: usize,
}

impl RemoteNode {
    pub fn directory(url: String, depth: usize) -> Self {
        Self {
            url,
            kind: NodeKind::Directory,
            depth,
        }
    }

    pub fn file(url: String, depth: usize) -> Self {
        Self {
            url,
            kind: NodeKind::File,
            depth,
        }
    }
}

/// Everything one crawl found.
///
/// `visited` holds each expanded directory once, in expansion order,
/// including listings that failed to load. `files` holds leaf files in
/// discovery order. Both are closed once the walk returns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlInventory {
    pub visited: Vec<RemoteNode>,
    pub files: Vec<RemoteNode>,
}

impl CrawlInventory {
    pub fn directory_urls(&self) -> impl Iterator<Item = &str> {
        self.visited.iter().map(|node| node.url.as_str())
    }

    pub fn file_urls(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|node| node.url.as_str())
    }
}

/// Case-insensitive allow-list of file suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Builds a filter, lowercasing each entry and adding a leading dot when missing.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = ext.as_ref().trim().to_lowercase();
            if ext.is_empty() || ext == "." {
                continue;
            }
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            };
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            extensions: normalized,
        }
    }

    pub fn matches(&self, href: &str) -> bool {
        let lower = href.trim().to_lowercase();
        self.extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }
}

impl Default for ExtensionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_EXTENSIONS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_accepts_mixed_case() {
        let filter = ExtensionFilter::default();
        assert!(filter.matches("scene_01.TIF"));
        assert!(filter.matches("labels.csv"));
        assert!(filter.matches("cube.Nc"));
        assert!(filter.matches("fields.gpkg"));
    }

    #[test]
    fn test_default_filter_rejects_other_suffixes() {
        let filter = ExtensionFilter::default();
        assert!(!filter.matches("readme.txt"));
        assert!(!filter.matches("index.html"));
        assert!(!filter.matches("subdir/"));
        assert!(!filter.matches("archive.tif.md5"));
    }

    #[test]
    fn test_inventory_url_views() {
        let inventory = CrawlInventory {
            visited: vec![
                RemoteNode::directory("http://h/root/".to_string(), 0),
                RemoteNode::directory("http://h/root/a/".to_string(), 1),
            ],
            files: vec![RemoteNode::file("http://h/root/a/x.tif".to_string(), 1)],
        };

        let dirs: Vec<&str> = inventory.directory_urls().collect();
        assert_eq!(dirs, vec!["http://h/root/", "http://h/root/a/"]);
        assert!(inventory.visited.iter().all(|n| n.kind == NodeKind::Directory));
        let files: Vec<&str> = inventory.file_urls().collect();
        assert_eq!(files, vec!["http://h/root/a/x.tif"]);
        assert_eq!(inventory.files[0].kind, NodeKind::File);
    }

    #[test]
    fn test_new_normalizes_entries() {
        let filter = ExtensionFilter::new(["TIF", ".Zip", "  ", ".", "tif"]);
        assert_eq!(filter.extensions(), &[".tif".to_string(), ".zip".to_string()]);
        assert!(filter.matches("bundle.ZIP"));
    }
}
