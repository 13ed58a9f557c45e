use crate::error::{MirrorError, Result};
use std::path::PathBuf;

/// Maps remote URLs under a base prefix onto a local destination tree.
///
/// The mapping depends only on the prefix, the destination root and the URL:
/// strip the prefix, drop any query or fragment, percent-decode each path
/// segment and join the segments onto the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorLayout {
    base_prefix: String,
    destination_root: PathBuf,
}

impl MirrorLayout {
    pub fn new(base_prefix: impl Into<String>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            base_prefix: base_prefix.into(),
            destination_root: destination_root.into(),
        }
    }

    pub fn local_path(&self, url: &str) -> Result<PathBuf> {
        let remainder = url
            .strip_prefix(&self.base_prefix)
            .ok_or_else(|| MirrorError::OutsidePrefix(url.to_string()))?;
        let remainder = remainder.split(['?', '#']).next().unwrap_or_default();

        let mut path = self.destination_root.clone();
        for segment in remainder.split('/').filter(|s| !s.is_empty()) {
            let decoded = urlencoding::decode(segment)
                .map_err(|_| MirrorError::UnsafePath(url.to_string()))?;
            if !is_safe_segment(&decoded) {
                return Err(MirrorError::UnsafePath(url.to_string()));
            }
            path.push(decoded.as_ref());
        }

        Ok(path)
    }
}

fn is_safe_segment(segment: &str) -> bool {
    segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
        && !(segment.len() >= 2 && segment.as_bytes()[1] == b':')
}
