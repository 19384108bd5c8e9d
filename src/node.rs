//! # Node identity
//!
//! [`NodeInfo`] is the part every virtual file shares regardless of backend:
//! the parsed url plus the split of the resolved path into the file that holds
//! the bytes (`stream_path`) and the entry inside it (`path_in_stream`).
//!
//! The split is computed once, by the registry, from the segment a provider
//! claimed:
//!
//! ```text
//! host/archive.D64/PROGRAM
//! ^^^^^^^^^^^^^^^^ ^^^^^^^
//!   stream_path    path_in_stream
//! ```

use crate::url::UrlPath;

/// Segment separator of the universal namespace.
pub const SEPARATOR: char = '/';

/// Identity and path split of one virtual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeInfo {
    /// The parsed url of the node.
    pub url: UrlPath,
    /// Path up to and including the segment the backend claimed.
    pub stream_path: String,
    /// Remainder naming an entry inside the container; empty if none.
    pub path_in_stream: String,
    /// Listing type override (`SEQ`, `USR`, ...) for entries whose name has no
    /// extension.
    pub type_tag: Option<String>,
}

impl NodeInfo {
    /// A node whose whole path is its own stream.
    pub fn new(path: &str) -> Self {
        Self {
            url: UrlPath::parse(path),
            stream_path: path.to_string(),
            path_in_stream: String::new(),
            type_tag: None,
        }
    }

    /// A node claimed at `segments[matched]`.
    ///
    /// Segments up to and including `matched` form `stream_path`, the rest
    /// form `path_in_stream`.
    ///
    /// # Panics
    ///
    /// Panics if `matched` is out of bounds; the registry only passes indices
    /// of segments it scanned.
    pub fn claimed(path: &str, segments: &[&str], matched: usize) -> Self {
        Self {
            url: UrlPath::parse(path),
            stream_path: segments[..=matched].join("/"),
            path_in_stream: segments[matched + 1..].join("/"),
            type_tag: None,
        }
    }

    /// The node's url string.
    #[inline]
    pub fn url(&self) -> &str {
        self.url.url()
    }

    /// Rejoin `stream_path` and `path_in_stream`.
    ///
    /// Reproduces the path the node was resolved from.
    pub fn full_path(&self) -> String {
        if self.path_in_stream.is_empty() {
            self.stream_path.clone()
        } else {
            format!("{}{}{}", self.stream_path, SEPARATOR, self.path_in_stream)
        }
    }
}

/// Split a path into its `/`-delimited segments, empty ones included.
pub fn chop(path: &str) -> Vec<&str> {
    path.split(SEPARATOR).collect()
}

/// Turn a navigation request made from `current` into the url to resolve.
///
/// | Request | Target |
/// |---------|--------|
/// | empty | `current` itself |
/// | `_` or `..` | parent of `current` |
/// | `//NAME` | `NAME` on local storage |
/// | `/NAME` | `NAME` at the root of `current`'s host |
/// | `scheme://...`, `cs:...` | taken as is |
/// | anything else | child of `current` |
pub fn navigate(current: &UrlPath, name: &str) -> String {
    if name.is_empty() {
        return current.url().to_string();
    }
    if name == "_" || name == ".." {
        return current.parent();
    }
    if let Some(rest) = name.strip_prefix("//") {
        let rest = rest.trim_start_matches(SEPARATOR);
        return if rest.is_empty() {
            String::new()
        } else {
            format!("{SEPARATOR}{rest}")
        };
    }
    if is_absolute(name) {
        return name.to_string();
    }
    if name.starts_with(SEPARATOR) {
        return format!("{}{}", current.root(), name);
    }
    current.join(name)
}

fn is_absolute(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("cs:") {
        return true;
    }
    !UrlPath::parse(name).scheme.is_empty() && name.contains("://")
}
