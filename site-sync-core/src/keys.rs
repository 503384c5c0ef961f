//! Destination key and content-type derivation.
//!
//! HTML pages other than `index.html` lose their extension so they can be
//! served from "pretty" URLs: `about.html` is stored as `about` with an
//! explicit `text/html` content type.

use std::path::Path;

pub const HTML_CONTENT_TYPE: &str = "text/html";

const INDEX_DOCUMENT: &str = "index.html";

/// Where a file goes and how it is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMapping {
    /// Object key, including the prefix.
    pub key: String,
    /// Public URI relative to the site root, without the prefix.
    pub uri: String,
    pub content_type: Option<&'static str>,
}

/// Ensure a non-empty prefix ends with `/`. Object keys never start with
/// `/`, so leading slashes are dropped.
pub fn normalize_key_prefix(prefix: &str) -> String {
    let prefix = prefix.trim_start_matches('/');
    if prefix.is_empty() || prefix.ends_with('/') {
        prefix.to_string()
    } else {
        format!("{prefix}/")
    }
}

/// Map a `/`-separated relative path to its key under `prefix`.
/// `prefix` is expected to be normalized already.
pub fn map_key(relative_path: &str, prefix: &str) -> KeyMapping {
    let file_name = relative_path.rsplit('/').next().unwrap_or(relative_path);
    let is_html = Path::new(file_name)
        .extension()
        .is_some_and(|ext| ext == "html");

    let (uri, content_type) = if is_html {
        let uri = if file_name == INDEX_DOCUMENT {
            relative_path.to_string()
        } else {
            strip_extension(relative_path).to_string()
        };
        (uri, Some(HTML_CONTENT_TYPE))
    } else {
        (relative_path.to_string(), None)
    };

    KeyMapping {
        key: format!("{prefix}{uri}"),
        uri,
        content_type,
    }
}

/// Drop the extension of the last path segment. Paths whose last segment has
/// no extension (including dotfiles like `.htaccess`) come back unchanged.
pub fn strip_extension(path: &str) -> &str {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[segment_start..];
    match segment.rfind('.') {
        Some(dot) if dot > 0 => &path[..segment_start + dot],
        _ => path,
    }
}
