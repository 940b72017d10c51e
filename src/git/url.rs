//! URL handling for git operations
//!
//! This module handles:
//! - Detecting the transport a repository URL uses
//! - Normalizing file:// URLs for libgit2 compatibility

use std::borrow::Cow;

/// Transport of a repository URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlTransport {
    Https,
    Http,
    Ssh,
    /// `file://` URLs and plain paths
    Local,
    Unknown,
}

/// Classify `url` by its scheme
pub fn url_transport(url: &str) -> UrlTransport {
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("https://") {
        UrlTransport::Https
    } else if lower.starts_with("http://") {
        UrlTransport::Http
    } else if lower.starts_with("ssh://") || lower.starts_with("git@") {
        UrlTransport::Ssh
    } else if lower.starts_with("file://")
        || url.starts_with('/')
        || url.starts_with("./")
        || url.starts_with("../")
        || std::path::Path::new(url).is_absolute()
    {
        UrlTransport::Local
    } else {
        UrlTransport::Unknown
    }
}

/// Normalize file:// URLs so libgit2 can resolve them on Unix.
pub fn normalize_file_url_for_clone(url: &str) -> Cow<'_, str> {
    let Some(after) = url.strip_prefix("file://") else {
        return Cow::Borrowed(url);
    };
    if after.contains('\\') {
        let path = after.replace('\\', "/");
        return Cow::Owned(format!("file:///{}", path.trim_start_matches('/')));
    }
    if !after.is_empty() && !after.starts_with('/') {
        return Cow::Owned(format!("file:///{after}"));
    }
    Cow::Borrowed(url)
}
