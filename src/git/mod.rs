//! Git operations for the management repository
//!
//! This module handles:
//! - The [`WorkingCopy`] seam the reconciler drives
//! - A libgit2 implementation of it ([`working_copy`])
//! - Authentication with a token or git's native credentials ([`auth`])
//! - The clone, commit and push cycle ([`reconcile`])
//!
//! Only HTTP(S) and local repositories are supported; SSH URLs are rejected
//! during configuration validation.

pub mod auth;
pub mod error;
pub mod reconcile;
pub mod url;
pub mod working_copy;

use std::path::Path;

use crate::error::Result;

pub use auth::GitCredentials;
pub use reconcile::{GitReconciler, ReconcileOutcome, ReconcileState, commit_message};
pub use url::{UrlTransport, url_transport};
pub use working_copy::Git2WorkingCopy;

/// Files and metadata of one commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    /// Paths relative to the working copy root, with their full content
    pub files: Vec<(String, Vec<u8>)>,
}

/// Local clone of a remote repository
pub trait WorkingCopy: Send {
    /// Directory the working copy lives in
    fn path(&self) -> &Path;

    /// Commit id HEAD points to; `None` on an unborn branch
    ///
    /// Fails with `NoGitRepository` when [`path`](Self::path) holds no repository.
    fn head(&self) -> Result<Option<String>>;

    /// Clone `url` at `branch` into [`path`](Self::path), which must be empty
    fn clone_repository(&mut self, url: &str, branch: &str) -> Result<()>;

    /// Write and stage the request's files, then commit them on HEAD
    ///
    /// Returns `None` without committing when the files leave the tree unchanged.
    fn commit(&mut self, request: &CommitRequest) -> Result<Option<String>>;

    /// Push the checked-out branch to its remote
    fn push(&mut self) -> Result<()>;
}

/// Repository path of a manifest file: `<target_path>/<namespace>/<file>`
///
/// Empty and `.` segments are dropped so a blank target path puts the
/// namespace directory at the repository root.
pub fn manifest_path(target_path: &str, namespace: &str, file: &str) -> String {
    [target_path, namespace, file]
        .iter()
        .flat_map(|part| part.split(['/', '\\']))
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            manifest_path("clusters/prod", "flux-system", "gotk-components.yaml"),
            "clusters/prod/flux-system/gotk-components.yaml"
        );
        assert_eq!(
            manifest_path("", "flux-system", "gotk-components.yaml"),
            "flux-system/gotk-components.yaml"
        );
        assert_eq!(
            manifest_path("./clusters//prod/", "ocm-system", "gotk-components.yaml"),
            "clusters/prod/ocm-system/gotk-components.yaml"
        );
    }
}
