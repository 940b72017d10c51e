//! libgit2-backed working copy
//!
//! This module handles:
//! - Cloning the management repository at a branch
//! - Initializing an unborn branch when the remote has no refs yet
//! - Committing files and pushing the checked-out branch

use std::cell::RefCell;
use std::fs;
use std::path::{Component, Path, PathBuf};

use git2::{
    ErrorCode, FetchOptions, PushOptions, RemoteCallbacks, Repository, build::RepoBuilder,
};
use tracing::debug;

use super::auth::{GitCredentials, setup_auth_callbacks};
use super::error::interpret_git_error;
use super::reconcile::clean_dir;
use super::url::normalize_file_url_for_clone;
use super::{CommitRequest, WorkingCopy};
use crate::error::{Result, git};

/// Name of the remote the working copy pushes to
const ORIGIN: &str = "origin";

/// Working copy of a repository on local disk
pub struct Git2WorkingCopy {
    path: PathBuf,
    credentials: Option<GitCredentials>,
}

impl Git2WorkingCopy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            credentials: None,
        }
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<GitCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.path).map_err(|e| {
            if e.code() == ErrorCode::NotFound {
                git::no_repository(self.path.display().to_string())
            } else {
                git::operation_failed(interpret_git_error(&e))
            }
        })
    }

    fn callbacks<'a>(&self) -> RemoteCallbacks<'a> {
        let mut callbacks = RemoteCallbacks::new();
        setup_auth_callbacks(&mut callbacks, self.credentials.as_ref());
        callbacks
    }

    /// Start an unborn `branch` tracking `url` if the remote has no branches yet
    ///
    /// Fetches instead of listing the advertised refs: git2 cannot list an
    /// empty advertisement. Returns false when the remote has branches.
    fn init_if_remote_empty(
        &self,
        url: &str,
        branch: &str,
    ) -> std::result::Result<bool, git2::Error> {
        let repo = Repository::init(&self.path)?;
        let mut remote = repo.remote(ORIGIN, url)?;
        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.callbacks());
        remote.fetch(
            &["+refs/heads/*:refs/remotes/origin/*"],
            Some(&mut fetch_options),
            None,
        )?;
        if repo.references_glob("refs/remotes/origin/*")?.next().is_some() {
            return Ok(false);
        }
        repo.set_head(&format!("refs/heads/{branch}"))?;
        Ok(true)
    }
}

/// Reject paths that are absolute or climb out of the working copy
fn is_contained(relative: &str) -> bool {
    let path = Path::new(relative);
    !relative.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl WorkingCopy for Git2WorkingCopy {
    fn path(&self) -> &Path {
        &self.path
    }

    fn head(&self) -> Result<Option<String>> {
        let repo = self.open()?;
        match repo.head() {
            Ok(head) => Ok(head.target().map(|oid| oid.to_string())),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(None)
            }
            Err(e) => Err(git::operation_failed(interpret_git_error(&e))),
        }
    }

    fn clone_repository(&mut self, url: &str, branch: &str) -> Result<()> {
        let url_to_clone = normalize_file_url_for_clone(url);

        let mut fetch_options = FetchOptions::new();
        fetch_options.remote_callbacks(self.callbacks());

        let mut builder = RepoBuilder::new();
        builder.branch(branch).fetch_options(fetch_options);

        match builder.clone(url_to_clone.as_ref(), &self.path) {
            Ok(_) => {
                debug!(url, branch, path = %self.path.display(), "cloned repository");
                Ok(())
            }
            Err(clone_err) => {
                // A freshly created remote has no branch to check out yet
                clean_dir(&self.path)?;
                match self.init_if_remote_empty(url_to_clone.as_ref(), branch) {
                    Ok(true) => {
                        debug!(url, branch, "remote is empty, starting an unborn branch");
                        Ok(())
                    }
                    Ok(false) | Err(_) => {
                        clean_dir(&self.path)?;
                        Err(git::clone_attempt_failed(url, interpret_git_error(&clone_err)))
                    }
                }
            }
        }
    }

    fn commit(&mut self, request: &CommitRequest) -> Result<Option<String>> {
        let paths = request
            .files
            .iter()
            .map(|(p, _)| p.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let fail = |reason: String| git::commit_failed(paths.clone(), reason);

        let repo = self.open()?;

        for (relative, content) in &request.files {
            if !is_contained(relative) {
                return Err(fail(format!("'{relative}' is not a relative path")));
            }
            let full = self.path.join(relative);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).map_err(|e| fail(e.to_string()))?;
            }
            fs::write(&full, content).map_err(|e| fail(e.to_string()))?;
        }

        let git_err = |e: git2::Error| fail(interpret_git_error(&e));
        let mut index = repo.index().map_err(git_err)?;
        for (relative, _) in &request.files {
            index.add_path(Path::new(relative)).map_err(git_err)?;
        }
        index.write().map_err(git_err)?;
        let tree_id = index.write_tree().map_err(git_err)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit().map_err(git_err)?),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => None,
            Err(e) => return Err(git_err(e)),
        };

        let unchanged = match &parent {
            Some(parent) => parent.tree_id() == tree_id,
            None => index.is_empty(),
        };
        if unchanged {
            debug!(path = %self.path.display(), "nothing to commit");
            return Ok(None);
        }

        let tree = repo.find_tree(tree_id).map_err(git_err)?;
        let signature = git2::Signature::now(&request.author_name, &request.author_email)
            .map_err(git_err)?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let oid = repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                &request.message,
                &tree,
                &parents,
            )
            .map_err(git_err)?;

        debug!(commit = %oid, files = %paths, "created commit");
        Ok(Some(oid.to_string()))
    }

    fn push(&mut self) -> Result<()> {
        let repo = self.open()?;
        let head = repo
            .head()
            .map_err(|e| git::push_failed(interpret_git_error(&e)))?;
        let refname = head
            .name()
            .ok_or_else(|| git::push_failed("HEAD is not a valid UTF-8 reference"))?
            .to_string();
        if !head.is_branch() {
            return Err(git::push_failed("HEAD is detached"));
        }

        let mut remote = repo
            .find_remote(ORIGIN)
            .map_err(|e| git::push_failed(interpret_git_error(&e)))?;

        let rejected = RefCell::new(None);
        let mut callbacks = self.callbacks();
        callbacks.push_update_reference(|reference, status| {
            if let Some(message) = status {
                *rejected.borrow_mut() = Some(format!("{reference}: {message}"));
            }
            Ok(())
        });

        let mut push_options = PushOptions::new();
        push_options.remote_callbacks(callbacks);
        remote
            .push(&[format!("{refname}:{refname}")], Some(&mut push_options))
            .map_err(|e| git::push_failed(interpret_git_error(&e)))?;
        drop(push_options);

        if let Some(reason) = rejected.take() {
            return Err(git::push_failed(format!("remote rejected {reason}")));
        }
        debug!(reference = %refname, "pushed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BootstrapError;
    use tempfile::TempDir;

    fn request(files: &[(&str, &str)]) -> CommitRequest {
        CommitRequest {
            author_name: "Flux".to_string(),
            author_email: "flux@users.noreply.local".to_string(),
            message: "Add manifests".to_string(),
            files: files
                .iter()
                .map(|(p, c)| ((*p).to_string(), c.as_bytes().to_vec()))
                .collect(),
        }
    }

    /// Bare remote holding one commit on `main`
    fn seeded_remote(root: &Path) -> PathBuf {
        let remote = root.join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let seed_dir = root.join("seed");
        let mut seed = Git2WorkingCopy::new(&seed_dir);
        seed.clone_repository(remote.to_str().unwrap(), "main").unwrap();
        seed.commit(&request(&[("README.md", "# management\n")]))
            .unwrap()
            .unwrap();
        seed.push().unwrap();
        remote
    }

    #[test]
    fn test_head_without_repository() {
        let temp = TempDir::new().unwrap();
        let wc = Git2WorkingCopy::new(temp.path());
        let err = wc.head().unwrap_err();
        assert!(matches!(err, BootstrapError::NoGitRepository { .. }));
        assert!(err.is_no_repository());
    }

    #[test]
    fn test_clone_empty_remote_starts_unborn_branch() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let mut wc = Git2WorkingCopy::new(temp.path().join("wc"));
        wc.clone_repository(remote.to_str().unwrap(), "main").unwrap();
        assert_eq!(wc.head().unwrap(), None);
    }

    #[test]
    fn test_clone_empty_remote_commits_and_pushes() {
        let temp = TempDir::new().unwrap();
        let remote = temp.path().join("remote.git");
        Repository::init_bare(&remote).unwrap();

        let mut wc = Git2WorkingCopy::new(temp.path().join("wc"));
        wc.clone_repository(remote.to_str().unwrap(), "main").unwrap();
        let commit = wc
            .commit(&request(&[("flux-system/gotk-components.yaml", "kind: List\n")]))
            .unwrap()
            .unwrap();
        wc.push().unwrap();

        let bare = Repository::open_bare(&remote).unwrap();
        let main = bare.find_reference("refs/heads/main").unwrap();
        assert_eq!(main.target().unwrap().to_string(), commit);
    }

    #[test]
    fn test_clone_missing_branch_fails_and_leaves_directory_empty() {
        let temp = TempDir::new().unwrap();
        let remote = seeded_remote(temp.path());
        let path = temp.path().join("wc");

        let mut wc = Git2WorkingCopy::new(&path);
        let err = wc
            .clone_repository(remote.to_str().unwrap(), "release")
            .unwrap_err();
        assert!(matches!(err, BootstrapError::CloneAttemptFailed { .. }));
        assert_eq!(fs::read_dir(&path).unwrap().count(), 0);
    }

    #[test]
    fn test_commit_push_and_no_change() {
        let temp = TempDir::new().unwrap();
        let remote = seeded_remote(temp.path());

        let mut wc = Git2WorkingCopy::new(temp.path().join("wc"));
        wc.clone_repository(remote.to_str().unwrap(), "main").unwrap();
        let before = wc.head().unwrap();
        assert!(before.is_some());

        let files = [("clusters/flux-system/gotk-components.yaml", "kind: List\n")];
        let commit = wc.commit(&request(&files)).unwrap().unwrap();
        wc.push().unwrap();
        assert_eq!(wc.head().unwrap(), Some(commit.clone()));

        let bare = Repository::open_bare(&remote).unwrap();
        let remote_main = bare.find_reference("refs/heads/main").unwrap();
        assert_eq!(remote_main.target().unwrap().to_string(), commit);

        assert_eq!(wc.commit(&request(&files)).unwrap(), None);
    }

    #[test]
    fn test_clone_missing_remote_fails() {
        let temp = TempDir::new().unwrap();
        let mut wc = Git2WorkingCopy::new(temp.path().join("wc"));
        let err = wc
            .clone_repository(temp.path().join("missing.git").to_str().unwrap(), "main")
            .unwrap_err();
        assert!(matches!(err, BootstrapError::CloneAttemptFailed { .. }));
    }

    #[test]
    fn test_commit_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let remote = seeded_remote(temp.path());
        let mut wc = Git2WorkingCopy::new(temp.path().join("wc"));
        wc.clone_repository(remote.to_str().unwrap(), "main").unwrap();

        let err = wc.commit(&request(&[("../outside.yaml", "x")])).unwrap_err();
        assert!(matches!(err, BootstrapError::CommitFailed { .. }));
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained("a/b/c.yaml"));
        assert!(!is_contained("/etc/passwd"));
        assert!(!is_contained("a/../../b"));
        assert!(!is_contained(""));
    }
}
