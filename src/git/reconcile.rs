//! Clone, commit and push cycle for generated manifests
//!
//! ```text
//! NoLocalCopy ──► Cloning ──► Cloned ──► Committing ──► NoChange ─────────────► Done
//!                                                  └──► Committed ──► Pushed ──► Done
//! ```
//!
//! An existing working copy skips straight to `Cloned`. Cloning is retried once
//! after a fixed delay and the directory is emptied before every attempt.
//! A commit that changes nothing is not pushed.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{CommitRequest, WorkingCopy};
use crate::cancel::CancelToken;
use crate::error::{BootstrapError, Result, git};

/// Retries after the first failed clone attempt
pub const MAX_CLONE_RETRIES: usize = 1;

/// Delay before retrying a failed clone
pub const DEFAULT_CLONE_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Position in the reconcile cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    NoLocalCopy,
    Cloning,
    Cloned,
    Committing,
    NoChange,
    Committed,
    Pushed,
    Done,
}

impl fmt::Display for ReconcileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileState::NoLocalCopy => "no local copy",
            ReconcileState::Cloning => "cloning",
            ReconcileState::Cloned => "cloned",
            ReconcileState::Committing => "committing",
            ReconcileState::NoChange => "no change",
            ReconcileState::Committed => "committed",
            ReconcileState::Pushed => "pushed",
            ReconcileState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What one reconcile did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether the working copy had to be cloned first
    pub cloned: bool,
    /// Clone attempts made, 0 when the working copy already existed
    pub clone_attempts: usize,
    /// Commit created by this reconcile, if any
    pub commit: Option<String>,
    pub pushed: bool,
    /// HEAD after the reconcile
    pub head: Option<String>,
    /// Every state passed through, in order
    pub states: Vec<ReconcileState>,
}

impl ReconcileOutcome {
    fn enter(&mut self, state: ReconcileState) {
        debug!(%state, "reconcile state");
        self.states.push(state);
    }
}

/// Commit message for component manifests
///
/// `Add <display> <version> component manifests`, followed by a blank line and
/// `appendix` when one is configured.
pub fn commit_message(display: &str, version: &str, appendix: Option<&str>) -> String {
    let message = format!("Add {display} {version} component manifests");
    match appendix {
        Some(appendix) if !appendix.is_empty() => format!("{message}\n\n{appendix}"),
        _ => message,
    }
}

/// Remove everything inside `dir`, creating it when missing
pub fn clean_dir(dir: &Path) -> Result<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir)
            .map_err(|e| git::clean_failed(dir.display().to_string(), e.to_string()));
    }

    let entries = fs::read_dir(dir)
        .map_err(|e| git::clean_failed(dir.display().to_string(), e.to_string()))?;
    let mut failures = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(entry) => entry.path(),
            Err(e) => {
                failures.push(e.to_string());
                continue;
            }
        };
        let removed = if path.is_dir() && !path.is_symlink() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = removed {
            failures.push(format!("{}: {}", path.display(), e));
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(git::clean_failed(
            dir.display().to_string(),
            failures.join("; "),
        ))
    }
}

/// Drives a [`WorkingCopy`] through the reconcile cycle
#[derive(Debug, Clone)]
pub struct GitReconciler {
    url: String,
    branch: String,
    retry_delay: Duration,
}

impl GitReconciler {
    pub fn new(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            retry_delay: DEFAULT_CLONE_RETRY_DELAY,
        }
    }

    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Clone into the working copy unless it already holds a repository
    ///
    /// Returns the number of clone attempts made.
    pub fn ensure_cloned(&self, wc: &mut dyn WorkingCopy, cancel: &CancelToken) -> Result<usize> {
        match wc.head() {
            Ok(_) => return Ok(0),
            Err(e) if e.is_no_repository() => {}
            Err(e) => return Err(e),
        }

        let max_attempts = MAX_CLONE_RETRIES + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            cancel.check()?;

            clean_dir(wc.path())?;
            info!(url = %self.url, branch = %self.branch, attempt, "cloning repository");
            let err = match wc.clone_repository(&self.url, &self.branch) {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };

            let err = match err {
                BootstrapError::CloneAttemptFailed { .. } => err,
                other => git::clone_attempt_failed(&self.url, other.to_string()),
            };
            if attempt >= max_attempts {
                return Err(git::clone_failed(&self.url, attempt, err));
            }
            warn!(
                url = %self.url,
                error = %err,
                delay = ?self.retry_delay,
                "clone failed, retrying"
            );
            cancel.sleep(self.retry_delay)?;
        }
    }

    /// Commit `request` and push it when a commit was created
    pub fn commit_and_push(
        &self,
        wc: &mut dyn WorkingCopy,
        request: &CommitRequest,
    ) -> Result<Option<String>> {
        let commit = wc.commit(request)?;
        match &commit {
            Some(id) => {
                wc.push()?;
                info!(commit = %id, branch = %self.branch, "pushed manifests");
            }
            None => info!(branch = %self.branch, "manifests unchanged, nothing to push"),
        }
        Ok(commit)
    }

    /// Run the full cycle: clone if needed, commit, push
    pub fn reconcile(
        &self,
        wc: &mut dyn WorkingCopy,
        request: &CommitRequest,
        cancel: &CancelToken,
    ) -> Result<ReconcileOutcome> {
        let mut outcome = ReconcileOutcome::default();

        match wc.head() {
            Ok(_) => {}
            Err(e) if e.is_no_repository() => {
                outcome.enter(ReconcileState::NoLocalCopy);
                outcome.enter(ReconcileState::Cloning);
            }
            Err(e) => return Err(e),
        }
        outcome.clone_attempts = self.ensure_cloned(wc, cancel)?;
        outcome.cloned = outcome.clone_attempts > 0;
        outcome.enter(ReconcileState::Cloned);

        cancel.check()?;
        outcome.enter(ReconcileState::Committing);
        let commit = self.commit_and_push(wc, request)?;
        if commit.is_some() {
            outcome.enter(ReconcileState::Committed);
            outcome.pushed = true;
            outcome.enter(ReconcileState::Pushed);
        } else {
            outcome.enter(ReconcileState::NoChange);
        }
        outcome.commit = commit;
        outcome.head = wc.head()?;
        outcome.enter(ReconcileState::Done);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    /// Scripted working copy recording every call
    struct ScriptedCopy {
        path: PathBuf,
        has_repo: bool,
        clone_failures: usize,
        seen_on_clone: Vec<usize>,
        commits: Vec<CommitRequest>,
        pushes: usize,
        tree: Option<Vec<(String, Vec<u8>)>>,
    }

    impl ScriptedCopy {
        fn new(path: &Path, clone_failures: usize) -> Self {
            Self {
                path: path.to_path_buf(),
                has_repo: false,
                clone_failures,
                seen_on_clone: Vec::new(),
                commits: Vec::new(),
                pushes: 0,
                tree: None,
            }
        }
    }

    impl WorkingCopy for ScriptedCopy {
        fn path(&self) -> &Path {
            &self.path
        }

        fn head(&self) -> Result<Option<String>> {
            if !self.has_repo {
                return Err(git::no_repository(self.path.display().to_string()));
            }
            Ok(Some(format!("commit-{}", self.commits.len())))
        }

        fn clone_repository(&mut self, url: &str, _branch: &str) -> Result<()> {
            self.seen_on_clone
                .push(fs::read_dir(&self.path).unwrap().count());
            // leave debris behind, as a half-finished clone would
            fs::write(self.path.join("partial"), "x").unwrap();
            if self.clone_failures > 0 {
                self.clone_failures -= 1;
                return Err(git::clone_attempt_failed(url, "connection reset"));
            }
            self.has_repo = true;
            Ok(())
        }

        fn commit(&mut self, request: &CommitRequest) -> Result<Option<String>> {
            if self.tree.as_ref() == Some(&request.files) {
                return Ok(None);
            }
            self.tree = Some(request.files.clone());
            self.commits.push(request.clone());
            Ok(Some(format!("commit-{}", self.commits.len())))
        }

        fn push(&mut self) -> Result<()> {
            self.pushes += 1;
            Ok(())
        }
    }

    fn request() -> CommitRequest {
        CommitRequest {
            author_name: "Flux".to_string(),
            author_email: "flux@users.noreply.local".to_string(),
            message: commit_message("Flux", "v2.1.0", None),
            files: vec![(
                "flux-system/gotk-components.yaml".to_string(),
                b"kind: List\n".to_vec(),
            )],
        }
    }

    fn reconciler() -> GitReconciler {
        GitReconciler::new("https://example.com/mgmt.git", "main")
            .with_retry_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_commit_message() {
        assert_eq!(
            commit_message("Flux", "v2.1.0", None),
            "Add Flux v2.1.0 component manifests"
        );
        assert_eq!(
            commit_message("Flux", "v2.1.0", Some("Signed-off-by: ci")),
            "Add Flux v2.1.0 component manifests\n\nSigned-off-by: ci"
        );
        assert_eq!(
            commit_message("Flux", "v2.1.0", Some("")),
            "Add Flux v2.1.0 component manifests"
        );
    }

    #[test]
    fn test_reconcile_twice_pushes_once() {
        let temp = TempDir::new().unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 0);
        let reconciler = reconciler();
        let cancel = CancelToken::new();

        let first = reconciler.reconcile(&mut wc, &request(), &cancel).unwrap();
        assert!(first.cloned);
        assert!(first.pushed);
        assert_eq!(
            first.states,
            vec![
                ReconcileState::NoLocalCopy,
                ReconcileState::Cloning,
                ReconcileState::Cloned,
                ReconcileState::Committing,
                ReconcileState::Committed,
                ReconcileState::Pushed,
                ReconcileState::Done,
            ]
        );

        let second = reconciler.reconcile(&mut wc, &request(), &cancel).unwrap();
        assert!(!second.cloned);
        assert!(!second.pushed);
        assert_eq!(second.commit, None);
        assert_eq!(
            second.states,
            vec![
                ReconcileState::Cloned,
                ReconcileState::Committing,
                ReconcileState::NoChange,
                ReconcileState::Done,
            ]
        );
        assert_eq!(wc.pushes, 1);
    }

    #[test]
    fn test_reconcile_after_commit_and_push_is_no_change() {
        let temp = TempDir::new().unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 0);
        wc.has_repo = true;
        let reconciler = reconciler();

        let commit = reconciler.commit_and_push(&mut wc, &request()).unwrap();
        assert!(commit.is_some());
        assert_eq!(wc.pushes, 1);

        let outcome = reconciler
            .reconcile(&mut wc, &request(), &CancelToken::new())
            .unwrap();
        assert!(!outcome.pushed);
        assert!(outcome.states.contains(&ReconcileState::NoChange));
        assert!(!outcome.states.contains(&ReconcileState::Pushed));
        assert_eq!(wc.pushes, 1);
    }

    #[test]
    fn test_clone_retried_once_on_clean_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("stale"), "old").unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 1);

        let attempts = reconciler()
            .ensure_cloned(&mut wc, &CancelToken::new())
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(wc.seen_on_clone, vec![0, 0]);
    }

    #[test]
    fn test_clone_gives_up_after_one_retry() {
        let temp = TempDir::new().unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 5);

        let err = reconciler()
            .ensure_cloned(&mut wc, &CancelToken::new())
            .unwrap_err();
        match err {
            BootstrapError::CloneFailed { attempts, source, .. } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, BootstrapError::CloneAttemptFailed { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(wc.seen_on_clone.len(), 2);
    }

    #[test]
    fn test_clone_retry_wait_is_cancellable() {
        let temp = TempDir::new().unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 1);
        let cancel = CancelToken::new();
        let reconciler = reconciler().with_retry_delay(Duration::from_secs(60));

        let canceller = cancel.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            canceller.cancel();
        });
        let err = reconciler.ensure_cloned(&mut wc, &cancel).unwrap_err();
        handle.join().unwrap();

        assert!(matches!(err, BootstrapError::Cancelled));
        assert_eq!(wc.seen_on_clone.len(), 1);
    }

    #[test]
    fn test_existing_copy_is_not_cloned() {
        let temp = TempDir::new().unwrap();
        let mut wc = ScriptedCopy::new(temp.path(), 0);
        wc.has_repo = true;

        assert_eq!(
            reconciler()
                .ensure_cloned(&mut wc, &CancelToken::new())
                .unwrap(),
            0
        );
        assert!(wc.seen_on_clone.is_empty());
    }

    #[test]
    fn test_clean_dir_empties_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("a/b/c.yaml"), "x").unwrap();
        fs::write(temp.path().join(".git"), "gitdir: elsewhere").unwrap();

        clean_dir(temp.path()).unwrap();
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);

        let missing = temp.path().join("missing");
        clean_dir(&missing).unwrap();
        assert!(missing.is_dir());
    }
}
