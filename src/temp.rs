//! Scratch directories for installs
//!
//! Each install gets its own directory holding the render directory and the
//! working copy. It is removed when the returned [`TempDir`] drops.

use std::env;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{BootstrapError, Result, ResultExt};

/// Absolute directory to create scratch directories in
///
/// A relative `TMPDIR` would put them under the current directory, which may
/// be the management repository itself.
pub fn temp_dir_base() -> PathBuf {
    let t = env::temp_dir();
    if t.is_absolute() {
        return t;
    }
    #[cfg(windows)]
    {
        env::var("TEMP")
            .or_else(|_| env::var("TMP"))
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
    }
    #[cfg(not(windows))]
    {
        PathBuf::from("/tmp")
    }
}

/// Create a scratch directory named `<prefix>*` under `base`
pub fn create_work_dir(base: &Path, prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(base)
        .map_err(BootstrapError::from)
        .with_context(|| format!("failed to create work directory under {}", base.display()))
}
