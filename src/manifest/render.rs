//! Kustomize rendering
//!
//! [`Renderer`] turns a directory holding a `kustomization.yaml` into one
//! multi-document YAML stream. [`KustomizeCommand`] shells out to the
//! standalone `kustomize` binary, or to `kubectl kustomize` when configured so.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::command::{CommandOptions, CommandRunner};
use crate::error::{Result, manifest};

/// Builds a kustomization directory into YAML
pub trait Renderer: Send + Sync {
    fn render(&self, dir: &Path) -> Result<Vec<u8>>;
}

/// Renders by running an external kustomize build
pub struct KustomizeCommand {
    runner: Arc<dyn CommandRunner>,
    program: String,
    via_kubectl: bool,
}

impl KustomizeCommand {
    /// Use the standalone `kustomize build <dir>`
    pub fn kustomize(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            via_kubectl: false,
        }
    }

    /// Use `kubectl kustomize <dir>`
    pub fn kubectl(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
            via_kubectl: true,
        }
    }
}

impl Renderer for KustomizeCommand {
    fn render(&self, dir: &Path) -> Result<Vec<u8>> {
        let dir_arg = dir.to_string_lossy();
        let subcommand = if self.via_kubectl { "kustomize" } else { "build" };
        debug!(program = %self.program, dir = %dir_arg, "rendering kustomization");

        self.runner
            .run_checked(
                &self.program,
                &[subcommand, dir_arg.as_ref()],
                &CommandOptions::default(),
            )
            .map_err(|e| manifest::render_failed(dir_arg.as_ref(), e.to_string()))
    }
}
