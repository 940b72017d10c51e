//! Abstraction over external command execution
//!
//! `kustomize` and `kubectl` are reached through [`CommandRunner`] so the
//! renderer and the cluster client can be exercised without spawning processes.
//! [`SystemCommandRunner`] is the production implementation.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::error::{Result, cluster};

/// Options for one command invocation
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Bytes written to the child's stdin
    pub stdin: Option<Vec<u8>>,
}

impl CommandOptions {
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }

    pub fn with_stdin(stdin: impl Into<Vec<u8>>) -> Self {
        Self {
            stdin: Some(stdin.into()),
            ..Default::default()
        }
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Runs external programs
pub trait CommandRunner: Send + Sync {
    /// Run `program` to completion and capture its output
    ///
    /// Only failures to launch are errors; a non-zero exit is reported through
    /// [`CommandOutput::success`].
    fn run(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<CommandOutput>;

    /// Run `program` and return its stdout, failing on a non-zero exit
    fn run_checked(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<Vec<u8>> {
        let output = self.run(program, args, options)?;
        if output.success {
            return Ok(output.stdout);
        }
        let status = output
            .code
            .map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"));
        let stderr = output.stderr_lossy();
        let reason = if stderr.is_empty() {
            status
        } else {
            format!("{status}: {stderr}")
        };
        Err(cluster::command_failed(program, reason))
    }
}

/// Production runner delegating to [`std::process::Command`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<CommandOutput> {
        debug!(program, ?args, "running command");

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if options.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &options.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .map_err(|e| cluster::command_failed(program, e.to_string()))?;

        // Feed stdin from a separate thread so a full stdout pipe cannot deadlock us
        let writer = match (child.stdin.take(), options.stdin.clone()) {
            (Some(mut stdin), Some(data)) => {
                Some(thread::spawn(move || stdin.write_all(&data)))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .map_err(|e| cluster::command_failed(program, e.to_string()))?;

        if let Some(writer) = writer {
            match writer.join() {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(cluster::command_failed(program, e.to_string())),
                Err(_) => {
                    return Err(cluster::command_failed(program, "stdin writer panicked"));
                }
            }
        }

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
