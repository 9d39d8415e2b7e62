//! Analyzer invocation: runs `solidhunter` as a subprocess.
//!
//! One call spawns exactly one process. Retrying is the orchestrator's
//! decision; this module only reports what happened.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::types::AnalyzerConfig;

/// File name used for in-memory snapshots whose URI has no usable name.
const FALLBACK_SNAPSHOT_NAME: &str = "snapshot.sol";

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("no file path given to the analyzer")]
    EmptyPath,
    #[error("{command} not found in PATH")]
    NotFound { command: String },
    #[error("spawning {command}: {error}")]
    Spawn { command: String, error: io::Error },
    #[error("writing content snapshot: {0}")]
    Snapshot(io::Error),
    #[error("analyzer timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },
    #[error("analyzer exited with {}: {stderr}", describe_exit(.code))]
    Exit { code: Option<i32>, stderr: String },
    #[error("analyzer reported: {message}")]
    Reported { message: String },
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"))
}

impl InvokeError {
    /// Whether an immediate second attempt could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Spawn { error, .. } => error.kind() != io::ErrorKind::NotFound,
            Self::Snapshot(_) | Self::Timeout { .. } => true,
            Self::EmptyPath | Self::NotFound { .. } | Self::Exit { .. } | Self::Reported { .. } => {
                false
            }
        }
    }
}

/// Out-of-process static analyzer.
///
/// `config` is the resolved analyzer config file; `None` means the analyzer
/// uses its defaults.
pub trait Analyzer: Send + Sync + 'static {
    /// Lint the file as it exists on disk.
    fn lint_file(
        &self,
        path: &Path,
        config: Option<&Path>,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send;

    /// Lint `content` as if it were the contents of `path`.
    fn lint_content(
        &self,
        path: &Path,
        content: &str,
        config: Option<&Path>,
    ) -> impl Future<Output = Result<String, InvokeError>> + Send;
}

/// [`Analyzer`] backed by the `solidhunter` CLI.
#[derive(Debug, Clone)]
pub struct CommandAnalyzer {
    config: AnalyzerConfig,
}

impl CommandAnalyzer {
    #[must_use]
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    async fn run(&self, target: &Path, config: Option<&Path>) -> Result<String, InvokeError> {
        let command = self.config.command();
        let resolved = resolve_command(command).await?;

        let args = build_args(self.config.args(), target, config);
        tracing::debug!(
            command = %resolved.display(),
            target = %target.display(),
            "Running analyzer"
        );

        let child = Command::new(&resolved)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| InvokeError::Spawn {
                command: command.to_string(),
                error,
            })?;

        // On timeout the future is dropped together with the child, and
        // kill_on_drop reaps it.
        let timeout = self.config.timeout();
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(error)) => {
                return Err(InvokeError::Spawn {
                    command: command.to_string(),
                    error,
                });
            }
            Err(_) => return Err(InvokeError::Timeout { after: timeout }),
        };

        interpret_output(
            output.status.success(),
            output.status.code(),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        )
    }
}

impl Analyzer for CommandAnalyzer {
    async fn lint_file(&self, path: &Path, config: Option<&Path>) -> Result<String, InvokeError> {
        if path.as_os_str().is_empty() {
            return Err(InvokeError::EmptyPath);
        }
        self.run(path, config).await
    }

    async fn lint_content(
        &self,
        path: &Path,
        content: &str,
        config: Option<&Path>,
    ) -> Result<String, InvokeError> {
        if path.as_os_str().is_empty() {
            return Err(InvokeError::EmptyPath);
        }

        // The snapshot keeps the original file name so the analyzer sees the
        // same extension; the directory is removed when `dir` drops.
        let dir = tempfile::Builder::new()
            .prefix("solidhunter-")
            .tempdir()
            .map_err(InvokeError::Snapshot)?;
        let snapshot = snapshot_path(dir.path(), path);
        tokio::fs::write(&snapshot, content)
            .await
            .map_err(InvokeError::Snapshot)?;

        self.run(&snapshot, config).await
    }
}

/// Look `command` up in `PATH` off the async workers.
async fn resolve_command(command: &str) -> Result<PathBuf, InvokeError> {
    let owned = command.to_string();
    let lookup = tokio::task::spawn_blocking(move || which::which(owned)).await;
    match lookup {
        Ok(Ok(path)) => Ok(path),
        Ok(Err(_)) => Err(InvokeError::NotFound {
            command: command.to_string(),
        }),
        Err(e) => Err(InvokeError::Spawn {
            command: command.to_string(),
            error: io::Error::other(e),
        }),
    }
}

/// `[extra..] -j -f <target> [-r <config>]`
pub(crate) fn build_args(extra: &[String], target: &Path, config: Option<&Path>) -> Vec<OsString> {
    let mut args: Vec<OsString> = extra.iter().map(OsString::from).collect();
    args.push("-j".into());
    args.push("-f".into());
    args.push(target.as_os_str().to_owned());
    if let Some(config) = config.filter(|c| !c.as_os_str().is_empty()) {
        args.push("-r".into());
        args.push(config.as_os_str().to_owned());
    }
    args
}

fn snapshot_path(dir: &Path, original: &Path) -> PathBuf {
    let name = original
        .file_name()
        .map_or_else(|| OsString::from(FALLBACK_SNAPSHOT_NAME), ToOwned::to_owned);
    dir.join(name)
}

/// Classify a finished analyzer run.
///
/// Stdout starting with `E` is the analyzer's fatal-error convention and is
/// never handed to the decoder, whatever the exit status.
pub(crate) fn interpret_output(
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
) -> Result<String, InvokeError> {
    if !stderr.trim().is_empty() {
        tracing::debug!("Analyzer stderr: {}", stderr.trim_end());
    }

    if stdout.starts_with('E') {
        let message = stdout.lines().next().unwrap_or_default().trim().to_string();
        return Err(InvokeError::Reported { message });
    }

    if !success {
        return Err(InvokeError::Exit {
            code,
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(stdout)
}
