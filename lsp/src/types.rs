//! Public types shared by the pipeline and its embedders.
//!
//! The binary constructs an [`AnalyzerConfig`], the pipeline produces
//! [`Diagnostic`]s, and the session layer serializes them for the editor.

use serde::Deserialize;
use std::time::Duration;

/// Provenance tag attached to every diagnostic this pipeline produces.
pub const DIAGNOSTIC_SOURCE: &str = "solidhunter";

/// File name of the analyzer configuration at the workspace root.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".solidhunter.json";

const DEFAULT_COMMAND: &str = "solidhunter";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 300;
const DEFAULT_RETRIES: u8 = 1;
const MAX_RETRIES: u8 = 3;

/// Configuration for the external analyzer and the documents it handles.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Executable name or path (e.g. "solidhunter"). `${VAR}` references are
    /// expanded by the config loader.
    command: String,
    /// Extra arguments placed before the standard `-j -f <file> -r <config>` flags.
    args: Vec<String>,
    /// Upper bound on a single analyzer run.
    timeout_secs: u64,
    /// Immediate retries of transient failures before giving up.
    retries: u8,
    /// Editor language identifiers that trigger validation.
    language_ids: Vec<String>,
    /// File name joined onto the first workspace folder to locate the analyzer config.
    config_file_name: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            retries: DEFAULT_RETRIES,
            language_ids: vec!["solidity".to_string(), "sol".to_string()],
            config_file_name: DEFAULT_CONFIG_FILE_NAME.to_string(),
        }
    }
}

impl AnalyzerConfig {
    #[must_use]
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_retries(mut self, retries: u8) -> Self {
        self.retries = retries;
        self
    }

    #[must_use]
    pub fn with_language_ids(mut self, ids: Vec<String>) -> Self {
        self.language_ids = ids;
        self
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Run timeout, clamped to 1..=300 seconds.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(1, MAX_TIMEOUT_SECS))
    }

    /// Retry budget, clamped to at most 3.
    #[must_use]
    pub fn retries(&self) -> u8 {
        self.retries.min(MAX_RETRIES)
    }

    #[must_use]
    pub fn config_file_name(&self) -> &str {
        &self.config_file_name
    }

    /// Whether documents with this language identifier are validated.
    #[must_use]
    pub fn handles_language(&self, language_id: &str) -> bool {
        self.language_ids.iter().any(|id| id == language_id)
    }

    /// Replace `command` in place (used after `${VAR}` expansion).
    pub fn set_command(&mut self, command: String) {
        self.command = command;
    }
}

/// Normalized severity, numbered as the editor protocol numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error = 1,
    Warning = 2,
    Info = 3,
    Hint = 4,
}

impl Severity {
    /// Map an analyzer severity label.
    ///
    /// Matching is exact. Unknown labels fall back to `Error` so a finding is
    /// never lost to an unexpected label.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label {
            "WARNING" => Self::Warning,
            "INFO" => Self::Info,
            "HINT" => Self::Hint,
            _ => Self::Error,
        }
    }

    /// Editor-protocol numeric value.
    #[must_use]
    pub fn as_lsp(self) -> u8 {
        self as u8
    }
}

/// 0-based position. `character` is an offset within the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// 0-based range in editor convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// A single normalized finding for one document.
///
/// Fields are private; values are immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    severity: Severity,
    range: Range,
    message: String,
}

impl Diagnostic {
    #[must_use]
    pub fn new(severity: Severity, range: Range, message: String) -> Self {
        Self {
            severity,
            range,
            message,
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn range(&self) -> Range {
        self.range
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Always [`DIAGNOSTIC_SOURCE`].
    #[must_use]
    pub fn source(&self) -> &'static str {
        DIAGNOSTIC_SOURCE
    }
}
