//! solidhunter-ls - stdio language server for the solidhunter analyzer.
//!
//! ```text
//! main() -> Settings::load() -> init_tracing() -> serve(stdin, stdout) -> Exit
//! ```
//!
//! Stdout carries the editor protocol, so logs never go there: they land in
//! `~/.solidhunter/logs/ls.log`, or on stderr when no log file can be opened.

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    path::PathBuf,
    process::ExitCode,
    sync::Mutex,
    time::Duration,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use solidhunter_config::{ConfigError, Settings};
use solidhunter_lsp::{CommandAnalyzer, Exit, serve};

/// Grace period for background tasks once the session is over. A pending
/// stdin read holds a blocking thread that never finishes on its own.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn init_tracing(settings_filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings_filter.unwrap_or("info")))
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .init();
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.solidhunter/logs/ls.log
    if let Some(data_dir) = solidhunter_config::data_dir() {
        candidates.push(data_dir.join("logs").join("ls.log"));
    }

    // Fallback: ./.solidhunter/logs/ls.log
    candidates.push(PathBuf::from(".solidhunter").join("logs").join("ls.log"));

    candidates
}

async fn run(settings: Settings) -> Result<Exit> {
    let config = settings.analyzer_config();
    tracing::info!(
        command = config.command(),
        timeout_secs = config.timeout().as_secs(),
        retries = config.retries(),
        "Starting solidhunter language server"
    );

    let analyzer = CommandAnalyzer::new(config.clone());
    serve(tokio::io::stdin(), tokio::io::stdout(), analyzer, config)
        .await
        .context("editor session failed")
}

fn main() -> ExitCode {
    let (settings, load_error) = match Settings::load() {
        Ok(settings) => (settings.unwrap_or_default(), None),
        Err(e) => (Settings::default(), Some(e)),
    };

    init_tracing(settings.log_filter());
    if let Some(e) = load_error {
        report_config_error(e);
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!("Failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(settings));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(exit) => {
            tracing::info!(code = exit.code(), "Exiting");
            ExitCode::from(u8::try_from(exit.code()).unwrap_or(1))
        }
        Err(e) => {
            tracing::error!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn report_config_error(e: ConfigError) {
    let path = e.path().to_path_buf();
    let err = anyhow::Error::new(e);
    tracing::warn!(path = %path.display(), "Ignoring settings file: {err:#}");
}
