//! Settings file for the solidhunter language server.
//!
//! Read once at startup from `~/.solidhunter/ls.toml`, or from the path in
//! `SOLIDHUNTER_LS_CONFIG`. A missing file is not an error.

use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use solidhunter_lsp::AnalyzerConfig;

/// Environment variable naming an alternate settings file.
pub const CONFIG_PATH_ENV: &str = "SOLIDHUNTER_LS_CONFIG";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `"solidhunter_lsp=debug,info"`.
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub analyzer: Option<AnalyzerConfig>,
    pub log: Option<LogConfig>,
}

impl Settings {
    /// Load settings from the default location.
    ///
    /// Returns `Ok(None)` when no settings file exists.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&content)
            .map(Some)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Analyzer settings with `${VAR}` references in the command expanded.
    #[must_use]
    pub fn analyzer_config(&self) -> AnalyzerConfig {
        let mut config = self.analyzer.clone().unwrap_or_default();
        let command = expand_env_vars(config.command());
        config.set_command(command);
        config
    }

    #[must_use]
    pub fn log_filter(&self) -> Option<&str> {
        self.log
            .as_ref()
            .and_then(|log| log.filter.as_deref())
            .filter(|filter| !filter.trim().is_empty())
    }
}

/// Replace `${VAR}` with the variable's value, or nothing when unset.
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let var = &after[..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    data_dir().map(|dir| dir.join("ls.toml"))
}

/// `~/.solidhunter`, home of the settings file and logs.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".solidhunter"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    // expand_env_vars tests

    #[test]
    fn expand_env_vars_no_vars() {
        assert_eq!(expand_env_vars("solidhunter"), "solidhunter");
    }

    #[test]
    fn expand_env_vars_single_var() {
        unsafe {
            std::env::set_var("SH_TEST_TOOLS_DIR", "/opt/tools");
        }
        let result = expand_env_vars("${SH_TEST_TOOLS_DIR}/bin/solidhunter");
        assert_eq!(result, "/opt/tools/bin/solidhunter");
        unsafe {
            std::env::remove_var("SH_TEST_TOOLS_DIR");
        }
    }

    #[test]
    fn expand_env_vars_missing_var_becomes_empty() {
        unsafe {
            std::env::remove_var("SH_TEST_MISSING_VAR");
        }
        assert_eq!(expand_env_vars("a${SH_TEST_MISSING_VAR}b"), "ab");
    }

    #[test]
    fn expand_env_vars_unterminated_kept() {
        assert_eq!(expand_env_vars("bin/${HOME"), "bin/${HOME");
        assert_eq!(expand_env_vars("${}x"), "x");
    }

    // parsing tests

    #[test]
    fn parse_empty_uses_defaults() {
        let settings = Settings::parse("").unwrap();
        assert!(settings.analyzer.is_none());
        let analyzer = settings.analyzer_config();
        assert_eq!(analyzer.command(), "solidhunter");
        assert_eq!(analyzer.timeout(), Duration::from_secs(10));
        assert_eq!(analyzer.retries(), 1);
        assert!(analyzer.handles_language("solidity"));
        assert!(settings.log_filter().is_none());
    }

    #[test]
    fn parse_analyzer_table() {
        let settings = Settings::parse(
            r#"
            [analyzer]
            command = "/usr/local/bin/solidhunter"
            args = ["--no-color"]
            timeout_secs = 30
            retries = 0
            language_ids = ["solidity"]
            config_file_name = "hunter.json"

            [log]
            filter = "solidhunter_lsp=debug"
            "#,
        )
        .unwrap();

        let analyzer = settings.analyzer_config();
        assert_eq!(analyzer.command(), "/usr/local/bin/solidhunter");
        assert_eq!(analyzer.args(), ["--no-color".to_string()]);
        assert_eq!(analyzer.timeout(), Duration::from_secs(30));
        assert_eq!(analyzer.retries(), 0);
        assert!(!analyzer.handles_language("sol"));
        assert_eq!(analyzer.config_file_name(), "hunter.json");
        assert_eq!(settings.log_filter(), Some("solidhunter_lsp=debug"));
    }

    #[test]
    fn parse_partial_analyzer_table_keeps_defaults() {
        let settings = Settings::parse("[analyzer]\ntimeout_secs = 5000\n").unwrap();
        let analyzer = settings.analyzer_config();
        assert_eq!(analyzer.command(), "solidhunter");
        assert_eq!(analyzer.timeout(), Duration::from_secs(300));
        assert_eq!(analyzer.config_file_name(), ".solidhunter.json");
    }

    #[test]
    fn blank_log_filter_ignored() {
        let settings = Settings::parse("[log]\nfilter = \"  \"\n").unwrap();
        assert!(settings.log_filter().is_none());
    }

    #[test]
    fn parse_wrong_type_fails() {
        assert!(Settings::parse("[analyzer]\nretries = \"many\"\n").is_err());
    }

    // file loading tests

    #[test]
    fn load_from_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::load_from(&dir.path().join("ls.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ls.toml");
        fs::write(&path, "[analyzer]\ncommand = \"hunter\"\n").unwrap();

        let settings = Settings::load_from(&path).unwrap().unwrap();
        assert_eq!(settings.analyzer_config().command(), "hunter");
    }

    #[test]
    fn load_from_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ls.toml");
        fs::write(&path, "[analyzer\n").unwrap();

        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), path);
        assert!(err.to_string().contains("ls.toml"));
        // The TOML error is the source, not part of the message.
        let cause = std::error::Error::source(&err).unwrap().to_string();
        assert!(!err.to_string().contains(&cause));
    }

    #[test]
    fn load_from_directory_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load_from(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn config_path_honors_env_override() {
        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, "/tmp/custom-ls.toml");
        }
        assert_eq!(config_path(), Some(PathBuf::from("/tmp/custom-ls.toml")));
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
        }
        if let Some(path) = config_path() {
            assert!(path.ends_with(".solidhunter/ls.toml"));
        }
    }
}
