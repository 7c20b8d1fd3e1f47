use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub log_server: LogServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

/// Connection parameters for the remote log host.
#[derive(Debug, Deserialize, Clone)]
pub struct LogServerConfig {
    pub host: String,
    pub username: String,
    /// Credential handed to the transport via the process environment
    /// (`SSHPASS`); key-based auth leaves this empty.
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_base_directory")]
    pub base_directory: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_directory() -> String {
    "/logs/".to_string()
}
fn default_port() -> u16 {
    22
}
fn default_timeout_secs() -> u64 {
    30
}

/// Search tuning parameters for the remote grep.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Output cap applied on the remote side (`| head -N`).
    #[serde(default = "default_max_lines")]
    pub max_lines: usize,
    /// Symmetric context window (`-A n -B n`); 0 disables it.
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default)]
    pub case_insensitive: bool,
    /// Expected trace identifier length; a mismatch only warns.
    #[serde(default = "default_tid_length")]
    pub tid_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_lines: default_max_lines(),
            context_lines: default_context_lines(),
            case_insensitive: false,
            tid_length: default_tid_length(),
        }
    }
}

fn default_max_lines() -> usize {
    1000
}
fn default_context_lines() -> usize {
    3
}
fn default_tid_length() -> usize {
    32
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArtifactsConfig {
    #[serde(default = "default_artifacts_root")]
    pub root: PathBuf,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            root: default_artifacts_root(),
        }
    }
}

fn default_artifacts_root() -> PathBuf {
    PathBuf::from(".bugfix")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProjectConfig {
    /// Source tree root for `bfx analyze`; overridable via `--root`.
    #[serde(default = "default_project_root")]
    pub root: PathBuf,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            root: default_project_root(),
        }
    }
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

impl Config {
    /// A fallback configuration for commands that never touch the
    /// remote log host (analyze, session inspection, filing reports).
    pub fn minimal() -> Self {
        Self {
            log_server: LogServerConfig {
                host: "localhost".to_string(),
                username: "root".to_string(),
                password: String::new(),
                base_directory: default_base_directory(),
                port: default_port(),
                timeout_secs: default_timeout_secs(),
            },
            search: SearchConfig::default(),
            artifacts: ArtifactsConfig::default(),
            project: ProjectConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate log server
    if config.log_server.host.trim().is_empty() {
        anyhow::bail!("log_server.host must not be empty");
    }
    if config.log_server.username.trim().is_empty() {
        anyhow::bail!("log_server.username must not be empty");
    }
    if config.log_server.timeout_secs == 0 {
        anyhow::bail!("log_server.timeout_secs must be > 0");
    }

    // Validate search tuning
    if config.search.max_lines == 0 {
        anyhow::bail!("search.max_lines must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_defaults() {
        let f = write_config(
            r#"[log_server]
host = "logs.internal"
username = "app"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.log_server.port, 22);
        assert_eq!(cfg.log_server.timeout_secs, 30);
        assert_eq!(cfg.log_server.base_directory, "/logs/");
        assert_eq!(cfg.search.max_lines, 1000);
        assert_eq!(cfg.search.context_lines, 3);
        assert!(!cfg.search.case_insensitive);
        assert_eq!(cfg.artifacts.root, PathBuf::from(".bugfix"));
    }

    #[test]
    fn test_missing_config_is_fatal() {
        let err = load_config(Path::new("/nonexistent/bugfix.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_malformed_config_is_fatal() {
        let f = write_config("log_server = \"not a table\"");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_empty_host_rejected() {
        let f = write_config(
            r#"[log_server]
host = ""
username = "app"
"#,
        );
        let err = load_config(f.path()).unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_zero_max_lines_rejected() {
        let f = write_config(
            r#"[log_server]
host = "logs.internal"
username = "app"

[search]
max_lines = 0
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
