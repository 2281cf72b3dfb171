use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the optional config file looked up in the current directory.
pub const CONFIG_FILE: &str = ".pr-audit.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level configuration loaded from .pr-audit.toml.
///
/// All fields are optional; the tool works with zero config as long as
/// GITHUB_TOKEN is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,

    #[serde(default)]
    pub fetch: FetchConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// REST API root, e.g. https://api.github.com or a GHE `/api/v3` URL
    pub api_url: String,
    /// Domain marker a spreadsheet cell must contain to count as a PR reference
    pub host: String,
    pub request_timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: "https://api.github.com".to_string(),
            host: "github.com".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl GitHubConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Maximum number of PRs processed at once
    pub concurrency: usize,
    /// Maximum metadata fetches per PR while mergeable_state is "unknown"
    pub retries: u32,
    pub retry_delay_ms: u64,
    /// Pause between the metadata call and the comments call
    pub api_delay_ms: u64,
    pub comments_per_page: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            retries: 2,
            retry_delay_ms: 2000,
            api_delay_ms: 100,
            comments_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Logins whose comments never count as external
    pub excluded_users: Vec<String>,
    /// Comments containing any of these markers never count as external
    pub excluded_keywords: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            excluded_users: vec![
                "acrolinx-at-msft2".to_string(),
                "learn-build-service-prod".to_string(),
            ],
            excluded_keywords: vec!["Acrolinx Scorecards".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default input spreadsheet when none is given on the command line
    pub input: Option<PathBuf>,
    /// Folder that holds the dated run folders
    pub base_dir: PathBuf,
    pub keep_runs: usize,
    pub stale_after_days: i64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        let root = dirs::desktop_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            input: None,
            base_dir: root.join("PR_Check_Results"),
            keep_runs: 10,
            stale_after_days: 7,
        }
    }
}

impl Config {
    /// Load configuration from .pr-audit.toml in the current directory.
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Config, ConfigError> {
        let path = Path::new(CONFIG_FILE);
        if path.exists() {
            Self::load_from(path)
        } else {
            Ok(Config::default().with_resolved_token())
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config.with_resolved_token())
    }

    fn with_resolved_token(mut self) -> Self {
        self.github.token = self.github_token();
        self
    }

    /// Resolve the GitHub token: config file value takes precedence,
    /// falls back to GITHUB_TOKEN env var.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
    }
}
