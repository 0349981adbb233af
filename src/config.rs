use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub web: WebConfig,
    /// Absent means messages are stored locally only.
    #[serde(default)]
    pub github: Option<GithubConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_page_size")]
    pub max_page_size: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GithubConfig {
    #[serde(default)]
    pub token: String,
    /// `owner/name`
    #[serde(default)]
    pub repository: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_messages_dir")]
    pub messages_dir: String,
}

impl GithubConfig {
    fn from_parts(token: String, repository: String) -> Self {
        Self {
            token,
            repository,
            branch: default_branch(),
            api_base_url: default_api_base_url(),
            messages_dir: default_messages_dir(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1:8081".to_string()
}

fn default_page_size() -> u32 {
    100
}

fn default_db_path() -> PathBuf {
    PathBuf::from("database/messages.db")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("templates/index.html")
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_messages_dir() -> String {
    "messages".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            default_page_size: default_page_size(),
            max_page_size: default_page_size(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            index_path: default_index_path(),
            static_dir: default_static_dir(),
        }
    }
}

/// Load `KEY=value` pairs from a `.env` file into the process environment.
/// Variables already set in the environment win. Returns false when the file
/// does not exist.
pub fn load_dotenv(path: &Path) -> Result<bool> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.apply_env_overrides(lookup);
        config.validate()?;
        Ok(config)
    }

    /// Built-in defaults plus environment overrides, for running without a file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML configuration")
    }

    /// `GITHUB_TOKEN` / `GITHUB_REPO` enable or override the mirror section;
    /// `BIND_ADDR` overrides the listen address.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(addr) = non_empty("BIND_ADDR") {
            self.server.bind_address = addr;
        }

        let token = non_empty("GITHUB_TOKEN");
        let repo = non_empty("GITHUB_REPO");
        if token.is_none() && repo.is_none() {
            return;
        }
        let github = self
            .github
            .get_or_insert_with(|| GithubConfig::from_parts(String::new(), String::new()));
        if let Some(token) = token {
            github.token = token;
        }
        if let Some(repo) = repo {
            github.repository = repo;
        }
    }

    /// Checks everything except the `[github]` section, which only the
    /// serving path needs (see `validate_github`).
    pub fn validate(&self) -> Result<()> {
        if self.server.max_page_size == 0 {
            anyhow::bail!("server.max_page_size must be at least 1");
        }
        Ok(())
    }

    pub fn validate_github(&self) -> Result<()> {
        if let Some(github) = &self.github {
            if github.token.is_empty() || github.repository.is_empty() {
                anyhow::bail!(
                    "GitHub token and repository name must both be set \
                     (in [github] or via GITHUB_TOKEN / GITHUB_REPO)"
                );
            }
            let mut parts = github.repository.split('/');
            let valid = matches!(
                (parts.next(), parts.next(), parts.next()),
                (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
            );
            if !valid {
                anyhow::bail!(
                    "GitHub repository must look like 'owner/name', got '{}'",
                    github.repository
                );
            }
        }
        Ok(())
    }

    /// Clamp a requested page size into `1..=max_page_size`.
    pub fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.server.default_page_size)
            .clamp(1, self.server.max_page_size)
    }
}
