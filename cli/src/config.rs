use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use oink_core::CaloriesPolicy;

pub const LOG_FILE_NAME: &str = "user_logs.csv";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Where the log lives. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendConfig {
    /// A CSV file on this machine.
    Local {
        #[serde(default)]
        path: Option<PathBuf>,
    },
    /// A remote table service; every call goes over the network.
    Remote {
        url: String,
        #[serde(default)]
        token_file: Option<PathBuf>,
    },
    /// A local CSV uploaded to a cloud file store after every change.
    Synced {
        #[serde(default)]
        path: Option<PathBuf>,
        url: String,
        #[serde(default)]
        remote_name: Option<String>,
        #[serde(default)]
        token_file: Option<PathBuf>,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local { path: None }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    user_id: Option<i64>,
    calories_policy: CaloriesPolicy,
    backend: BackendConfig,
}

#[derive(Debug)]
pub struct Config {
    pub data_dir: PathBuf,
    pub config_path: PathBuf,
    pub user_id: Option<i64>,
    pub calories_policy: CaloriesPolicy,
    pub backend: BackendConfig,
    /// Bearer token from the environment; a `token_file` is re-read on reconnect.
    pub remote_token: Option<String>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults.
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "oink").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let config_path = proj_dirs.config_dir().join(CONFIG_FILE_NAME);
        Self::from_paths(data_dir, config_path, |key| std::env::var(key).ok())
    }

    pub fn from_paths(
        data_dir: PathBuf,
        config_path: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let file = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            serde_yaml::from_str::<FileConfig>(&contents).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            FileConfig::default()
        };

        let mut config = Config {
            data_dir,
            config_path,
            user_id: file.user_id,
            calories_policy: file.calories_policy,
            backend: file.backend,
            remote_token: None,
        };

        if let Some(raw) = env("OINK_USER_ID") {
            let id = raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("OINK_USER_ID must be an integer, got '{raw}'"))?;
            config.user_id = Some(id);
        }
        if let Some(log_path) = env("OINK_LOG_PATH") {
            match &mut config.backend {
                BackendConfig::Local { path } | BackendConfig::Synced { path, .. } => {
                    *path = Some(PathBuf::from(log_path));
                }
                BackendConfig::Remote { .. } => {}
            }
        }
        config.remote_token = env("OINK_REMOTE_TOKEN").filter(|t| !t.is_empty());

        Ok(config)
    }

    /// The local CSV path for the local and synced backends.
    pub fn log_path(&self) -> PathBuf {
        let configured = match &self.backend {
            BackendConfig::Local { path } | BackendConfig::Synced { path, .. } => path.as_deref(),
            BackendConfig::Remote { .. } => None,
        };
        match configured {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.data_dir.join(p),
            None => self.data_dir.join(LOG_FILE_NAME),
        }
    }

    /// Resolve a relative path from the config file against the data directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    /// The user to act for: the `--user` flag, else the configured id.
    pub fn user_id(&self, flag: Option<i64>) -> Result<i64> {
        match flag.or(self.user_id) {
            Some(id) => Ok(id),
            None => bail!(
                "No user id. Pass --user <ID>, set OINK_USER_ID, or add `user_id` to {}",
                self.config_path.display()
            ),
        }
    }
}
