//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The password is loaded from BOOKSHELF_PASSWORD or password_file and is
//! never stored in the TOML.

use std::path::{Path, PathBuf};
use std::time::Duration;

use common::Secret;
use serde::Deserialize;

pub const PASSWORD_ENV: &str = "BOOKSHELF_PASSWORD";
pub const DEFAULT_CONFIG_FILE: &str = "bookshelf-client.toml";

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Remote bookshelf service
#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Credential persistence and login identity
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    #[serde(default = "default_timeout")]
    pub refresh_timeout_secs: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<Secret<String>>,
    /// Alternative to the BOOKSHELF_PASSWORD env var
    #[serde(default)]
    pub password_file: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            refresh_timeout_secs: default_timeout(),
            username: None,
            password: None,
            password_file: None,
        }
    }
}

fn default_base_url() -> String {
    session_auth::DEFAULT_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Password resolution order:
    /// 1. BOOKSHELF_PASSWORD env var
    /// 2. password_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            config.session.password = Some(Secret::new(password));
        } else if let Some(ref password_file) = config.session.password_file {
            let password = std::fs::read_to_string(password_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read password_file {}: {e}",
                    password_file.display()
                ))
            })?;
            let password = password.trim().to_owned();
            if !password.is_empty() {
                config.session.password = Some(Secret::new(password));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        let base_url = &self.service.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(common::Error::InvalidValue {
                field: "service.base_url",
                reason: format!("must start with http:// or https://, got: {base_url}"),
            });
        }
        if self.service.timeout_secs == 0 {
            return Err(common::Error::InvalidValue {
                field: "service.timeout_secs",
                reason: "must be greater than 0".into(),
            });
        }
        if self.session.refresh_timeout_secs == 0 {
            return Err(common::Error::InvalidValue {
                field: "session.refresh_timeout_secs",
                reason: "must be greater than 0".into(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_secs(self.session.refresh_timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from(DEFAULT_CONFIG_FILE)
    }
}
