use std::fs;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::GiCatError;

pub const DEFAULT_CONFIG_FILE: &str = "gicat.json";
pub const DEFAULT_HARVEST_TIMEOUT_SECS: u64 = 1500;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 1;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
pub const LUCENE_REQUEST_TIMEOUT_SECS: u64 = 300;

/// On-disk shape of `gicat.json`. Every field is optional so that the
/// environment and command line can fill the gaps.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub harvest_timeout_secs: Option<u64>,
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

/// Values supplied on the command line; they win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub harvest_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestSettings {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_HARVEST_TIMEOUT_SECS),
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub harvest: HarvestSettings,
    pub request_timeout: Duration,
}

impl DriverConfig {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            harvest: HarvestSettings::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn endpoint(&self) -> ServiceEndpoint {
        ServiceEndpoint::new(&self.base_url, &self.username, &self.password)
    }
}

/// Base URL and precomputed credentials shared by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    base_url: String,
    authorization: String,
}

impl ServiceEndpoint {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            authorization: basic_auth(username, password),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn authorization(&self) -> &str {
        &self.authorization
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub fn basic_auth(username: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(
        path: Option<&str>,
        overrides: ConfigOverrides,
    ) -> Result<DriverConfig, GiCatError> {
        let config = match path {
            Some(path) => Self::read(Utf8Path::new(path))?,
            None => match Self::default_path() {
                Some(path) => Self::read(&path)?,
                None => Config::default(),
            },
        };
        Self::resolve_config(config, env_overrides(), overrides)
    }

    pub fn read(path: &Utf8Path) -> Result<Config, GiCatError> {
        let content =
            fs::read_to_string(path).map_err(|_| GiCatError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| GiCatError::ConfigParse(err.to_string()))
    }

    pub fn resolve_config(
        config: Config,
        env: ConfigOverrides,
        cli: ConfigOverrides,
    ) -> Result<DriverConfig, GiCatError> {
        let base_url = cli
            .base_url
            .or(env.base_url)
            .or(config.base_url)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .ok_or(GiCatError::MissingConfig)?;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(GiCatError::InvalidConfig(format!(
                "base URL must be http(s): {base_url}"
            )));
        }

        let poll_interval_secs = cli
            .poll_interval_secs
            .or(env.poll_interval_secs)
            .or(config.poll_interval_secs)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);
        if poll_interval_secs == 0 {
            return Err(GiCatError::InvalidConfig(
                "poll interval must be at least one second".to_string(),
            ));
        }
        let timeout_secs = cli
            .harvest_timeout_secs
            .or(env.harvest_timeout_secs)
            .or(config.harvest_timeout_secs)
            .unwrap_or(DEFAULT_HARVEST_TIMEOUT_SECS);

        Ok(DriverConfig {
            base_url,
            username: cli
                .username
                .or(env.username)
                .or(config.username)
                .unwrap_or_default(),
            password: cli
                .password
                .or(env.password)
                .or(config.password)
                .unwrap_or_default(),
            harvest: HarvestSettings {
                timeout: Duration::from_secs(timeout_secs),
                poll_interval: Duration::from_secs(poll_interval_secs),
            },
            request_timeout: Duration::from_secs(
                config
                    .request_timeout_secs
                    .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
            ),
        })
    }

    /// `gicat.json` in the working directory, then the user config directory.
    fn default_path() -> Option<Utf8PathBuf> {
        let local = Utf8PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.as_std_path().exists() {
            return Some(local);
        }
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(
                    dirs.config_dir()
                        .join("gicat-driver")
                        .join(DEFAULT_CONFIG_FILE),
                )
                .ok()
            })
            .filter(|path| path.as_std_path().exists())
    }
}

fn env_overrides() -> ConfigOverrides {
    ConfigOverrides {
        base_url: env_value("GICAT_URL"),
        username: env_value("GICAT_USERNAME"),
        password: env_value("GICAT_PASSWORD"),
        harvest_timeout_secs: env_value("GICAT_HARVEST_TIMEOUT").and_then(|v| v.parse().ok()),
        poll_interval_secs: env_value("GICAT_POLL_INTERVAL").and_then(|v| v.parse().ok()),
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_strips_trailing_slashes() {
        let endpoint = ServiceEndpoint::new("http://www.somecompany.com//", "admin", "abcd123$");
        assert_eq!(endpoint.base_url(), "http://www.somecompany.com");
        assert_eq!(
            endpoint.url("/services/conf/giconf/configuration"),
            "http://www.somecompany.com/services/conf/giconf/configuration"
        );
    }

    #[test]
    fn basic_auth_header() {
        assert_eq!(basic_auth("admin", "abcd123$"), "Basic YWRtaW46YWJjZDEyMyQ=");
    }
}
