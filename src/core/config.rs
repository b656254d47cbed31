use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:3000";
pub const CONFIG_FILE_NAME: &str = "dashboard.toml";
pub const CONFIG_PATH_ENV: &str = "MILO_DASHBOARD_CONFIG";
pub const API_URL_ENV: &str = "MILO_DASHBOARD_API_URL";
pub const TOKEN_ENV: &str = "MILO_DASHBOARD_TOKEN";

/// Where the dashboard talks to and how it authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    pub api_url: String,
    pub token: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
        }
    }
}

/// Contents of `dashboard.toml`. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

/// Values given on the command line; they beat everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("milo-dashboard").join(CONFIG_FILE_NAME))
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            debug!(path = %path.display(), "no dashboard config file");
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!(path = %path.display(), "loaded dashboard config");
        Ok(Some(config))
    }
}

impl DashboardConfig {
    /// Resolve from the process environment and the config file it points at.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);
        let file = match path {
            Some(path) => FileConfig::load(&path)?,
            None => None,
        };
        Self::resolve(file, |key| std::env::var(key).ok(), overrides)
    }

    /// Layer defaults, file, environment and flags, later sources winning.
    pub fn resolve(
        file: Option<FileConfig>,
        env: impl Fn(&str) -> Option<String>,
        overrides: &ConfigOverrides,
    ) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file) = file {
            if let Some(url) = file.api_url {
                config.api_url = url;
            }
            if file.token.is_some() {
                config.token = file.token;
            }
        }

        if let Some(url) = env(API_URL_ENV).filter(|u| !u.is_empty()) {
            config.api_url = url;
        }
        if let Some(token) = env(TOKEN_ENV) {
            config.token = Some(token);
        }

        if let Some(url) = &overrides.api_url {
            config.api_url = url.clone();
        }
        if let Some(token) = &overrides.token {
            config.token = Some(token.clone());
        }

        config.token = config.token.filter(|t| !t.trim().is_empty());
        config.api_url = validate_api_url(&config.api_url)?;
        Ok(config)
    }
}

fn validate_api_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw).with_context(|| format!("Invalid API URL '{}'", raw))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("API URL must use http or https, got '{}'", parsed.scheme());
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config =
            DashboardConfig::resolve(None, env_from(&[]), &ConfigOverrides::default()).unwrap();
        assert_eq!(config, DashboardConfig::default());
    }

    #[test]
    fn later_sources_win() {
        let file = FileConfig {
            api_url: Some("http://file:1".into()),
            token: Some("file-token".into()),
        };
        let env = env_from(&[(API_URL_ENV, "http://env:2/"), (TOKEN_ENV, "env-token")]);
        let config =
            DashboardConfig::resolve(Some(file.clone()), &env, &ConfigOverrides::default())
                .unwrap();
        assert_eq!(config.api_url, "http://env:2");
        assert_eq!(config.token.as_deref(), Some("env-token"));

        let flags = ConfigOverrides {
            api_url: Some("https://flag:3".into()),
            token: None,
        };
        let config = DashboardConfig::resolve(Some(file), &env, &flags).unwrap();
        assert_eq!(config.api_url, "https://flag:3");
        assert_eq!(config.token.as_deref(), Some("env-token"));
    }

    #[test]
    fn empty_token_means_no_auth() {
        let env = env_from(&[(TOKEN_ENV, "")]);
        let config = DashboardConfig::resolve(None, env, &ConfigOverrides::default()).unwrap();
        assert!(config.token.is_none());
    }

    #[test]
    fn rejects_non_http_urls() {
        let flags = ConfigOverrides {
            api_url: Some("ftp://example.com".into()),
            token: None,
        };
        assert!(DashboardConfig::resolve(None, env_from(&[]), &flags).is_err());

        let flags = ConfigOverrides {
            api_url: Some("not a url".into()),
            token: None,
        };
        assert!(DashboardConfig::resolve(None, env_from(&[]), &flags).is_err());
    }

    #[test]
    fn file_config_loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(FileConfig::load(&path).unwrap().is_none());

        std::fs::write(&path, "api_url = \"http://gateway:8080\"\ntoken = \"abc\"\n").unwrap();
        let file = FileConfig::load(&path).unwrap().unwrap();
        assert_eq!(file.api_url.as_deref(), Some("http://gateway:8080"));
        assert_eq!(file.token.as_deref(), Some("abc"));
    }
}
