use crate::ingest::FetchOptions;
use crate::persistence::JsonFilePersistence;
use crate::{ChartError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "LASTFM_CHARTS_CONFIG";
/// Environment variables for a single user without a config file.
pub const USER_ENV: &str = "LASTFM_USER";
pub const API_KEY_ENV: &str = "LASTFM_API_KEY";

/// A Last.fm account and the API key used to read its scrobbles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    #[serde(alias = "LASTFM_USER")]
    pub username: String,
    #[serde(alias = "LASTFM_API_KEY")]
    pub api_key: String,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            api_key: api_key.into(),
        }
    }
}

/// Configuration for chart runs.
///
/// Stored as JSON. Besides the full form
///
/// ```json
/// {
///   "users": [{"username": "rj", "api_key": "..."}],
///   "cache_path": "/var/cache/charts.json",
///   "page_size": 200,
///   "page_delay_ms": 200
/// }
/// ```
///
/// a bare list of users (`[{"LASTFM_USER": "rj", "LASTFM_API_KEY": "..."}]`)
/// is accepted too, with every other setting at its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartsConfig {
    /// Known accounts; the first one is used when no user is selected
    pub users: Vec<UserCredentials>,
    /// Cache file location, `None` for the XDG default
    pub cache_path: Option<PathBuf>,
    /// Scrobbles per page when fetching a week
    pub page_size: u32,
    /// Pause between page requests in milliseconds
    pub page_delay_ms: u64,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        let fetch = FetchOptions::default();
        Self {
            users: Vec::new(),
            cache_path: None,
            page_size: fetch.page_size,
            page_delay_ms: fetch.page_delay.as_millis() as u64,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Full(ChartsConfig),
    Users(Vec<UserCredentials>),
}

impl ChartsConfig {
    /// Create a new config with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the default config file path using XDG directories.
    ///
    /// Returns a path like: `~/.config/lastfm-charts/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ChartError::Config("Cannot determine XDG config directory".to_string()))?;
        Ok(config_dir.join("lastfm-charts").join("config.json"))
    }

    /// Load a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            ChartError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| ChartError::Config(format!("Failed to parse config: {e}")))?;
        Ok(match file {
            ConfigFile::Full(config) => config,
            ConfigFile::Users(users) => Self {
                users,
                ..Self::default()
            },
        })
    }

    /// Resolve the configuration the way the CLI does.
    ///
    /// 1. An explicit path must exist and parse.
    /// 2. Otherwise `$LASTFM_CHARTS_CONFIG`, then the XDG default, if present.
    /// 3. `LASTFM_USER` / `LASTFM_API_KEY` add a user that is not configured yet.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::load(path)?,
            None => {
                let path = match env::var_os(CONFIG_PATH_ENV) {
                    Some(path) => Some(PathBuf::from(path)),
                    None => Self::default_path().ok(),
                };
                match path {
                    Some(path) if path.exists() => {
                        log::debug!("Using config file {}", path.display());
                        Self::load(&path)?
                    }
                    _ => Self::default(),
                }
            }
        };
        Ok(config.with_env_user())
    }

    /// Add the user from `LASTFM_USER` / `LASTFM_API_KEY`, if both are set.
    pub fn with_env_user(self) -> Self {
        match (env::var(USER_ENV), env::var(API_KEY_ENV)) {
            (Ok(username), Ok(api_key)) => self.with_user(UserCredentials::new(username, api_key)),
            _ => self,
        }
    }

    /// Add a user unless one with the same name is configured already.
    pub fn with_user(mut self, user: UserCredentials) -> Self {
        if !self.users.iter().any(|u| u.username == user.username) {
            self.users.push(user);
        }
        self
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay_ms = delay.as_millis() as u64;
        self
    }

    /// The named user, or the first configured user when `name` is `None`.
    pub fn user(&self, name: Option<&str>) -> Result<&UserCredentials> {
        match name {
            Some(name) => self
                .users
                .iter()
                .find(|u| u.username.eq_ignore_ascii_case(name))
                .ok_or_else(|| ChartError::Config(format!("User '{name}' is not configured"))),
            None => self.users.first().ok_or_else(|| {
                ChartError::Config(format!(
                    "No users configured; set {USER_ENV} and {API_KEY_ENV} or add a config file"
                ))
            }),
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions::default()
            .with_page_size(self.page_size)
            .with_page_delay(Duration::from_millis(self.page_delay_ms))
    }

    pub fn persistence(&self) -> Result<JsonFilePersistence> {
        match &self.cache_path {
            Some(path) => Ok(JsonFilePersistence::new(path)),
            None => JsonFilePersistence::at_default_location(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config() {
        let config = ChartsConfig::from_json(
            r#"{
                "users": [{"username": "rj", "api_key": "k1"}],
                "cache_path": "/tmp/charts.json",
                "page_delay_ms": 0
            }"#,
        )
        .unwrap();

        assert_eq!(config.users, vec![UserCredentials::new("rj", "k1")]);
        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/charts.json")));
        assert_eq!(config.page_size, 200);
        assert_eq!(config.fetch_options().page_delay, Duration::ZERO);
        assert_eq!(
            config.persistence().unwrap().path(),
            Path::new("/tmp/charts.json")
        );
    }

    #[test]
    fn test_bare_user_list_with_legacy_keys() {
        let config = ChartsConfig::from_json(
            r#"[
                {"LASTFM_USER": "rj", "LASTFM_API_KEY": "k1"},
                {"LASTFM_USER": "mia", "LASTFM_API_KEY": "k2"}
            ]"#,
        )
        .unwrap();

        assert_eq!(config.users.len(), 2);
        assert_eq!(config.user(None).unwrap().username, "rj");
        assert_eq!(config.user(Some("MIA")).unwrap().api_key, "k2");
        assert_eq!(config.page_delay_ms, 200);
    }

    #[test]
    fn test_unknown_or_missing_user() {
        let config = ChartsConfig::new();
        assert!(matches!(config.user(None), Err(ChartError::Config(_))));

        let config = config.with_user(UserCredentials::new("rj", "k1"));
        assert!(matches!(config.user(Some("mia")), Err(ChartError::Config(_))));
    }

    #[test]
    fn test_with_user_does_not_duplicate() {
        let config = ChartsConfig::new()
            .with_user(UserCredentials::new("rj", "k1"))
            .with_user(UserCredentials::new("rj", "k2"));
        assert_eq!(config.users, vec![UserCredentials::new("rj", "k1")]);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        assert!(matches!(
            ChartsConfig::from_json("{"),
            Err(ChartError::Config(_))
        ));
    }
}
