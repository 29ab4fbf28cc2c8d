//! Configuration and credential storage

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::auth::{StoredToken, TokenStore};
use crate::models::UserProfile;

/// Default Remote Config cache expiration (seconds). Developer mode uses 0,
/// i.e. always refetch.
pub const CONFIG_CACHE_EXPIRATION_SECS: u64 = 3600;

/// Application configuration
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Backend web API key (identity toolkit + remote config)
    pub api_key: Option<String>,
    /// Realtime database root URL (e.g. https://<project>.firebaseio.com)
    pub database_url: Option<String>,
    /// Object storage bucket (e.g. <project>.appspot.com)
    pub storage_bucket: Option<String>,
    /// Backend project ID (remote config namespace)
    pub project_id: Option<String>,
    /// Developer mode: remote config is refetched on every start
    #[serde(default)]
    pub developer_mode: bool,
    /// Stored identity token (authorizes database and storage calls)
    pub id_token: Option<StoredToken>,
    /// Stored refresh token
    pub refresh_token: Option<String>,
    /// Profile of the signed-in user (from last login)
    pub user: Option<UserProfile>,
    /// Per-install instance ID used by remote config fetches
    pub app_instance_id: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "friendly-cli", "friendly-cli")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Path of the remote-config cache file (fetched values + fetch time)
    pub fn remote_config_cache_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("remote_config.toml"))
    }

    /// Load configuration from disk
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir).context("Failed to create config directory")?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    pub fn api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("No api_key configured. Set it in config.toml.")
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .context("No database_url configured. Set it in config.toml.")
    }

    pub fn storage_bucket(&self) -> Result<&str> {
        self.storage_bucket
            .as_deref()
            .context("No storage_bucket configured. Set it in config.toml.")
    }

    /// Remote config cache expiration currently in effect.
    pub fn cache_expiration_secs(&self) -> u64 {
        if self.developer_mode {
            0
        } else {
            CONFIG_CACHE_EXPIRATION_SECS
        }
    }

    /// Display name of the signed-in user, "anonymous" when unknown.
    pub fn username(&self) -> String {
        self.user
            .as_ref()
            .map(|u| u.name_or_anonymous().to_string())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    pub fn set_user(&mut self, user: UserProfile) {
        self.user = Some(user);
    }

    /// Per-install instance ID, generated on first use.
    pub fn app_instance_id(&mut self) -> String {
        match self.app_instance_id {
            Some(ref id) => id.clone(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                self.app_instance_id = Some(id.clone());
                id
            }
        }
    }
}

impl TokenStore for Config {
    fn get_id_token(&self) -> Option<StoredToken> {
        self.id_token.clone()
    }

    fn set_id_token(&mut self, token: String, expires_in: Option<u64>) {
        self.id_token = Some(StoredToken::new(token, expires_in));
    }

    fn get_refresh_token(&self) -> Option<String> {
        self.refresh_token.clone()
    }

    fn set_refresh_token(&mut self, token: String) {
        self.refresh_token = Some(token);
    }

    fn clear_tokens(&mut self) {
        self.id_token = None;
        self.refresh_token = None;
        self.user = None;
    }
}
