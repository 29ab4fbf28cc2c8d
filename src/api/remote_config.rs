//! Remote-configured message length policy
//!
//! A single numeric limit under the `friendly_msg_length` key. The local
//! default applies immediately at startup; a fetched value overrides it once
//! the fetch completes. Fetch failure silently keeps whatever limit is
//! already in effect.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;

/// Remote config key for the message length limit.
pub const FRIENDLY_MSG_LENGTH_KEY: &str = "friendly_msg_length";

/// Limit applied until (and unless) the fetch completes.
pub const DEFAULT_MSG_LENGTH_LIMIT: usize = 1000;

const REMOTE_CONFIG_BASE: &str = "https://firebaseremoteconfig.googleapis.com/v1";

/// Fetched values cached on disk, honoring the cache expiration parameter.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CachedFetch {
    fetched_at: u64,
    entries: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    entries: HashMap<String, String>,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Parse the length limit out of a fetched entry set.
fn limit_from_entries(entries: &HashMap<String, String>) -> Option<usize> {
    entries
        .get(FRIENDLY_MSG_LENGTH_KEY)
        .and_then(|v| v.parse().ok())
}

/// Pick the limit to apply after a fetch attempt: a fetched value wins,
/// a failure keeps the limit already in effect.
pub fn limit_after_fetch(fetch: Result<usize>, active: usize) -> usize {
    match fetch {
        Ok(limit) => {
            tracing::debug!("{} = {}", FRIENDLY_MSG_LENGTH_KEY, limit);
            limit
        }
        Err(e) => {
            tracing::warn!("Error fetching config: {:#}", e);
            active
        }
    }
}

/// Fetch the message length limit, using the on-disk cache when it is
/// younger than the cache expiration (3600s; 0 in developer mode).
pub async fn fetch_msg_length_limit() -> Result<usize> {
    let mut config = Config::load()?;
    let cache_expiration = config.cache_expiration_secs();

    if cache_expiration > 0 {
        if let Some(cached) = load_cache() {
            if now_secs().saturating_sub(cached.fetched_at) < cache_expiration {
                tracing::debug!("Remote config cache still fresh, skipping fetch");
                return Ok(limit_from_entries(&cached.entries).unwrap_or(DEFAULT_MSG_LENGTH_LIMIT));
            }
        }
    }

    let api_key = config.api_key()?.to_string();
    let project = config
        .project_id
        .as_deref()
        .context("No project_id configured. Set it in config.toml.")?
        .to_string();
    let instance_id = config.app_instance_id();
    config.save().ok();

    let url = format!(
        "{}/projects/{}/namespaces/firebase:fetch?key={}",
        REMOTE_CONFIG_BASE, project, api_key
    );
    let resp = reqwest::Client::new()
        .post(&url)
        .json(&serde_json::json!({ "appInstanceId": instance_id }))
        .send()
        .await
        .context("Remote config fetch failed")?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Remote config fetch: HTTP {}: {}", status.as_u16(), body);
    }

    let body: FetchResponse = resp
        .json()
        .await
        .context("Failed to parse remote config response")?;

    save_cache(&CachedFetch {
        fetched_at: now_secs(),
        entries: body.entries.clone(),
    });

    Ok(limit_from_entries(&body.entries).unwrap_or(DEFAULT_MSG_LENGTH_LIMIT))
}

fn load_cache() -> Option<CachedFetch> {
    let path = Config::remote_config_cache_path().ok()?;
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

fn save_cache(cache: &CachedFetch) {
    let result = (|| -> Result<()> {
        let path = Config::remote_config_cache_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(cache)?;
        std::fs::write(path, content)?;
        Ok(())
    })();
    if let Err(e) = result {
        tracing::warn!("Failed to write remote config cache: {:#}", e);
    }
}

/// Print the active limit (CLI `limit` command).
pub async fn show_limit() -> Result<()> {
    let limit = limit_after_fetch(fetch_msg_length_limit().await, DEFAULT_MSG_LENGTH_LIMIT);
    println!("{} = {}", FRIENDLY_MSG_LENGTH_KEY, limit);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetched_value_overrides_active_limit() {
        let limit = limit_after_fetch(Ok(140), DEFAULT_MSG_LENGTH_LIMIT);
        assert_eq!(limit, 140);
    }

    #[test]
    fn fetch_failure_keeps_active_limit() {
        let limit = limit_after_fetch(Err(anyhow::anyhow!("offline")), DEFAULT_MSG_LENGTH_LIMIT);
        assert_eq!(limit, DEFAULT_MSG_LENGTH_LIMIT);
    }

    #[test]
    fn fetch_failure_keeps_previously_fetched_limit() {
        // A prior successful fetch stays in effect across a later failure.
        let limit = limit_after_fetch(Err(anyhow::anyhow!("offline")), 140);
        assert_eq!(limit, 140);
    }

    #[test]
    fn missing_key_means_no_override() {
        let entries = HashMap::new();
        assert_eq!(limit_from_entries(&entries), None);
    }

    #[test]
    fn entry_parses_as_number() {
        let mut entries = HashMap::new();
        entries.insert(FRIENDLY_MSG_LENGTH_KEY.to_string(), "140".to_string());
        assert_eq!(limit_from_entries(&entries), Some(140));

        entries.insert(FRIENDLY_MSG_LENGTH_KEY.to_string(), "nonsense".to_string());
        assert_eq!(limit_from_entries(&entries), None);
    }
}
