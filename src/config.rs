use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::KiraError;
use crate::fetch_log::DEFAULT_LOG_CAPACITY;
use crate::state::BackoffPolicy;

pub const DEFAULT_CONFIG_FILE: &str = "kira-mt.json";
pub const DEFAULT_ANILIST_ENDPOINT: &str = "https://graphql.anilist.co";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub anilist: Option<AniListEntry>,
    #[serde(default)]
    pub queue: Option<QueueEntry>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AniListEntry {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct QueueEntry {
    #[serde(default)]
    pub base_delay_ms: Option<u64>,
    #[serde(default)]
    pub first_failure_delay_ms: Option<u64>,
    #[serde(default)]
    pub repeat_failure_delay_ms: Option<u64>,
    #[serde(default)]
    pub min_rate_limit_secs: Option<u64>,
    #[serde(default)]
    pub log_capacity: Option<usize>,
}

/// Knobs of the background queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub backoff: BackoffPolicy,
    /// Pause used when the service rate-limits without a usable retry-after.
    pub min_rate_limit_secs: u64,
    pub log_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            min_rate_limit_secs: 60,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub data_dir: Utf8PathBuf,
    pub endpoint: String,
    pub timeout: Duration,
    pub engine: EngineConfig,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; the default file is optional.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, KiraError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if !config_path.exists() {
            if path.is_some() {
                return Err(KiraError::MissingConfig(config_path));
            }
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| KiraError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| KiraError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, KiraError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let data_dir = match config.data_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let anilist = config.anilist.unwrap_or_default();
        let endpoint = anilist
            .endpoint
            .unwrap_or_else(|| DEFAULT_ANILIST_ENDPOINT.to_string());
        let timeout = Duration::from_secs(anilist.timeout_secs.unwrap_or(30));

        let queue = config.queue.unwrap_or_default();
        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            backoff: BackoffPolicy {
                base_delay_ms: queue
                    .base_delay_ms
                    .unwrap_or(defaults.backoff.base_delay_ms),
                first_failure_delay_ms: queue
                    .first_failure_delay_ms
                    .unwrap_or(defaults.backoff.first_failure_delay_ms),
                repeat_failure_delay_ms: queue
                    .repeat_failure_delay_ms
                    .unwrap_or(defaults.backoff.repeat_failure_delay_ms),
            },
            min_rate_limit_secs: queue
                .min_rate_limit_secs
                .unwrap_or(defaults.min_rate_limit_secs)
                .max(1),
            log_capacity: queue.log_capacity.unwrap_or(defaults.log_capacity),
        };

        Ok(ResolvedConfig {
            schema_version,
            data_dir,
            endpoint,
            timeout,
            engine,
        })
    }
}

pub fn default_data_dir() -> Result<Utf8PathBuf, KiraError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.data_dir().join("kira-media-tracker")).ok()
        })
        .ok_or_else(|| KiraError::Filesystem("unable to resolve data directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_defaults() {
        let config = Config {
            data_dir: Some("/tmp/kira-mt".to_string()),
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.endpoint, DEFAULT_ANILIST_ENDPOINT);
        assert_eq!(resolved.engine, EngineConfig::default());
        assert_eq!(resolved.data_dir, Utf8PathBuf::from("/tmp/kira-mt"));
    }
}
