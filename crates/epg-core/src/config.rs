use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub tmdb: TmdbConfig,
}

/// Where schedule data comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Per-channel queries against the live EPG API.
    Wavve,
    /// A single pre-generated `{items, updatedAt}` JSON document.
    Static,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    /// URL of the static JSON document (only used when `kind = "static"`).
    #[serde(default = "default_data_url")]
    pub data_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// The EPG API key. The default is the public key the upstream web
    /// player itself ships with.
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Collect tomorrow's schedule in the same run as today's.
    #[serde(default = "default_include_tomorrow")]
    pub include_tomorrow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Evening window bounds, minutes since midnight, `[start, end)`.
    #[serde(default = "default_window_start")]
    pub window_start: u32,
    #[serde(default = "default_window_end")]
    pub window_end: u32,
    /// Reference-zone hours of day at which upstream data refreshes.
    #[serde(default = "default_update_hours")]
    pub update_hours: Vec<u32>,
    /// Minutes of upstream generation latency tolerated after a slot.
    #[serde(default = "default_grace_min")]
    pub grace_min: u32,
    /// Channel display names to keep.
    #[serde(default = "default_target_channels")]
    pub target_channels: Vec<String>,
    /// Genre labels dropped during normalization.
    #[serde(default = "default_genre_noise")]
    pub genre_noise: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_minutes")]
    pub ttl_minutes: i64,
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_http_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Route upstream requests through relay gateways when direct access
    /// fails.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
    /// Relay endpoints, tried in order; each receives the target as a
    /// `url` query parameter.
    #[serde(default = "default_gateways")]
    pub gateways: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmdbConfig {
    /// Empty key disables enrichment lookups.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_tmdb_language")]
    pub language: String,
    #[serde(default = "default_tmdb_image_base")]
    pub image_base: String,
    #[serde(default = "default_tmdb_cache_file")]
    pub cache_file: PathBuf,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            data_url: default_data_url(),
            api_base: default_api_base(),
            api_key: default_api_key(),
            include_tomorrow: default_include_tomorrow(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            window_start: default_window_start(),
            window_end: default_window_end(),
            update_hours: default_update_hours(),
            grace_min: default_grace_min(),
            target_channels: default_target_channels(),
            genre_noise: default_genre_noise(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: default_ttl_minutes(),
            snapshot_file: default_snapshot_file(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: default_http_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            attempt_timeout_secs: default_attempt_timeout_secs(),
            gateways: default_gateways(),
        }
    }
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            language: default_tmdb_language(),
            image_base: default_tmdb_image_base(),
            cache_file: default_tmdb_cache_file(),
        }
    }
}

fn default_source_kind() -> SourceKind {
    SourceKind::Wavve
}

fn default_data_url() -> String {
    "https://example.invalid/data.json".to_string()
}

fn default_api_base() -> String {
    "https://api.wavve.com/v4".to_string()
}

fn default_api_key() -> String {
    "E5F3E0D30947AA5440556471321BB6D9".to_string()
}

fn default_include_tomorrow() -> bool {
    true
}

fn default_window_start() -> u32 {
    21 * 60 + 30
}

fn default_window_end() -> u32 {
    22 * 60
}

fn default_update_hours() -> Vec<u32> {
    vec![0, 6, 12, 18]
}

fn default_grace_min() -> u32 {
    5
}

fn default_target_channels() -> Vec<String> {
    [
        "KBS1", "KBS2", "MBC", "SBS", "tvN", "OCN", "OCN Movies", "OCN Movies2", "CGV", "채널CGV",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_genre_noise() -> Vec<String> {
    vec!["Movie / Drama".to_string()]
}

fn default_ttl_minutes() -> i64 {
    30
}

fn default_snapshot_file() -> PathBuf {
    platform::data_dir().join("snapshot.json")
}

fn default_http_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8788
}

fn default_attempt_timeout_secs() -> u64 {
    8
}

fn default_gateways() -> Vec<String> {
    vec![
        "https://api.allorigins.win/raw".to_string(),
        "https://corsproxy.io/".to_string(),
    ]
}

fn default_tmdb_language() -> String {
    "ko-KR".to_string()
}

fn default_tmdb_image_base() -> String {
    "https://image.tmdb.org/t/p/w200".to_string()
}

fn default_tmdb_cache_file() -> PathBuf {
    platform::cache_dir().join("tmdb.json")
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// Update hours restricted to the valid 0–23 range, sorted, deduped.
    pub fn sane_update_hours(&self) -> Vec<u32> {
        let mut hours: Vec<u32> = self
            .schedule
            .update_hours
            .iter()
            .copied()
            .filter(|h| *h <= 23)
            .collect();
        hours.sort_unstable();
        hours.dedup();
        hours
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.source.kind, SourceKind::Wavve);
        assert_eq!(config.schedule.window_start, 1290);
        assert_eq!(config.schedule.window_end, 1320);
        assert_eq!(config.schedule.update_hours, vec![0, 6, 12, 18]);
        assert_eq!(config.cache.ttl_minutes, 30);
        assert!(config.http.enabled);
        assert_eq!(config.http.port, 8788);
        assert!(!config.proxy.enabled);
        assert!(config.source.api_base.starts_with("https://"));
        assert!(config.cache.snapshot_file.ends_with("epg/snapshot.json"));
    }

    #[test]
    fn test_sane_update_hours() {
        let mut config = Config::default();
        config.schedule.update_hours = vec![18, 6, 99, 6, 0];
        assert_eq!(config.sane_update_hours(), vec![0, 6, 18]);
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.schedule.target_channels, config.schedule.target_channels);
        assert_eq!(back.source.kind, config.source.kind);
    }
}
