use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Server configuration: a TOML file plus `RILL_`-prefixed environment
/// overrides, every section carrying sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub stream_hub: StreamHubConfig,
    pub storage: StorageConfig,
    pub hls: HlsSection,
    pub dash: DashSection,
    pub forward: ForwardSection,
    pub pull: PullSection,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub rtmp_address: String,
    pub http_address: String,
    pub max_connections: usize,
    pub rtmp_read_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rtmp_address: "0.0.0.0:1935".to_string(),
            http_address: "0.0.0.0:8080".to_string(),
            max_connections: 1000,
            rtmp_read_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamHubConfig {
    /// Cache whole GOPs for instant first frames on join.
    pub gop_cache: bool,
    /// How many GOPs to keep when the cache is on.
    pub gop_num: usize,
    /// Subscriber queue high-water mark, in seconds of media.
    pub queue_length_secs: u64,
    /// A DTS regression beyond this rebases the virtual timeline.
    pub atc_threshold_secs: u64,
    /// A second publisher displaces the first instead of being
    /// rejected.
    pub latest_wins: bool,
}

impl Default for StreamHubConfig {
    fn default() -> Self {
        Self {
            gop_cache: true,
            gop_num: 1,
            queue_length_secs: 5,
            atc_threshold_secs: 90,
            latest_wins: false,
        }
    }
}

impl StreamHubConfig {
    #[must_use]
    pub const fn effective_gop_num(&self) -> usize {
        if self.gop_cache {
            self.gop_num
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for HLS/DASH segments and manifests.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HlsSection {
    pub enabled: bool,
    pub fragment_secs: u64,
    pub window_secs: u64,
    pub endlist_on_unpublish: bool,
    pub discontinuity_on_av_change: bool,
    pub cleanup_delay_secs: u64,
}

impl Default for HlsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            fragment_secs: 10,
            window_secs: 60,
            endlist_on_unpublish: true,
            discontinuity_on_av_change: true,
            cleanup_delay_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashSection {
    pub enabled: bool,
    pub fragment_secs: u64,
    pub window_size: usize,
    pub update_period_secs: u64,
    pub cleanup_delay_secs: u64,
}

impl Default for DashSection {
    fn default() -> Self {
        Self {
            enabled: false,
            fragment_secs: 10,
            window_size: 5,
            update_period_secs: 30,
            cleanup_delay_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ForwardSection {
    pub enabled: bool,
    /// Peer addresses to mirror every publish to, `host:port`.
    pub destinations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PullSection {
    pub enabled: bool,
    /// Upstream origin to pull missing streams from, `host:port`.
    pub upstream: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter, e.g. "info" or "rill=debug,info".
    pub level: String,
    /// "pretty" or "json".
    pub format: String,
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            file_path: None,
        }
    }
}

impl Config {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(Path::new(path)));
        } else if Path::new("rill.toml").exists() {
            builder = builder.add_source(File::from(Path::new("rill.toml")));
        }

        builder = builder.add_source(
            Environment::with_prefix("RILL")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.hls.enabled && self.hls.fragment_secs == 0 {
            errors.push("hls.fragment_secs must be positive".to_string());
        }
        if self.dash.enabled && self.dash.fragment_secs == 0 {
            errors.push("dash.fragment_secs must be positive".to_string());
        }
        if self.dash.enabled && self.dash.window_size == 0 {
            errors.push("dash.window_size must be positive".to_string());
        }
        if self.forward.enabled && self.forward.destinations.is_empty() {
            errors.push("forward.enabled without forward.destinations".to_string());
        }
        if self.pull.enabled && self.pull.upstream.is_empty() {
            errors.push("pull.enabled without pull.upstream".to_string());
        }
        if self.server.max_connections == 0 {
            errors.push("server.max_connections must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.rtmp_address, "0.0.0.0:1935");
        assert_eq!(config.stream_hub.effective_gop_num(), 1);
    }

    #[test]
    fn test_gop_cache_disabled_means_zero_gops() {
        let config = StreamHubConfig {
            gop_cache: false,
            gop_num: 4,
            ..StreamHubConfig::default()
        };
        assert_eq!(config.effective_gop_num(), 0);
    }

    #[test]
    fn test_validation_catches_inconsistencies() {
        let mut config = Config::default();
        config.forward.enabled = true;
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("forward"));
    }
}
