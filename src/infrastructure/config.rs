use crate::domain::category::BinWidths;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct AnalyticsConfig {
    #[serde(default)]
    pub server: ServerSettings,
    pub upstream: UpstreamSettings,
    #[serde(default)]
    pub binning: BinWidths,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct UpstreamSettings {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

pub fn load_analytics_config() -> anyhow::Result<AnalyticsConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name("config/analytics"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::{Config, File, FileFormat};

    fn parse(toml: &str) -> AnalyticsConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [upstream]
            base_url = "http://alto-backend:8000"
            "#,
        );

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.upstream.timeout(), Duration::from_secs(60));
        assert_eq!(config.binning, BinWidths::default());
    }

    #[test]
    fn test_binning_overrides() {
        let config = parse(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [upstream]
            base_url = "http://alto-backend:8000"
            timeout_secs = 15

            [binning]
            cds = 1.0
            outdoor_wbt = 2.5
            "#,
        );

        assert_eq!(config.server.bind, "127.0.0.1:9000");
        assert_eq!(config.upstream.timeout_secs, 15);
        assert_eq!(config.binning.cds, 1.0);
        assert_eq!(config.binning.outdoor_wbt, 2.5);
        assert_eq!(config.binning.chs, 2.0);
    }
}
