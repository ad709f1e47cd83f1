use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use super::types::{ChannelDefaults, RpcConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub rpc: RpcConfig,
    pub channel_defaults: ChannelDefaults,
    pub logging: LogConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub file: Option<PathBuf>,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    Plain,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.rpc.rpc_url.is_empty() {
            return Err("rpc url cannot be empty".into());
        }

        if self.channel_defaults.min_reveal_timeout >= self.channel_defaults.min_settle_timeout {
            return Err("min_reveal_timeout must be strictly less than min_settle_timeout".into());
        }

        if self.channel_defaults.max_reveal_timeout >= self.channel_defaults.max_settle_timeout {
            return Err("max_reveal_timeout must be strictly less than max_settle_timeout".into());
        }

        if let Some(file) = &self.logging.file {
            if let Some(parent) = file.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err("log file directory does not exist".into());
                }
            }
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err("invalid metrics port".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> Config {
        Config {
            rpc: RpcConfig { chain_id: 1, rpc_url: "http://localhost:8545".into(), ws_url: None },
            channel_defaults: ChannelDefaults {
                min_reveal_timeout: 20,
                max_reveal_timeout: 200,
                min_settle_timeout: 50,
                max_settle_timeout: 10_000,
            },
            logging: LogConfig { level: "info".into(), file: None, format: LogFormat::Plain },
            metrics: MetricsConfig { enabled: true, port: 9090, host: "127.0.0.1".into() },
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(sample_config().validate().is_ok());
    }

    #[test]
    fn test_rejects_reveal_timeout_not_below_settle_timeout() {
        let mut config = sample_config();
        config.channel_defaults.min_reveal_timeout = config.channel_defaults.min_settle_timeout;
        assert!(config.validate().is_err());
    }
}
