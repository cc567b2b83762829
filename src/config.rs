use serde::{Deserialize, Serialize};
use std::fs;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub enable_tracing: bool,
    /// PostgreSQL connection URL for the ledger store.
    /// When absent the in-memory store is used (local runs, tests).
    #[serde(default)]
    pub postgres_url: Option<String>,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Intent channel sizing and consumer parallelism
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChannelConfig {
    pub queue_size: usize,
    pub workers: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_size: 1024,
            workers: 2,
        }
    }
}

/// Settlement retry discipline
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessorConfig {
    /// Bounded retries for serialization conflicts before the attempt
    /// is surfaced as transient (redelivery takes over).
    pub max_conflict_retries: u32,
    pub conflict_backoff_ms: u64,
    /// Delay before a transiently-failed payload is re-published.
    pub redelivery_backoff_ms: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            conflict_backoff_ms: 20,
            redelivery_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SecurityConfig {
    /// HS256 secret for bearer-token resolution
    pub jwt_secret: String,
    /// AES-128 key for stored payment-instrument encryption (16 bytes)
    pub card_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-only-jwt-secret".to_string(),
            card_key: "0123456789abcdef".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(env: &str) -> Self {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path)
            .unwrap_or_else(|_| panic!("Failed to read config file: {}", config_path));
        serde_yaml::from_str(&content).expect("Failed to parse config yaml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let channel = ChannelConfig::default();
        assert_eq!(channel.queue_size, 1024);
        assert_eq!(channel.workers, 2);

        let processor = ProcessorConfig::default();
        assert_eq!(processor.max_conflict_retries, 5);
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let yaml = r#"
log_level: info
log_dir: ./logs
log_file: payflow.log
use_json: false
rotation: daily
enable_tracing: true
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.postgres_url.is_none());
        assert_eq!(config.channel.workers, 2);
        assert_eq!(config.security.card_key.len(), 16);
    }
}
