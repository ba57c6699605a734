use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid report time {hour:02}:{minute:02}:{second:02} UTC")]
    InvalidReportTime { hour: u32, minute: u32, second: u32 },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub farcaster: FarcasterConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Primary WebSocket RPC URL (preferred transport).
    #[serde(default)]
    pub ws_url: String,
    /// Fallback WebSocket RPC URLs, rotated through on failure.
    #[serde(default)]
    pub fallback_ws_urls: Vec<String>,
    /// HTTP RPC URL, used for log polling when no WebSocket provider is
    /// reachable and for the leaderboard backfill.
    #[serde(default)]
    pub http_url: String,
    /// Address of the staking contract to watch.
    #[serde(default)]
    pub contract: String,
    /// Poll interval in seconds for the HTTP fallback transport.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FarcasterConfig {
    /// Neynar API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Neynar API key - loaded from env NEYNAR_API_KEY
    #[serde(default)]
    pub api_key: String,
    /// Farcaster signer UUID - loaded from env SIGNER_UUID
    #[serde(default)]
    pub signer_uuid: String,
    /// Image embedded in stake and daily-report casts.
    #[serde(default = "default_sign_image_url")]
    pub sign_image_url: String,
    /// Image embedded in transfer casts.
    #[serde(default = "default_sale_image_url")]
    pub sale_image_url: String,
    /// Mini-app link appended to the leaderboard cast.
    #[serde(default = "default_miniapp_url")]
    pub miniapp_url: String,
    /// Timeout on outbound cast requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
    /// Total delivery attempts per cast (first try + retries).
    #[serde(default = "default_publish_attempts")]
    pub publish_attempts: u32,
    /// Capacity of the cast queue between the event loop and the publisher.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportConfig {
    /// UTC fire time for the daily report.
    #[serde(default)]
    pub utc_hour: u32,
    #[serde(default)]
    pub utc_minute: u32,
    #[serde(default = "default_report_second")]
    pub utc_second: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
    /// How many blocks behind the tip the leaderboard scan starts.
    #[serde(default = "default_lookback")]
    pub lookback_blocks: u64,
    /// Blocks per eth_getLogs query.
    #[serde(default = "default_window")]
    pub window_blocks: u64,
    /// Leaderboard length.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address of the liveness endpoint.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// URL the keep-alive task pings; empty disables the task.
    #[serde(default)]
    pub self_ping_url: String,
    #[serde(default = "default_self_ping_interval")]
    pub self_ping_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_poll_interval() -> u64 {
    5
}
fn default_api_url() -> String {
    "https://api.neynar.com".to_string()
}
fn default_sign_image_url() -> String {
    "https://baseland.life/vrnouns_sign.jpg".to_string()
}
fn default_sale_image_url() -> String {
    "https://baseland.life/vrnouns_sale.jpg".to_string()
}
fn default_miniapp_url() -> String {
    "https://farcaster.xyz/miniapps/pIFtRBsgnWAF/flooorfun".to_string()
}
fn default_http_timeout() -> u64 {
    10
}
fn default_publish_attempts() -> u32 {
    3
}
fn default_queue_capacity() -> usize {
    64
}
fn default_report_second() -> u32 {
    30
}
fn default_lookback() -> u64 {
    500
}
fn default_window() -> u64 {
    50
}
fn default_top_n() -> usize {
    10
}
fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
fn default_self_ping_interval() -> u64 {
    840
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            ws_url: String::new(),
            fallback_ws_urls: Vec::new(),
            http_url: String::new(),
            contract: String::new(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Default for FarcasterConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            signer_uuid: String::new(),
            sign_image_url: default_sign_image_url(),
            sale_image_url: default_sale_image_url(),
            miniapp_url: default_miniapp_url(),
            http_timeout_secs: default_http_timeout(),
            publish_attempts: default_publish_attempts(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            utc_hour: 0,
            utc_minute: 0,
            utc_second: default_report_second(),
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            lookback_blocks: default_lookback(),
            window_blocks: default_window(),
            top_n: default_top_n(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            self_ping_url: String::new(),
            self_ping_interval_secs: default_self_ping_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for secrets.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        // Override secrets from environment variables (never store in config file)
        if let Ok(key) = std::env::var("NEYNAR_API_KEY") {
            config.farcaster.api_key = key;
        }
        if let Ok(uuid) = std::env::var("SIGNER_UUID") {
            config.farcaster.signer_uuid = uuid;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load a default config with env-only settings (no file needed).
    pub fn from_env() -> Self {
        Config {
            chain: ChainConfig {
                ws_url: std::env::var("BASE_RPC_WSS").unwrap_or_default(),
                fallback_ws_urls: Vec::new(),
                http_url: std::env::var("BASE_RPC_HTTPS").unwrap_or_default(),
                contract: std::env::var("SIGN_CONTRACT").unwrap_or_default(),
                poll_interval_secs: default_poll_interval(),
            },
            farcaster: FarcasterConfig {
                api_key: std::env::var("NEYNAR_API_KEY").unwrap_or_default(),
                signer_uuid: std::env::var("SIGNER_UUID").unwrap_or_default(),
                ..FarcasterConfig::default()
            },
            report: ReportConfig::default(),
            scanner: ScannerConfig::default(),
            server: ServerConfig {
                bind: std::env::var("BIND_ADDR").unwrap_or_else(|_| default_bind()),
                ..ServerConfig::default()
            },
            logging: LoggingConfig::default(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.report;
        if r.utc_hour > 23 || r.utc_minute > 59 || r.utc_second > 59 {
            return Err(ConfigError::InvalidReportTime {
                hour: r.utc_hour,
                minute: r.utc_minute,
                second: r.utc_second,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_gets_defaults() {
        let config: Config = toml::from_str(
            r#"
            [chain]
            contract = "0x1f9090aae28b8a3dceadf281b0f12828e676c326"
            "#,
        )
        .unwrap();

        assert_eq!(config.chain.contract, "0x1f9090aae28b8a3dceadf281b0f12828e676c326");
        assert_eq!(config.chain.poll_interval_secs, 5);
        assert_eq!(config.farcaster.api_url, "https://api.neynar.com");
        assert_eq!(config.farcaster.publish_attempts, 3);
        assert_eq!(config.report.utc_hour, 0);
        assert_eq!(config.report.utc_second, 30);
        assert_eq!(config.scanner.lookback_blocks, 500);
        assert_eq!(config.scanner.window_blocks, 50);
        assert_eq!(config.scanner.top_n, 10);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_report_time_rejected() {
        let config: Config = toml::from_str(
            r#"
            [report]
            utc_hour = 24
            "#,
        )
        .unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidReportTime { hour: 24, .. })
        ));
    }
}
