use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::template::placeholders;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub otp: OtpConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub otel: OtelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Initial reconnect delay in milliseconds
    #[serde(default = "default_backoff_initial_delay_ms")]
    pub backoff_initial_delay_ms: u64,
    /// Upper bound for the reconnect delay in milliseconds
    #[serde(default = "default_backoff_max_delay_ms")]
    pub backoff_max_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL URL, required when `storage.backend = "postgres"`
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout_seconds")]
    pub idle_timeout_seconds: u32,
}

/// Where templates and delivery logs live
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// "memory" or "redis"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
    /// Redis list holding pending dispatch jobs
    #[serde(default = "default_queue_key")]
    pub redis_key: String,
    /// How long a single dequeue waits for a job before returning empty
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// "memory" or "redis"
    #[serde(default = "default_memory_backend")]
    pub backend: String,
    #[serde(default = "default_otp_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default = "default_otp_code_length")]
    pub code_length: usize,
    /// Wrong codes tolerated before the live code is discarded
    #[serde(default = "default_otp_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_otp_prefix")]
    pub redis_prefix: String,
    /// Body of the message carrying the code, rendered with `{{code}}`
    #[serde(default = "default_otp_message_template")]
    pub message_template: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Total gateway attempts per job; 1 disables the immediate retry
    #[serde(default = "default_worker_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    /// "whatsapp" or "log"
    #[serde(default = "default_gateway_kind")]
    pub kind: String,
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,
    #[serde(default = "default_gateway_api_version")]
    pub api_version: String,
    #[serde(default)]
    pub phone_number_id: String,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_gateway_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_backoff_initial_delay_ms() -> u64 {
    100
}

fn default_backoff_max_delay_ms() -> u64 {
    30_000
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout_seconds() -> u32 {
    5
}

fn default_idle_timeout_seconds() -> u32 {
    600
}

fn default_memory_backend() -> String {
    "memory".to_string()
}

fn default_queue_key() -> String {
    "whatsapp:dispatch:queue".to_string()
}

fn default_poll_timeout_ms() -> u64 {
    5_000
}

fn default_otp_ttl_seconds() -> u64 {
    300 // 5 minutes
}

fn default_otp_code_length() -> usize {
    6
}

fn default_otp_max_attempts() -> u32 {
    5
}

fn default_otp_prefix() -> String {
    "whatsapp:otp".to_string()
}

fn default_otp_message_template() -> String {
    "Your verification code is {{code}}".to_string()
}

fn default_true() -> bool {
    true
}

fn default_worker_max_attempts() -> u32 {
    1
}

fn default_gateway_kind() -> String {
    "log".to_string()
}

fn default_gateway_base_url() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_gateway_api_version() -> String {
    "v19.0".to_string()
}

fn default_gateway_timeout_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// "text" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "whatsapp-dispatch-service".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // APP_SERVER__PORT, APP_QUEUE__BACKEND, APP_OTP__TTL_SECONDS, ...
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject combinations that cannot be wired at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.backend == "postgres" && self.database.url.is_none() {
            return Err(ConfigError::Message(
                "database.url is required when storage.backend = \"postgres\"".to_string(),
            ));
        }

        if self.otp.code_length == 0 || self.otp.code_length > 12 {
            return Err(ConfigError::Message(
                "otp.code_length must be between 1 and 12".to_string(),
            ));
        }

        if self.otp.ttl_seconds == 0 {
            return Err(ConfigError::Message(
                "otp.ttl_seconds must be greater than zero".to_string(),
            ));
        }

        if self.queue.poll_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "queue.poll_timeout_ms must be greater than zero".to_string(),
            ));
        }

        match placeholders(&self.otp.message_template) {
            Ok(names) if names.iter().any(|name| name == "code") => {}
            Ok(_) => {
                return Err(ConfigError::Message(
                    "otp.message_template must contain a {{code}} placeholder".to_string(),
                ));
            }
            Err(e) => {
                return Err(ConfigError::Message(format!(
                    "otp.message_template is malformed: {}",
                    e
                )));
            }
        }

        if self.worker.max_attempts == 0 {
            return Err(ConfigError::Message(
                "worker.max_attempts must be at least 1".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::Message(
                "logging.format must be \"text\" or \"json\"".to_string(),
            ));
        }

        if self.gateway.kind == "whatsapp"
            && (self.gateway.phone_number_id.is_empty() || self.gateway.access_token.is_none())
        {
            return Err(ConfigError::Message(
                "gateway.phone_number_id and gateway.access_token are required for the whatsapp gateway"
                    .to_string(),
            ));
        }

        Ok(())
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl QueueConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl OtpConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            redis: RedisConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            queue: QueueConfig::default(),
            otp: OtpConfig::default(),
            worker: WorkerConfig::default(),
            gateway: GatewayConfig::default(),
            otel: OtelConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            backoff_initial_delay_ms: default_backoff_initial_delay_ms(),
            backoff_max_delay_ms: default_backoff_max_delay_ms(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            idle_timeout_seconds: default_idle_timeout_seconds(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            redis_key: default_queue_key(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            ttl_seconds: default_otp_ttl_seconds(),
            code_length: default_otp_code_length(),
            max_attempts: default_otp_max_attempts(),
            redis_prefix: default_otp_prefix(),
            message_template: default_otp_message_template(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: default_worker_max_attempts(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            kind: default_gateway_kind(),
            base_url: default_gateway_base_url(),
            api_version: default_gateway_api_version(),
            phone_number_id: String::new(),
            access_token: None,
            timeout_ms: default_gateway_timeout_ms(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.queue.backend, "memory");
        assert_eq!(settings.otp.ttl(), Duration::from_secs(300));
        assert_eq!(settings.otp.code_length, 6);
        assert_eq!(settings.worker.max_attempts, 1);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_postgres_storage_requires_url() {
        let mut settings = Settings::default();
        settings.storage.backend = "postgres".to_string();
        assert!(settings.validate().is_err());

        settings.database.url = Some("postgres://localhost/whatsapp".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_whatsapp_gateway_requires_credentials() {
        let mut settings = Settings::default();
        settings.gateway.kind = "whatsapp".to_string();
        assert!(settings.validate().is_err());

        settings.gateway.phone_number_id = "1234567890".to_string();
        settings.gateway.access_token = Some("token".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_worker_attempts_rejected() {
        let mut settings = Settings::default();
        settings.worker.max_attempts = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();
        assert!(settings.validate().is_err());

        settings.logging.format = "json".to_string();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_poll_timeout_rejected() {
        let mut settings = Settings::default();
        settings.queue.poll_timeout_ms = 0;

        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("queue.poll_timeout_ms"));
    }

    #[test]
    fn test_otp_message_template_needs_code() {
        let mut settings = Settings::default();

        settings.otp.message_template = "Your verification code is ready".to_string();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("{{code}}"));

        settings.otp.message_template = "Your code: {{code".to_string();
        assert!(settings.validate().is_err());

        settings.otp.message_template = "{{ code }} is your login code".to_string();
        assert!(settings.validate().is_ok());
    }
}
