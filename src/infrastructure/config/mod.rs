mod settings;

pub use settings::{
    DatabaseConfig, GatewayConfig, LoggingConfig, OtelConfig, OtpConfig, QueueConfig, RedisConfig,
    ServerConfig, Settings, StorageConfig, WorkerConfig,
};
