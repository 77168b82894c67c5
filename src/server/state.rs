use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;

use crate::config::Settings;
use crate::delivery_log::{create_delivery_log, DeliveryLog};
use crate::dispatch::{BackoffConfig, DispatchService, DispatchWorker};
use crate::gateway::{create_gateway, MessageGateway};
use crate::otp::{create_otp_backend, OtpBackend, OtpService};
use crate::postgres::PostgresPool;
use crate::queue::{create_dispatch_queue, DispatchQueue};
use crate::redis::{RedisHealth, RedisPool};
use crate::template::{create_template_store, TemplateRepository};

/// Shared handles for request handlers and the dispatch worker.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub templates: Arc<dyn TemplateRepository>,
    pub queue: Arc<dyn DispatchQueue>,
    pub dispatch: Arc<DispatchService>,
    pub otp: Arc<OtpService>,
    pub delivery_log: Arc<dyn DeliveryLog>,
    pub gateway: Arc<dyn MessageGateway>,
    pub redis_pool: Option<Arc<RedisPool>>,
    pub redis_health: Arc<RedisHealth>,
    pub postgres_pool: Option<PostgresPool>,
    pub start_time: Instant,
}

impl AppState {
    /// Connect the configured stores and build every component.
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let redis_health = Arc::new(RedisHealth::new());

        let needs_redis = settings.queue.backend == "redis" || settings.otp.backend == "redis";
        let redis_pool = if needs_redis {
            let pool = RedisPool::new(settings.redis.clone(), redis_health.clone())
                .context("invalid Redis configuration")?;
            if let Err(e) = pool.ping().await {
                tracing::warn!(error = %e, url = %pool.url(), "Redis not reachable at startup");
            }
            Some(Arc::new(pool))
        } else {
            None
        };

        let postgres_pool = if settings.storage.backend == "postgres" {
            let pool = PostgresPool::new(&settings.database)
                .await
                .context("failed to connect to PostgreSQL")?;
            pool.ensure_schema()
                .await
                .context("failed to apply database schema")?;
            tracing::info!(url = %pool.database_url_masked(), "PostgreSQL ready");
            Some(pool)
        } else {
            None
        };

        let templates = create_template_store(&settings.storage.backend, postgres_pool.clone());
        let delivery_log = create_delivery_log(&settings.storage.backend, postgres_pool.clone());
        let queue = create_dispatch_queue(&settings.queue, redis_pool.clone());
        let otp_backend = create_otp_backend(&settings.otp, redis_pool.clone());
        let gateway = create_gateway(&settings.gateway).context("failed to build gateway")?;

        let mut state = Self::from_parts(
            settings,
            templates,
            queue,
            otp_backend,
            delivery_log,
            gateway,
        );
        state.redis_health = redis_health;
        state.redis_pool = redis_pool;
        state.postgres_pool = postgres_pool;

        Ok(state)
    }

    /// Assemble state from ready-made components.
    pub fn from_parts(
        settings: Settings,
        templates: Arc<dyn TemplateRepository>,
        queue: Arc<dyn DispatchQueue>,
        otp_backend: Arc<dyn OtpBackend>,
        delivery_log: Arc<dyn DeliveryLog>,
        gateway: Arc<dyn MessageGateway>,
    ) -> Self {
        let dispatch = Arc::new(DispatchService::new(templates.clone(), queue.clone()));
        let otp = Arc::new(OtpService::from_config(&settings.otp, otp_backend));

        Self {
            settings: Arc::new(settings),
            templates,
            queue,
            dispatch,
            otp,
            delivery_log,
            gateway,
            redis_pool: None,
            redis_health: Arc::new(RedisHealth::new()),
            postgres_pool: None,
            start_time: Instant::now(),
        }
    }

    /// The worker that drains this state's queue.
    pub fn dispatch_worker(&self) -> DispatchWorker {
        DispatchWorker::new(
            self.queue.clone(),
            self.gateway.clone(),
            self.delivery_log.clone(),
        )
        .with_max_attempts(self.settings.worker.max_attempts)
        .with_poll_timeout(self.settings.queue.poll_timeout())
        .with_backoff(BackoffConfig::from(&self.settings.redis))
    }
}
