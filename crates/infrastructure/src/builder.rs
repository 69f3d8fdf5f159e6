use std::sync::Arc;
use std::time::Duration;

use application::Repositories;
use config::DatabaseConfig;
use thiserror::Error;

use crate::{
    migrations::MIGRATOR,
    repository::{create_pg_pool, PgStorage},
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

#[derive(Clone)]
pub struct Infrastructure {
    pub storage: Arc<PgStorage>,
}

impl Infrastructure {
    /// 建立连接池并执行迁移
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(
            &config.url,
            config.max_connections,
            Duration::from_secs(config.acquire_timeout_seconds),
        )
        .await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!(
            max_connections = config.max_connections,
            "postgres storage ready"
        );

        Ok(Self {
            storage: Arc::new(PgStorage::new(pool)),
        })
    }

    pub fn repositories(&self) -> Repositories {
        self.storage.repositories()
    }
}
