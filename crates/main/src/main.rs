//! 主应用程序入口
//!
//! 加载配置、选择存储后端、启动孤儿匹配修复任务与 Axum Web API 服务。

use std::sync::Arc;

use anyhow::Context;
use application::{
    Clock, MatchRepairDependencies, MatchRepairService, MemoryStore, Repositories, SystemClock,
};
use config::{AppConfig, RepairConfig, StorageBackend};
use infrastructure::Infrastructure;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing_subscriber::EnvFilter;
use web_api::{cors_layer, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    // RUST_LOG 优先于配置文件中的过滤器
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!(config = %config.sanitize(), "配置已加载");
    if config.uses_development_secret() {
        tracing::warn!("using the built-in development JWT secret; set PETMATE_JWT__SECRET");
    }

    let repositories = match config.storage.backend {
        StorageBackend::Postgres => Infrastructure::connect(&config.database)
            .await
            .context("failed to initialise postgres storage")?
            .repositories(),
        StorageBackend::Memory => {
            tracing::warn!("in-memory storage selected; all data is lost on restart");
            MemoryStore::new().repositories()
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repair_task = spawn_repair_task(&repositories, clock.clone(), &config.repair)?;

    let state = AppState::build(repositories, &config, clock);
    let app = router(state).layer(cors_layer(&config.server.cors_origins));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("PetMate 服务启动在 http://{address}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(task) = repair_task {
        task.abort();
    }
    tracing::info!("服务已停止");
    Ok(())
}

/// 周期性修复没有聊天的匹配；interval 为 0 时不启动
fn spawn_repair_task(
    repositories: &Repositories,
    clock: Arc<dyn Clock>,
    config: &RepairConfig,
) -> anyhow::Result<Option<JoinHandle<()>>> {
    if !config.is_enabled() {
        tracing::info!("match repair task disabled");
        return Ok(None);
    }

    let threshold = chrono::Duration::from_std(config.orphan_threshold())
        .context("orphan threshold out of range")?;
    let service = MatchRepairService::new(
        MatchRepairDependencies {
            pet_repository: repositories.pets.clone(),
            match_repository: repositories.matches.clone(),
            chat_repository: repositories.chats.clone(),
            clock,
        },
        config.policy,
        threshold,
    );
    let period = config.interval();

    Ok(Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            // 本轮结果由 run_once 自己记录
            if let Err(err) = service.run_once().await {
                tracing::warn!(error = %err, "match repair pass failed");
            }
        }
    })))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("收到停止信号，开始优雅关闭");
}
