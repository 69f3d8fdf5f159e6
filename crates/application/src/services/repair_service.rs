use std::sync::Arc;

use chrono::Duration;
use config::RepairPolicy;
use domain::{DomainError, Match, MatchStatus};

use crate::{
    clock::Clock,
    error::ApplicationError,
    repository::{ChatRepository, MatchRepository, PetRepository},
    services::match_service::provision_chat,
};

pub struct MatchRepairDependencies {
    pub pet_repository: Arc<dyn PetRepository>,
    pub match_repository: Arc<dyn MatchRepository>,
    pub chat_repository: Arc<dyn ChatRepository>,
    pub clock: Arc<dyn Clock>,
}

/// 一轮修复的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub scanned: usize,
    pub repaired: usize,
    pub cancelled: usize,
    pub failed: usize,
}

/// 处理没有聊天的匹配：按策略补建聊天或取消匹配
pub struct MatchRepairService {
    deps: MatchRepairDependencies,
    policy: RepairPolicy,
    orphan_threshold: Duration,
}

impl MatchRepairService {
    pub fn new(
        deps: MatchRepairDependencies,
        policy: RepairPolicy,
        orphan_threshold: Duration,
    ) -> Self {
        Self {
            deps,
            policy,
            orphan_threshold,
        }
    }

    pub async fn run_once(&self) -> Result<RepairReport, ApplicationError> {
        let now = self.deps.clock.now();
        let orphans = self
            .deps
            .match_repository
            .list_without_chat(now - self.orphan_threshold)
            .await?;

        let mut report = RepairReport {
            scanned: orphans.len(),
            ..RepairReport::default()
        };

        for orphan in &orphans {
            match self.policy {
                RepairPolicy::Cancel => self.cancel(orphan, &mut report).await,
                RepairPolicy::Retry => self.retry(orphan, &mut report).await,
            }
        }

        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                repaired = report.repaired,
                cancelled = report.cancelled,
                failed = report.failed,
                "orphan match repair finished"
            );
        }
        Ok(report)
    }

    async fn retry(&self, orphan: &Match, report: &mut RepairReport) {
        let result = provision_chat(
            self.deps.pet_repository.as_ref(),
            self.deps.chat_repository.as_ref(),
            self.deps.match_repository.as_ref(),
            self.deps.clock.as_ref(),
            orphan,
        )
        .await;

        match result {
            Ok(_) => report.repaired += 1,
            // 宠物已不存在，聊天再也无法建立
            Err(ApplicationError::Domain(DomainError::PetNotFound)) => {
                self.cancel(orphan, report).await
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(match_id = %orphan.id, error = %err, "retrying chat creation failed");
            }
        }
    }

    async fn cancel(&self, orphan: &Match, report: &mut RepairReport) {
        let result = self
            .deps
            .match_repository
            .update_status(orphan.id, MatchStatus::Cancelled, self.deps.clock.now())
            .await;
        match result {
            Ok(()) => {
                report.cancelled += 1;
                tracing::warn!(match_id = %orphan.id, "orphan match cancelled");
            }
            Err(err) => {
                report.failed += 1;
                tracing::warn!(match_id = %orphan.id, error = %err, "cancelling orphan match failed");
            }
        }
    }
}
