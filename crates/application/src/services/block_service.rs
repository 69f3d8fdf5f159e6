use std::sync::Arc;

use domain::{BlockStatus, DomainError, UserId};
use uuid::Uuid;

use crate::{error::ApplicationError, repository::UserRepository};

pub struct BlockServiceDependencies {
    pub user_repository: Arc<dyn UserRepository>,
}

/// 用户之间的屏蔽关系。屏蔽是单向记录、双向生效。
pub struct BlockService {
    deps: BlockServiceDependencies,
}

impl BlockService {
    pub fn new(deps: BlockServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn block(&self, acting_user: Uuid, target_user: Uuid) -> Result<(), ApplicationError> {
        let blocker = UserId::from(acting_user);
        let target = UserId::from(target_user);
        if blocker == target {
            return Err(DomainError::SelfBlock.into());
        }

        self.deps
            .user_repository
            .find_by_id(target)
            .await?
            .ok_or(DomainError::UserNotFound)?;

        self.deps.user_repository.add_block(blocker, target).await?;
        tracing::info!(blocker = %blocker, target = %target, "user blocked");
        Ok(())
    }

    /// 未屏蔽时为空操作
    pub async fn unblock(
        &self,
        acting_user: Uuid,
        target_user: Uuid,
    ) -> Result<(), ApplicationError> {
        let blocker = UserId::from(acting_user);
        let target = UserId::from(target_user);
        self.deps.user_repository.remove_block(blocker, target).await?;
        tracing::info!(blocker = %blocker, target = %target, "user unblocked");
        Ok(())
    }

    pub async fn is_blocked(&self, a: UserId, b: UserId) -> Result<bool, ApplicationError> {
        Ok(self.status(a, b).await?.is_blocked())
    }

    pub async fn status(
        &self,
        viewer: UserId,
        other: UserId,
    ) -> Result<BlockStatus, ApplicationError> {
        Ok(self.deps.user_repository.block_status(viewer, other).await?)
    }
}
