use std::sync::Arc;

use domain::{User, UserId};
use uuid::Uuid;

use crate::{error::ApplicationError, repository::UserRepository};

/// 连接与请求的身份校验：令牌里的用户必须存在、未被封禁、未被删除
pub struct IdentityService {
    user_repository: Arc<dyn UserRepository>,
}

impl IdentityService {
    pub fn new(user_repository: Arc<dyn UserRepository>) -> Self {
        Self { user_repository }
    }

    pub async fn authenticate(&self, user_id: Uuid) -> Result<User, ApplicationError> {
        let user = self
            .user_repository
            .find_by_id(UserId::from(user_id))
            .await?
            .ok_or(ApplicationError::Authentication)?;

        if !user.can_sign_in() {
            tracing::warn!(user_id = %user.id, "rejected sign-in from inactive account");
            return Err(ApplicationError::Authentication);
        }
        Ok(user)
    }
}
