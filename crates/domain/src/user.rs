use std::collections::BTreeSet;

use crate::errors::{DomainError, DomainResult};
use crate::value_objects::{Timestamp, UserId};

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    /// 该用户屏蔽的其他用户（集合语义，重复屏蔽无副作用）
    pub blocked_users: BTreeSet<UserId>,
    pub is_banned: bool,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl User {
    pub fn register(id: UserId, name: impl Into<String>, now: Timestamp) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation_error("name", "name is required"));
        }
        Ok(Self {
            id,
            name,
            blocked_users: BTreeSet::new(),
            is_banned: false,
            deleted_at: None,
            created_at: now,
        })
    }

    /// 被封禁或已删除的账户不能建立任何连接
    pub fn can_sign_in(&self) -> bool {
        !self.is_banned && self.deleted_at.is_none()
    }

    pub fn has_blocked(&self, other: UserId) -> bool {
        self.blocked_users.contains(&other)
    }

    /// 屏蔽某个用户；返回集合是否发生了变化
    pub fn block(&mut self, target: UserId) -> DomainResult<bool> {
        if target == self.id {
            return Err(DomainError::SelfBlock);
        }
        Ok(self.blocked_users.insert(target))
    }

    /// 取消屏蔽；未屏蔽时为空操作
    pub fn unblock(&mut self, target: UserId) -> bool {
        self.blocked_users.remove(&target)
    }

    pub fn ban(&mut self) {
        self.is_banned = true;
    }

    pub fn soft_delete(&mut self, now: Timestamp) {
        self.deleted_at = Some(now);
    }
}

/// 两个用户之间的屏蔽状态，以 viewer 的视角描述
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlockStatus {
    /// viewer 屏蔽了对方
    pub blocked_by_viewer: bool,
    /// 对方屏蔽了 viewer
    pub blocked_by_other: bool,
}

impl BlockStatus {
    pub fn between(viewer: &User, other: &User) -> Self {
        Self {
            blocked_by_viewer: viewer.has_blocked(other.id),
            blocked_by_other: other.has_blocked(viewer.id),
        }
    }

    /// 任一方向存在屏蔽即视为被屏蔽
    pub fn is_blocked(&self) -> bool {
        self.blocked_by_viewer || self.blocked_by_other
    }

    /// 转换成发送消息时应返回的错误
    pub fn ensure_can_message(&self) -> DomainResult<()> {
        if self.blocked_by_viewer {
            Err(DomainError::BlockedByYou)
        } else if self.blocked_by_other {
            Err(DomainError::BlockedByOther)
        } else {
            Ok(())
        }
    }
}
