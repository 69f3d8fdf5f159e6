//! 领域模型错误定义
//!
//! 每个错误变体都归属于一个稳定的 [`ErrorKind`]，传输层据此决定状态码，
//! 而不需要解析错误文本。

use serde::Serialize;
use thiserror::Error;

/// 对外暴露的错误分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    InvalidState,
    InvalidOperation,
    InvalidInput,
}

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Pet not found")]
    PetNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Interest not found")]
    InterestNotFound,

    #[error("Chat not found")]
    ChatNotFound,

    /// 操作的宠物不属于当前用户
    #[error("Pet does not belong to the current user")]
    PetNotOwned,

    #[error("You are not a participant of this chat")]
    NotChatParticipant,

    /// 当前用户屏蔽了对方
    #[error("You have blocked this user")]
    BlockedByYou,

    /// 对方屏蔽了当前用户
    #[error("You cannot send messages to this user")]
    BlockedByOther,

    #[error("Interest already sent")]
    InterestAlreadySent,

    #[error("Interest already processed")]
    InterestAlreadyProcessed,

    #[error("Pet is not active")]
    PetInactive,

    #[error("Cannot send interest to your own pet")]
    SelfInterest,

    #[error("Cannot block yourself")]
    SelfBlock,

    #[error("Message content is required")]
    EmptyMessage,

    /// 验证错误
    #[error("Invalid {field}: {message}")]
    ValidationError { field: String, message: String },
}

impl DomainError {
    /// 创建验证错误
    pub fn validation_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::PetNotFound
            | DomainError::UserNotFound
            | DomainError::InterestNotFound
            | DomainError::ChatNotFound => ErrorKind::NotFound,
            DomainError::PetNotOwned
            | DomainError::NotChatParticipant
            | DomainError::BlockedByYou
            | DomainError::BlockedByOther => ErrorKind::Forbidden,
            DomainError::InterestAlreadySent => ErrorKind::Conflict,
            DomainError::InterestAlreadyProcessed | DomainError::PetInactive => {
                ErrorKind::InvalidState
            }
            DomainError::SelfInterest | DomainError::SelfBlock => ErrorKind::InvalidOperation,
            DomainError::EmptyMessage | DomainError::ValidationError { .. } => {
                ErrorKind::InvalidInput
            }
        }
    }
}

/// 领域模型结果类型
pub type DomainResult<T> = Result<T, DomainError>;

/// 仓储层错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated")]
    Conflict,

    #[error("storage failure: {message}")]
    Storage { message: String },
}

impl RepositoryError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_errors_are_forbidden_with_distinct_messages() {
        assert_eq!(DomainError::BlockedByYou.kind(), ErrorKind::Forbidden);
        assert_eq!(DomainError::BlockedByOther.kind(), ErrorKind::Forbidden);
        assert_eq!(
            DomainError::BlockedByYou.to_string(),
            "You have blocked this user"
        );
        assert_eq!(
            DomainError::BlockedByOther.to_string(),
            "You cannot send messages to this user"
        );
    }

    #[test]
    fn resolution_errors_map_to_their_kinds() {
        assert_eq!(
            DomainError::InterestAlreadySent.kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            DomainError::InterestAlreadyProcessed.kind(),
            ErrorKind::InvalidState
        );
        assert_eq!(DomainError::PetInactive.kind(), ErrorKind::InvalidState);
        assert_eq!(DomainError::SelfInterest.kind(), ErrorKind::InvalidOperation);
        assert_eq!(
            DomainError::validation_error("content", "too long").kind(),
            ErrorKind::InvalidInput
        );
    }
}
