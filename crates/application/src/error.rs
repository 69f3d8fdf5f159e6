use domain::{DomainError, ErrorKind, RepositoryError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("authentication failed")]
    Authentication,
}

impl ApplicationError {
    /// 业务错误的分类；存储、认证故障返回 None
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApplicationError::Domain(err) => Some(err.kind()),
            _ => None,
        }
    }

    /// 是否是暂时性故障，调用方可以重试
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApplicationError::Repository(RepositoryError::Storage { .. })
        )
    }
}
