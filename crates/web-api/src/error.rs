use application::ApplicationError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::{DomainError, ErrorKind, RepositoryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    /// 暂时性故障，客户端可以原样重试
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                retryable: false,
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            body: ErrorBody {
                code: "STORAGE_UNAVAILABLE",
                message: "Service temporarily unavailable, please retry".into(),
                retryable: true,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.body.code
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::Conflict | ErrorKind::InvalidState => StatusCode::CONFLICT,
        ErrorKind::InvalidOperation | ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
    }
}

fn domain_code(error: &DomainError) -> &'static str {
    match error {
        DomainError::PetNotFound => "PET_NOT_FOUND",
        DomainError::UserNotFound => "USER_NOT_FOUND",
        DomainError::InterestNotFound => "INTEREST_NOT_FOUND",
        DomainError::ChatNotFound => "CHAT_NOT_FOUND",
        DomainError::PetNotOwned => "PET_NOT_OWNED",
        DomainError::NotChatParticipant => "NOT_CHAT_PARTICIPANT",
        DomainError::BlockedByYou => "BLOCKED_BY_YOU",
        DomainError::BlockedByOther => "BLOCKED_BY_OTHER",
        DomainError::InterestAlreadySent => "INTEREST_ALREADY_SENT",
        DomainError::InterestAlreadyProcessed => "INTEREST_ALREADY_PROCESSED",
        DomainError::PetInactive => "PET_INACTIVE",
        DomainError::SelfInterest => "SELF_INTEREST",
        DomainError::SelfBlock => "SELF_BLOCK",
        DomainError::EmptyMessage => "EMPTY_MESSAGE",
        DomainError::ValidationError { .. } => "INVALID_ARGUMENT",
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(err) => {
                ApiError::new(status_for(err.kind()), domain_code(&err), err.to_string())
            }
            ApplicationError::Repository(RepositoryError::NotFound) => ApiError::new(
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "requested resource not found",
            ),
            ApplicationError::Repository(RepositoryError::Conflict) => {
                ApiError::new(StatusCode::CONFLICT, "CONFLICT", "resource already exists")
            }
            ApplicationError::Repository(RepositoryError::Storage { message }) => {
                // 内部细节只进日志
                tracing::error!(error = %message, "storage failure");
                ApiError::unavailable()
            }
            ApplicationError::Authentication => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_FAILED",
                "authentication failed",
            ),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::bad_request(errors.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
