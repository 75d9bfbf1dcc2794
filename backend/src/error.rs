use actix_web::{error::BlockingError, http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

/// Failure while talking to the measurement store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot open database: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("{0}")]
    Query(#[from] diesel::result::Error),
}

/// Rejections and failures of the ad-hoc query path.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("Access denied: This endpoint is only accessible from local network")]
    AccessDenied,

    #[error("Query is required")]
    EmptyQuery,

    #[error("Only SELECT queries are allowed")]
    NotSelect,

    #[error("Query contains forbidden keyword: {0}")]
    ForbiddenKeyword(&'static str),

    #[error("Database error: {0}")]
    Store(#[from] StoreError),
}

/// Transport-facing error taxonomy. The only place where failures become
/// HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Out-of-range or unparsable request parameter.
    #[error("{0}")]
    InvalidParameter(String),

    #[error("{0}")]
    BadRequest(String),

    /// Statement rejected by the sandbox policy.
    #[error("{0}")]
    Forbidden(String),

    /// Caller outside the local network.
    #[error("{0}")]
    AccessDenied(String),

    #[error("{0}")]
    NotFound(String),

    /// The store refused the caller's own SQL text. The diagnostic is echoed.
    #[error("Database error: {0}")]
    QueryFailed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("blocking worker failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl ApiError {
    fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidParameter(_) => "INVALID_PARAMETER",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::AccessDenied(_) => "ACCESS_DENIED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::QueryFailed(_) => "QUERY_FAILED",
            ApiError::Store(_) | ApiError::Blocking(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<SandboxError> for ApiError {
    fn from(err: SandboxError) -> Self {
        match err {
            SandboxError::AccessDenied => ApiError::AccessDenied(err.to_string()),
            SandboxError::EmptyQuery => ApiError::BadRequest(err.to_string()),
            SandboxError::NotSelect | SandboxError::ForbiddenKeyword(_) => {
                ApiError::Forbidden(err.to_string())
            }
            SandboxError::Store(StoreError::Query(e)) => ApiError::QueryFailed(e.to_string()),
            SandboxError::Store(e) => ApiError::Store(e),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidParameter(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) | ApiError::QueryFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) | ApiError::AccessDenied(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Store(_) | ApiError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            ApiError::Store(_) | ApiError::Blocking(_) => {
                log::error!("request failed: {self}");
                "An internal error occurred".to_string()
            }
            _ => self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(json!({
            "error": message,
            "code": self.code(),
        }))
    }
}
