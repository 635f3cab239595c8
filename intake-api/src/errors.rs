use hyper::StatusCode;
use record_store::{BlobError, StoreError};

use crate::auth::AuthError;
use crate::merge::MergeError;

pub type ApiResult<T, E = ApiError> = Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("detail id not found in stored record: {0}")]
    IdentityMismatch(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),

    #[error("file store error: {0}")]
    Blob(#[from] BlobError),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("invalid webhook signature")]
    InvalidSignature,

    #[error("could not read request body: {0}")]
    RequestBody(String),

    #[error("could not serialize response: {0}")]
    ResponseSerialization(String),

    #[error("record not found")]
    NotFound,

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<MergeError> for ApiError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::IdentityMismatch(id) => ApiError::IdentityMismatch(id),
            other => ApiError::MalformedInput(other.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Auth(_) | ApiError::UnsupportedAction(_) | ApiError::InvalidSignature => {
                StatusCode::FORBIDDEN
            }
            ApiError::MalformedInput(_) | ApiError::RequestBody(_) => StatusCode::BAD_REQUEST,
            ApiError::IdentityMismatch(_) => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Store(StoreError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Store(StoreError::Malformed(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Blob(BlobError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Blob(_)
            | ApiError::ResponseSerialization(_)
            | ApiError::Internal(_)
            | ApiError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
