//! JSON envelope shared by all non-redirect endpoints: `{code, msg, data}`.

use crate::error::SsoError;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use utoipa::ToSchema;

pub const CODE_OK: i32 = 0;
pub const CODE_NOT_LOGGED_IN: i32 = 1000;
pub const CODE_NO_PERMISSION: i32 = 1005;
pub const CODE_PARAM_ERROR: i32 = 1200;
pub const CODE_DATABASE_ERROR: i32 = 1300;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// 0 on success
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Envelope without payload, as documented for error and empty responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiStatus {
    pub code: i32,
    pub msg: String,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: CODE_OK,
            msg: "OK".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn success() -> Self {
        Self {
            code: CODE_OK,
            msg: "OK".to_string(),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Failed request, rendered as the envelope with a non-zero code.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn not_logged_in() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: CODE_NOT_LOGGED_IN,
            msg: "Not logged in".to_string(),
        }
    }

    pub fn no_permission() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: CODE_NO_PERMISSION,
            msg: "No permission".to_string(),
        }
    }

    pub fn param(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: CODE_PARAM_ERROR,
            msg: msg.into(),
        }
    }

    pub fn database() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: CODE_DATABASE_ERROR,
            msg: "Database error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        tracing::error!(error = %err, "database error");
        Self::database()
    }
}

impl From<SsoError> for ApiError {
    fn from(err: SsoError) -> Self {
        match err {
            SsoError::Database(e) => e.into(),
            other => Self::param(other.user_message()),
        }
    }
}

/// JSON request body whose rejection is a parameter error in the envelope
/// instead of axum's plain-text response.
#[derive(Debug, Clone)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                tracing::debug!(error = %rejection, "rejected request body");
                Err(ApiError::param(rejection_message(&rejection)))
            }
        }
    }
}

fn rejection_message(rejection: &JsonRejection) -> String {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => "Expected a JSON request body".to_string(),
        other => other.body_text(),
    }
}
