use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

#[derive(Debug, PartialEq)]
pub enum DatabaseError {
    ServerError,
    NotFound,
    HasDependents,
    DuplicateEmail,
}

#[derive(Debug, PartialEq)]
pub enum ApiError {
    ValidationError(String),
    HasDependents,
    NotFound,
    ServerError,
    AuthenticationError,
    Forbidden,
}

impl From<DatabaseError> for ApiError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::ServerError => Self::ServerError,
            DatabaseError::NotFound => Self::NotFound,
            DatabaseError::HasDependents => Self::HasDependents,
            DatabaseError::DuplicateEmail => {
                Self::ValidationError("Email is already in use".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message) = match self {
            Self::ValidationError(message) => (StatusCode::BAD_REQUEST, message),
            Self::HasDependents => (
                StatusCode::CONFLICT,
                "User has referred other users and cannot be deleted".to_string(),
            ),
            Self::NotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            Self::ServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong".to_string(),
            ),
            Self::AuthenticationError => {
                (StatusCode::UNAUTHORIZED, "Authentication failed".to_string())
            }
            Self::Forbidden => (StatusCode::FORBIDDEN, "Admin access required".to_string()),
        };

        let body = Json(json!({
            "error": error_message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug)]
pub enum JWTError {
    GenerationFailed(jsonwebtoken::errors::ErrorKind),
    DecodeFailed(jsonwebtoken::errors::ErrorKind),
}

impl From<JWTError> for ApiError {
    fn from(_value: JWTError) -> Self {
        Self::AuthenticationError
    }
}
