//! API error responses
//!
//! Every error is rendered as `{request_id, error: {code, message}}` with a
//! status code that matches its kind.

use crate::errors::GameError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub request_id: String,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable machine-readable code (UNKNOWN_ACCOUNT, BAD_REQUEST, ...)
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub request_id: String,
}

#[derive(Debug)]
pub enum ApiErrorKind {
    NotFound(String),
    BadRequest(String),
    /// A rejection from the betting core; carries its own code
    Game {
        status: StatusCode,
        code: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn not_found(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::NotFound(message),
            request_id,
        }
    }

    pub fn bad_request(request_id: String, message: String) -> Self {
        Self {
            kind: ApiErrorKind::BadRequest(message),
            request_id,
        }
    }

    /// Map a core error. Storage details stay in the logs.
    pub fn from_game(request_id: String, err: GameError) -> Self {
        let status = match &err {
            GameError::UnknownAccount { .. } => StatusCode::NOT_FOUND,
            GameError::StakeTooSmall { .. }
            | GameError::MultiplierOutOfRange { .. }
            | GameError::InsufficientBalance { .. }
            | GameError::AmountOverflow { .. }
            | GameError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            GameError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            GameError::Persistence(_) => "request could not be processed".to_string(),
            other => other.to_string(),
        };
        Self {
            kind: ApiErrorKind::Game {
                status,
                code: err.code(),
                message,
            },
            request_id,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ApiErrorKind::NotFound(msg) => write!(f, "[{}] Not Found: {}", self.request_id, msg),
            ApiErrorKind::BadRequest(msg) => write!(f, "[{}] Bad Request: {}", self.request_id, msg),
            ApiErrorKind::Game { code, message, .. } => {
                write!(f, "[{}] {}: {}", self.request_id, code, message)
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self.kind {
            ApiErrorKind::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiErrorKind::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiErrorKind::Game {
                status,
                code,
                message,
            } => (status, code, message),
        };

        let body = Json(ErrorResponse {
            request_id: self.request_id,
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_game_error_status_mapping() {
        let err = ApiError::from_game(
            "req-1".to_string(),
            GameError::UnknownAccount {
                username: "ghost".to_string(),
            },
        );
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

        let err = ApiError::from_game(
            "req-2".to_string(),
            GameError::InsufficientBalance {
                balance: dec!(1),
                stake: dec!(2),
            },
        );
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_details_are_hidden() {
        let err = ApiError::from_game(
            "req-3".to_string(),
            GameError::Persistence(StorageError::Backend("disk on fire".to_string())),
        );
        match &err.kind {
            ApiErrorKind::Game { code, message, .. } => {
                assert_eq!(*code, "PERSISTENCE_FAILURE");
                assert!(!message.contains("disk"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
