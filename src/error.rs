use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;

use crate::model::leave_request::LeaveStatus;

/// Failure of the backing store. Never shown verbatim to API callers.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

/// Every error the leave domain surfaces to its callers.
#[derive(Debug, thiserror::Error)]
pub enum LeaveError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    PolicyViolation(String),

    #[error("requested {requested} days, available balance {available}")]
    InsufficientBalance { requested: f64, available: f64 },

    #[error("cannot {action} a {from} request")]
    InvalidTransition {
        from: LeaveStatus,
        action: &'static str,
    },

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeaveError {
    pub fn validation(message: impl Into<String>) -> Self {
        LeaveError::Validation(message.into())
    }

    pub fn policy(message: impl Into<String>) -> Self {
        LeaveError::PolicyViolation(message.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        LeaveError::NotFound(what.into())
    }

    /// Stable machine-readable code for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LeaveError::Validation(_) => "validation_error",
            LeaveError::Conflict(_) => "conflict",
            LeaveError::PolicyViolation(_) => "policy_violation",
            LeaveError::InsufficientBalance { .. } => "insufficient_balance",
            LeaveError::InvalidTransition { .. } => "invalid_transition",
            LeaveError::NotFound(_) => "not_found",
            LeaveError::Forbidden(_) => "forbidden",
            LeaveError::Store(_) => "internal_error",
        }
    }

    /// Message safe to hand to API callers.
    pub fn public_message(&self) -> String {
        match self {
            LeaveError::Store(_) => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for LeaveError {
    fn from(value: sqlx::Error) -> Self {
        LeaveError::Store(StoreError::Database(value))
    }
}

impl ResponseError for LeaveError {
    fn status_code(&self) -> StatusCode {
        match self {
            LeaveError::Validation(_) => StatusCode::BAD_REQUEST,
            LeaveError::Conflict(_) | LeaveError::InvalidTransition { .. } => StatusCode::CONFLICT,
            LeaveError::PolicyViolation(_) | LeaveError::InsufficientBalance { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            LeaveError::NotFound(_) => StatusCode::NOT_FOUND,
            LeaveError::Forbidden(_) => StatusCode::FORBIDDEN,
            LeaveError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let LeaveError::Store(e) = self {
            tracing::error!(error = %e, "Leave store failure");
        }
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.kind(),
            "message": self.public_message(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_balance_message_names_both_limits() {
        let err = LeaveError::InsufficientBalance {
            requested: 5.0,
            available: 2.5,
        };
        assert_eq!(err.to_string(), "requested 5 days, available balance 2.5");
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn invalid_transition_message_names_state_and_action() {
        let err = LeaveError::InvalidTransition {
            from: LeaveStatus::Rejected,
            action: "approve",
        };
        assert_eq!(err.to_string(), "cannot approve a REJECTED request");
        assert_eq!(err.kind(), "invalid_transition");
    }

    #[test]
    fn store_errors_hide_details() {
        let err = LeaveError::Store(StoreError::Corrupt("bad enum".to_string()));
        assert_eq!(err.public_message(), "Internal Server Error");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
