//! Error types for regalo-srv
//!
//! Identity and store failures carry technical detail for the logs; what the
//! visitor sees comes from [`Error::user_message`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regalo_common::RevealPhase;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Message shown when identity or a store read fails
pub const MSG_CONNECTION_PROBLEM: &str = "Problema de conexión.";

/// Message shown when the assignment cannot be created
pub const MSG_CONNECTION_RETRY: &str = "Error de conexión. Intenta de nuevo.";

/// Main error type for regalo-srv
#[derive(Error, Debug)]
pub enum Error {
    /// Anonymous identity could not be acquired
    #[error("Identity acquisition failed: {0}")]
    Identity(String),

    /// Reading the catalog or the assignment store failed
    #[error("Store read failed: {0}")]
    StoreRead(String),

    /// Writing the assignment failed
    #[error("Store write failed: {0}")]
    StoreWrite(String),

    /// Drawn phrase id has no catalog entry (strict policy)
    #[error("Phrase {phrase_id} not found in catalog")]
    CatalogMiss { phrase_id: i64 },

    /// Trigger not valid in the current phase
    #[error("Invalid transition: cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: RevealPhase,
    },

    /// No live session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(Uuid),

    /// Invalid runtime setting
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shared library error (database bootstrap, I/O)
    #[error(transparent)]
    Common(#[from] regalo_common::Error),
}

/// Convenience Result type using regalo-srv Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Terse, non-technical text for the visitor
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::StoreWrite(_) | Error::CatalogMiss { .. } => MSG_CONNECTION_RETRY,
            Error::InvalidTransition { .. } => "Acción no disponible.",
            Error::SessionNotFound(_) => "Sesión no encontrada.",
            _ => MSG_CONNECTION_PROBLEM,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::debug!("Request failed: {}", self);

        let body = Json(json!({
            "error": self.user_message(),
        }));

        (status, body).into_response()
    }
}
