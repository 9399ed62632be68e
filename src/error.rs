use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Every failure the API can surface. User-facing messages are Spanish,
/// matching the storefront; internal variants never leak detail to the
/// caller (logged server-side, generic 500 body).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Código de referido inválido.")]
    InvalidReferralGate,
    #[error("El usuario o correo electrónico ya está registrado.")]
    Conflict,
    // unknown email and wrong password share this variant on purpose:
    // the caller must not be able to probe which accounts exist
    #[error("Credenciales inválidas.")]
    InvalidCredentials,
    #[error("Usuario no encontrado.")]
    AccountNotFound,
    #[error("Transacción no encontrada.")]
    EntryNotFound,
    #[error("La transacción ya fue procesada.")]
    InvalidState,
    #[error("no collision-free referral code after {0} attempts")]
    AllocationExhausted(u32),
    #[error("ledger write for account {0} kept conflicting")]
    LedgerContention(i64),
    #[error("account {0} holds malformed data: {1}")]
    CorruptAccount(i64, String),
    #[error("password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidReferralGate => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::AccountNotFound | ApiError::EntryNotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict | ApiError::InvalidState => StatusCode::CONFLICT,
            ApiError::AllocationExhausted(_)
            | ApiError::LedgerContention(_)
            | ApiError::CorruptAccount(_, _)
            | ApiError::Hashing(_)
            | ApiError::Database(_)
            | ApiError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("internal error: {}", self);
            "Error interno del servidor.".to_string()
        } else {
            self.to_string()
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}
