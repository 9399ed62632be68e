use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::ledger::{EntryKind, EntryStatus, LedgerEntry, LedgerRepository};
use crate::db::utils::format_entry_date;
use crate::error::ApiError;

/// Bound on read-modify-write retries for one request. Contention on a
/// single account is short-lived; hitting this means something is wrong.
const MAX_WRITE_ATTEMPTS: u32 = 16;

/// Client-supplied part of a new entry. Ids, dates and status are assigned
/// server-side; anything else the client sends along is ignored.
#[derive(Debug, Deserialize)]
pub struct EntryDraft {
    pub description: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordRequest {
    pub user_id: Option<i64>,
    pub transaction: Option<serde_json::Value>,
}

impl RecordRequest {
    fn into_parts(self) -> Result<(i64, EntryDraft), ApiError> {
        let (Some(user_id), Some(transaction)) = (self.user_id, self.transaction) else {
            return Err(ApiError::validation("Faltan datos de usuario o transacción."));
        };
        let draft = serde_json::from_value(transaction)
            .map_err(|_err| ApiError::validation("La transacción no tiene un formato válido."))?;
        Ok((user_id, draft))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub user_id: Option<i64>,
    pub transaction_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub message: String,
    pub transaction_id: i64,
    pub new_history: Vec<LedgerEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub message: String,
    pub new_history: Vec<LedgerEntry>,
}

// Ledger service
pub struct LedgerService {
    pub repo: LedgerRepository,
}

impl LedgerService {
    pub fn new(repo: LedgerRepository) -> Self {
        Self { repo }
    }

    /// Prepends a new pending entry to the account's history and returns
    /// its server-assigned id plus the updated history.
    pub async fn record(
        &self,
        account_id: i64,
        draft: EntryDraft,
    ) -> Result<(i64, Vec<LedgerEntry>), ApiError> {
        if draft.amount <= Decimal::ZERO {
            return Err(ApiError::validation("El monto debe ser mayor a cero."));
        }

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let snapshot = self
                .repo
                .load(account_id)
                .await?
                .ok_or(ApiError::AccountNotFound)?;
            let mut entries = snapshot.entries;

            let description = match draft.description.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => text.to_string(),
                _ => format!("Recarga de ${:.2}", draft.amount),
            };
            let entry = LedgerEntry {
                id: next_entry_id(&entries),
                date: format_entry_date(Utc::now().naive_utc()),
                description,
                amount: draft.amount,
                kind: draft.kind,
                status: EntryStatus::Pendiente,
            };
            let entry_id = entry.id;

            // Newest first
            entries.insert(0, entry);

            if self
                .repo
                .store_if_unchanged(account_id, &entries, snapshot.version)
                .await?
            {
                tracing::info!("entry {} recorded for account {}", entry_id, account_id);
                return Ok((entry_id, entries));
            }
            tracing::warn!("ledger moved under account {}, retrying record", account_id);
        }
        Err(ApiError::LedgerContention(account_id))
    }

    /// Marks one pending entry `Cancelada`. The entry stays in the history;
    /// entries already processed or cancelled refuse the transition.
    pub async fn cancel(
        &self,
        account_id: i64,
        transaction_id: i64,
    ) -> Result<Vec<LedgerEntry>, ApiError> {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let snapshot = self
                .repo
                .load(account_id)
                .await?
                .ok_or(ApiError::AccountNotFound)?;
            let mut entries = snapshot.entries;

            let Some(entry) = entries.iter_mut().find(|entry| entry.id == transaction_id)
            else {
                return Err(ApiError::EntryNotFound);
            };
            if entry.status != EntryStatus::Pendiente {
                return Err(ApiError::InvalidState);
            }
            entry.status = EntryStatus::Cancelada;

            if self
                .repo
                .store_if_unchanged(account_id, &entries, snapshot.version)
                .await?
            {
                tracing::info!("entry {} cancelled for account {}", transaction_id, account_id);
                return Ok(entries);
            }
            tracing::warn!("ledger moved under account {}, retrying cancel", account_id);
        }
        Err(ApiError::LedgerContention(account_id))
    }

    pub async fn list(&self, account_id: i64) -> Result<Vec<LedgerEntry>, ApiError> {
        let snapshot = self
            .repo
            .load(account_id)
            .await?
            .ok_or(ApiError::AccountNotFound)?;
        Ok(snapshot.entries)
    }
}

/// Entry ids are epoch milliseconds bumped past any id already present, so
/// two entries recorded within the same millisecond stay distinct.
fn next_entry_id(entries: &[LedgerEntry]) -> i64 {
    let mut candidate = Utc::now().timestamp_millis();
    while entries.iter().any(|entry| entry.id == candidate) {
        candidate += 1;
    }
    candidate
}

// Route for recording a new pending transaction
pub async fn record_handler(
    State(service): State<Arc<LedgerService>>,
    Json(req): Json<RecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (user_id, draft) = req.into_parts()?;
    let (transaction_id, new_history) = service.record(user_id, draft).await?;
    Ok((
        StatusCode::OK,
        Json(RecordResponse {
            message: "Transacción registrada exitosamente.".to_string(),
            transaction_id,
            new_history,
        }),
    ))
}

// Route for cancelling a pending transaction
pub async fn cancel_handler(
    State(service): State<Arc<LedgerService>>,
    Json(req): Json<CancelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(user_id), Some(transaction_id)) = (req.user_id, req.transaction_id) else {
        return Err(ApiError::validation(
            "Faltan datos de usuario o ID de transacción.",
        ));
    };
    let new_history = service.cancel(user_id, transaction_id).await?;
    Ok((
        StatusCode::OK,
        Json(CancelResponse {
            message: "Transacción cancelada exitosamente.".to_string(),
            new_history,
        }),
    ))
}

pub fn ledger_routes(service: Arc<LedgerService>) -> Router {
    Router::new()
        .route("/transaction/record", post(record_handler))
        .route("/transaction/cancel", post(cancel_handler))
        .with_state(service)
}
