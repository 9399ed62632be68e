use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::db::account::Role;
use crate::db::ledger::LedgerEntry;
use crate::error::ApiError;

use super::{account::AccountService, ledger::LedgerService};

const PROFILE_IMAGE_URL: &str =
    "https://images.pexels.com/photos/220453/pexels-photo-220453.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750&dpr=2";

/// Composite view the storefront profile page renders. `status`, `balance`
/// and the avatar are fixed values the frontend expects; no settlement is
/// derived from the ledger.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub registration_date: String,
    pub role: Role,
    pub status: &'static str,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    pub profile_image_url: &'static str,
    pub referral_code: Option<String>,
    pub transactions_history: Vec<LedgerEntry>,
}

// Route for serving the composite profile view
pub async fn profile_handler(
    State((accounts, ledger)): State<(Arc<AccountService>, Arc<LedgerService>)>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = accounts.get_profile(user_id).await?;
    let history = ledger.list(user_id).await?;

    Ok(Json(ProfileResponse {
        username: profile.username,
        email: profile.email,
        phone: profile.phone,
        registration_date: profile.registration_date,
        role: profile.role,
        status: "Activa",
        balance: Decimal::ZERO,
        profile_image_url: PROFILE_IMAGE_URL,
        referral_code: profile.referral_code,
        transactions_history: history,
    }))
}

pub fn profile_routes(accounts: Arc<AccountService>, ledger: Arc<LedgerService>) -> Router {
    Router::new()
        .route("/profile/:user_id", get(profile_handler))
        .with_state((accounts, ledger))
}
