pub mod account;
pub mod ledger;
pub mod profile;

use std::sync::Arc;

use axum::Router;
use sqlx::sqlite::SqlitePool;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer};

use crate::db::account::AccountRepository;
use crate::db::ledger::LedgerRepository;

/// Assembles the full route tree over one connection pool. The storefront
/// runs on another origin, so CORS stays permissive.
pub fn app(pool: SqlitePool, onboarding_gate: String) -> Router {
    let accounts = Arc::new(account::AccountService::new(
        AccountRepository::new(pool.clone()),
        onboarding_gate,
    ));
    let ledger = Arc::new(ledger::LedgerService::new(LedgerRepository::new(pool)));

    Router::new()
        .merge(account::account_routes(accounts.clone()))
        .merge(ledger::ledger_routes(ledger.clone()))
        .merge(profile::profile_routes(accounts, ledger))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new().gzip(true))
        .layer(RequestBodyLimitLayer::new(1024 * 64)) // 64KB limit
}
