use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    Pendiente,
    Completada,
    Cancelada,
}

/// One movement inside an account's serialized history. The wire shape is
/// fixed by the storefront, so every field keeps its JSON spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub date: String,
    pub description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub status: EntryStatus,
}

/// A decoded history plus the version counter it was read at. Writers hand
/// the version back so a stale snapshot can be detected instead of clobbered.
#[derive(Debug)]
pub struct LedgerSnapshot {
    pub entries: Vec<LedgerEntry>,
    pub version: i64,
}

// Database repository
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Reads and decodes one account's history. `Ok(None)` means the account
    /// does not exist; a row whose column cannot be decoded is surfaced as a
    /// corrupt-account error rather than silently reset.
    pub async fn load(&self, account_id: i64) -> Result<Option<LedgerSnapshot>, ApiError> {
        let row = sqlx::query_as::<_, (Option<String>, i64)>(
            "SELECT transactions_history, ledger_version FROM users WHERE id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((raw, version)) = row else {
            return Ok(None);
        };

        let entries = parse_history(account_id, raw.as_deref())?;
        Ok(Some(LedgerSnapshot { entries, version }))
    }

    /// Serializes `entries` back into the account row, but only if the row
    /// still carries `expected_version`. Returns false when another writer
    /// got there first and the caller must re-read and retry.
    pub async fn store_if_unchanged(
        &self,
        account_id: i64,
        entries: &[LedgerEntry],
        expected_version: i64,
    ) -> Result<bool, ApiError> {
        let serialized = serde_json::to_string(entries)?;
        let done = sqlx::query(
            r#"
            UPDATE users
            SET transactions_history = ?, ledger_version = ledger_version + 1
            WHERE id = ? AND ledger_version = ?
            "#,
        )
        .bind(serialized)
        .bind(account_id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;

        Ok(done.rows_affected() == 1)
    }
}

fn parse_history(account_id: i64, raw: Option<&str>) -> Result<Vec<LedgerEntry>, ApiError> {
    match raw {
        None => Ok(Vec::new()),
        Some(text) if text.trim().is_empty() => Ok(Vec::new()),
        Some(text) => serde_json::from_str(text)
            .map_err(|err| ApiError::CorruptAccount(account_id, err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::ensure_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn seeded_repository() -> (LedgerRepository, i64) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        ensure_schema(&pool).await.expect("schema");

        let id = sqlx::query(
            "INSERT INTO users (username, email, password_hash, referral_code) VALUES ('lia', 'lia@melu.pe', 'h', 'ZZZ999')",
        )
        .execute(&pool)
        .await
        .expect("seed account")
        .last_insert_rowid();

        (LedgerRepository::new(pool), id)
    }

    fn entry(id: i64) -> LedgerEntry {
        LedgerEntry {
            id,
            date: "01/03/2025 10:30".to_string(),
            description: "Recarga de $50.00".to_string(),
            amount: Decimal::from(50),
            kind: EntryKind::Credit,
            status: EntryStatus::Pendiente,
        }
    }

    #[test]
    fn entries_keep_the_storefront_wire_shape() {
        let json = serde_json::to_value(entry(1712000000000)).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "id": 1712000000000_i64,
                "date": "01/03/2025 10:30",
                "description": "Recarga de $50.00",
                "amount": 50.0,
                "type": "credit",
                "status": "Pendiente",
            })
        );
    }

    #[test]
    fn entries_decode_from_storefront_json() {
        let decoded: LedgerEntry = serde_json::from_str(
            r#"{"id":7,"date":"02/03/2025 08:00","description":"Plan mensual","amount":25.5,"type":"debit","status":"Completada"}"#,
        )
        .expect("decode");
        assert_eq!(decoded.id, 7);
        assert_eq!(decoded.kind, EntryKind::Debit);
        assert_eq!(decoded.status, EntryStatus::Completada);
        assert_eq!(decoded.amount, "25.5".parse::<Decimal>().unwrap());
    }

    #[test]
    fn blank_and_missing_histories_decode_to_empty() {
        assert!(parse_history(1, None).expect("none").is_empty());
        assert!(parse_history(1, Some("")).expect("empty").is_empty());
        assert!(parse_history(1, Some("  ")).expect("blank").is_empty());
        assert!(parse_history(1, Some("[]")).expect("brackets").is_empty());
    }

    #[test]
    fn mangled_histories_are_reported_not_reset() {
        let err = parse_history(42, Some("{not json")).expect_err("corrupt");
        assert!(matches!(err, ApiError::CorruptAccount(42, _)));
    }

    #[tokio::test]
    async fn load_distinguishes_missing_accounts_from_empty_histories() {
        let (repo, id) = seeded_repository().await;

        let snapshot = repo.load(id).await.expect("load").expect("account exists");
        assert!(snapshot.entries.is_empty());
        assert_eq!(snapshot.version, 0);

        assert!(repo.load(id + 999).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn stale_writers_are_rejected() {
        let (repo, id) = seeded_repository().await;

        let first = repo.load(id).await.expect("load").expect("snapshot");
        let stored = repo
            .store_if_unchanged(id, &[entry(1)], first.version)
            .await
            .expect("store");
        assert!(stored);

        // A second writer still holding version 0 must lose.
        let stale = repo
            .store_if_unchanged(id, &[entry(2)], first.version)
            .await
            .expect("store");
        assert!(!stale);

        let current = repo.load(id).await.expect("load").expect("snapshot");
        assert_eq!(current.version, first.version + 1);
        assert_eq!(current.entries, vec![entry(1)]);
    }
}
