use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqlitePool;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Usuario,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Usuario => "Usuario",
            Role::Admin => "Admin",
        }
    }

    pub fn parse(raw: &str) -> Option<Role> {
        match raw {
            "Usuario" => Some(Role::Usuario),
            "Admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Usuario
    }
}

/// Account fields the profile view needs. The password hash and the raw
/// ledger column stay out of this projection on purpose.
#[derive(Debug, Clone, FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub referral_code: Option<String>,
    pub role: String,
    pub created_at: Option<NaiveDateTime>,
}

/// Credential projection used by authentication only.
#[derive(Debug, FromRow)]
pub struct CredentialRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

pub struct NewAccount<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
    pub referral_code: &'a str,
    pub role: Role,
}

/// Typed outcome of an insert so the service can tell a referral-code
/// collision (retry with a fresh candidate) from a username/email
/// collision (a real conflict).
#[derive(Debug)]
pub enum InsertOutcome {
    Created(i64),
    ReferralTaken,
    IdentityTaken,
}

// Database repository
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts one account row with an empty ledger. Unique violations are
    /// demoted to outcomes instead of errors; everything else bubbles up.
    pub async fn insert(&self, account: &NewAccount<'_>) -> Result<InsertOutcome, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, phone, password_hash, referral_code, role, transactions_history)
            VALUES (?, ?, ?, ?, ?, ?, '[]')
            "#,
        )
        .bind(account.username)
        .bind(account.email)
        .bind(account.phone)
        .bind(account.password_hash)
        .bind(account.referral_code)
        .bind(account.role.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Created(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db_err))
                if matches!(db_err.kind(), ErrorKind::UniqueViolation) =>
            {
                if db_err.message().contains("referral_code") {
                    Ok(InsertOutcome::ReferralTaken)
                } else {
                    Ok(InsertOutcome::IdentityTaken)
                }
            }
            Err(err) => Err(err),
        }
    }

    pub async fn identity_exists(&self, username: &str, email: &str) -> Result<bool, sqlx::Error> {
        let found = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE email = ? OR username = ?")
            .bind(email)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<CredentialRow>, sqlx::Error> {
        sqlx::query_as::<_, CredentialRow>(
            r#"
            SELECT id, username, email, password_hash
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AccountRow>, sqlx::Error> {
        sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, username, email, phone, referral_code, role, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema::ensure_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn repository() -> AccountRepository {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        ensure_schema(&pool).await.expect("schema");
        AccountRepository::new(pool)
    }

    fn account<'a>(username: &'a str, email: &'a str, code: &'a str) -> NewAccount<'a> {
        NewAccount {
            username,
            email,
            phone: None,
            password_hash: "$argon2$test",
            referral_code: code,
            role: Role::Usuario,
        }
    }

    #[test]
    fn role_round_trips_through_text() {
        assert_eq!(Role::parse("Usuario"), Some(Role::Usuario));
        assert_eq!(Role::parse("Admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
        assert_eq!(Role::parse(Role::Admin.as_str()), Some(Role::Admin));
    }

    #[tokio::test]
    async fn insert_reports_which_constraint_tripped() {
        let repo = repository().await;

        let created = repo.insert(&account("marta", "marta@melu.pe", "AAA111")).await.expect("insert");
        assert!(matches!(created, InsertOutcome::Created(id) if id > 0));

        let referral_clash = repo
            .insert(&account("otro", "otro@melu.pe", "AAA111"))
            .await
            .expect("insert");
        assert!(matches!(referral_clash, InsertOutcome::ReferralTaken));

        let email_clash = repo
            .insert(&account("tercero", "marta@melu.pe", "BBB222"))
            .await
            .expect("insert");
        assert!(matches!(email_clash, InsertOutcome::IdentityTaken));

        let username_clash = repo
            .insert(&account("marta", "cuarto@melu.pe", "CCC333"))
            .await
            .expect("insert");
        assert!(matches!(username_clash, InsertOutcome::IdentityTaken));
    }

    #[tokio::test]
    async fn new_rows_start_with_an_empty_ledger_and_a_creation_date() {
        let repo = repository().await;
        let InsertOutcome::Created(id) = repo
            .insert(&account("saul", "saul@melu.pe", "DDD444"))
            .await
            .expect("insert")
        else {
            panic!("expected a created row");
        };

        let row = repo.find_by_id(id).await.expect("select").expect("row");
        assert_eq!(row.username, "saul");
        assert_eq!(row.role, "Usuario");
        assert_eq!(row.referral_code.as_deref(), Some("DDD444"));
        assert!(row.created_at.is_some());

        let history = sqlx::query_scalar::<_, String>("SELECT transactions_history FROM users WHERE id = ?")
            .bind(id)
            .fetch_one(&repo.pool)
            .await
            .expect("history column");
        assert_eq!(history, "[]");
    }
}
