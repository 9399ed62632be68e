use sqlx::sqlite::SqlitePool;
use sqlx::Row;

/// Creates the accounts table when missing and applies the additive column
/// migrations. Safe to run on every startup: nothing here drops or rewrites
/// existing data.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            phone TEXT,
            password_hash TEXT NOT NULL,
            referral_code TEXT,
            role TEXT NOT NULL DEFAULT 'Usuario',
            transactions_history TEXT NOT NULL DEFAULT '[]',
            ledger_version INTEGER NOT NULL DEFAULT 0,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    // databases created by older deployments predate some columns; add
    // them in place instead of recreating the table
    let mut columns = Vec::new();
    for row in sqlx::query("PRAGMA table_info(users)").fetch_all(pool).await? {
        columns.push(row.try_get::<String, _>("name")?);
    }

    add_column_if_missing(
        pool,
        &columns,
        "role",
        "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'Usuario'",
    )
    .await?;
    add_column_if_missing(
        pool,
        &columns,
        "transactions_history",
        "ALTER TABLE users ADD COLUMN transactions_history TEXT NOT NULL DEFAULT '[]'",
    )
    .await?;
    add_column_if_missing(
        pool,
        &columns,
        "ledger_version",
        "ALTER TABLE users ADD COLUMN ledger_version INTEGER NOT NULL DEFAULT 0",
    )
    .await?;

    // referral uniqueness belongs to the store: inserts race, this index
    // does not. NULL stays allowed for rows that predate the allocator.
    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS ux_users_referral_code ON users (referral_code)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn add_column_if_missing(
    pool: &SqlitePool,
    columns: &[String],
    name: &str,
    alter: &str,
) -> Result<(), sqlx::Error> {
    if columns.iter().any(|column| column == name) {
        return Ok(());
    }
    tracing::info!("schema migration: adding missing column '{}'", name);
    sqlx::query(alter).execute(pool).await?;
    Ok(())
}
