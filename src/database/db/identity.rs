use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::database::db::columns::{self, timestamp};
use crate::database::models::Identity;
use crate::sync::VerificationKind;
/*
Users, bearer sessions and one-shot auth tokens for the hosted auth endpoints.
Tokens are never stored in the clear: callers pass the SHA-256 hex digest.
 */

/// A user row including the credential hash. Never leaves the server.
#[derive(Debug, Clone)]
pub struct StoredUser {
    pub identity: Identity,
    pub password_hash: String,
}

const USER_COLUMNS: &str = "id, email, display_name, role, email_confirmed_at, password_hash";

fn user_from_row(row: &SqliteRow) -> Result<StoredUser, sqlx::Error> {
    Ok(StoredUser {
        identity: Identity {
            id: columns::uuid(row, "id")?,
            email: row.try_get("email")?,
            display_name: row.try_get("display_name")?,
            role: row.try_get("role")?,
            email_confirmed_at: columns::opt_time(row, "email_confirmed_at")?,
        },
        password_hash: row.try_get("password_hash")?,
    })
}

/*==========User Queries=========== */

/// Fails with a unique violation when the email is already registered.
pub async fn create_user(
    pool: &Pool<Sqlite>,
    email: &str,
    password_hash: &str,
    display_name: Option<&str>,
) -> Result<Identity, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = timestamp(Utc::now());
    let row = sqlx::query(&format!(
        r#"
        INSERT INTO users (id, email, password_hash, display_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        RETURNING {USER_COLUMNS}
        "#
    ))
    .bind(id.to_string())
    .bind(email)
    .bind(password_hash)
    .bind(display_name)
    .bind(&now)
    .bind(&now)
    .fetch_one(pool)
    .await?;

    Ok(user_from_row(&row)?.identity)
}

pub async fn find_user_by_email(
    pool: &Pool<Sqlite>,
    email: &str,
) -> Result<Option<StoredUser>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
        .bind(email.trim())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(user_from_row).transpose()
}

pub async fn get_user(pool: &Pool<Sqlite>, user_id: Uuid) -> Result<Option<Identity>, sqlx::Error> {
    let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(user_from_row).transpose()?.map(|user| user.identity))
}

pub async fn confirm_email(
    pool: &Pool<Sqlite>,
    user_id: Uuid,
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE users
        SET email_confirmed_at = COALESCE(email_confirmed_at, ?), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(timestamp(at))
    .bind(timestamp(at))
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_password_hash(
    pool: &Pool<Sqlite>,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = ?, updated_at = ? WHERE id = ?")
        .bind(password_hash)
        .bind(timestamp(Utc::now()))
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/*==========Session Queries=========== */

pub async fn insert_session(
    pool: &Pool<Sqlite>,
    token_hash: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (token_hash, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id.to_string())
    .bind(timestamp(expires_at))
    .bind(timestamp(Utc::now()))
    .execute(pool)
    .await?;
    Ok(())
}

/// The identity behind a live session, with the session's expiry.
pub async fn session_user(
    pool: &Pool<Sqlite>,
    token_hash: &str,
    now: DateTime<Utc>,
) -> Result<Option<(Identity, DateTime<Utc>)>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.email, u.display_name, u.role, u.email_confirmed_at, u.password_hash,
               s.expires_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(token_hash)
    .bind(timestamp(now))
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|row| Ok((user_from_row(row)?.identity, columns::time(row, "expires_at")?)))
        .transpose()
}

pub async fn delete_session(pool: &Pool<Sqlite>, token_hash: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn purge_expired(pool: &Pool<Sqlite>, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
    let now = timestamp(now);
    let mut tx = pool.begin().await?;
    let sessions = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let tokens = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ? OR used_at IS NOT NULL")
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    tx.commit().await?;
    Ok(sessions + tokens)
}

/*==========Auth Token Queries=========== */

pub async fn insert_auth_token(
    pool: &Pool<Sqlite>,
    token_hash: &str,
    user_id: Uuid,
    kind: VerificationKind,
    expires_at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO auth_tokens (token_hash, user_id, kind, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(token_hash)
    .bind(user_id.to_string())
    .bind(kind.as_str())
    .bind(timestamp(expires_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Marks an unused, unexpired token of `kind` as used and returns its user.
pub async fn consume_auth_token(
    pool: &Pool<Sqlite>,
    token_hash: &str,
    kind: VerificationKind,
    now: DateTime<Utc>,
) -> Result<Option<Uuid>, sqlx::Error> {
    let row = sqlx::query(
        r#"
        UPDATE auth_tokens
        SET used_at = ?
        WHERE token_hash = ? AND kind = ? AND used_at IS NULL AND expires_at > ?
        RETURNING user_id
        "#,
    )
    .bind(timestamp(now))
    .bind(token_hash)
    .bind(kind.as_str())
    .bind(timestamp(now))
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|row| columns::uuid(row, "user_id"))
        .transpose()
}
