//! `SessionRepo` over the `sessions` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rf_core::error::{AppError, Result};
use rf_core::models::Session;
use rf_core::traits::SessionRepo;
use sqlx::Row;

use crate::{is_foreign_key_violation, storage, SqliteForumRepo};

#[async_trait]
impl SessionRepo for SqliteForumRepo {
    /// Insert first, then evict the identity's other sessions, one transaction.
    async fn insert_exclusive(&self, session: &Session) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(storage("begin session insert"))?;

        let inserted = sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(&session.token)
            .bind(session.identity_id)
            .bind(session.expires_at)
            .execute(&mut *tx)
            .await;
        if let Err(err) = inserted {
            if is_foreign_key_violation(&err) {
                return Err(AppError::not_found("identity", session.identity_id));
            }
            return Err(storage("insert session")(err));
        }

        let evicted = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND token != ?")
            .bind(session.identity_id)
            .bind(&session.token)
            .execute(&mut *tx)
            .await
            .map_err(storage("evict other sessions"))?
            .rows_affected();

        tx.commit().await.map_err(storage("commit session insert"))?;
        Ok(evicted)
    }

    async fn find_session(&self, token: &str) -> Result<Option<Session>> {
        let row = sqlx::query("SELECT token, user_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find session"))?;

        row.map(|row| -> sqlx::Result<Session> {
            Ok(Session {
                token: row.try_get("token")?,
                identity_id: row.try_get("user_id")?,
                expires_at: row.try_get("expires_at")?,
            })
        })
        .transpose()
        .map_err(storage("decode session"))
    }

    async fn delete_session(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(storage("delete session"))?;
        Ok(())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(storage("delete expired sessions"))?;
        Ok(result.rows_affected())
    }
}
