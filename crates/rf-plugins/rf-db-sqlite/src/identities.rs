//! `IdentityRepo` over the `users` table.

use async_trait::async_trait;
use rf_core::error::{AppError, Result};
use rf_core::models::{Identity, Role};
use rf_core::traits::IdentityRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{decode_error, is_unique_violation, storage, SqliteForumRepo};

const IDENTITY_COLUMNS: &str = "id, email, username, password_hash, role, created_at";

fn identity_from_row(row: &SqliteRow) -> sqlx::Result<Identity> {
    let role: String = row.try_get("role")?;
    Ok(Identity {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        role: role.parse().map_err(decode_error)?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl IdentityRepo for SqliteForumRepo {
    async fn is_taken(&self, email: &str, username: &str) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ? OR username = ?)")
            .bind(email)
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(storage("check identity uniqueness"))
    }

    async fn insert_identity(&self, identity: &Identity) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO users (id, email, username, password_hash, role, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(identity.id)
        .bind(&identity.email)
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(identity.role.as_str())
        .bind(identity.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(AppError::AlreadyTaken(
                "email or username".into(),
            )),
            Err(err) => Err(storage("insert identity")(err)),
        }
    }

    async fn find_identity_by_username(&self, username: &str) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE username = ?"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find identity by username"))?;

        row.as_ref()
            .map(identity_from_row)
            .transpose()
            .map_err(storage("decode identity"))
    }

    async fn find_identity(&self, id: Uuid) -> Result<Option<Identity>> {
        let row = sqlx::query(&format!("SELECT {IDENTITY_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage("find identity"))?;

        row.as_ref()
            .map(identity_from_row)
            .transpose()
            .map_err(storage("decode identity"))
    }

    async fn set_role(&self, id: Uuid, role: Role) -> Result<()> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage("set role"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("identity", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::test_support;

    #[tokio::test]
    async fn test_insert_and_find_identity() {
        let repo = test_support::repo().await;
        let alice = test_support::identity(&repo, "alice").await;

        let found = repo.find_identity_by_username("alice").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert_eq!(found.role, Role::User);
        assert!(repo.find_identity(alice.id).await.unwrap().is_some());
        assert!(repo.find_identity_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_already_taken() {
        let repo = test_support::repo().await;
        test_support::identity(&repo, "alice").await;

        // The column collation rejects case variants even if a caller forgot to normalize.
        let dup = Identity {
            id: Uuid::now_v7(),
            email: "ALICE@EXAMPLE.COM".into(),
            username: "someone".into(),
            password_hash: "x".into(),
            role: Role::User,
            created_at: Utc::now(),
        };
        assert!(matches!(
            repo.insert_identity(&dup).await,
            Err(AppError::AlreadyTaken(_))
        ));
        assert!(repo.is_taken("alice@example.com", "nobody").await.unwrap());
        assert!(repo.is_taken("x@example.com", "alice").await.unwrap());
        assert!(!repo.is_taken("x@example.com", "nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_role() {
        let repo = test_support::repo().await;
        let alice = test_support::identity(&repo, "alice").await;

        repo.set_role(alice.id, Role::Moderator).await.unwrap();
        let found = repo.find_identity(alice.id).await.unwrap().unwrap();
        assert_eq!(found.role, Role::Moderator);

        assert!(matches!(
            repo.set_role(Uuid::now_v7(), Role::Admin).await,
            Err(AppError::NotFound(..))
        ));
    }
}
