use async_trait::async_trait;
use rf_core::error::{AppError, Result};
use rf_core::models::Notification;
use rf_core::traits::NotificationRepo;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::{decode_error, is_foreign_key_violation, storage, SqliteForumRepo};

fn notification_from_row(row: &SqliteRow) -> sqlx::Result<Notification> {
    let kind: String = row.try_get("kind")?;
    Ok(Notification {
        id: row.try_get("id")?,
        recipient_id: row.try_get("user_id")?,
        kind: kind.parse().map_err(decode_error)?,
        source_id: row.try_get("from_user_id")?,
        post_id: row.try_get("post_id")?,
        comment_id: row.try_get("comment_id")?,
        created_at: row.try_get("created_at")?,
        is_read: row.try_get("is_read")?,
    })
}

#[async_trait]
impl NotificationRepo for SqliteForumRepo {
    async fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, from_user_id, post_id, comment_id, created_at, is_read) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.kind.as_str())
        .bind(notification.source_id)
        .bind(notification.post_id)
        .bind(notification.comment_id)
        .bind(notification.created_at)
        .bind(notification.is_read)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            // The referenced post or comment was removed between commit and fan-out.
            Err(err) if is_foreign_key_violation(&err) => Err(AppError::not_found(
                "notification subject",
                notification.post_id.or(notification.comment_id).unwrap_or_default(),
            )),
            Err(err) => Err(storage("insert notification")(err)),
        }
    }

    async fn notifications_for(&self, recipient_id: Uuid) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, from_user_id, post_id, comment_id, created_at, is_read \
             FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage("list notifications"))?;

        rows.iter()
            .map(notification_from_row)
            .collect::<sqlx::Result<_>>()
            .map_err(storage("decode notification"))
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(recipient_id)
            .execute(&self.pool)
            .await
            .map_err(storage("mark notification read"))?;
        Ok(result.rows_affected() > 0)
    }
}
