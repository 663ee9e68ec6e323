//! Notifications repository for database operations

use sqlx::{Executor, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::notification::{NewNotification, Notification},
};

#[derive(Clone)]
pub struct NotificationsRepository {
    pool: Pool<Postgres>,
}

impl NotificationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification with id {} not found", id)))
    }

    /// A user's notifications, newest first
    pub async fn list_for_user(
        &self,
        user_id: i32,
        unread_only: bool,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<Notification>, i64)> {
        let unread_filter = if unread_only { " AND NOT is_read" } else { "" };

        let count_query = format!(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND deleted_at IS NULL{}",
            unread_filter
        );
        let total: i64 = sqlx::query_scalar(&count_query)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let select_query = format!(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1 AND deleted_at IS NULL{}
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            unread_filter
        );
        let notifications = sqlx::query_as::<_, Notification>(&select_query)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok((notifications, total))
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Store a notification, on the pool or inside a running transaction
    pub async fn create<'e, E>(&self, executor: E, notification: &NewNotification) -> AppResult<Notification>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (
                user_id, title, message, kind, material_id, loan_id, reservation_id,
                points_earned, amount, action
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(notification.user_id)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind)
        .bind(notification.material_id)
        .bind(notification.loan_id)
        .bind(notification.reservation_id)
        .bind(notification.points_earned)
        .bind(notification.amount)
        .bind(&notification.action)
        .fetch_one(executor)
        .await?;
        Ok(created)
    }

    /// Mark as read; `read_at` keeps the first read time
    pub async fn mark_read(&self, id: i32) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification with id {} not found", id)))?;
        Ok(notification)
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND NOT is_read AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Soft delete
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE notifications SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
