//! In-app notification service

use crate::{
    error::{AppError, AppResult},
    models::{
        notification::{CreateNotification, NewNotification, Notification, NotificationList, NotificationQuery},
        page_bounds, Pagination, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
}

impl NotificationsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list(&self, user_id: i32, query: &NotificationQuery) -> AppResult<NotificationList> {
        let (page, limit, offset) = page_bounds(query.page, query.limit);
        let (notifications, total) = self
            .repository
            .notifications
            .list_for_user(user_id, query.unread_only, limit, offset)
            .await?;
        let unread_count = self.repository.notifications.unread_count(user_id).await?;

        Ok(NotificationList {
            notifications,
            unread_count,
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        self.repository.notifications.unread_count(user_id).await
    }

    pub async fn create(&self, request: CreateNotification) -> AppResult<Notification> {
        self.repository.users.get_by_id(request.user_id).await?;
        let notification = NewNotification::from(request);
        self.repository
            .notifications
            .create(&self.repository.pool, &notification)
            .await
    }

    /// Loads a notification the caller owns
    async fn owned(&self, id: i32, claims: &UserClaims) -> AppResult<Notification> {
        let notification = self.repository.notifications.get_by_id(id).await?;
        if notification.user_id != claims.user_id {
            return Err(AppError::Authorization(
                "Access denied to another user's notification".to_string(),
            ));
        }
        Ok(notification)
    }

    pub async fn mark_read(&self, id: i32, claims: &UserClaims) -> AppResult<Notification> {
        self.owned(id, claims).await?;
        self.repository.notifications.mark_read(id).await
    }

    pub async fn mark_all_read(&self, user_id: i32) -> AppResult<u64> {
        self.repository.notifications.mark_all_read(user_id).await
    }

    pub async fn delete(&self, id: i32, claims: &UserClaims) -> AppResult<()> {
        self.owned(id, claims).await?;
        self.repository.notifications.delete(id).await
    }
}
