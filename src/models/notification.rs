//! In-app notification model and the messages produced by circulation events

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::NotificationKind;
use super::Pagination;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub material_id: Option<i32>,
    pub loan_id: Option<i32>,
    pub reservation_id: Option<i32>,
    pub points_earned: Option<i32>,
    pub amount: Option<Decimal>,
    pub action: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

/// Staff-authored notification
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotification {
    pub user_id: i32,
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    pub kind: Option<NotificationKind>,
}

/// Notification to be stored
#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub material_id: Option<i32>,
    pub loan_id: Option<i32>,
    pub reservation_id: Option<i32>,
    pub points_earned: Option<i32>,
    pub amount: Option<Decimal>,
    pub action: Option<String>,
}

impl From<CreateNotification> for NewNotification {
    fn from(request: CreateNotification) -> Self {
        Self {
            user_id: request.user_id,
            title: request.title,
            message: request.message,
            kind: request.kind.unwrap_or_default(),
            ..Default::default()
        }
    }
}

impl NewNotification {
    pub fn due_soon(user_id: i32, loan_id: i32, material_id: i32, title: &str, days_left: i64) -> Self {
        let when = match days_left {
            0 => "today".to_string(),
            1 => "in 1 day".to_string(),
            n => format!("in {} days", n),
        };
        Self {
            user_id,
            title: "Loan due soon".to_string(),
            message: format!("\"{}\" must be returned {}", title, when),
            kind: NotificationKind::Warning,
            material_id: Some(material_id),
            loan_id: Some(loan_id),
            action: Some("return".to_string()),
            ..Default::default()
        }
    }

    pub fn overdue(user_id: i32, loan_id: i32, material_id: i32, title: &str, days_overdue: i64) -> Self {
        Self {
            user_id,
            title: "Loan overdue".to_string(),
            message: format!(
                "\"{}\" is {} day(s) overdue. Late fines accrue until it is returned",
                title, days_overdue
            ),
            kind: NotificationKind::Warning,
            material_id: Some(material_id),
            loan_id: Some(loan_id),
            action: Some("return".to_string()),
            ..Default::default()
        }
    }

    pub fn available_for_pickup(user_id: i32, reservation_id: i32, material_id: i32, title: &str) -> Self {
        Self {
            user_id,
            title: "Material available for pickup".to_string(),
            message: format!("\"{}\" is available for pickup", title),
            kind: NotificationKind::Success,
            material_id: Some(material_id),
            reservation_id: Some(reservation_id),
            action: Some("pickup".to_string()),
            ..Default::default()
        }
    }

    pub fn achievement(user_id: i32, title: &str, description: &str, points: i32) -> Self {
        Self {
            user_id,
            title: title.to_string(),
            message: description.to_string(),
            kind: NotificationKind::Achievement,
            points_earned: Some(points),
            ..Default::default()
        }
    }

    pub fn fine_assessed(user_id: i32, loan_id: Option<i32>, amount: Decimal, reason: &str) -> Self {
        Self {
            user_id,
            title: "Fine assessed".to_string(),
            message: format!("A fine of R$ {} was assessed: {}", amount, reason),
            kind: NotificationKind::Warning,
            loan_id,
            amount: Some(amount),
            action: Some("pay".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staff_notification_defaults_to_info() {
        let n: NewNotification = CreateNotification {
            user_id: 4,
            title: "Library closed".to_string(),
            message: "Closed on Monday".to_string(),
            kind: None,
        }
        .into();
        assert_eq!(n.kind, NotificationKind::Info);
        assert_eq!(n.user_id, 4);
    }

    #[test]
    fn test_due_soon_message() {
        let n = NewNotification::due_soon(1, 2, 3, "O Cortiço", 2);
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.message, "\"O Cortiço\" must be returned in 2 days");
        assert_eq!(n.loan_id, Some(2));
        assert_eq!(
            NewNotification::due_soon(1, 2, 3, "X", 0).message,
            "\"X\" must be returned today"
        );
    }

    #[test]
    fn test_achievement_carries_points() {
        let n = NewNotification::achievement(1, "First loan", "You borrowed your first book", 25);
        assert_eq!(n.kind, NotificationKind::Achievement);
        assert_eq!(n.points_earned, Some(25));
    }

    #[test]
    fn test_fine_assessed_carries_amount() {
        let n = NewNotification::fine_assessed(1, Some(9), Decimal::new(750, 2), "Late return: 3 days");
        assert_eq!(n.amount, Some(Decimal::new(750, 2)));
        assert!(n.message.contains("7.50"));
    }

    #[test]
    fn test_title_length_validated() {
        let request = CreateNotification {
            user_id: 1,
            title: String::new(),
            message: String::new(),
            kind: None,
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));
        assert!(errors.field_errors().contains_key("message"));
    }
}
