//! Fine model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{FineReason, FineStatus};
use super::Pagination;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Fine {
    pub id: i32,
    pub user_id: i32,
    pub loan_id: Option<i32>,
    /// Staff member who assessed the fine
    pub staff_id: Option<i32>,
    pub amount: Decimal,
    pub reason: FineReason,
    pub description: Option<String>,
    pub status: FineStatus,
    pub due_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Fine {
    /// Pending and past its due date
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == FineStatus::Pending && now > self.due_at
    }

    fn require_pending(&self, action: &str) -> AppResult<()> {
        if self.status == FineStatus::Pending {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Only pending fines can be {} (fine is {})",
                action, self.status
            )))
        }
    }

    pub fn check_payable(&self) -> AppResult<()> {
        self.require_pending("paid")
    }

    /// Notes after cancelling, with the reason on its own line
    pub fn cancelled_notes(&self, reason: Option<&str>) -> AppResult<Option<String>> {
        self.require_pending("cancelled")?;
        Ok(match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reason) => Some(format!(
                "{}\nCancelled: {}",
                self.notes.as_deref().unwrap_or(""),
                reason
            )),
            None => self.notes.clone(),
        })
    }
}

/// Fine joined with the user it was assessed against
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct FineDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub fine: Fine,
    pub user_name: String,
    pub material_title: Option<String>,
    #[sqlx(skip)]
    pub is_overdue: bool,
}

impl FineDetails {
    pub fn with_computed(mut self, now: DateTime<Utc>) -> Self {
        self.is_overdue = self.fine.is_overdue(now);
        self
    }
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FineQuery {
    pub status: Option<FineStatus>,
    pub user_id: Option<i32>,
    pub reason: Option<FineReason>,
    /// Only pending fines past their due date
    pub overdue: Option<bool>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FineList {
    pub fines: Vec<FineDetails>,
    pub pagination: Pagination,
}

/// A user's fines with running totals
#[derive(Debug, Serialize, ToSchema)]
pub struct UserFines {
    pub fines: Vec<FineDetails>,
    pub total_pending: Decimal,
    pub total_paid: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateFine {
    pub user_id: i32,
    pub loan_id: Option<i32>,
    pub amount: Decimal,
    pub reason: FineReason,
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
    /// Defaults to the configured payment window
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct PayFine {
    #[validate(length(min = 1, max = 50, message = "Payment method must be between 1 and 50 characters"))]
    pub payment_method: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct CancelFine {
    pub reason: Option<String>,
}

/// Parameters of a fine raised by the circulation desk
#[derive(Debug, Clone)]
pub struct NewFine {
    pub user_id: i32,
    pub loan_id: Option<i32>,
    pub staff_id: Option<i32>,
    pub amount: Decimal,
    pub reason: FineReason,
    pub description: Option<String>,
    pub due_at: DateTime<Utc>,
}

impl NewFine {
    pub fn late_return(user_id: i32, loan_id: i32, staff_id: Option<i32>, amount: Decimal, days: i64, due_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            loan_id: Some(loan_id),
            staff_id,
            amount,
            reason: FineReason::Late,
            description: Some(format!("Late return: {} days", days)),
            due_at,
        }
    }

    pub fn lost_material(user_id: i32, loan_id: i32, staff_id: Option<i32>, amount: Decimal, due_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            loan_id: Some(loan_id),
            staff_id,
            amount,
            reason: FineReason::Lost,
            description: Some("Lost material".to_string()),
            due_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn fine(status: FineStatus, notes: Option<&str>) -> Fine {
        let now = Utc::now();
        Fine {
            id: 1,
            user_id: 2,
            loan_id: Some(3),
            staff_id: None,
            amount: Decimal::new(750, 2),
            reason: FineReason::Late,
            description: None,
            status,
            due_at: now - Duration::days(1),
            paid_at: None,
            payment_method: None,
            notes: notes.map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_overdue_only_when_pending() {
        let now = Utc::now();
        assert!(fine(FineStatus::Pending, None).is_overdue(now));
        assert!(!fine(FineStatus::Paid, None).is_overdue(now));
    }

    #[test]
    fn test_pay_requires_pending() {
        assert!(fine(FineStatus::Pending, None).check_payable().is_ok());
        assert!(fine(FineStatus::Paid, None).check_payable().is_err());
        assert!(fine(FineStatus::Cancelled, None).check_payable().is_err());
    }

    #[test]
    fn test_cancel_appends_reason() {
        let notes = fine(FineStatus::Pending, Some("Returned damaged"))
            .cancelled_notes(Some("waived by director"))
            .unwrap();
        assert_eq!(notes.as_deref(), Some("Returned damaged\nCancelled: waived by director"));

        let empty = fine(FineStatus::Pending, None).cancelled_notes(Some("error")).unwrap();
        assert_eq!(empty.as_deref(), Some("\nCancelled: error"));
    }

    #[test]
    fn test_cancel_without_reason_keeps_notes() {
        let notes = fine(FineStatus::Pending, Some("x")).cancelled_notes(None).unwrap();
        assert_eq!(notes.as_deref(), Some("x"));
        assert!(fine(FineStatus::Paid, None).cancelled_notes(None).is_err());
    }

    #[test]
    fn test_late_return_description() {
        let f = NewFine::late_return(1, 2, Some(3), Decimal::new(500, 2), 2, Utc::now());
        assert_eq!(f.reason, FineReason::Late);
        assert_eq!(f.description.as_deref(), Some("Late return: 2 days"));
    }
}
