//! Loan model and circulation rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::LoanStatus;
use super::Pagination;
use crate::config::LoansConfig;
use crate::error::{AppError, AppResult};

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub user_id: i32,
    pub material_id: i32,
    /// Staff member who registered the loan
    pub staff_id: Option<i32>,
    pub loaned_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    /// Stored status, never `late`
    pub status: LoanStatus,
    pub renewals: i32,
    pub fine: Decimal,
    pub notes: Option<String>,
    pub due_soon_notified: bool,
    pub overdue_notified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == LoanStatus::Active && now > self.due_at
    }

    /// Whole days past the due date, 0 when not overdue
    pub fn days_overdue(&self, now: DateTime<Utc>) -> i64 {
        if self.is_overdue(now) {
            (now - self.due_at).num_days()
        } else {
            0
        }
    }

    /// Late fine accrued so far, after the grace period
    pub fn late_fine(&self, now: DateTime<Utc>, rules: &LoansConfig) -> Decimal {
        let chargeable = (self.days_overdue(now) - rules.grace_period_days).max(0);
        Decimal::from(chargeable) * rules.fine_per_day
    }

    /// Status reported to clients: `late` for an active loan past due
    pub fn effective_status(&self, now: DateTime<Utc>) -> LoanStatus {
        if self.is_overdue(now) {
            LoanStatus::Late
        } else {
            self.status
        }
    }

    fn require_active(&self, action: &str) -> AppResult<()> {
        if self.status == LoanStatus::Active {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Only active loans can be {} (loan is {})",
                action, self.status
            )))
        }
    }

    /// Due date after one more renewal
    pub fn renewed_due_at(&self, rules: &LoansConfig) -> AppResult<DateTime<Utc>> {
        self.require_active("renewed")?;
        if self.renewals >= rules.max_renewals {
            return Err(AppError::BusinessRule(format!(
                "Maximum number of renewals reached ({})",
                rules.max_renewals
            )));
        }
        Ok(self.due_at + chrono::Duration::days(rules.renewal_days))
    }

    pub fn check_returnable(&self) -> AppResult<()> {
        self.require_active("returned")
    }

    pub fn check_can_be_marked_lost(&self) -> AppResult<()> {
        self.require_active("marked as lost")
    }

    /// A fine can only point at one of the fined user's own loans
    pub fn check_borrower(&self, user_id: i32) -> AppResult<()> {
        if self.user_id == user_id {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Loan {} does not belong to user {}",
                self.id, user_id
            )))
        }
    }
}

/// Loan joined with borrower and material, with computed overdue fields
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct LoanDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub loan: Loan,
    pub user_name: String,
    pub user_email: String,
    pub material_title: String,
    pub material_author: String,
    #[sqlx(skip)]
    pub effective_status: Option<LoanStatus>,
    #[sqlx(skip)]
    pub is_overdue: bool,
    #[sqlx(skip)]
    pub days_overdue: i64,
    /// Fine that would be charged if returned now
    #[sqlx(skip)]
    pub accrued_fine: Decimal,
}

impl LoanDetails {
    /// Fills the computed fields for the given instant
    pub fn with_computed(mut self, now: DateTime<Utc>, rules: &LoansConfig) -> Self {
        self.effective_status = Some(self.loan.effective_status(now));
        self.is_overdue = self.loan.is_overdue(now);
        self.days_overdue = self.loan.days_overdue(now);
        self.accrued_fine = self.loan.late_fine(now, rules);
        self
    }
}

/// Loan query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoanQuery {
    /// `late` selects active loans past due
    pub status: Option<LoanStatus>,
    pub user_id: Option<i32>,
    pub material_id: Option<i32>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

/// Status filter for one user's loans
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserLoansQuery {
    pub status: Option<LoanStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoanList {
    pub loans: Vec<LoanDetails>,
    pub pagination: Pagination,
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    pub user_id: i32,
    pub material_id: i32,
    /// Defaults to the configured loan duration
    pub due_at: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// Returned by the return and lost operations
#[derive(Debug, Serialize, ToSchema)]
pub struct LoanClosed {
    pub loan: Loan,
    /// Fine record created, if any
    pub fine_id: Option<i32>,
    pub days_overdue: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan(due_in: Duration, status: LoanStatus) -> (Loan, DateTime<Utc>) {
        let now = Utc::now();
        let loan = Loan {
            id: 1,
            user_id: 2,
            material_id: 3,
            staff_id: Some(1),
            loaned_at: now - Duration::days(14),
            due_at: now + due_in,
            returned_at: None,
            status,
            renewals: 0,
            fine: Decimal::ZERO,
            notes: None,
            due_soon_notified: false,
            overdue_notified: false,
            created_at: now,
            updated_at: now,
        };
        (loan, now)
    }

    #[test]
    fn test_not_overdue_before_due_date() {
        let (loan, now) = loan(Duration::days(3), LoanStatus::Active);
        assert!(!loan.is_overdue(now));
        assert_eq!(loan.days_overdue(now), 0);
        assert_eq!(loan.effective_status(now), LoanStatus::Active);
        assert_eq!(loan.late_fine(now, &LoansConfig::default()), Decimal::ZERO);
    }

    #[test]
    fn test_days_overdue_truncates() {
        let (loan, now) = loan(-(Duration::days(3) + Duration::hours(20)), LoanStatus::Active);
        assert!(loan.is_overdue(now));
        assert_eq!(loan.days_overdue(now), 3);
        assert_eq!(loan.effective_status(now), LoanStatus::Late);
    }

    #[test]
    fn test_late_fine_amount() {
        let (loan, now) = loan(-(Duration::days(4) + Duration::hours(1)), LoanStatus::Active);
        assert_eq!(loan.late_fine(now, &LoansConfig::default()).to_string(), "10.00");
    }

    #[test]
    fn test_grace_period_reduces_fine() {
        let rules = LoansConfig {
            grace_period_days: 2,
            ..LoansConfig::default()
        };
        let (loan, now) = loan(-(Duration::days(3) + Duration::hours(1)), LoanStatus::Active);
        assert_eq!(loan.late_fine(now, &rules).to_string(), "2.50");

        let (short, now) = loan_hours_late(30);
        assert_eq!(short.late_fine(now, &rules), Decimal::ZERO);
    }

    fn loan_hours_late(hours: i64) -> (Loan, DateTime<Utc>) {
        loan(-Duration::hours(hours), LoanStatus::Active)
    }

    #[test]
    fn test_returned_loan_is_never_late() {
        let (loan, now) = loan(-Duration::days(10), LoanStatus::Returned);
        assert!(!loan.is_overdue(now));
        assert_eq!(loan.effective_status(now), LoanStatus::Returned);
    }

    #[test]
    fn test_renewal_extends_from_due_date() {
        let (loan, _) = loan(Duration::days(2), LoanStatus::Active);
        let renewed = loan.renewed_due_at(&LoansConfig::default()).unwrap();
        assert_eq!(renewed, loan.due_at + Duration::days(7));
    }

    #[test]
    fn test_renewal_cap() {
        let (mut loan, _) = loan(Duration::days(2), LoanStatus::Active);
        loan.renewals = 3;
        assert!(matches!(
            loan.renewed_due_at(&LoansConfig::default()),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_only_active_loans_transition() {
        let (loan, _) = loan(Duration::days(2), LoanStatus::Returned);
        assert!(loan.renewed_due_at(&LoansConfig::default()).is_err());
        assert!(loan.check_returnable().is_err());
        assert!(loan.check_can_be_marked_lost().is_err());
    }

    #[test]
    fn test_fine_loan_must_belong_to_user() {
        let (loan, _) = loan(Duration::days(3), LoanStatus::Returned);
        assert!(loan.check_borrower(2).is_ok());
        assert!(matches!(loan.check_borrower(7), Err(AppError::BusinessRule(_))));
    }
}
