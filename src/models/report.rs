//! Staff report payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::UserRole;
use super::material::{CountByKey, MaterialShort};

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct Overview {
    pub total_materials: i64,
    pub available_materials: i64,
    pub total_users: i64,
    pub active_users: i64,
    pub active_loans: i64,
    pub overdue_loans: i64,
    pub open_reservations: i64,
    pub pending_fines_amount: Decimal,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoanReport {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub total: i64,
    /// Effective status counts, `late` included
    pub by_status: Vec<CountByKey>,
    pub returned_late: i64,
    /// Mean days between loan and return, for closed loans
    pub average_duration_days: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PopularQuery {
    #[validate(range(min = 1, max = 50, message = "Limit must be between 1 and 50"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PopularReport {
    pub materials: Vec<MaterialShort>,
}

/// Count and amount of fines for one status or reason
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct AmountByKey {
    pub key: String,
    pub count: i64,
    pub amount: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FineReport {
    pub by_status: Vec<AmountByKey>,
    pub by_reason: Vec<AmountByKey>,
    pub overdue_count: i64,
    pub overdue_amount: Decimal,
}

#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct TopReader {
    pub id: i32,
    pub name: String,
    pub role: UserRole,
    pub points: i32,
    pub achievements: i32,
    pub total_loans: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserReport {
    pub by_role: Vec<CountByKey>,
    pub active_users: i64,
    pub inactive_users: i64,
    pub top_readers: Vec<TopReader>,
}

/// Counts produced by one maintenance sweep
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct SweepReport {
    pub reservations_expired: u64,
    pub due_soon_notified: u64,
    pub overdue_notified: u64,
}
