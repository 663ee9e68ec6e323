//! Reservation (hold) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::ReservationStatus;
use super::Pagination;
use crate::error::{AppError, AppResult};

pub const DEFAULT_PRIORITY: i32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Reservation {
    pub id: i32,
    pub user_id: i32,
    pub material_id: i32,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    /// 1 (lowest) to 5 (highest), served first
    pub priority: i32,
    /// The user has been told the material is waiting for them
    pub notified: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Pending or active
    pub fn is_open(&self) -> bool {
        matches!(
            self.status,
            ReservationStatus::Pending | ReservationStatus::Active
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn check_activatable(&self) -> AppResult<()> {
        if self.status == ReservationStatus::Pending {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Only pending reservations can be activated (reservation is {})",
                self.status
            )))
        }
    }

    pub fn check_cancellable(&self) -> AppResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Reservation cannot be cancelled (reservation is {})",
                self.status
            )))
        }
    }

    pub fn check_completable(&self) -> AppResult<()> {
        if self.status == ReservationStatus::Active {
            Ok(())
        } else {
            Err(AppError::BusinessRule(format!(
                "Only active reservations can be completed (reservation is {})",
                self.status
            )))
        }
    }
}

/// Reservation joined with user and material
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct ReservationDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reservation: Reservation,
    pub user_name: String,
    pub material_title: String,
    pub material_author: String,
}

#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservationQuery {
    pub status: Option<ReservationStatus>,
    pub user_id: Option<i32>,
    pub material_id: Option<i32>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationList {
    pub reservations: Vec<ReservationDetails>,
    pub pagination: Pagination,
}

/// Create reservation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateReservation {
    pub material_id: i32,
    /// Staff only; readers always reserve for themselves
    pub user_id: Option<i32>,
    #[validate(range(min = 1, max = 5, message = "Priority must be between 1 and 5"))]
    pub priority: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reservation(status: ReservationStatus) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: 1,
            user_id: 2,
            material_id: 3,
            reserved_at: now,
            expires_at: now + Duration::days(7),
            status,
            priority: 1,
            notified: false,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_transitions() {
        let r = reservation(ReservationStatus::Pending);
        assert!(r.is_open());
        assert!(r.check_activatable().is_ok());
        assert!(r.check_cancellable().is_ok());
        assert!(r.check_completable().is_err());
    }

    #[test]
    fn test_active_transitions() {
        let r = reservation(ReservationStatus::Active);
        assert!(r.check_activatable().is_err());
        assert!(r.check_cancellable().is_ok());
        assert!(r.check_completable().is_ok());
    }

    #[test]
    fn test_closed_reservations_are_final() {
        for status in [
            ReservationStatus::Expired,
            ReservationStatus::Cancelled,
            ReservationStatus::Completed,
        ] {
            let r = reservation(status);
            assert!(!r.is_open());
            assert!(r.check_activatable().is_err());
            assert!(r.check_cancellable().is_err());
            assert!(r.check_completable().is_err());
        }
    }

    #[test]
    fn test_expiry() {
        let r = reservation(ReservationStatus::Pending);
        assert!(!r.is_expired(Utc::now()));
        assert!(r.is_expired(Utc::now() + Duration::days(8)));
    }

    #[test]
    fn test_priority_range() {
        let create = CreateReservation {
            material_id: 1,
            user_id: None,
            priority: Some(6),
            expires_at: None,
            notes: None,
        };
        assert!(create.validate().is_err());
    }
}
