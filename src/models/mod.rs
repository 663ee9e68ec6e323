//! Data models for Biblioteca

pub mod enums;
pub mod fine;
pub mod loan;
pub mod material;
pub mod notification;
pub mod report;
pub mod reservation;
pub mod user;
pub mod validation;

use serde::Serialize;
use utoipa::ToSchema;

// Re-export commonly used types
pub use enums::{
    FineReason, FineStatus, LoanStatus, MaterialCategory, MaterialStatus, NotificationKind,
    ReservationStatus, UserRole,
};
pub use fine::Fine;
pub use loan::{Loan, LoanDetails};
pub use material::Material;
pub use notification::{NewNotification, Notification};
pub use reservation::{Reservation, ReservationDetails};
pub use user::{User, UserClaims};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Resolves optional `page` / `limit` query values into `(page, limit, offset)`
pub fn page_bounds(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1) * limit)
}

/// Pagination block attached to every list response
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total_items: i64) -> Self {
        let total_pages = if total_items == 0 {
            0
        } else {
            (total_items + limit - 1) / limit
        };
        Self {
            current_page: page,
            total_pages,
            total_items,
            items_per_page: limit,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds_defaults() {
        assert_eq!(page_bounds(None, None), (1, 20, 0));
        assert_eq!(page_bounds(Some(3), Some(10)), (3, 10, 20));
    }

    #[test]
    fn test_page_bounds_clamps() {
        assert_eq!(page_bounds(Some(0), Some(500)), (1, 100, 0));
        assert_eq!(page_bounds(Some(-2), Some(0)), (1, 1, 0));
    }

    #[test]
    fn test_pagination_flags() {
        let p = Pagination::new(1, 20, 45);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_prev);

        let last = Pagination::new(3, 20, 45);
        assert!(!last.has_next);
        assert!(last.has_prev);
    }

    #[test]
    fn test_pagination_empty() {
        let p = Pagination::new(1, 20, 0);
        assert_eq!(p.total_pages, 0);
        assert!(!p.has_next);
        assert!(!p.has_prev);
    }
}
