//! Aggregate queries behind the staff reports

use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};

use crate::{
    error::AppResult,
    models::{
        material::CountByKey,
        report::{AmountByKey, Overview, TopReader},
    },
};

/// Loans created inside an optional date range
const LOAN_RANGE: &str = r#"
    deleted_at IS NULL
    AND ($1::timestamptz IS NULL OR loaned_at >= $1)
    AND ($2::timestamptz IS NULL OR loaned_at <= $2)
"#;

#[derive(Clone)]
pub struct ReportsRepository {
    pool: Pool<Postgres>,
}

/// Loan counters for a date range
pub struct LoanTotals {
    pub total: i64,
    pub returned_late: i64,
    pub average_duration_days: Option<f64>,
}

impl ReportsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> AppResult<Overview> {
        let overview = sqlx::query_as::<_, Overview>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM materials WHERE deleted_at IS NULL) AS total_materials,
                (SELECT COUNT(*) FROM materials WHERE deleted_at IS NULL AND status = 'available') AS available_materials,
                (SELECT COUNT(*) FROM users WHERE deleted_at IS NULL) AS total_users,
                (SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND active) AS active_users,
                (SELECT COUNT(*) FROM loans WHERE deleted_at IS NULL AND status = 'active') AS active_loans,
                (SELECT COUNT(*) FROM loans
                  WHERE deleted_at IS NULL AND status = 'active' AND due_at < NOW()) AS overdue_loans,
                (SELECT COUNT(*) FROM reservations
                  WHERE deleted_at IS NULL AND status IN ('pending', 'active')) AS open_reservations,
                (SELECT COALESCE(SUM(amount), 0) FROM fines
                  WHERE deleted_at IS NULL AND status = 'pending') AS pending_fines_amount
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(overview)
    }

    pub async fn loan_totals(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<LoanTotals> {
        let query = format!(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE returned_at IS NOT NULL AND returned_at > due_at) AS returned_late,
                   (AVG(EXTRACT(EPOCH FROM (returned_at - loaned_at)) / 86400.0)
                       FILTER (WHERE returned_at IS NOT NULL))::float8 AS average_duration_days
            FROM loans
            WHERE {}
            "#,
            LOAN_RANGE
        );
        let row = sqlx::query(&query)
            .bind(from)
            .bind(to)
            .fetch_one(&self.pool)
            .await?;

        Ok(LoanTotals {
            total: row.get("total"),
            returned_late: row.get("returned_late"),
            average_duration_days: row.get("average_duration_days"),
        })
    }

    /// Loans per effective status (`late` for active loans past due)
    pub async fn loans_by_status(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<CountByKey>> {
        let query = format!(
            r#"
            SELECT CASE WHEN status = 'active' AND due_at < NOW() THEN 'late' ELSE status END AS key,
                   COUNT(*) AS count
            FROM loans
            WHERE {}
            GROUP BY 1
            ORDER BY 1
            "#,
            LOAN_RANGE
        );
        let rows = sqlx::query_as::<_, CountByKey>(&query)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn fines_by_status(&self) -> AppResult<Vec<AmountByKey>> {
        let rows = sqlx::query_as::<_, AmountByKey>(
            r#"
            SELECT status AS key, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM fines WHERE deleted_at IS NULL
            GROUP BY status ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn fines_by_reason(&self) -> AppResult<Vec<AmountByKey>> {
        let rows = sqlx::query_as::<_, AmountByKey>(
            r#"
            SELECT reason AS key, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM fines WHERE deleted_at IS NULL
            GROUP BY reason ORDER BY reason
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Pending fines past their due date
    pub async fn overdue_fines(&self) -> AppResult<AmountByKey> {
        let row = sqlx::query_as::<_, AmountByKey>(
            r#"
            SELECT 'overdue' AS key, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS amount
            FROM fines
            WHERE deleted_at IS NULL AND status = 'pending' AND due_at < NOW()
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn users_by_role(&self) -> AppResult<Vec<CountByKey>> {
        let rows = sqlx::query_as::<_, CountByKey>(
            r#"
            SELECT role AS key, COUNT(*) AS count
            FROM users WHERE deleted_at IS NULL
            GROUP BY role ORDER BY role
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Active and inactive user counts
    pub async fn users_by_activity(&self) -> AppResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) FILTER (WHERE active) AS active,
                   COUNT(*) FILTER (WHERE NOT active) AS inactive
            FROM users WHERE deleted_at IS NULL
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok((row.get("active"), row.get("inactive")))
    }

    pub async fn top_readers(&self, limit: i64) -> AppResult<Vec<TopReader>> {
        let rows = sqlx::query_as::<_, TopReader>(
            r#"
            SELECT u.id, u.name, u.role, u.points, u.achievements,
                   (SELECT COUNT(*) FROM loans l WHERE l.user_id = u.id AND l.deleted_at IS NULL) AS total_loans
            FROM users u
            WHERE u.deleted_at IS NULL
            ORDER BY u.points DESC, u.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
