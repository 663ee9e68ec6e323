//! Loans repository for database operations

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::LoanStatus,
        loan::{Loan, LoanDetails, LoanQuery},
        page_bounds,
    },
};

/// Loan joined with borrower and material
const DETAILS_SELECT: &str = r#"
    SELECT l.*, u.name AS user_name, u.email AS user_email,
           m.title AS material_title, m.author AS material_author
    FROM loans l
    JOIN users u ON u.id = l.user_id
    JOIN materials m ON m.id = l.material_id
"#;

/// SQL condition matching a loan's effective status
fn status_condition(status: LoanStatus) -> &'static str {
    match status {
        LoanStatus::Active => "l.status = 'active' AND l.due_at >= NOW()",
        LoanStatus::Late => "l.status = 'active' AND l.due_at < NOW()",
        LoanStatus::Returned => "l.status = 'returned'",
        LoanStatus::Lost => "l.status = 'lost'",
    }
}

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan by ID inside a transaction, locking the row
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>(
            "SELECT * FROM loans WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Get loan with borrower and material
    pub async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        let query = format!("{} WHERE l.id = $1 AND l.deleted_at IS NULL", DETAILS_SELECT);
        sqlx::query_as::<_, LoanDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// Search loans with pagination, newest first
    pub async fn search(&self, query: &LoanQuery) -> AppResult<(Vec<LoanDetails>, i64)> {
        let (_, limit, offset) = page_bounds(query.page, query.limit);

        let mut conditions = vec!["l.deleted_at IS NULL".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            conditions.push(status_condition(status).to_string());
        }

        if let Some(user_id) = query.user_id {
            params.push(user_id.to_string());
            conditions.push(format!("l.user_id = ${}::int", params.len()));
        }

        if let Some(material_id) = query.material_id {
            params.push(material_id.to_string());
            conditions.push(format!("l.material_id = ${}::int", params.len()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM loans l {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY l.loaned_at DESC, l.id DESC LIMIT {} OFFSET {}",
            DETAILS_SELECT, where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, LoanDetails>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let loans = select_builder.fetch_all(&self.pool).await?;

        Ok((loans, total))
    }

    /// Active loans past due, oldest due date first
    pub async fn overdue(&self) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.deleted_at IS NULL AND {} ORDER BY l.due_at",
            DETAILS_SELECT,
            status_condition(LoanStatus::Late)
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Loans of one user, optionally filtered by effective status
    pub async fn for_user(&self, user_id: i32, status: Option<LoanStatus>) -> AppResult<Vec<LoanDetails>> {
        let status_filter = status
            .map(|s| format!(" AND {}", status_condition(s)))
            .unwrap_or_default();
        let query = format!(
            "{} WHERE l.user_id = $1 AND l.deleted_at IS NULL{} ORDER BY l.loaned_at DESC",
            DETAILS_SELECT, status_filter
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Loan history of one material, newest first
    pub async fn for_material(&self, material_id: i32, limit: i64) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.material_id = $1 AND l.deleted_at IS NULL ORDER BY l.loaned_at DESC LIMIT $2",
            DETAILS_SELECT
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&query)
            .bind(material_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Whether a user currently holds the material
    pub async fn user_has_active_loan_on(&self, user_id: i32, material_id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM loans
                WHERE user_id = $1 AND material_id = $2 AND status = 'active' AND deleted_at IS NULL
            )
            "#,
        )
        .bind(user_id)
        .bind(material_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        material_id: i32,
        staff_id: i32,
        due_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (user_id, material_id, staff_id, loaned_at, due_at, status, notes)
            VALUES ($1, $2, $3, NOW(), $4, 'active', $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(material_id)
        .bind(staff_id)
        .bind(due_at)
        .bind(notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(loan)
    }

    /// Push the due date and count the renewal
    pub async fn renew(&self, conn: &mut PgConnection, id: i32, due_at: DateTime<Utc>) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET due_at = $1, renewals = renewals + 1,
                due_soon_notified = FALSE, overdue_notified = FALSE, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(due_at)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(loan)
    }

    /// Close an active loan as returned or lost
    pub async fn close(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: LoanStatus,
        fine: Decimal,
    ) -> AppResult<Loan> {
        let loan = sqlx::query_as::<_, Loan>(
            r#"
            UPDATE loans
            SET status = $1, returned_at = NOW(), fine = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(fine)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(loan)
    }

    /// Active loans due within `days` that were not reminded yet
    pub async fn due_soon_unnotified(&self, days: i64) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            r#"{}
            WHERE l.deleted_at IS NULL AND l.status = 'active' AND NOT l.due_soon_notified
              AND l.due_at >= NOW() AND l.due_at <= NOW() + make_interval(days => $1)
            ORDER BY l.due_at"#,
            DETAILS_SELECT
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&query)
            .bind(days as i32)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    /// Overdue loans whose borrower was not warned yet
    pub async fn overdue_unnotified(&self) -> AppResult<Vec<LoanDetails>> {
        let query = format!(
            "{} WHERE l.deleted_at IS NULL AND {} AND NOT l.overdue_notified ORDER BY l.due_at",
            DETAILS_SELECT,
            status_condition(LoanStatus::Late)
        );
        let loans = sqlx::query_as::<_, LoanDetails>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(loans)
    }

    pub async fn mark_due_soon_notified(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE loans SET due_soon_notified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn mark_overdue_notified(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE loans SET overdue_notified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_filter_reads_active_rows() {
        assert_eq!(
            status_condition(LoanStatus::Late),
            "l.status = 'active' AND l.due_at < NOW()"
        );
        assert!(status_condition(LoanStatus::Active).contains("l.due_at >= NOW()"));
    }
}
