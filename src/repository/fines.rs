//! Fines repository for database operations

use rust_decimal::Decimal;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::FineStatus,
        fine::{Fine, FineDetails, FineQuery, NewFine},
        page_bounds,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT f.*, u.name AS user_name, m.title AS material_title
    FROM fines f
    JOIN users u ON u.id = f.user_id
    LEFT JOIN loans l ON l.id = f.loan_id
    LEFT JOIN materials m ON m.id = l.material_id
"#;

const OVERDUE_CONDITION: &str = "f.status = 'pending' AND f.due_at < NOW()";

#[derive(Clone)]
pub struct FinesRepository {
    pool: Pool<Postgres>,
}

impl FinesRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get fine by ID inside a transaction, locking the row
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Fine> {
        sqlx::query_as::<_, Fine>("SELECT * FROM fines WHERE id = $1 AND deleted_at IS NULL FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    pub async fn get_details(&self, id: i32) -> AppResult<FineDetails> {
        let query = format!("{} WHERE f.id = $1 AND f.deleted_at IS NULL", DETAILS_SELECT);
        sqlx::query_as::<_, FineDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    /// Search fines with pagination, newest first
    pub async fn search(&self, query: &FineQuery) -> AppResult<(Vec<FineDetails>, i64)> {
        let (_, limit, offset) = page_bounds(query.page, query.limit);

        let mut conditions = vec!["f.deleted_at IS NULL".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("f.status = ${}", params.len()));
        }

        if let Some(user_id) = query.user_id {
            params.push(user_id.to_string());
            conditions.push(format!("f.user_id = ${}::int", params.len()));
        }

        if let Some(reason) = query.reason {
            params.push(reason.as_str().to_string());
            conditions.push(format!("f.reason = ${}", params.len()));
        }

        match query.overdue {
            Some(true) => conditions.push(format!("({})", OVERDUE_CONDITION)),
            Some(false) => conditions.push(format!("NOT ({})", OVERDUE_CONDITION)),
            None => {}
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM fines f {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY f.created_at DESC, f.id DESC LIMIT {} OFFSET {}",
            DETAILS_SELECT, where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, FineDetails>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let fines = select_builder.fetch_all(&self.pool).await?;

        Ok((fines, total))
    }

    pub async fn for_user(&self, user_id: i32) -> AppResult<Vec<FineDetails>> {
        let query = format!(
            "{} WHERE f.user_id = $1 AND f.deleted_at IS NULL ORDER BY f.created_at DESC",
            DETAILS_SELECT
        );
        let fines = sqlx::query_as::<_, FineDetails>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(fines)
    }

    /// Sum of a user's fines in one status
    pub async fn total_for_user(&self, user_id: i32, status: FineStatus) -> AppResult<Decimal> {
        let total: Option<Decimal> = sqlx::query_scalar(
            "SELECT SUM(amount) FROM fines WHERE user_id = $1 AND status = $2 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.unwrap_or(Decimal::ZERO))
    }

    pub async fn create(&self, conn: &mut PgConnection, fine: &NewFine) -> AppResult<Fine> {
        let created = sqlx::query_as::<_, Fine>(
            r#"
            INSERT INTO fines (user_id, loan_id, staff_id, amount, reason, description, status, due_at)
            VALUES ($1, $2, $3, $4, $5, $6, 'pending', $7)
            RETURNING *
            "#,
        )
        .bind(fine.user_id)
        .bind(fine.loan_id)
        .bind(fine.staff_id)
        .bind(fine.amount)
        .bind(fine.reason)
        .bind(&fine.description)
        .bind(fine.due_at)
        .fetch_one(&mut *conn)
        .await?;
        Ok(created)
    }

    pub async fn mark_paid(&self, conn: &mut PgConnection, id: i32, payment_method: &str) -> AppResult<Fine> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines
            SET status = 'paid', paid_at = NOW(), payment_method = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(payment_method)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(fine)
    }

    pub async fn mark_cancelled(&self, conn: &mut PgConnection, id: i32, notes: Option<&str>) -> AppResult<Fine> {
        let fine = sqlx::query_as::<_, Fine>(
            r#"
            UPDATE fines SET status = 'cancelled', notes = $1, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(notes)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(fine)
    }
}
