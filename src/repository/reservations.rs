//! Reservations repository for database operations

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::ReservationStatus,
        page_bounds,
        reservation::{Reservation, ReservationDetails, ReservationQuery},
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT r.*, u.name AS user_name, m.title AS material_title, m.author AS material_author
    FROM reservations r
    JOIN users u ON u.id = r.user_id
    JOIN materials m ON m.id = r.material_id
"#;

/// Serving order of a material's queue
const QUEUE_ORDER: &str = "r.priority DESC, r.reserved_at ASC, r.id ASC";

#[derive(Clone)]
pub struct ReservationsRepository {
    pool: Pool<Postgres>,
}

impl ReservationsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// Get reservation by ID inside a transaction, locking the row
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Reservation> {
        sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    pub async fn get_details(&self, id: i32) -> AppResult<ReservationDetails> {
        let query = format!("{} WHERE r.id = $1 AND r.deleted_at IS NULL", DETAILS_SELECT);
        sqlx::query_as::<_, ReservationDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Reservation with id {} not found", id)))
    }

    /// Search reservations with pagination, newest first
    pub async fn search(&self, query: &ReservationQuery) -> AppResult<(Vec<ReservationDetails>, i64)> {
        let (_, limit, offset) = page_bounds(query.page, query.limit);

        let mut conditions = vec!["r.deleted_at IS NULL".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("r.status = ${}", params.len()));
        }

        if let Some(user_id) = query.user_id {
            params.push(user_id.to_string());
            conditions.push(format!("r.user_id = ${}::int", params.len()));
        }

        if let Some(material_id) = query.material_id {
            params.push(material_id.to_string());
            conditions.push(format!("r.material_id = ${}::int", params.len()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM reservations r {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            "{} {} ORDER BY r.reserved_at DESC, r.id DESC LIMIT {} OFFSET {}",
            DETAILS_SELECT, where_clause, limit, offset
        );
        let mut select_builder = sqlx::query_as::<_, ReservationDetails>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let reservations = select_builder.fetch_all(&self.pool).await?;

        Ok((reservations, total))
    }

    pub async fn for_user(&self, user_id: i32) -> AppResult<Vec<ReservationDetails>> {
        let query = format!(
            "{} WHERE r.user_id = $1 AND r.deleted_at IS NULL ORDER BY r.reserved_at DESC",
            DETAILS_SELECT
        );
        let reservations = sqlx::query_as::<_, ReservationDetails>(&query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reservations)
    }

    /// Open reservations of a material in serving order
    pub async fn queue_for_material(&self, material_id: i32) -> AppResult<Vec<ReservationDetails>> {
        let query = format!(
            r#"{} WHERE r.material_id = $1 AND r.deleted_at IS NULL
              AND r.status IN ('pending', 'active')
            ORDER BY r.status = 'active' DESC, {}"#,
            DETAILS_SELECT, QUEUE_ORDER
        );
        let reservations = sqlx::query_as::<_, ReservationDetails>(&query)
            .bind(material_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(reservations)
    }

    pub async fn count_open_for_user(&self, conn: &mut PgConnection, user_id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reservations
            WHERE user_id = $1 AND status IN ('pending', 'active') AND deleted_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Open reservations on a material, optionally ignoring one user
    pub async fn count_open_for_material(
        &self,
        conn: &mut PgConnection,
        material_id: i32,
        excluding_user: Option<i32>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM reservations
            WHERE material_id = $1 AND status IN ('pending', 'active') AND deleted_at IS NULL
              AND ($2::int IS NULL OR user_id != $2)
            "#,
        )
        .bind(material_id)
        .bind(excluding_user)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// The user's open reservation on a material, if any
    pub async fn open_for(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        material_id: i32,
    ) -> AppResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE user_id = $1 AND material_id = $2
              AND status IN ('pending', 'active') AND deleted_at IS NULL
            ORDER BY status = 'active' DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(material_id)
        .fetch_optional(&mut *conn)
        .await?;
        Ok(reservation)
    }

    /// Next pending reservation to serve for a material
    pub async fn next_pending(&self, conn: &mut PgConnection, material_id: i32) -> AppResult<Option<Reservation>> {
        let query = format!(
            r#"
            SELECT r.* FROM reservations r
            WHERE r.material_id = $1 AND r.status = 'pending' AND r.deleted_at IS NULL
            ORDER BY {}
            LIMIT 1
            FOR UPDATE
            "#,
            QUEUE_ORDER
        );
        let reservation = sqlx::query_as::<_, Reservation>(&query)
            .bind(material_id)
            .fetch_optional(&mut *conn)
            .await?;
        Ok(reservation)
    }

    pub async fn create(
        &self,
        conn: &mut PgConnection,
        user_id: i32,
        material_id: i32,
        priority: i32,
        expires_at: DateTime<Utc>,
        notes: Option<&str>,
    ) -> AppResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            INSERT INTO reservations (user_id, material_id, reserved_at, expires_at, status, priority, notes)
            VALUES ($1, $2, NOW(), $3, 'pending', $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(material_id)
        .bind(expires_at)
        .bind(priority)
        .bind(notes)
        .fetch_one(&mut *conn)
        .await?;
        Ok(reservation)
    }

    /// Move to active and restart the pickup window
    pub async fn activate(
        &self,
        conn: &mut PgConnection,
        id: i32,
        expires_at: DateTime<Utc>,
    ) -> AppResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            r#"
            UPDATE reservations
            SET status = 'active', expires_at = $1, notified = TRUE, updated_at = NOW()
            WHERE id = $2
            RETURNING *
            "#,
        )
        .bind(expires_at)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(reservation)
    }

    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: ReservationStatus,
    ) -> AppResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "UPDATE reservations SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(reservation)
    }

    /// Open reservations whose window has passed, locked for the sweep
    pub async fn lock_expired(&self, conn: &mut PgConnection) -> AppResult<Vec<Reservation>> {
        let reservations = sqlx::query_as::<_, Reservation>(
            r#"
            SELECT * FROM reservations
            WHERE status IN ('pending', 'active') AND expires_at < NOW() AND deleted_at IS NULL
            ORDER BY expires_at
            FOR UPDATE
            "#,
        )
        .fetch_all(&mut *conn)
        .await?;
        Ok(reservations)
    }
}
