//! Users repository for database operations

use chrono::Utc;
use sqlx::{PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::UserRole,
        user::{UpdateProfile, UpdateUser, User, UserQuery, UserSummary},
        page_bounds,
    },
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

/// Fields of a user row to insert
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub phone: Option<&'a str>,
    pub role: UserRole,
    pub active: bool,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by ID inside a transaction, locking the row
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    /// Get user by email (case-insensitive)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Check if email already exists (optionally excluding a user ID)
    pub async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM users
                WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL
                  AND ($2::int IS NULL OR id != $2)
            )
            "#,
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Search users with pagination
    pub async fn search(&self, query: &UserQuery) -> AppResult<(Vec<UserSummary>, i64)> {
        let (_, limit, offset) = page_bounds(query.page, query.limit);

        let mut conditions = vec!["u.deleted_at IS NULL".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            conditions.push(format!(
                "(LOWER(u.name) LIKE ${} OR LOWER(u.email) LIKE ${})",
                params.len(),
                params.len()
            ));
        }

        if let Some(role) = query.role {
            params.push(role.as_str().to_string());
            conditions.push(format!("u.role = ${}", params.len()));
        }

        if let Some(active) = query.active {
            params.push(active.to_string());
            conditions.push(format!("u.active = ${}::boolean", params.len()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM users u {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        let select_query = format!(
            r#"
            SELECT u.id, u.name, u.email, u.phone, u.role, u.active, u.points,
                   u.last_access_at, u.created_at,
                   (SELECT COUNT(*) FROM loans l
                     WHERE l.user_id = u.id AND l.status = 'active' AND l.deleted_at IS NULL) AS active_loans,
                   (SELECT COUNT(*) FROM fines f
                     WHERE f.user_id = u.id AND f.status = 'pending' AND f.deleted_at IS NULL) AS pending_fines
            FROM users u
            {}
            ORDER BY u.name, u.id
            LIMIT {} OFFSET {}
            "#,
            where_clause, limit, offset
        );

        let mut select_builder = sqlx::query_as::<_, UserSummary>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let users = select_builder.fetch_all(&self.pool).await?;

        Ok((users, total))
    }

    /// Create a new user
    pub async fn create(&self, user: NewUser<'_>) -> AppResult<User> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password, phone, role, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.phone)
        .bind(user.role)
        .bind(user.active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    /// Update an existing user
    pub async fn update(&self, id: i32, user: &UpdateUser, password: Option<String>) -> AppResult<User> {
        let now = Utc::now();

        // Build dynamic update query
        let mut sets = vec!["updated_at = $1".to_string()];
        let mut param_idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, param_idx));
                    param_idx += 1;
                }
            };
        }

        add_field!(user.name, "name");
        add_field!(user.email, "email");
        add_field!(user.phone, "phone");
        add_field!(user.role, "role");
        add_field!(user.active, "active");
        add_field!(user.avatar, "avatar");
        add_field!(password, "password");

        let query = format!(
            "UPDATE users SET {} WHERE id = ${} AND deleted_at IS NULL",
            sets.join(", "),
            param_idx
        );

        let mut builder = sqlx::query(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(user.name);
        bind_field!(user.email);
        bind_field!(user.phone);
        bind_field!(user.role);
        bind_field!(user.active);
        bind_field!(user.avatar);
        bind_field!(password);

        let result = builder.bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }

        self.get_by_id(id).await
    }

    /// Update own name, phone or avatar
    pub async fn update_profile(&self, id: i32, profile: &UpdateProfile) -> AppResult<User> {
        let update = UpdateUser {
            name: profile.name.clone(),
            phone: profile.phone.clone(),
            avatar: profile.avatar.clone(),
            ..Default::default()
        };
        self.update(id, &update, None).await
    }

    pub async fn set_active(&self, id: i32, active: bool) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET active = $1, updated_at = NOW()
            WHERE id = $2 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        Ok(user)
    }

    pub async fn update_password(&self, id: i32, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password = $1, updated_at = NOW() WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_last_access(&self, id: i32) -> AppResult<()> {
        sqlx::query("UPDATE users SET last_access_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Soft delete
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW(), active = FALSE WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User with id {} not found", id)));
        }
        Ok(())
    }

    /// Add gamification points (and optionally one achievement)
    pub async fn add_points(
        &self,
        conn: &mut PgConnection,
        id: i32,
        points: i32,
        achievement: bool,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET points = points + $1,
                achievements = achievements + CASE WHEN $2 THEN 1 ELSE 0 END,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(points)
        .bind(achievement)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Number of open loans of a user
    pub async fn count_active_loans(&self, conn: &mut PgConnection, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND status = 'active' AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }

    /// Number of loans ever taken by a user, in any status
    pub async fn count_all_loans(&self, conn: &mut PgConnection, id: i32) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM loans WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(count)
    }
}
