//! Materials repository for database operations

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Executor, PgConnection, Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::MaterialStatus,
        material::{
            CountByKey, CreateMaterial, Material, MaterialQuery, MaterialShort, UpdateMaterial,
            DEFAULT_LANGUAGE,
        },
        page_bounds,
    },
};

#[derive(Clone)]
pub struct MaterialsRepository {
    pool: Pool<Postgres>,
}

impl MaterialsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get material by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Material> {
        sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", id)))
    }

    /// Get material by ID inside a transaction, locking the row
    pub async fn lock_by_id(&self, conn: &mut PgConnection, id: i32) -> AppResult<Material> {
        sqlx::query_as::<_, Material>(
            "SELECT * FROM materials WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", id)))
    }

    /// Check if an ISBN is already used by another material
    pub async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM materials
                WHERE isbn = $1 AND deleted_at IS NULL
                  AND ($2::int IS NULL OR id != $2)
            )
            "#,
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Search materials with filters, sorting and pagination
    pub async fn search(&self, query: &MaterialQuery) -> AppResult<(Vec<Material>, i64)> {
        let (_, limit, offset) = page_bounds(query.page, query.limit);

        let mut conditions = vec!["deleted_at IS NULL".to_string()];
        let mut params: Vec<String> = Vec::new();

        if let Some(ref search) = query.search {
            params.push(format!("%{}%", search.to_lowercase()));
            let idx = params.len();
            conditions.push(format!(
                "(LOWER(title) LIKE ${idx} OR LOWER(author) LIKE ${idx} \
                  OR LOWER(COALESCE(isbn, '')) LIKE ${idx} OR LOWER(COALESCE(description, '')) LIKE ${idx})"
            ));
        }

        if let Some(category) = query.category {
            params.push(category.as_str().to_string());
            conditions.push(format!("category = ${}", params.len()));
        }

        if let Some(status) = query.status {
            params.push(status.as_str().to_string());
            conditions.push(format!("status = ${}", params.len()));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let count_query = format!("SELECT COUNT(*) FROM materials {}", where_clause);
        let mut count_builder = sqlx::query_scalar::<_, i64>(&count_query);
        for param in &params {
            count_builder = count_builder.bind(param);
        }
        let total = count_builder.fetch_one(&self.pool).await?;

        // Sort column and direction come from closed enums, never from raw input
        let sort = query.sort.unwrap_or_default();
        let order = query.order.unwrap_or_default();

        let select_query = format!(
            r#"
            SELECT * FROM materials
            {}
            ORDER BY {} {} NULLS LAST, id
            LIMIT {} OFFSET {}
            "#,
            where_clause,
            sort.column(),
            order.as_sql(),
            limit,
            offset
        );

        let mut select_builder = sqlx::query_as::<_, Material>(&select_query);
        for param in &params {
            select_builder = select_builder.bind(param);
        }
        let materials = select_builder.fetch_all(&self.pool).await?;

        Ok((materials, total))
    }

    /// Create a new material
    pub async fn create(&self, conn: &mut PgConnection, material: &CreateMaterial) -> AppResult<Material> {
        let created = sqlx::query_as::<_, Material>(
            r#"
            INSERT INTO materials (
                title, author, isbn, category, publisher, publication_year, pages,
                language, description, location, cover_image, price, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&material.title)
        .bind(&material.author)
        .bind(&material.isbn)
        .bind(material.category)
        .bind(&material.publisher)
        .bind(material.publication_year)
        .bind(material.pages)
        .bind(material.language.as_deref().unwrap_or(DEFAULT_LANGUAGE))
        .bind(&material.description)
        .bind(&material.location)
        .bind(&material.cover_image)
        .bind(material.price)
        .bind(material.status.unwrap_or(MaterialStatus::Available))
        .fetch_one(&mut *conn)
        .await?;

        Ok(created)
    }

    /// Update an existing material
    pub async fn update(
        &self,
        conn: &mut PgConnection,
        id: i32,
        material: &UpdateMaterial,
    ) -> AppResult<Material> {
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

        add_field!(material.title, "title");
        add_field!(material.author, "author");
        add_field!(material.isbn, "isbn");
        add_field!(material.category, "category");
        add_field!(material.publisher, "publisher");
        add_field!(material.publication_year, "publication_year");
        add_field!(material.pages, "pages");
        add_field!(material.language, "language");
        add_field!(material.description, "description");
        add_field!(material.location, "location");
        add_field!(material.cover_image, "cover_image");
        add_field!(material.price, "price");
        add_field!(material.status, "status");

        let query = format!(
            "UPDATE materials SET {} WHERE id = ${} AND deleted_at IS NULL RETURNING *",
            sets.join(", "),
            param_idx
        );

        let mut builder = sqlx::query_as::<_, Material>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(material.title);
        bind_field!(material.author);
        bind_field!(material.isbn);
        bind_field!(material.category);
        bind_field!(material.publisher);
        bind_field!(material.publication_year);
        bind_field!(material.pages);
        bind_field!(material.language);
        bind_field!(material.description);
        bind_field!(material.location);
        bind_field!(material.cover_image);
        bind_field!(material.price);
        bind_field!(material.status);

        builder
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Material with id {} not found", id)))
    }

    /// Soft delete
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE materials SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Material with id {} not found", id)));
        }
        Ok(())
    }

    pub async fn has_active_loan<'e, E>(&self, executor: E, id: i32) -> AppResult<bool>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM loans WHERE material_id = $1 AND status = 'active' AND deleted_at IS NULL)",
        )
        .bind(id)
        .fetch_one(executor)
        .await?;
        Ok(exists)
    }

    pub async fn set_status(
        &self,
        conn: &mut PgConnection,
        id: i32,
        status: MaterialStatus,
    ) -> AppResult<()> {
        sqlx::query("UPDATE materials SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Mark as borrowed and bump the loan counter
    pub async fn mark_borrowed(&self, conn: &mut PgConnection, id: i32) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE materials
            SET status = 'borrowed', total_loans = total_loans + 1, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update_rating(
        &self,
        conn: &mut PgConnection,
        id: i32,
        rating: Decimal,
        rating_count: i32,
    ) -> AppResult<Material> {
        let material = sqlx::query_as::<_, Material>(
            r#"
            UPDATE materials SET rating = $1, rating_count = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(rating)
        .bind(rating_count)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(material)
    }

    pub async fn set_qr_code(
        &self,
        conn: &mut PgConnection,
        id: i32,
        qr_code: &str,
    ) -> AppResult<Material> {
        let material = sqlx::query_as::<_, Material>(
            "UPDATE materials SET qr_code = $1 WHERE id = $2 RETURNING *",
        )
        .bind(qr_code)
        .bind(id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(material)
    }

    pub async fn count(&self) -> AppResult<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM materials WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    pub async fn count_by_category(&self) -> AppResult<Vec<CountByKey>> {
        let rows = sqlx::query_as::<_, CountByKey>(
            r#"
            SELECT category AS key, COUNT(*) AS count
            FROM materials WHERE deleted_at IS NULL
            GROUP BY category ORDER BY category
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_by_status(&self) -> AppResult<Vec<CountByKey>> {
        let rows = sqlx::query_as::<_, CountByKey>(
            r#"
            SELECT status AS key, COUNT(*) AS count
            FROM materials WHERE deleted_at IS NULL
            GROUP BY status ORDER BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Materials with the most loans
    pub async fn most_borrowed(&self, limit: i64) -> AppResult<Vec<MaterialShort>> {
        let rows = sqlx::query_as::<_, MaterialShort>(
            r#"
            SELECT id, title, author, category, status, rating, rating_count, total_loans, cover_image
            FROM materials
            WHERE deleted_at IS NULL
            ORDER BY total_loans DESC, title
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
