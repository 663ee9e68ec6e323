//! Catalog service

use chrono::Utc;
use sqlx::PgConnection;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        enums::MaterialStatus,
        loan::LoanDetails,
        material::{
            CreateMaterial, Material, MaterialList, MaterialQuery, MaterialStats, QrPayload,
            UpdateMaterial,
        },
        page_bounds,
        reservation::ReservationDetails,
        Pagination,
    },
    repository::Repository,
};

use super::reservations::ReservationsService;

/// Loans shown in a material's history
const MATERIAL_HISTORY_LIMIT: i64 = 50;
/// Entries in the most borrowed ranking of the catalog stats
const MOST_BORROWED_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct MaterialsService {
    repository: Repository,
    loan_rules: LoansConfig,
    reservations: ReservationsService,
}

impl MaterialsService {
    pub fn new(
        repository: Repository,
        loan_rules: LoansConfig,
        reservations: ReservationsService,
    ) -> Self {
        Self {
            repository,
            loan_rules,
            reservations,
        }
    }

    pub async fn search(&self, query: &MaterialQuery) -> AppResult<MaterialList> {
        let (page, limit, _) = page_bounds(query.page, query.limit);
        let (materials, total) = self.repository.materials.search(query).await?;
        Ok(MaterialList {
            materials,
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<Material> {
        self.repository.materials.get_by_id(id).await
    }

    pub async fn create(&self, material: &CreateMaterial) -> AppResult<Material> {
        material.check_rules()?;
        if let Some(ref isbn) = material.isbn {
            if self.repository.materials.isbn_exists(isbn, None).await? {
                return Err(AppError::Conflict(format!("ISBN {} already registered", isbn)));
            }
        }

        let mut tx = self.repository.pool.begin().await?;
        let created = self.repository.materials.create(&mut *tx, material).await?;
        let created = self.store_qr_code(&mut *tx, created).await?;
        tx.commit().await?;

        tracing::info!(material_id = created.id, title = %created.title, "material created");
        Ok(created)
    }

    /// Partial update. A material coming back to the shelf serves its
    /// reservation queue.
    pub async fn update(&self, id: i32, material: &UpdateMaterial) -> AppResult<Material> {
        material.check_rules()?;
        if let Some(ref isbn) = material.isbn {
            if self.repository.materials.isbn_exists(isbn, Some(id)).await? {
                return Err(AppError::Conflict(format!("ISBN {} already registered", isbn)));
            }
        }

        let mut tx = self.repository.pool.begin().await?;
        let current = self.repository.materials.lock_by_id(&mut *tx, id).await?;
        if let Some(status) = material.status {
            current.check_status_change(status)?;
            if status == MaterialStatus::Lost
                && current.status != MaterialStatus::Lost
                && self.repository.materials.has_active_loan(&mut *tx, id).await?
            {
                return Err(AppError::BusinessRule(
                    "Material has an open loan; report the loan as lost instead".to_string(),
                ));
            }
        }

        let updated = self.repository.materials.update(&mut *tx, id, material).await?;
        let mut updated = self.store_qr_code(&mut *tx, updated).await?;

        if updated.status == MaterialStatus::Available && current.status != MaterialStatus::Available {
            if let Some(reservation) = self.reservations.release_material(&mut *tx, &updated).await? {
                tracing::info!(
                    material_id = id,
                    reservation_id = reservation.id,
                    "material back on the shelf went to the next reservation"
                );
                updated = self.repository.materials.lock_by_id(&mut *tx, id).await?;
            }
        }
        tx.commit().await?;

        if current.status != updated.status {
            tracing::info!(
                material_id = id,
                from = current.status.as_str(),
                to = updated.status.as_str(),
                "material status changed"
            );
        }
        Ok(updated)
    }

    /// Keep the stored QR payload in step with the material
    async fn store_qr_code(&self, conn: &mut PgConnection, material: Material) -> AppResult<Material> {
        let encoded = serde_json::to_string(&material.qr_payload())
            .map_err(|e| AppError::Internal(format!("Failed to encode QR payload: {}", e)))?;
        if material.qr_code.as_deref() == Some(encoded.as_str()) {
            return Ok(material);
        }
        self.repository
            .materials
            .set_qr_code(conn, material.id, &encoded)
            .await
    }

    /// Soft delete, refused while the material is on loan
    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.materials.get_by_id(id).await?;
        if self
            .repository
            .materials
            .has_active_loan(&self.repository.pool, id)
            .await?
        {
            return Err(AppError::Conflict(
                "Material has an open loan and cannot be deleted".to_string(),
            ));
        }

        self.repository.materials.delete(id).await?;
        tracing::info!(material_id = id, "material deleted");
        Ok(())
    }

    pub async fn loans(&self, id: i32) -> AppResult<Vec<LoanDetails>> {
        self.repository.materials.get_by_id(id).await?;
        let now = Utc::now();
        let loans = self
            .repository
            .loans
            .for_material(id, MATERIAL_HISTORY_LIMIT)
            .await?;
        Ok(loans
            .into_iter()
            .map(|loan| loan.with_computed(now, &self.loan_rules))
            .collect())
    }

    /// Open reservations in serving order
    pub async fn reservations(&self, id: i32) -> AppResult<Vec<ReservationDetails>> {
        self.repository.materials.get_by_id(id).await?;
        self.repository.reservations.queue_for_material(id).await
    }

    /// Fold one rating into the running average
    pub async fn rate(&self, id: i32, rating: i32) -> AppResult<Material> {
        let mut tx = self.repository.pool.begin().await?;
        let material = self.repository.materials.lock_by_id(&mut *tx, id).await?;
        let average = material.updated_rating(rating);
        let updated = self
            .repository
            .materials
            .update_rating(&mut *tx, id, average, material.rating_count + 1)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// QR payload for the material
    pub async fn qr_code(&self, id: i32) -> AppResult<QrPayload> {
        let material = self.repository.materials.get_by_id(id).await?;
        Ok(material.qr_payload())
    }

    pub async fn stats(&self) -> AppResult<MaterialStats> {
        Ok(MaterialStats {
            total: self.repository.materials.count().await?,
            by_category: self.repository.materials.count_by_category().await?,
            by_status: self.repository.materials.count_by_status().await?,
            most_borrowed: self.repository.materials.most_borrowed(MOST_BORROWED_LIMIT).await?,
        })
    }
}
