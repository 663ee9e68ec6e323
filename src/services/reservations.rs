//! Reservation queue service

use chrono::{DateTime, Duration, Utc};
use sqlx::PgConnection;

use crate::{
    config::ReservationsConfig,
    error::{AppError, AppResult},
    models::{
        enums::{MaterialStatus, ReservationStatus},
        material::Material,
        notification::NewNotification,
        page_bounds,
        reservation::{
            CreateReservation, Reservation, ReservationDetails, ReservationList, ReservationQuery,
            DEFAULT_PRIORITY,
        },
        Pagination, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReservationsService {
    repository: Repository,
    config: ReservationsConfig,
}

impl ReservationsService {
    pub fn new(repository: Repository, config: ReservationsConfig) -> Self {
        Self { repository, config }
    }

    fn pickup_deadline(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.config.expiry_days)
    }

    /// Activate a reservation, hold its material and tell the user
    async fn hand_over(
        &self,
        conn: &mut PgConnection,
        reservation_id: i32,
        material: &Material,
    ) -> AppResult<Reservation> {
        let expires_at = self.pickup_deadline(Utc::now());
        let activated = self
            .repository
            .reservations
            .activate(conn, reservation_id, expires_at)
            .await?;
        self.repository
            .materials
            .set_status(conn, material.id, MaterialStatus::Reserved)
            .await?;
        self.repository
            .notifications
            .create(
                &mut *conn,
                &NewNotification::available_for_pickup(
                    activated.user_id,
                    activated.id,
                    material.id,
                    &material.title,
                ),
            )
            .await?;

        tracing::info!(
            reservation_id = activated.id,
            material_id = material.id,
            user_id = activated.user_id,
            "reservation activated"
        );
        Ok(activated)
    }

    /// A material came back from a loan, a hold or maintenance: serve the
    /// next pending reservation, or put it back on the shelf.
    ///
    /// Lost materials and materials under maintenance keep their status.
    pub async fn release_material(
        &self,
        conn: &mut PgConnection,
        material: &Material,
    ) -> AppResult<Option<Reservation>> {
        if !matches!(
            material.status,
            MaterialStatus::Available | MaterialStatus::Borrowed | MaterialStatus::Reserved
        ) {
            return Ok(None);
        }

        match self.repository.reservations.next_pending(conn, material.id).await? {
            Some(next) => Ok(Some(self.hand_over(conn, next.id, material).await?)),
            None => {
                self.repository
                    .materials
                    .set_status(conn, material.id, MaterialStatus::Available)
                    .await?;
                Ok(None)
            }
        }
    }

    /// Place a reservation; readers always reserve for themselves
    pub async fn create(&self, claims: &UserClaims, request: &CreateReservation) -> AppResult<Reservation> {
        let user_id = match request.user_id {
            Some(user_id) if user_id != claims.user_id => {
                claims.require_staff()?;
                user_id
            }
            _ => claims.user_id,
        };

        let now = Utc::now();
        let expires_at = match request.expires_at {
            Some(expires_at) if expires_at <= now => {
                return Err(AppError::Validation(
                    "Expiration date must be in the future".to_string(),
                ))
            }
            Some(expires_at) => expires_at,
            None => self.pickup_deadline(now),
        };

        let mut tx = self.repository.pool.begin().await?;

        let user = self.repository.users.lock_by_id(&mut *tx, user_id).await?;
        if !user.active {
            return Err(AppError::BusinessRule("User account is inactive".to_string()));
        }

        let material = self
            .repository
            .materials
            .lock_by_id(&mut *tx, request.material_id)
            .await?;
        if material.status == MaterialStatus::Lost {
            return Err(AppError::BusinessRule("Lost materials cannot be reserved".to_string()));
        }

        let open = self
            .repository
            .reservations
            .count_open_for_user(&mut *tx, user_id)
            .await?;
        if open >= self.config.max_per_user {
            return Err(AppError::BusinessRule(format!(
                "Reservation limit reached ({})",
                self.config.max_per_user
            )));
        }

        if self
            .repository
            .reservations
            .open_for(&mut *tx, user_id, material.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "User already has an open reservation for this material".to_string(),
            ));
        }

        if self
            .repository
            .loans
            .user_has_active_loan_on(user_id, material.id)
            .await?
        {
            return Err(AppError::BusinessRule(
                "User already has this material on loan".to_string(),
            ));
        }

        let queued_ahead = self
            .repository
            .reservations
            .count_open_for_material(&mut *tx, material.id, Some(user_id))
            .await?;

        let mut reservation = self
            .repository
            .reservations
            .create(
                &mut *tx,
                user_id,
                material.id,
                request.priority.unwrap_or(DEFAULT_PRIORITY),
                expires_at,
                request.notes.as_deref(),
            )
            .await?;

        if material.status == MaterialStatus::Available && queued_ahead == 0 {
            reservation = self.hand_over(&mut *tx, reservation.id, &material).await?;
        }

        tx.commit().await?;

        tracing::info!(
            reservation_id = reservation.id,
            user_id,
            material_id = material.id,
            status = %reservation.status,
            "reservation created"
        );
        Ok(reservation)
    }

    pub async fn search(&self, query: &ReservationQuery) -> AppResult<ReservationList> {
        let (page, limit, _) = page_bounds(query.page, query.limit);
        let (reservations, total) = self.repository.reservations.search(query).await?;
        Ok(ReservationList {
            reservations,
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn get(&self, id: i32, claims: &UserClaims) -> AppResult<ReservationDetails> {
        let details = self.repository.reservations.get_details(id).await?;
        claims.require_self_or_staff(details.reservation.user_id)?;
        Ok(details)
    }

    /// Staff activation of a pending reservation on an available material
    pub async fn activate(&self, id: i32) -> AppResult<Reservation> {
        let mut tx = self.repository.pool.begin().await?;

        let reservation = self.repository.reservations.lock_by_id(&mut *tx, id).await?;
        reservation.check_activatable()?;

        let material = self
            .repository
            .materials
            .lock_by_id(&mut *tx, reservation.material_id)
            .await?;
        if material.status != MaterialStatus::Available {
            return Err(AppError::BusinessRule(format!(
                "Material is not available (material is {})",
                material.status
            )));
        }

        let activated = self.hand_over(&mut *tx, reservation.id, &material).await?;
        tx.commit().await?;
        Ok(activated)
    }

    pub async fn cancel(&self, id: i32, claims: &UserClaims) -> AppResult<Reservation> {
        let mut tx = self.repository.pool.begin().await?;

        let reservation = self.repository.reservations.lock_by_id(&mut *tx, id).await?;
        claims.require_self_or_staff(reservation.user_id)?;
        reservation.check_cancellable()?;

        let cancelled = self
            .repository
            .reservations
            .set_status(&mut *tx, id, ReservationStatus::Cancelled)
            .await?;

        if reservation.status == ReservationStatus::Active {
            let material = self
                .repository
                .materials
                .lock_by_id(&mut *tx, reservation.material_id)
                .await?;
            self.release_material(&mut *tx, &material).await?;
        }

        tx.commit().await?;
        tracing::info!(reservation_id = id, "reservation cancelled");
        Ok(cancelled)
    }

    /// Close an active reservation; a material still held for it is released
    pub async fn complete(&self, id: i32) -> AppResult<Reservation> {
        let mut tx = self.repository.pool.begin().await?;

        let reservation = self.repository.reservations.lock_by_id(&mut *tx, id).await?;
        reservation.check_completable()?;

        let completed = self
            .repository
            .reservations
            .set_status(&mut *tx, id, ReservationStatus::Completed)
            .await?;

        let material = self
            .repository
            .materials
            .lock_by_id(&mut *tx, reservation.material_id)
            .await?;
        if material.status == MaterialStatus::Reserved {
            self.release_material(&mut *tx, &material).await?;
        }

        tx.commit().await?;
        tracing::info!(reservation_id = id, "reservation completed");
        Ok(completed)
    }

    /// Expire every open reservation past its window, returning how many
    pub async fn expire_due(&self) -> AppResult<u64> {
        let mut tx = self.repository.pool.begin().await?;

        let expired = self.repository.reservations.lock_expired(&mut *tx).await?;
        for reservation in &expired {
            self.repository
                .reservations
                .set_status(&mut *tx, reservation.id, ReservationStatus::Expired)
                .await?;
        }

        // Released only once the whole batch is expired, so no stale hold is handed over
        let mut held: Vec<i32> = expired
            .iter()
            .filter(|r| r.status == ReservationStatus::Active)
            .map(|r| r.material_id)
            .collect();
        held.sort_unstable();
        held.dedup();

        for material_id in held {
            let material = self.repository.materials.lock_by_id(&mut *tx, material_id).await?;
            self.release_material(&mut *tx, &material).await?;
        }

        tx.commit().await?;
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "reservations expired");
        }
        Ok(expired.len() as u64)
    }
}
