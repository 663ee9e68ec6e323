//! Fine service

use chrono::{Duration, Utc};

use crate::{
    config::FinesConfig,
    error::AppResult,
    models::{
        fine::{CreateFine, Fine, FineDetails, FineList, FineQuery, NewFine},
        notification::NewNotification,
        page_bounds,
        validation::validate_non_negative,
        Pagination, UserClaims,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    config: FinesConfig,
}

impl FinesService {
    pub fn new(repository: Repository, config: FinesConfig) -> Self {
        Self { repository, config }
    }

    /// Assess a fine by hand
    pub async fn create(&self, request: &CreateFine, staff_id: i32) -> AppResult<Fine> {
        validate_non_negative(request.amount, "Amount")?;
        self.repository.users.get_by_id(request.user_id).await?;
        if let Some(loan_id) = request.loan_id {
            let loan = self.repository.loans.get_by_id(loan_id).await?;
            loan.check_borrower(request.user_id)?;
        }

        let new_fine = NewFine {
            user_id: request.user_id,
            loan_id: request.loan_id,
            staff_id: Some(staff_id),
            amount: request.amount,
            reason: request.reason,
            description: request.description.clone(),
            due_at: request
                .due_at
                .unwrap_or_else(|| Utc::now() + Duration::days(self.config.due_days)),
        };

        let mut tx = self.repository.pool.begin().await?;
        let fine = self.repository.fines.create(&mut *tx, &new_fine).await?;
        let reason = new_fine
            .description
            .clone()
            .unwrap_or_else(|| new_fine.reason.to_string());
        self.repository
            .notifications
            .create(
                &mut *tx,
                &NewNotification::fine_assessed(fine.user_id, fine.loan_id, fine.amount, &reason),
            )
            .await?;
        tx.commit().await?;

        tracing::info!(fine_id = fine.id, user_id = fine.user_id, amount = %fine.amount, "fine created");
        Ok(fine)
    }

    pub async fn search(&self, query: &FineQuery) -> AppResult<FineList> {
        let (page, limit, _) = page_bounds(query.page, query.limit);
        let (fines, total) = self.repository.fines.search(query).await?;
        let now = Utc::now();
        Ok(FineList {
            fines: fines.into_iter().map(|fine| fine.with_computed(now)).collect(),
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn get(&self, id: i32, claims: &UserClaims) -> AppResult<FineDetails> {
        let details = self.repository.fines.get_details(id).await?;
        claims.require_self_or_staff(details.fine.user_id)?;
        Ok(details.with_computed(Utc::now()))
    }

    pub async fn pay(&self, id: i32, payment_method: Option<&str>) -> AppResult<Fine> {
        let mut tx = self.repository.pool.begin().await?;
        let fine = self.repository.fines.lock_by_id(&mut *tx, id).await?;
        fine.check_payable()?;

        let method = payment_method.unwrap_or(self.config.default_payment_method.as_str());
        let paid = self.repository.fines.mark_paid(&mut *tx, id, method).await?;
        tx.commit().await?;

        tracing::info!(fine_id = id, payment_method = method, "fine paid");
        Ok(paid)
    }

    pub async fn cancel(&self, id: i32, reason: Option<&str>) -> AppResult<Fine> {
        let mut tx = self.repository.pool.begin().await?;
        let fine = self.repository.fines.lock_by_id(&mut *tx, id).await?;
        let notes = fine.cancelled_notes(reason)?;

        let cancelled = self
            .repository
            .fines
            .mark_cancelled(&mut *tx, id, notes.as_deref())
            .await?;
        tx.commit().await?;

        tracing::info!(fine_id = id, "fine cancelled");
        Ok(cancelled)
    }
}
