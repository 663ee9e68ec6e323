//! Loan management service

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use crate::{
    config::{FinesConfig, GamificationConfig, LoansConfig},
    error::{AppError, AppResult},
    models::{
        enums::{LoanStatus, MaterialStatus, ReservationStatus},
        fine::NewFine,
        loan::{CreateLoan, Loan, LoanClosed, LoanDetails, LoanList, LoanQuery},
        notification::NewNotification,
        page_bounds, Pagination, UserClaims,
    },
    repository::Repository,
};

use super::reservations::ReservationsService;

/// Due date of a new loan: the requested one, which must be in the future,
/// or the configured loan period from now
fn resolve_due_at(
    now: DateTime<Utc>,
    requested: Option<DateTime<Utc>>,
    rules: &LoansConfig,
) -> AppResult<DateTime<Utc>> {
    match requested {
        Some(due_at) if due_at <= now => Err(AppError::Validation(
            "Due date must be in the future".to_string(),
        )),
        Some(due_at) => Ok(due_at),
        None => Ok(now + Duration::days(rules.default_days)),
    }
}

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    rules: LoansConfig,
    fines: FinesConfig,
    points: GamificationConfig,
    reservations: ReservationsService,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        rules: LoansConfig,
        fines: FinesConfig,
        points: GamificationConfig,
        reservations: ReservationsService,
    ) -> Self {
        Self {
            repository,
            rules,
            fines,
            points,
            reservations,
        }
    }

    fn fine_due_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.fines.due_days)
    }

    /// Lend a material to a user
    pub async fn create(&self, request: &CreateLoan, staff_id: i32) -> AppResult<LoanDetails> {
        let due_at = resolve_due_at(Utc::now(), request.due_at, &self.rules)?;

        let mut tx = self.repository.pool.begin().await?;

        let user = self.repository.users.lock_by_id(&mut *tx, request.user_id).await?;
        if !user.active {
            return Err(AppError::BusinessRule("User account is inactive".to_string()));
        }

        let material = self
            .repository
            .materials
            .lock_by_id(&mut *tx, request.material_id)
            .await?;
        let hold = self
            .repository
            .reservations
            .open_for(&mut *tx, user.id, material.id)
            .await?;

        match material.status {
            MaterialStatus::Available => {}
            MaterialStatus::Reserved
                if hold
                    .as_ref()
                    .is_some_and(|r| r.status == ReservationStatus::Active) => {}
            MaterialStatus::Reserved => {
                return Err(AppError::BusinessRule(
                    "Material is reserved for another user".to_string(),
                ))
            }
            status => {
                return Err(AppError::BusinessRule(format!(
                    "Material is not available (material is {})",
                    status
                )))
            }
        }

        let active_loans = self.repository.users.count_active_loans(&mut *tx, user.id).await?;
        let max_loans = user.role.max_loans(&self.rules);
        if active_loans >= max_loans {
            return Err(AppError::BusinessRule(format!(
                "Loan limit reached ({} of {})",
                active_loans, max_loans
            )));
        }
        let first_loan = self.repository.users.count_all_loans(&mut *tx, user.id).await? == 0;

        let loan = self
            .repository
            .loans
            .create(&mut *tx, user.id, material.id, staff_id, due_at, request.notes.as_deref())
            .await?;
        self.repository.materials.mark_borrowed(&mut *tx, material.id).await?;

        if let Some(hold) = hold {
            self.repository
                .reservations
                .set_status(&mut *tx, hold.id, ReservationStatus::Completed)
                .await?;
        }

        self.repository
            .users
            .add_points(&mut *tx, user.id, self.points.borrow_points, false)
            .await?;
        if first_loan {
            self.repository
                .users
                .add_points(&mut *tx, user.id, self.points.first_borrow_points, true)
                .await?;
            self.repository
                .notifications
                .create(
                    &mut *tx,
                    &NewNotification::achievement(
                        user.id,
                        "First loan",
                        "You borrowed your first material from the library",
                        self.points.first_borrow_points,
                    ),
                )
                .await?;
        }

        tx.commit().await?;

        tracing::info!(
            loan_id = loan.id,
            user_id = user.id,
            material_id = material.id,
            due_at = %loan.due_at,
            "loan created"
        );
        self.get_details(loan.id).await
    }

    async fn get_details(&self, id: i32) -> AppResult<LoanDetails> {
        let details = self.repository.loans.get_details(id).await?;
        Ok(details.with_computed(Utc::now(), &self.rules))
    }

    pub async fn search(&self, query: &LoanQuery) -> AppResult<LoanList> {
        let (page, limit, _) = page_bounds(query.page, query.limit);
        let (loans, total) = self.repository.loans.search(query).await?;
        let now = Utc::now();
        Ok(LoanList {
            loans: loans
                .into_iter()
                .map(|loan| loan.with_computed(now, &self.rules))
                .collect(),
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// Active loans past due, oldest due date first
    pub async fn overdue(&self) -> AppResult<Vec<LoanDetails>> {
        let now = Utc::now();
        let loans = self.repository.loans.overdue().await?;
        Ok(loans
            .into_iter()
            .map(|loan| loan.with_computed(now, &self.rules))
            .collect())
    }

    pub async fn get(&self, id: i32, claims: &UserClaims) -> AppResult<LoanDetails> {
        let details = self.get_details(id).await?;
        claims.require_self_or_staff(details.loan.user_id)?;
        Ok(details)
    }

    /// Extend the due date, unless someone else is waiting for the material
    pub async fn renew(&self, id: i32, claims: &UserClaims) -> AppResult<Loan> {
        let mut tx = self.repository.pool.begin().await?;

        let loan = self.repository.loans.lock_by_id(&mut *tx, id).await?;
        claims.require_self_or_staff(loan.user_id)?;
        let due_at = loan.renewed_due_at(&self.rules)?;

        let waiting = self
            .repository
            .reservations
            .count_open_for_material(&mut *tx, loan.material_id, Some(loan.user_id))
            .await?;
        if waiting > 0 {
            return Err(AppError::BusinessRule(
                "Material is reserved by another user and cannot be renewed".to_string(),
            ));
        }

        let renewed = self.repository.loans.renew(&mut *tx, id, due_at).await?;
        tx.commit().await?;

        tracing::info!(loan_id = id, renewals = renewed.renewals, due_at = %renewed.due_at, "loan renewed");
        Ok(renewed)
    }

    /// Close a loan as returned, charging any late fine
    pub async fn return_loan(&self, id: i32, staff_id: i32) -> AppResult<LoanClosed> {
        let mut tx = self.repository.pool.begin().await?;

        let loan = self.repository.loans.lock_by_id(&mut *tx, id).await?;
        loan.check_returnable()?;

        let now = Utc::now();
        let days_overdue = loan.days_overdue(now);
        let fine = loan.late_fine(now, &self.rules);

        let closed = self
            .repository
            .loans
            .close(&mut *tx, id, LoanStatus::Returned, fine)
            .await?;

        let mut fine_id = None;
        if fine > Decimal::ZERO {
            let new_fine = NewFine::late_return(
                loan.user_id,
                loan.id,
                Some(staff_id),
                fine,
                days_overdue,
                self.fine_due_at(now),
            );
            let created = self.repository.fines.create(&mut *tx, &new_fine).await?;
            self.repository
                .notifications
                .create(
                    &mut *tx,
                    &NewNotification::fine_assessed(
                        loan.user_id,
                        Some(loan.id),
                        fine,
                        new_fine.description.as_deref().unwrap_or("Late return"),
                    ),
                )
                .await?;
            fine_id = Some(created.id);
        }

        if !loan.is_overdue(now) {
            self.repository
                .users
                .add_points(&mut *tx, loan.user_id, self.points.return_on_time_points, false)
                .await?;
        }

        let material = self
            .repository
            .materials
            .lock_by_id(&mut *tx, loan.material_id)
            .await?;
        self.reservations.release_material(&mut *tx, &material).await?;

        tx.commit().await?;

        tracing::info!(loan_id = id, days_overdue, fine = %fine, "loan returned");
        Ok(LoanClosed {
            loan: closed,
            fine_id,
            days_overdue,
        })
    }

    /// Close a loan as lost, charging the replacement fine
    pub async fn mark_lost(&self, id: i32, staff_id: i32) -> AppResult<LoanClosed> {
        let mut tx = self.repository.pool.begin().await?;

        let loan = self.repository.loans.lock_by_id(&mut *tx, id).await?;
        loan.check_can_be_marked_lost()?;

        let now = Utc::now();
        let days_overdue = loan.days_overdue(now);
        let fine = self.rules.lost_fine;

        let closed = self
            .repository
            .loans
            .close(&mut *tx, id, LoanStatus::Lost, fine)
            .await?;

        let new_fine = NewFine::lost_material(
            loan.user_id,
            loan.id,
            Some(staff_id),
            fine,
            self.fine_due_at(now),
        );
        let created = self.repository.fines.create(&mut *tx, &new_fine).await?;
        self.repository
            .notifications
            .create(
                &mut *tx,
                &NewNotification::fine_assessed(loan.user_id, Some(loan.id), fine, "Lost material"),
            )
            .await?;

        self.repository
            .materials
            .set_status(&mut *tx, loan.material_id, MaterialStatus::Lost)
            .await?;

        tx.commit().await?;

        tracing::warn!(loan_id = id, material_id = loan.material_id, "loan marked as lost");
        Ok(LoanClosed {
            loan: closed,
            fine_id: Some(created.id),
            days_overdue,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_at_defaults_to_loan_period() {
        let rules = LoansConfig::default();
        let now = Utc::now();
        let due_at = resolve_due_at(now, None, &rules).unwrap();
        assert_eq!(due_at, now + Duration::days(rules.default_days));
    }

    #[test]
    fn test_explicit_due_at_must_be_in_future() {
        let rules = LoansConfig::default();
        let now = Utc::now();

        let later = now + Duration::days(3);
        assert_eq!(resolve_due_at(now, Some(later), &rules).unwrap(), later);

        let past = now - Duration::hours(1);
        assert!(matches!(
            resolve_due_at(now, Some(past), &rules),
            Err(AppError::Validation(_))
        ));
        assert!(resolve_due_at(now, Some(now), &rules).is_err());
    }
}
