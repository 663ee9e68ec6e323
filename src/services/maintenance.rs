//! Periodic housekeeping, triggered from outside (cron calling the sweep endpoint)

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::AppResult,
    models::{notification::NewNotification, report::SweepReport},
    repository::Repository,
};

use super::reservations::ReservationsService;

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
    loan_rules: LoansConfig,
    reservations: ReservationsService,
}

impl MaintenanceService {
    pub fn new(repository: Repository, loan_rules: LoansConfig, reservations: ReservationsService) -> Self {
        Self {
            repository,
            loan_rules,
            reservations,
        }
    }

    /// Expire stale reservations, then send due-soon and overdue reminders once per loan
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        let mut report = SweepReport {
            reservations_expired: self.reservations.expire_due().await?,
            ..Default::default()
        };

        let now = Utc::now();

        let due_soon = self
            .repository
            .loans
            .due_soon_unnotified(self.loan_rules.due_soon_days)
            .await?;
        for details in &due_soon {
            let loan = &details.loan;
            let days_left = (loan.due_at - now).num_days().max(0);

            let mut tx = self.repository.pool.begin().await?;
            self.repository
                .notifications
                .create(
                    &mut *tx,
                    &NewNotification::due_soon(
                        loan.user_id,
                        loan.id,
                        loan.material_id,
                        &details.material_title,
                        days_left,
                    ),
                )
                .await?;
            self.repository.loans.mark_due_soon_notified(&mut *tx, loan.id).await?;
            tx.commit().await?;
            report.due_soon_notified += 1;
        }

        let overdue = self.repository.loans.overdue_unnotified().await?;
        for details in &overdue {
            let loan = &details.loan;

            let mut tx = self.repository.pool.begin().await?;
            self.repository
                .notifications
                .create(
                    &mut *tx,
                    &NewNotification::overdue(
                        loan.user_id,
                        loan.id,
                        loan.material_id,
                        &details.material_title,
                        loan.days_overdue(now),
                    ),
                )
                .await?;
            self.repository.loans.mark_overdue_notified(&mut *tx, loan.id).await?;
            tx.commit().await?;
            report.overdue_notified += 1;
        }

        tracing::info!(
            reservations_expired = report.reservations_expired,
            due_soon_notified = report.due_soon_notified,
            overdue_notified = report.overdue_notified,
            "maintenance sweep finished"
        );
        Ok(report)
    }
}
