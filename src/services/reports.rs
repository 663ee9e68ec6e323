//! Staff reports

use crate::{
    error::AppResult,
    models::report::{DateRange, FineReport, LoanReport, Overview, PopularReport, UserReport},
    repository::Repository,
};

pub const DEFAULT_POPULAR_LIMIT: i64 = 10;
const TOP_READERS_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
}

impl ReportsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn overview(&self) -> AppResult<Overview> {
        self.repository.reports.overview().await
    }

    pub async fn loans(&self, range: &DateRange) -> AppResult<LoanReport> {
        let totals = self.repository.reports.loan_totals(range.from, range.to).await?;
        let by_status = self.repository.reports.loans_by_status(range.from, range.to).await?;
        Ok(LoanReport {
            from: range.from,
            to: range.to,
            total: totals.total,
            by_status,
            returned_late: totals.returned_late,
            average_duration_days: totals.average_duration_days,
        })
    }

    pub async fn popular(&self, limit: Option<i64>) -> AppResult<PopularReport> {
        let limit = limit.unwrap_or(DEFAULT_POPULAR_LIMIT);
        Ok(PopularReport {
            materials: self.repository.materials.most_borrowed(limit).await?,
        })
    }

    pub async fn fines(&self) -> AppResult<FineReport> {
        let overdue = self.repository.reports.overdue_fines().await?;
        Ok(FineReport {
            by_status: self.repository.reports.fines_by_status().await?,
            by_reason: self.repository.reports.fines_by_reason().await?,
            overdue_count: overdue.count,
            overdue_amount: overdue.amount,
        })
    }

    pub async fn users(&self) -> AppResult<UserReport> {
        let (active_users, inactive_users) = self.repository.reports.users_by_activity().await?;
        Ok(UserReport {
            by_role: self.repository.reports.users_by_role().await?,
            active_users,
            inactive_users,
            top_readers: self.repository.reports.top_readers(TOP_READERS_LIMIT).await?,
        })
    }
}
