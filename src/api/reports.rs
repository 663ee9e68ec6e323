//! Staff report endpoints

use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::report::{
        DateRange, FineReport, LoanReport, Overview, PopularQuery, PopularReport, UserReport,
    },
    AppState,
};

use super::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/reports/overview",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library totals", body = Overview),
        (status = 403, description = "Staff only")
    )
)]
pub async fn overview(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Overview>> {
    claims.require_staff()?;

    let overview = state.services.reports.overview().await?;
    Ok(Json(overview))
}

/// Loans created in a date range
#[utoipa::path(
    get,
    path = "/reports/loans",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(DateRange),
    responses(
        (status = 200, description = "Loan report", body = LoanReport),
        (status = 400, description = "Range ends before it starts"),
        (status = 403, description = "Staff only")
    )
)]
pub async fn loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(range): Query<DateRange>,
) -> AppResult<Json<LoanReport>> {
    claims.require_staff()?;
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if from > to {
            return Err(AppError::Validation("'from' must not be after 'to'".to_string()));
        }
    }

    let report = state.services.reports.loans(&range).await?;
    Ok(Json(report))
}

/// Most borrowed materials
#[utoipa::path(
    get,
    path = "/reports/popular",
    tag = "reports",
    security(("bearer_auth" = [])),
    params(PopularQuery),
    responses(
        (status = 200, description = "Most borrowed materials", body = PopularReport),
        (status = 403, description = "Staff only")
    )
)]
pub async fn popular(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<PopularQuery>,
) -> AppResult<Json<PopularReport>> {
    claims.require_staff()?;
    query.validate()?;

    let report = state.services.reports.popular(query.limit).await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/fines",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Fine amounts by status and reason", body = FineReport),
        (status = 403, description = "Staff only")
    )
)]
pub async fn fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<FineReport>> {
    claims.require_staff()?;

    let report = state.services.reports.fines().await?;
    Ok(Json(report))
}

#[utoipa::path(
    get,
    path = "/reports/users",
    tag = "reports",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Users by role and top readers", body = UserReport),
        (status = 403, description = "Staff only")
    )
)]
pub async fn users(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserReport>> {
    claims.require_staff()?;

    let report = state.services.reports.users().await?;
    Ok(Json(report))
}
