//! Maintenance endpoint, meant to be called periodically by an external scheduler

use axum::{extract::State, Json};

use crate::{error::AppResult, models::report::SweepReport, AppState};

use super::AuthenticatedUser;

/// Expire stale reservations and send loan reminders
#[utoipa::path(
    post,
    path = "/maintenance/sweep",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Sweep counters", body = SweepReport),
        (status = 403, description = "Administrators only")
    )
)]
pub async fn sweep(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_admin()?;

    let report = state.services.maintenance.sweep().await?;
    Ok(Json(report))
}
