//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::fine::{CancelFine, CreateFine, Fine, FineDetails, FineList, FineQuery, PayFine},
    AppState,
};

use super::AuthenticatedUser;

/// Assess a fine
#[utoipa::path(
    post,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    request_body = CreateFine,
    responses(
        (status = 201, description = "Fine created", body = Fine),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "User or loan not found"),
        (status = 422, description = "Loan belongs to another user")
    )
)]
pub async fn create_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateFine>,
) -> AppResult<(StatusCode, Json<Fine>)> {
    claims.require_staff()?;
    request.validate()?;

    let fine = state.services.fines.create(&request, claims.user_id).await?;
    Ok((StatusCode::CREATED, Json(fine)))
}

/// List fines with filters and pagination
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(FineQuery),
    responses(
        (status = 200, description = "Paginated fines", body = FineList),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_fines(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<FineList>> {
    claims.require_staff()?;
    query.validate()?;

    let fines = state.services.fines.search(&query).await?;
    Ok(Json(fines))
}

/// Get a fine
#[utoipa::path(
    get,
    path = "/fines/{id}",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    responses(
        (status = 200, description = "Fine details", body = FineDetails),
        (status = 403, description = "Another user's fine"),
        (status = 404, description = "Fine not found")
    )
)]
pub async fn get_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<FineDetails>> {
    let fine = state.services.fines.get(id, &claims).await?;
    Ok(Json(fine))
}

/// Register a payment
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    request_body = PayFine,
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 422, description = "Fine is not pending")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<PayFine>>,
) -> AppResult<Json<Fine>> {
    claims.require_staff()?;
    let Json(request) = body.unwrap_or_default();
    request.validate()?;

    let fine = state
        .services
        .fines
        .pay(id, request.payment_method.as_deref())
        .await?;
    Ok(Json(fine))
}

/// Cancel a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/cancel",
    tag = "fines",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Fine ID")
    ),
    request_body = CancelFine,
    responses(
        (status = 200, description = "Fine cancelled", body = Fine),
        (status = 404, description = "Fine not found"),
        (status = 422, description = "Fine is not pending")
    )
)]
pub async fn cancel_fine(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    body: Option<Json<CancelFine>>,
) -> AppResult<Json<Fine>> {
    claims.require_staff()?;
    let Json(request) = body.unwrap_or_default();

    let fine = state.services.fines.cancel(id, request.reason.as_deref()).await?;
    Ok(Json(fine))
}
