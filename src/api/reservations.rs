//! Reservation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::reservation::{
        CreateReservation, Reservation, ReservationDetails, ReservationList, ReservationQuery,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Reserve a material
#[utoipa::path(
    post,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    request_body = CreateReservation,
    responses(
        (status = 201, description = "Reservation created, active when the material was free", body = Reservation),
        (status = 400, description = "Invalid input"),
        (status = 404, description = "Material not found"),
        (status = 409, description = "Already reserved by this user"),
        (status = 422, description = "Reservation not allowed")
    )
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateReservation>,
) -> AppResult<(StatusCode, Json<Reservation>)> {
    request.validate()?;

    let reservation = state.services.reservations.create(&claims, &request).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// List reservations with filters and pagination
#[utoipa::path(
    get,
    path = "/reservations",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(ReservationQuery),
    responses(
        (status = 200, description = "Paginated reservations", body = ReservationList),
        (status = 403, description = "Staff only")
    )
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<ReservationQuery>,
) -> AppResult<Json<ReservationList>> {
    claims.require_staff()?;
    query.validate()?;

    let reservations = state.services.reservations.search(&query).await?;
    Ok(Json(reservations))
}

/// Get a reservation
#[utoipa::path(
    get,
    path = "/reservations/{id}",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation details", body = ReservationDetails),
        (status = 403, description = "Another user's reservation"),
        (status = 404, description = "Reservation not found")
    )
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<ReservationDetails>> {
    let reservation = state.services.reservations.get(id, &claims).await?;
    Ok(Json(reservation))
}

/// Hold an available material for a pending reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/activate",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation activated", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 422, description = "Not pending or material unavailable")
    )
)]
pub async fn activate_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require_staff()?;

    let reservation = state.services.reservations.activate(id).await?;
    Ok(Json(reservation))
}

/// Cancel a reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/cancel",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation cancelled", body = Reservation),
        (status = 403, description = "Another user's reservation"),
        (status = 404, description = "Reservation not found"),
        (status = 422, description = "Reservation already closed")
    )
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    let reservation = state.services.reservations.cancel(id, &claims).await?;
    Ok(Json(reservation))
}

/// Complete an active reservation
#[utoipa::path(
    post,
    path = "/reservations/{id}/complete",
    tag = "reservations",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Reservation ID")
    ),
    responses(
        (status = 200, description = "Reservation completed", body = Reservation),
        (status = 404, description = "Reservation not found"),
        (status = 422, description = "Reservation is not active")
    )
)]
pub async fn complete_reservation(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Reservation>> {
    claims.require_staff()?;

    let reservation = state.services.reservations.complete(id).await?;
    Ok(Json(reservation))
}
