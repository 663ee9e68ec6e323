//! Catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::LoanDetails,
        material::{
            CreateMaterial, Material, MaterialList, MaterialQuery, MaterialStats, QrPayload,
            RateMaterial, UpdateMaterial,
        },
        reservation::ReservationDetails,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Search the catalog
#[utoipa::path(
    get,
    path = "/materials",
    tag = "materials",
    params(MaterialQuery),
    responses(
        (status = 200, description = "Paginated materials", body = MaterialList),
        (status = 400, description = "Invalid query")
    )
)]
pub async fn list_materials(
    State(state): State<AppState>,
    Query(query): Query<MaterialQuery>,
) -> AppResult<Json<MaterialList>> {
    query.validate()?;

    let materials = state.services.materials.search(&query).await?;
    Ok(Json(materials))
}

/// Get material details by ID
#[utoipa::path(
    get,
    path = "/materials/{id}",
    tag = "materials",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Material details", body = Material),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<Material>> {
    let material = state.services.materials.get_by_id(id).await?;
    Ok(Json(material))
}

/// Add a material to the catalog
#[utoipa::path(
    post,
    path = "/materials",
    tag = "materials",
    security(("bearer_auth" = [])),
    request_body = CreateMaterial,
    responses(
        (status = 201, description = "Material created", body = Material),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "ISBN already registered"),
        (status = 422, description = "Status is set by loans and reservations")
    )
)]
pub async fn create_material(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(material): Json<CreateMaterial>,
) -> AppResult<(StatusCode, Json<Material>)> {
    claims.require_staff()?;
    material.validate()?;

    let created = state.services.materials.create(&material).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a material
#[utoipa::path(
    put,
    path = "/materials/{id}",
    tag = "materials",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body = UpdateMaterial,
    responses(
        (status = 200, description = "Material updated", body = Material),
        (status = 404, description = "Material not found"),
        (status = 409, description = "ISBN already registered"),
        (status = 422, description = "Status change not allowed while on loan or held")
    )
)]
pub async fn update_material(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(material): Json<UpdateMaterial>,
) -> AppResult<Json<Material>> {
    claims.require_staff()?;
    material.validate()?;

    let updated = state.services.materials.update(id, &material).await?;
    Ok(Json(updated))
}

/// Remove a material from the catalog
#[utoipa::path(
    delete,
    path = "/materials/{id}",
    tag = "materials",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 404, description = "Material not found"),
        (status = 409, description = "Material is on loan")
    )
)]
pub async fn delete_material(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;

    state.services.materials.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Recent loans of a material
#[utoipa::path(
    get,
    path = "/materials/{id}/loans",
    tag = "materials",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Last 50 loans, newest first", body = Vec<LoanDetails>),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_material_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<LoanDetails>>> {
    claims.require_staff()?;

    let loans = state.services.materials.loans(id).await?;
    Ok(Json(loans))
}

/// Reservation queue of a material
#[utoipa::path(
    get,
    path = "/materials/{id}/reservations",
    tag = "materials",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "Open reservations in serving order", body = Vec<ReservationDetails>),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_material_reservations(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<ReservationDetails>>> {
    claims.require_staff()?;

    let reservations = state.services.materials.reservations(id).await?;
    Ok(Json(reservations))
}

/// Rate a material from 1 to 5
#[utoipa::path(
    post,
    path = "/materials/{id}/rate",
    tag = "materials",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    request_body = RateMaterial,
    responses(
        (status = 200, description = "Updated material", body = Material),
        (status = 400, description = "Rating out of range"),
        (status = 404, description = "Material not found")
    )
)]
pub async fn rate_material(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<RateMaterial>,
) -> AppResult<Json<Material>> {
    request.validate()?;

    let material = state.services.materials.rate(id, request.rating).await?;
    Ok(Json(material))
}

/// QR code payload of a material
#[utoipa::path(
    get,
    path = "/materials/{id}/qrcode",
    tag = "materials",
    params(
        ("id" = i32, Path, description = "Material ID")
    ),
    responses(
        (status = 200, description = "QR payload", body = QrPayload),
        (status = 404, description = "Material not found")
    )
)]
pub async fn get_qr_code(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<QrPayload>> {
    let payload = state.services.materials.qr_code(id).await?;
    Ok(Json(payload))
}

/// Catalog statistics
#[utoipa::path(
    get,
    path = "/materials/stats",
    tag = "materials",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Catalog statistics", body = MaterialStats),
        (status = 403, description = "Staff only")
    )
)]
pub async fn get_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<MaterialStats>> {
    claims.require_staff()?;

    let stats = state.services.materials.stats().await?;
    Ok(Json(stats))
}
