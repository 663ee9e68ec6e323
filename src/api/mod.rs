//! API handlers for the Biblioteca REST endpoints

pub mod auth;
pub mod fines;
pub mod health;
pub mod loans;
pub mod maintenance;
pub mod materials;
pub mod notifications;
pub mod openapi;
pub mod reports;
pub mod reservations;
pub mod users;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderValue, Method},
    routing::{delete, get, post, put},
    Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::CorsConfig, error::AppError, models::user::UserClaims, AppState};

/// Extractor for the authenticated user behind a Bearer access token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Authentication("Access token required".to_string()))?;

        let claims = state.services.auth.authenticate(bearer.token()).await?;
        Ok(AuthenticatedUser(claims))
    }
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}

/// Build the application router with all routes and middleware
pub fn router(state: AppState) -> Router {
    let rate_limit = state.config.rate_limit.clone();

    // Login and registration get their own, stricter limiter
    let mut auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/register", post(auth::register));

    let mut api_v1 = Router::new()
        // Health
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Authentication
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/me", get(auth::me).put(auth::update_me))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/logout", post(auth::logout))
        // Users
        .route("/users", get(users::list_users).post(users::create_user))
        .route(
            "/users/:id",
            get(users::get_user).put(users::update_user).delete(users::delete_user),
        )
        .route("/users/:id/status", put(users::update_user_status))
        .route("/users/:id/loans", get(users::get_user_loans))
        .route("/users/:id/reservations", get(users::get_user_reservations))
        .route("/users/:id/fines", get(users::get_user_fines))
        .route("/users/:id/borrowing", get(users::get_borrowing_status))
        // Materials
        .route("/materials", get(materials::list_materials).post(materials::create_material))
        .route("/materials/stats", get(materials::get_stats))
        .route(
            "/materials/:id",
            get(materials::get_material)
                .put(materials::update_material)
                .delete(materials::delete_material),
        )
        .route("/materials/:id/loans", get(materials::get_material_loans))
        .route("/materials/:id/reservations", get(materials::get_material_reservations))
        .route("/materials/:id/rate", post(materials::rate_material))
        .route("/materials/:id/qrcode", get(materials::get_qr_code))
        // Loans
        .route("/loans", get(loans::list_loans).post(loans::create_loan))
        .route("/loans/overdue", get(loans::list_overdue))
        .route("/loans/:id", get(loans::get_loan))
        .route("/loans/:id/renew", post(loans::renew_loan))
        .route("/loans/:id/return", post(loans::return_loan))
        .route("/loans/:id/lost", post(loans::mark_lost))
        // Reservations
        .route(
            "/reservations",
            get(reservations::list_reservations).post(reservations::create_reservation),
        )
        .route("/reservations/:id", get(reservations::get_reservation))
        .route("/reservations/:id/activate", post(reservations::activate_reservation))
        .route("/reservations/:id/cancel", post(reservations::cancel_reservation))
        .route("/reservations/:id/complete", post(reservations::complete_reservation))
        // Fines
        .route("/fines", get(fines::list_fines).post(fines::create_fine))
        .route("/fines/:id", get(fines::get_fine))
        .route("/fines/:id/pay", post(fines::pay_fine))
        .route("/fines/:id/cancel", post(fines::cancel_fine))
        // Notifications
        .route(
            "/notifications",
            get(notifications::list_notifications).post(notifications::create_notification),
        )
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/:id", delete(notifications::delete_notification))
        .route("/notifications/:id/read", post(notifications::mark_read))
        // Reports
        .route("/reports/overview", get(reports::overview))
        .route("/reports/loans", get(reports::loans))
        .route("/reports/popular", get(reports::popular))
        .route("/reports/fines", get(reports::fines))
        .route("/reports/users", get(reports::users))
        // Maintenance
        .route("/maintenance/sweep", post(maintenance::sweep));

    if rate_limit.enabled {
        let auth_limiter = GovernorConfigBuilder::default()
            .per_second(rate_limit.auth_replenish_seconds)
            .burst_size(rate_limit.auth_burst)
            .finish();
        let global_limiter = GovernorConfigBuilder::default()
            .per_second(rate_limit.global_replenish_seconds)
            .burst_size(rate_limit.global_burst)
            .finish();

        match (auth_limiter, global_limiter) {
            (Some(auth_limiter), Some(global_limiter)) => {
                // The layers borrow their config for the life of the process
                auth_routes = auth_routes.layer(GovernorLayer {
                    config: Box::leak(Box::new(auth_limiter)),
                });
                api_v1 = api_v1.layer(GovernorLayer {
                    config: Box::leak(Box::new(global_limiter)),
                });
            }
            _ => tracing::warn!("invalid rate limit settings, rate limiting disabled"),
        }
    }

    let cors = cors_layer(&state.config.cors);

    Router::new()
        .nest("/api/v1", api_v1.merge(auth_routes).with_state(state))
        .merge(openapi::create_openapi_router())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
