//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{
    auth, fines, health, loans, maintenance, materials, notifications, reports, reservations, users,
};
use crate::models::{enums, fine, loan, material, notification, report, reservation, user};

/// Registers the JWT bearer scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Biblioteca API",
        version = "1.0.0",
        description = "Library Management System REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    modifiers(&BearerAuth),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::login,
        auth::register,
        auth::refresh,
        auth::me,
        auth::update_me,
        auth::change_password,
        auth::logout,
        // Users
        users::list_users,
        users::get_user,
        users::create_user,
        users::update_user,
        users::update_user_status,
        users::delete_user,
        users::get_user_loans,
        users::get_user_reservations,
        users::get_user_fines,
        users::get_borrowing_status,
        // Materials
        materials::list_materials,
        materials::get_material,
        materials::create_material,
        materials::update_material,
        materials::delete_material,
        materials::get_material_loans,
        materials::get_material_reservations,
        materials::rate_material,
        materials::get_qr_code,
        materials::get_stats,
        // Loans
        loans::create_loan,
        loans::list_loans,
        loans::list_overdue,
        loans::get_loan,
        loans::renew_loan,
        loans::return_loan,
        loans::mark_lost,
        // Reservations
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::activate_reservation,
        reservations::cancel_reservation,
        reservations::complete_reservation,
        // Fines
        fines::create_fine,
        fines::list_fines,
        fines::get_fine,
        fines::pay_fine,
        fines::cancel_fine,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::create_notification,
        notifications::mark_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        // Reports
        reports::overview,
        reports::loans,
        reports::popular,
        reports::fines,
        reports::users,
        // Maintenance
        maintenance::sweep,
    ),
    components(
        schemas(
            // Enums
            enums::UserRole,
            enums::MaterialCategory,
            enums::MaterialStatus,
            enums::LoanStatus,
            enums::ReservationStatus,
            enums::FineStatus,
            enums::FineReason,
            enums::NotificationKind,
            crate::models::Pagination,
            // Auth & users
            auth::MessageResponse,
            user::User,
            user::UserSummary,
            user::UserList,
            user::LoginRequest,
            user::RegisterRequest,
            user::RefreshRequest,
            user::AuthResponse,
            user::CreateUser,
            user::UpdateUser,
            user::UpdateUserStatus,
            user::UpdateProfile,
            user::ChangePassword,
            user::BorrowingStatus,
            // Materials
            material::Material,
            material::MaterialShort,
            material::MaterialList,
            material::MaterialSort,
            material::SortOrder,
            material::CreateMaterial,
            material::UpdateMaterial,
            material::RateMaterial,
            material::QrPayload,
            material::CountByKey,
            material::MaterialStats,
            // Loans
            loan::Loan,
            loan::LoanDetails,
            loan::LoanList,
            loan::CreateLoan,
            loan::LoanClosed,
            // Reservations
            reservation::Reservation,
            reservation::ReservationDetails,
            reservation::ReservationList,
            reservation::CreateReservation,
            // Fines
            fine::Fine,
            fine::FineDetails,
            fine::FineList,
            fine::UserFines,
            fine::CreateFine,
            fine::PayFine,
            fine::CancelFine,
            // Notifications
            notification::Notification,
            notification::NotificationList,
            notification::UnreadCount,
            notification::MarkedRead,
            notification::CreateNotification,
            // Reports
            report::Overview,
            report::LoanReport,
            report::PopularReport,
            report::AmountByKey,
            report::FineReport,
            report::TopReader,
            report::UserReport,
            report::SweepReport,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "users", description = "User management"),
        (name = "materials", description = "Catalog management"),
        (name = "loans", description = "Loan management"),
        (name = "reservations", description = "Reservation queue"),
        (name = "fines", description = "Fines"),
        (name = "notifications", description = "In-app notifications"),
        (name = "reports", description = "Staff reports"),
        (name = "maintenance", description = "Housekeeping")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_versioned_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/materials/{id}"));
        assert!(doc.paths.paths.contains_key("/loans/{id}/return"));
        assert!(doc.paths.paths.contains_key("/maintenance/sweep"));
    }

    #[test]
    fn test_bearer_scheme_registered() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
