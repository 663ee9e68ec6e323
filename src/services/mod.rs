//! Business logic services

pub mod auth;
pub mod fines;
pub mod loans;
pub mod maintenance;
pub mod materials;
pub mod notifications;
pub mod reports;
pub mod reservations;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub users: users::UsersService,
    pub materials: materials::MaterialsService,
    pub loans: loans::LoansService,
    pub reservations: reservations::ReservationsService,
    pub fines: fines::FinesService,
    pub notifications: notifications::NotificationsService,
    pub reports: reports::ReportsService,
    pub maintenance: maintenance::MaintenanceService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let reservations =
            reservations::ReservationsService::new(repository.clone(), config.reservations.clone());

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            users: users::UsersService::new(repository.clone(), config.loans.clone()),
            materials: materials::MaterialsService::new(
                repository.clone(),
                config.loans.clone(),
                reservations.clone(),
            ),
            loans: loans::LoansService::new(
                repository.clone(),
                config.loans.clone(),
                config.fines.clone(),
                config.gamification.clone(),
                reservations.clone(),
            ),
            fines: fines::FinesService::new(repository.clone(), config.fines.clone()),
            notifications: notifications::NotificationsService::new(repository.clone()),
            reports: reports::ReportsService::new(repository.clone()),
            maintenance: maintenance::MaintenanceService::new(
                repository,
                config.loans.clone(),
                reservations.clone(),
            ),
            reservations,
        }
    }
}
