//! User management service (staff side)

use chrono::Utc;

use crate::{
    config::LoansConfig,
    error::{AppError, AppResult},
    models::{
        enums::{FineStatus, LoanStatus},
        fine::UserFines,
        loan::LoanDetails,
        page_bounds,
        reservation::ReservationDetails,
        user::{BorrowingStatus, CreateUser, UpdateUser, User, UserList, UserQuery},
        Pagination,
    },
    repository::{users::NewUser, Repository},
};

use super::auth::hash_password;

#[derive(Clone)]
pub struct UsersService {
    repository: Repository,
    loan_rules: LoansConfig,
}

impl UsersService {
    pub fn new(repository: Repository, loan_rules: LoansConfig) -> Self {
        Self { repository, loan_rules }
    }

    pub async fn search(&self, query: &UserQuery) -> AppResult<UserList> {
        let (page, limit, _) = page_bounds(query.page, query.limit);
        let (users, total) = self.repository.users.search(query).await?;
        Ok(UserList {
            users,
            pagination: Pagination::new(page, limit, total),
        })
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(id).await
    }

    /// Create a user with any role
    pub async fn create(&self, request: &CreateUser) -> AppResult<User> {
        if self.repository.users.email_exists(&request.email, None).await? {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(NewUser {
                name: request.name.trim(),
                email: request.email.trim(),
                password_hash: &password_hash,
                phone: request.phone.as_deref(),
                role: request.role.unwrap_or_default(),
                active: request.active.unwrap_or(true),
            })
            .await?;

        tracing::info!(user_id = user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub async fn update(&self, id: i32, request: &UpdateUser) -> AppResult<User> {
        self.repository.users.get_by_id(id).await?;

        if let Some(ref email) = request.email {
            if self.repository.users.email_exists(email, Some(id)).await? {
                return Err(AppError::Conflict("Email already registered".to_string()));
            }
        }

        let password_hash = match request.password {
            Some(ref password) => Some(hash_password(password)?),
            None => None,
        };

        self.repository.users.update(id, request, password_hash).await
    }

    pub async fn set_active(&self, id: i32, active: bool) -> AppResult<User> {
        let user = self.repository.users.set_active(id, active).await?;
        tracing::info!(user_id = id, active, "user status changed");
        Ok(user)
    }

    /// Soft delete, refused for the caller's own account and while loans are open
    pub async fn delete(&self, id: i32, acting_user_id: i32) -> AppResult<()> {
        if id == acting_user_id {
            return Err(AppError::BadRequest("You cannot delete your own account".to_string()));
        }
        self.repository.users.get_by_id(id).await?;

        let mut conn = self.repository.pool.acquire().await?;
        let open_loans = self.repository.users.count_active_loans(&mut *conn, id).await?;
        if open_loans > 0 {
            return Err(AppError::Conflict(format!(
                "User has {} open loan(s)",
                open_loans
            )));
        }

        self.repository.users.delete(id).await?;
        tracing::info!(user_id = id, "user deleted");
        Ok(())
    }

    pub async fn loans(&self, id: i32, status: Option<LoanStatus>) -> AppResult<Vec<LoanDetails>> {
        self.repository.users.get_by_id(id).await?;
        let now = Utc::now();
        let loans = self.repository.loans.for_user(id, status).await?;
        Ok(loans
            .into_iter()
            .map(|loan| loan.with_computed(now, &self.loan_rules))
            .collect())
    }

    pub async fn reservations(&self, id: i32) -> AppResult<Vec<ReservationDetails>> {
        self.repository.users.get_by_id(id).await?;
        self.repository.reservations.for_user(id).await
    }

    pub async fn fines(&self, id: i32) -> AppResult<UserFines> {
        self.repository.users.get_by_id(id).await?;
        let now = Utc::now();
        let fines = self
            .repository
            .fines
            .for_user(id)
            .await?
            .into_iter()
            .map(|fine| fine.with_computed(now))
            .collect();

        Ok(UserFines {
            fines,
            total_pending: self.repository.fines.total_for_user(id, FineStatus::Pending).await?,
            total_paid: self.repository.fines.total_for_user(id, FineStatus::Paid).await?,
        })
    }

    pub async fn borrowing(&self, id: i32) -> AppResult<BorrowingStatus> {
        let user = self.repository.users.get_by_id(id).await?;
        let mut conn = self.repository.pool.acquire().await?;
        let active_loans = self.repository.users.count_active_loans(&mut *conn, id).await?;
        Ok(BorrowingStatus::new(user.role, active_loans, &self.loan_rules))
    }
}
