//! Authentication service: credentials, token pairs and the caller's own account

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::{
        enums::UserRole,
        user::{
            AuthResponse, ChangePassword, LoginRequest, RegisterRequest, TokenType, UpdateProfile,
            User, UserClaims,
        },
    },
    repository::{users::NewUser, Repository},
};

/// Hash a password with argon2 and a random salt
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?
        .to_string();
    Ok(hash)
}

/// Check a password against a stored argon2 hash
pub fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Access token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.config.access_token_hours * 3600
    }

    fn issue_tokens(&self, user: User, message: &str) -> AppResult<AuthResponse> {
        let access = UserClaims::new(&user, TokenType::Access, Duration::hours(self.config.access_token_hours))
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;
        let refresh = UserClaims::new(&user, TokenType::Refresh, Duration::days(self.config.refresh_token_days))
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        Ok(AuthResponse {
            message: message.to_string(),
            token: access,
            refresh_token: refresh,
            user,
            expires_in: self.expires_in(),
        })
    }

    pub async fn login(&self, request: &LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(&request.password, &user.password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }
        if !user.active {
            return Err(AppError::Authentication("Account disabled".to_string()));
        }

        self.repository.users.touch_last_access(user.id).await?;
        tracing::info!(user_id = user.id, "user logged in");
        self.issue_tokens(user, "Login successful")
    }

    /// Public registration, always as a reader
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<AuthResponse> {
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
                role: UserRole::Reader,
                active: true,
            })
            .await?;

        tracing::info!(user_id = user.id, "user registered");
        self.issue_tokens(user, "User registered")
    }

    pub async fn refresh(&self, refresh_token: &str) -> AppResult<AuthResponse> {
        let claims = UserClaims::from_token(refresh_token, &self.config.jwt_secret)
            .map_err(|_| AppError::Authentication("Invalid refresh token".to_string()))?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::Authentication("Invalid refresh token".to_string()));
        }

        let user = self.active_user(claims.user_id).await?;
        self.issue_tokens(user, "Token refreshed")
    }

    /// Decode an access token and load its still-active owner
    pub async fn authenticate(&self, token: &str) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Authentication("Access token required".to_string()));
        }

        let user = self.active_user(claims.user_id).await?;
        self.repository.users.touch_last_access(user.id).await?;

        // Role changes take effect without waiting for a new token
        Ok(UserClaims { role: user.role, ..claims })
    }

    async fn active_user(&self, user_id: i32) -> AppResult<User> {
        let user = self
            .repository
            .users
            .get_by_id(user_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Authentication("User not found".to_string()),
                other => other,
            })?;
        if !user.active {
            return Err(AppError::Authentication("Account disabled".to_string()));
        }
        Ok(user)
    }

    pub async fn me(&self, user_id: i32) -> AppResult<User> {
        self.repository.users.get_by_id(user_id).await
    }

    pub async fn update_me(&self, user_id: i32, profile: &UpdateProfile) -> AppResult<User> {
        self.repository.users.update_profile(user_id, profile).await
    }

    pub async fn change_password(&self, user_id: i32, request: &ChangePassword) -> AppResult<()> {
        let user = self.repository.users.get_by_id(user_id).await?;
        if !verify_password(&request.current_password, &user.password)? {
            return Err(AppError::BadRequest("Current password is incorrect".to_string()));
        }

        let password_hash = hash_password(&request.new_password)?;
        self.repository.users.update_password(user_id, &password_hash).await?;
        tracing::info!(user_id, "password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_password() {
        let hash = hash_password("segredo123").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("segredo123", &hash).unwrap());
        assert!(!verify_password("outra-senha", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash_password("segredo123").unwrap();
        let b = hash_password("segredo123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("segredo123", "not-a-hash").is_err());
    }
}
