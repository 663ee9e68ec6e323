//! User model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use super::enums::UserRole;
use super::validation::PHONE_RE;
use super::Pagination;
use crate::config::LoansConfig;
use crate::error::AppError;

/// Full user model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    /// Hashed password (argon2)
    #[serde(skip_serializing, default)]
    pub password: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub active: bool,
    pub points: i32,
    pub achievements: i32,
    pub avatar: Option<String>,
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User row for staff listings, with circulation counters
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub active: bool,
    pub points: i32,
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub active_loans: i64,
    pub pending_fines: i64,
}

/// Paginated user listing
#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub users: Vec<UserSummary>,
    pub pagination: Pagination,
}

/// User query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Case-insensitive match on name or email
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
}

/// Public self-registration request, always creates a reader
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = *PHONE_RE, message = "Phone must use the format (XX) XXXXX-XXXX"))]
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Token pair returned by login, register and refresh
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub refresh_token: String,
    pub user: User,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Create user request (admin only, any role)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUser {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(regex(path = *PHONE_RE, message = "Phone must use the format (XX) XXXXX-XXXX"))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
}

/// Update user request (admin only)
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateUser {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone must use the format (XX) XXXXX-XXXX"))]
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub active: Option<bool>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUserStatus {
    pub active: bool,
}

/// Update own profile request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 2, max = 100, message = "Name must be between 2 and 100 characters"))]
    pub name: Option<String>,
    #[validate(regex(path = *PHONE_RE, message = "Phone must use the format (XX) XXXXX-XXXX"))]
    pub phone: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePassword {
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
}

/// Whether a user may take one more loan
#[derive(Debug, Serialize, ToSchema)]
pub struct BorrowingStatus {
    pub active_loans: i64,
    pub max_loans: i64,
    pub can_borrow: bool,
}

impl UserRole {
    /// Maximum number of concurrent open loans for this role
    pub fn max_loans(&self, rules: &LoansConfig) -> i64 {
        match self {
            UserRole::Admin => rules.max_loans_admin,
            UserRole::Librarian => rules.max_loans_librarian,
            UserRole::Reader => rules.max_loans_reader,
        }
    }
}

impl BorrowingStatus {
    pub fn new(role: UserRole, active_loans: i64, rules: &LoansConfig) -> Self {
        let max_loans = role.max_loans(rules);
        Self {
            active_loans,
            max_loans,
            can_borrow: active_loans < max_loans,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT Claims for authenticated users
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserClaims {
    pub sub: String,
    pub user_id: i32,
    pub email: String,
    pub role: UserRole,
    pub token_type: TokenType,
    pub jti: String,
    pub exp: i64,
    pub iat: i64,
}

impl UserClaims {
    pub fn new(user: &User, token_type: TokenType, lifetime: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user.id.to_string(),
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
            token_type,
            jti: Uuid::new_v4().to_string(),
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }

    /// Require admin privileges
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::Authorization("Administrator privileges required".to_string()))
        }
    }

    /// Require librarian or admin privileges
    pub fn require_staff(&self) -> Result<(), AppError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Librarian privileges required".to_string()))
        }
    }

    /// Readers may only reach their own records
    pub fn require_self_or_staff(&self, user_id: i32) -> Result<(), AppError> {
        if self.user_id == user_id || self.is_staff() {
            Ok(())
        } else {
            Err(AppError::Authorization("Access denied to another user's records".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> User {
        let now = Utc::now();
        User {
            id: 7,
            name: "Maria Silva".to_string(),
            email: "maria@example.com".to_string(),
            password: "$argon2id$hash".to_string(),
            phone: None,
            role,
            active: true,
            points: 0,
            achievements: 0,
            avatar: None,
            last_access_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_password_never_serialized() {
        let json = serde_json::to_value(user(UserRole::Reader)).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["role"], "reader");
    }

    #[test]
    fn test_token_round_trip() {
        let claims = UserClaims::new(&user(UserRole::Librarian), TokenType::Access, Duration::hours(1));
        let token = claims.create_token("secret").unwrap();
        let decoded = UserClaims::from_token(&token, "secret").unwrap();
        assert_eq!(decoded.user_id, 7);
        assert_eq!(decoded.role, UserRole::Librarian);
        assert_eq!(decoded.token_type, TokenType::Access);
        assert!(UserClaims::from_token(&token, "other-secret").is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = UserClaims::new(&user(UserRole::Reader), TokenType::Access, Duration::hours(-2));
        let token = claims.create_token("secret").unwrap();
        assert!(UserClaims::from_token(&token, "secret").is_err());
    }

    #[test]
    fn test_role_checks() {
        let reader = UserClaims::new(&user(UserRole::Reader), TokenType::Access, Duration::hours(1));
        assert!(reader.require_staff().is_err());
        assert!(reader.require_admin().is_err());
        assert!(reader.require_self_or_staff(7).is_ok());
        assert!(reader.require_self_or_staff(8).is_err());

        let librarian = UserClaims::new(&user(UserRole::Librarian), TokenType::Access, Duration::hours(1));
        assert!(librarian.require_staff().is_ok());
        assert!(librarian.require_admin().is_err());
        assert!(librarian.require_self_or_staff(8).is_ok());
    }

    #[test]
    fn test_borrowing_limits_by_role() {
        let rules = LoansConfig::default();
        assert_eq!(UserRole::Admin.max_loans(&rules), 20);
        assert_eq!(UserRole::Librarian.max_loans(&rules), 15);
        assert_eq!(UserRole::Reader.max_loans(&rules), 10);

        assert!(BorrowingStatus::new(UserRole::Reader, 9, &rules).can_borrow);
        assert!(!BorrowingStatus::new(UserRole::Reader, 10, &rules).can_borrow);
    }

    #[test]
    fn test_register_validation() {
        let request = RegisterRequest {
            name: "A".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
            phone: Some("11 9999".to_string()),
        };
        let errors = request.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("phone"));
    }
}
