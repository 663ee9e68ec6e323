//! Catalog material model and related types

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{MaterialCategory, MaterialStatus};
use super::validation::{validate_non_negative, validate_publication_year, ISBN_RE};
use super::Pagination;
use crate::error::{AppError, AppResult};

pub const DEFAULT_LANGUAGE: &str = "português";

/// Full material model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Material {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub category: MaterialCategory,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub pages: Option<i32>,
    pub language: String,
    pub description: Option<String>,
    /// Shelf location
    pub location: Option<String>,
    /// Cover image URL or path
    pub cover_image: Option<String>,
    pub price: Option<Decimal>,
    pub status: MaterialStatus,
    /// Average rating, one decimal place
    pub rating: Decimal,
    pub rating_count: i32,
    pub total_loans: i32,
    pub qr_code: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Short material representation for lists and rankings
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct MaterialShort {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub category: MaterialCategory,
    pub status: MaterialStatus,
    pub rating: Decimal,
    pub rating_count: i32,
    pub total_loans: i32,
    pub cover_image: Option<String>,
}

/// Data encoded in a material's QR code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QrPayload {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub kind: String,
}

impl Material {
    pub fn can_be_borrowed(&self) -> bool {
        self.status.can_be_borrowed()
    }

    /// Average after adding one rating, rounded half away from zero to one decimal
    pub fn updated_rating(&self, rating: i32) -> Decimal {
        let count = Decimal::from(self.rating_count);
        let total = self.rating * count + Decimal::from(rating);
        (total / (count + Decimal::ONE))
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Check a status change requested directly by staff. Materials out on
    /// loan or held for pickup change status only through their loan or
    /// reservation.
    pub fn check_status_change(&self, to: MaterialStatus) -> AppResult<()> {
        if to == self.status {
            return Ok(());
        }
        if !self.status.is_manual() {
            return Err(AppError::BusinessRule(format!(
                "Material is {} and its status follows its loan or reservation",
                self.status.as_str()
            )));
        }
        if !to.is_manual() {
            return Err(AppError::BusinessRule(format!(
                "Status {} is only set by loans and reservations",
                to.as_str()
            )));
        }
        Ok(())
    }

    pub fn qr_payload(&self) -> QrPayload {
        QrPayload {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            kind: "material".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum MaterialSort {
    #[default]
    Title,
    Author,
    Year,
    Rating,
    TotalLoans,
}

impl MaterialSort {
    pub fn column(&self) -> &'static str {
        match self {
            MaterialSort::Title => "title",
            MaterialSort::Author => "author",
            MaterialSort::Year => "publication_year",
            MaterialSort::Rating => "rating",
            MaterialSort::TotalLoans => "total_loans",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub enum SortOrder {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Material query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MaterialQuery {
    /// Case-insensitive match on title, author, isbn or description
    pub search: Option<String>,
    pub category: Option<MaterialCategory>,
    pub status: Option<MaterialStatus>,
    pub sort: Option<MaterialSort>,
    pub order: Option<SortOrder>,
    #[validate(range(min = 1, message = "Page must be at least 1"))]
    pub page: Option<i64>,
    #[validate(range(min = 1, max = 100, message = "Limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterialList {
    pub materials: Vec<Material>,
    pub pagination: Pagination,
}

/// Create material request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMaterial {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Author must be between 1 and 100 characters"))]
    pub author: String,
    #[validate(regex(path = *ISBN_RE, message = "ISBN must contain 10 to 17 digits or hyphens"))]
    pub isbn: Option<String>,
    pub category: MaterialCategory,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    #[validate(range(min = 1, message = "Pages must be at least 1"))]
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cover_image: Option<String>,
    pub price: Option<Decimal>,
    pub status: Option<MaterialStatus>,
}

/// Update material request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateMaterial {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "Author must be between 1 and 100 characters"))]
    pub author: Option<String>,
    #[validate(regex(path = *ISBN_RE, message = "ISBN must contain 10 to 17 digits or hyphens"))]
    pub isbn: Option<String>,
    pub category: Option<MaterialCategory>,
    #[validate(length(max = 100, message = "Publisher must be at most 100 characters"))]
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    #[validate(range(min = 1, message = "Pages must be at least 1"))]
    pub pages: Option<i32>,
    pub language: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub cover_image: Option<String>,
    pub price: Option<Decimal>,
    pub status: Option<MaterialStatus>,
}

/// Checks that cannot be expressed as derive attributes
fn check_year_and_price(year: Option<i32>, price: Option<Decimal>) -> AppResult<()> {
    if let Some(year) = year {
        validate_publication_year(year)?;
    }
    if let Some(price) = price {
        validate_non_negative(price, "Price")?;
    }
    Ok(())
}

impl CreateMaterial {
    pub fn check_rules(&self) -> AppResult<()> {
        if let Some(status) = self.status {
            if !status.is_manual() {
                return Err(AppError::BusinessRule(format!(
                    "New materials cannot start as {}",
                    status.as_str()
                )));
            }
        }
        check_year_and_price(self.publication_year, self.price)
    }
}

impl UpdateMaterial {
    pub fn check_rules(&self) -> AppResult<()> {
        check_year_and_price(self.publication_year, self.price)
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RateMaterial {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
}

/// Count of materials for one category or status value
#[derive(Debug, Serialize, FromRow, ToSchema)]
pub struct CountByKey {
    pub key: String,
    pub count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaterialStats {
    pub total: i64,
    pub by_category: Vec<CountByKey>,
    pub by_status: Vec<CountByKey>,
    pub most_borrowed: Vec<MaterialShort>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use std::str::FromStr;

    fn material(rating: &str, rating_count: i32) -> Material {
        let now = Utc::now();
        Material {
            id: 1,
            title: "Dom Casmurro".to_string(),
            author: "Machado de Assis".to_string(),
            isbn: Some("978-85-359-0277-5".to_string()),
            category: MaterialCategory::Fiction,
            publisher: None,
            publication_year: Some(1899),
            pages: Some(256),
            language: DEFAULT_LANGUAGE.to_string(),
            description: None,
            location: None,
            cover_image: None,
            price: None,
            status: MaterialStatus::Available,
            rating: Decimal::from_str(rating).unwrap(),
            rating_count,
            total_loans: 0,
            qr_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_first_rating() {
        assert_eq!(material("0", 0).updated_rating(4), Decimal::from(4));
    }

    #[test]
    fn test_rating_average_rounds_half_up() {
        // (4.0 * 3 + 5) / 4 = 4.25
        assert_eq!(material("4.0", 3).updated_rating(5).to_string(), "4.3");
        // (3.5 * 2 + 1) / 3 = 2.666..
        assert_eq!(material("3.5", 2).updated_rating(1).to_string(), "2.7");
    }

    #[test]
    fn test_qr_payload() {
        let payload = material("0", 0).qr_payload();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["kind"], "material");
        assert_eq!(json["title"], "Dom Casmurro");
        assert_eq!(json["isbn"], "978-85-359-0277-5");
    }

    #[test]
    fn test_can_be_borrowed_follows_status() {
        let mut m = material("0", 0);
        assert!(m.can_be_borrowed());
        m.status = MaterialStatus::Maintenance;
        assert!(!m.can_be_borrowed());
    }

    #[test]
    fn test_sort_and_order_parsing() {
        let query: MaterialQuery =
            serde_json::from_value(serde_json::json!({"sort": "total_loans", "order": "DESC"})).unwrap();
        assert_eq!(query.sort.unwrap_or_default().column(), "total_loans");
        assert_eq!(query.order.unwrap_or_default().as_sql(), "DESC");
        assert_eq!(MaterialSort::default().column(), "title");
    }

    #[test]
    fn test_create_rules() {
        let mut create = CreateMaterial {
            title: "Vidas Secas".to_string(),
            author: "Graciliano Ramos".to_string(),
            isbn: Some("not-an-isbn".to_string()),
            category: MaterialCategory::Fiction,
            publisher: None,
            publication_year: Some(Utc::now().year() + 2),
            pages: Some(0),
            language: None,
            description: None,
            location: None,
            cover_image: None,
            price: Some(Decimal::new(-100, 2)),
            status: None,
        };
        let errors = create.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("isbn"));
        assert!(errors.field_errors().contains_key("pages"));
        assert!(create.check_rules().is_err());

        create.publication_year = Some(1938);
        assert!(create.check_rules().is_err());
        create.price = Some(Decimal::new(3990, 2));
        assert!(create.check_rules().is_ok());

        create.status = Some(MaterialStatus::Borrowed);
        assert!(matches!(create.check_rules(), Err(AppError::BusinessRule(_))));
        create.status = Some(MaterialStatus::Maintenance);
        assert!(create.check_rules().is_ok());
    }

    #[test]
    fn test_shelf_status_changes_allowed() {
        let mut m = material("0", 0);
        assert!(m.check_status_change(MaterialStatus::Maintenance).is_ok());
        assert!(m.check_status_change(MaterialStatus::Lost).is_ok());
        m.status = MaterialStatus::Maintenance;
        assert!(m.check_status_change(MaterialStatus::Available).is_ok());
        m.status = MaterialStatus::Lost;
        assert!(m.check_status_change(MaterialStatus::Available).is_ok());
    }

    #[test]
    fn test_circulating_material_keeps_its_status() {
        let mut m = material("0", 0);
        m.status = MaterialStatus::Borrowed;
        assert!(matches!(
            m.check_status_change(MaterialStatus::Available),
            Err(AppError::BusinessRule(_))
        ));
        assert!(m.check_status_change(MaterialStatus::Lost).is_err());
        assert!(m.check_status_change(MaterialStatus::Borrowed).is_ok());

        m.status = MaterialStatus::Reserved;
        assert!(m.check_status_change(MaterialStatus::Available).is_err());
        assert!(m.check_status_change(MaterialStatus::Maintenance).is_err());
    }

    #[test]
    fn test_loan_and_hold_statuses_not_set_by_hand() {
        let m = material("0", 0);
        assert!(m.check_status_change(MaterialStatus::Borrowed).is_err());
        assert!(m.check_status_change(MaterialStatus::Reserved).is_err());
    }
}
