//! Shared input formats

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use crate::error::AppError;

/// Brazilian phone format, e.g. `(11) 98765-4321`
pub static PHONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\(\d{2}\) \d{4,5}-\d{4}$").expect("valid phone regex"));

/// ISBN-10 or ISBN-13, digits with optional hyphens
pub static ISBN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\d-]{10,17}$").expect("valid isbn regex"));

pub const MIN_PUBLICATION_YEAR: i32 = 1000;

/// Publication year must fall between 1000 and next year
pub fn validate_publication_year(year: i32) -> Result<(), AppError> {
    let max = Utc::now().year() + 1;
    if (MIN_PUBLICATION_YEAR..=max).contains(&year) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Publication year must be between {} and {}",
            MIN_PUBLICATION_YEAR, max
        )))
    }
}

pub fn validate_non_negative(value: Decimal, field: &str) -> Result<(), AppError> {
    if value.is_sign_negative() && !value.is_zero() {
        Err(AppError::Validation(format!("{} cannot be negative", field)))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_format() {
        assert!(PHONE_RE.is_match("(11) 98765-4321"));
        assert!(PHONE_RE.is_match("(21) 3456-7890"));
        assert!(!PHONE_RE.is_match("11987654321"));
        assert!(!PHONE_RE.is_match("(11) 98765-432"));
    }

    #[test]
    fn test_isbn_format() {
        assert!(ISBN_RE.is_match("978-85-359-0277-5"));
        assert!(ISBN_RE.is_match("8535902775"));
        assert!(!ISBN_RE.is_match("ISBN 978"));
        assert!(!ISBN_RE.is_match("123"));
    }

    #[test]
    fn test_publication_year_bounds() {
        let next_year = Utc::now().year() + 1;
        assert!(validate_publication_year(1000).is_ok());
        assert!(validate_publication_year(next_year).is_ok());
        assert!(validate_publication_year(999).is_err());
        assert!(validate_publication_year(next_year + 1).is_err());
    }

    #[test]
    fn test_non_negative() {
        assert!(validate_non_negative(Decimal::ZERO, "price").is_ok());
        assert!(validate_non_negative(Decimal::new(1999, 2), "price").is_ok());
        assert!(validate_non_negative(Decimal::new(-1, 2), "price").is_err());
    }
}
