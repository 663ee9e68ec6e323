//! Shared domain enums, stored as TEXT columns

use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, Postgres};
use utoipa::ToSchema;

/// Declares a string-backed enum with `as_str`, `FromStr`, `Display` and the
/// sqlx conversions used to read and write it as a TEXT column.
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($name), s)),
                }
            }
        }

        impl sqlx::Type<Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<Postgres>>::compatible(ty)
            }
        }

        impl<'r> Decode<'r, Postgres> for $name {
            fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
                let s: &str = Decode::<Postgres>::decode(value)?;
                s.parse().map_err(|e: String| e.into())
            }
        }

        impl Encode<'_, Postgres> for $name {
            fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
                <&str as Encode<Postgres>>::encode(self.as_str(), buf)
            }
        }
    };
}

text_enum! {
    /// Account role
    UserRole {
        Admin => "admin",
        Librarian => "librarian",
        Reader => "reader",
    }
}

text_enum! {
    /// Catalog category of a material
    MaterialCategory {
        Fiction => "fiction",
        NonFiction => "non_fiction",
        Technical => "technical",
        Academic => "academic",
        Periodical => "periodical",
        Reference => "reference",
    }
}

text_enum! {
    /// Current circulation status of a material
    MaterialStatus {
        Available => "available",
        Borrowed => "borrowed",
        Reserved => "reserved",
        Maintenance => "maintenance",
        Lost => "lost",
    }
}

text_enum! {
    /// Loan status. `Late` is only ever reported, never stored.
    LoanStatus {
        Active => "active",
        Returned => "returned",
        Late => "late",
        Lost => "lost",
    }
}

text_enum! {
    ReservationStatus {
        Pending => "pending",
        Active => "active",
        Expired => "expired",
        Cancelled => "cancelled",
        Completed => "completed",
    }
}

text_enum! {
    FineStatus {
        Pending => "pending",
        Paid => "paid",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// Why a fine was assessed
    FineReason {
        Late => "late",
        Lost => "lost",
        Damaged => "damaged",
        Other => "other",
    }
}

text_enum! {
    NotificationKind {
        Info => "info",
        Warning => "warning",
        Error => "error",
        Success => "success",
        Achievement => "achievement",
    }
}

impl UserRole {
    /// Admins and librarians run the circulation desk
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Librarian)
    }
}

impl Default for UserRole {
    fn default() -> Self {
        UserRole::Reader
    }
}

impl MaterialStatus {
    /// Whether the material may leave on a new loan (reserved material only
    /// goes to the holder of the active reservation)
    pub fn can_be_borrowed(&self) -> bool {
        matches!(self, MaterialStatus::Available | MaterialStatus::Reserved)
    }

    /// Statuses staff may set by hand; `borrowed` and `reserved` only follow
    /// loans and holds
    pub fn is_manual(&self) -> bool {
        matches!(
            self,
            MaterialStatus::Available | MaterialStatus::Maintenance | MaterialStatus::Lost
        )
    }
}

impl Default for NotificationKind {
    fn default() -> Self {
        NotificationKind::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_text() {
        for status in MaterialStatus::ALL {
            assert_eq!(status.as_str().parse::<MaterialStatus>().unwrap(), *status);
        }
        assert_eq!("non_fiction".parse::<MaterialCategory>().unwrap(), MaterialCategory::NonFiction);
    }

    #[test]
    fn test_unknown_value_rejected() {
        assert!("emprestado".parse::<MaterialStatus>().is_err());
        assert!("Admin".parse::<UserRole>().is_err());
    }

    #[test]
    fn test_serde_uses_snake_case_text() {
        let json = serde_json::to_string(&MaterialCategory::NonFiction).unwrap();
        assert_eq!(json, "\"non_fiction\"");
        let role: UserRole = serde_json::from_str("\"librarian\"").unwrap();
        assert_eq!(role, UserRole::Librarian);
    }

    #[test]
    fn test_staff_roles() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Librarian.is_staff());
        assert!(!UserRole::Reader.is_staff());
    }

    #[test]
    fn test_borrowable_statuses() {
        assert!(MaterialStatus::Available.can_be_borrowed());
        assert!(MaterialStatus::Reserved.can_be_borrowed());
        assert!(!MaterialStatus::Borrowed.can_be_borrowed());
        assert!(!MaterialStatus::Maintenance.can_be_borrowed());
        assert!(!MaterialStatus::Lost.can_be_borrowed());
    }

    #[test]
    fn test_manual_statuses() {
        assert!(MaterialStatus::Available.is_manual());
        assert!(MaterialStatus::Maintenance.is_manual());
        assert!(MaterialStatus::Lost.is_manual());
        assert!(!MaterialStatus::Borrowed.is_manual());
        assert!(!MaterialStatus::Reserved.is_manual());
    }
}
