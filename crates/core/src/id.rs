//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are surrogate UUIDs (v7, time-ordered). Domain crates define
//! their own identifiers with [`uuid_newtype!`](crate::uuid_newtype).

/// Declare a UUID-backed identifier newtype.
///
/// Generates `new()`, `from_uuid()`, `as_uuid()`, `Display`, `FromStr` and the
/// `Uuid` conversions. The second argument is the name used in parse errors.
#[macro_export]
macro_rules! uuid_newtype {
    ($(#[$meta:meta])* $t:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
            ::serde::Serialize, ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(::uuid::Uuid);

        impl $t {
            /// Create a new identifier.
            ///
            /// Uses UUIDv7 (time-ordered). Prefer passing IDs explicitly in tests
            /// for determinism.
            pub fn new() -> Self {
                Self(::uuid::Uuid::now_v7())
            }

            pub fn from_uuid(uuid: ::uuid::Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl Default for $t {
            fn default() -> Self {
                Self::new()
            }
        }

        impl ::core::fmt::Display for $t {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<::uuid::Uuid> for $t {
            fn from(value: ::uuid::Uuid) -> Self {
                Self(value)
            }
        }

        impl From<$t> for ::uuid::Uuid {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl ::core::str::FromStr for $t {
            type Err = $crate::DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = ::uuid::Uuid::parse_str(s)
                    .map_err(|e| $crate::DomainError::invalid_id(format!("{}: {}", $name, e)))?;
                Ok(Self(uuid))
            }
        }
    };
}

uuid_newtype!(
    /// Identifier of a user (actor identity).
    UserId,
    "UserId"
);
uuid_newtype!(
    /// Identifier of a product (catalog is managed outside this core).
    ProductId,
    "ProductId"
);
uuid_newtype!(
    /// Identifier of a product category.
    CategoryId,
    "CategoryId"
);
uuid_newtype!(
    /// Identifier of a stock location (warehouse, store, bin).
    LocationId,
    "LocationId"
);
uuid_newtype!(
    /// Identifier of a supplier.
    SupplierId,
    "SupplierId"
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DomainError;

    #[test]
    fn parse_round_trips_through_display() {
        let id = ProductId::new();
        let parsed: ProductId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_failure_names_the_identifier() {
        let err = "not-a-uuid".parse::<LocationId>().unwrap_err();
        match err {
            DomainError::InvalidId(msg) => assert!(msg.starts_with("LocationId")),
            other => panic!("expected InvalidId, got {other:?}"),
        }
    }
}
