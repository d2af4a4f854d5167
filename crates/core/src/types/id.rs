//! Newtype IDs for type-safe entity references.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

use core::str::FromStr;

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `PartialOrd`, `Ord`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>`, `Into<i64>` and `FromStr` implementations
///
/// # Example
///
/// ```rust
/// # use realty_core::define_id;
/// define_id!(ListingId);
/// define_id!(BrokerId);
///
/// let listing = ListingId::new(1);
/// let broker = BrokerId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: ListingId = broker;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = ::core::num::ParseIntError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

define_id!(UserId);
define_id!(EntityId);
define_id!(PropertyId);
define_id!(DocumentId);

impl From<EntityId> for PropertyId {
    fn from(id: EntityId) -> Self {
        Self::new(id.as_i64())
    }
}

/// Read an ID out of a JSON value that may be a number or a numeric string.
///
/// The remote authority is inconsistent about this, so every ID read at the
/// wire boundary goes through here.
#[must_use]
pub fn id_from_json<T: From<i64>>(value: &serde_json::Value) -> Option<T> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().map(T::from),
        serde_json::Value::String(s) => i64::from_str(s.trim()).ok().map(T::from),
        _ => None,
    }
}
