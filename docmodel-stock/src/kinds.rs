//! String-valued classifications stored on stock products.
//!
//! Each enum keeps values it does not recognize in an `Other` variant, so a
//! record with an unexpected value still decodes and can be rejected by
//! validation with the offending value in the message.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $value:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A value outside the known set, kept verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $value, )+
                    Self::Other(value) => value,
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::Other(String::new())
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value {
                    $( $value => Self::$variant, )+
                    other => Self::Other(other.to_string()),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                Ok(Self::from(value.as_str()))
            }
        }

        impl From<$name> for bson::Bson {
            fn from(value: $name) -> Self {
                bson::Bson::String(value.as_str().to_string())
            }
        }
    };
}

string_enum! {
    /// What a stock product is made of. Also the record discriminator.
    ProductType {
        /// A single raw material.
        Basic => "basic",
        /// A combination of other products.
        Formula => "formula",
        Collection => "collection",
    }
}

string_enum! {
    /// Packaging shape of a stock product.
    ShapeType {
        Alone => "alone",
        Bucket => "bucket",
        Irregular => "irregular",
        Long => "long",
        Solid => "solid",
        Wash => "wash",
    }
}

string_enum! {
    /// Supply state of a stock product.
    StockState {
        Supply => "supply",
        Stop => "stop",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_are_kept() {
        let typ: ProductType = serde_json::from_str(r#""widget""#).unwrap();
        assert_eq!(typ, ProductType::Other("widget".into()));
        assert!(!typ.is_known());
        assert_eq!(serde_json::to_string(&typ).unwrap(), r#""widget""#);
    }

    #[test]
    fn known_values_round_trip_as_strings() {
        assert_eq!(ShapeType::from("bucket"), ShapeType::Bucket);
        assert_eq!(StockState::Stop.to_string(), "stop");
        assert_eq!(bson::Bson::from(ProductType::Formula), bson::Bson::String("formula".into()));
    }
}
