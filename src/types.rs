//! Shared primitive ids and preference enums.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Record identifier. Valid ids are non-negative; negative values are treated as malformed.
pub type RecordId = i64;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Returns `Some(id)` for a well-formed record id.
pub fn valid_id(id: RecordId) -> Option<RecordId> {
    (id >= 0).then_some(id)
}

/// Current wall-clock time; zero if the clock reads before the epoch.
pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or(0)
}

/// Collection a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordKind {
    /// Cocktail recipes.
    Cocktail,
    /// Ingredients.
    Ingredient,
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, default = $default:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $key:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Stable string key used in persisted documents.
            pub fn as_key(self) -> &'static str {
                match self {
                    $( Self::$variant => $key ),+
                }
            }

            /// Parses a persisted key, returning `None` for unknown values.
            pub fn from_key(key: &str) -> Option<Self> {
                match key {
                    $( $key => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_key())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_key())
            }
        }

        // Unknown keys fall back to the default rather than failing the whole document.
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(Self::from_key(&raw).unwrap_or_default())
            }
        }
    };
}

string_enum! {
    /// UI locale; selects which bundled catalog forms the baseline.
    AppLocale, default = EnGb {
        /// British English.
        EnGb => "en-GB",
        /// American English.
        EnUs => "en-US",
        /// Ukrainian.
        UkUa => "uk-UA",
    }
}

string_enum! {
    /// Colour scheme preference.
    AppTheme, default = Light {
        /// Light theme.
        Light => "light",
        /// Dark theme.
        Dark => "dark",
        /// Follow the operating system.
        System => "system",
    }
}

string_enum! {
    /// Screen shown when the app starts.
    StartScreen, default = CocktailsAll {
        /// All cocktails.
        CocktailsAll => "cocktails_all",
        /// Cocktails makeable from available ingredients.
        CocktailsMy => "cocktails_my",
        /// Rated cocktails.
        CocktailsFavorites => "cocktails_favorites",
        /// Shaker screen.
        Shaker => "shaker",
        /// All ingredients.
        IngredientsAll => "ingredients_all",
        /// Available ingredients.
        IngredientsMy => "ingredients_my",
        /// Shopping list.
        IngredientsShopping => "ingredients_shopping",
    }
}
