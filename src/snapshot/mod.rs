//! Versioned snapshot documents.
//!
//! Every document carries an integer `version` that alone decides how its payload is
//! read. Version 1 holds full record arrays; versions 2 and 3 hold a delta against the
//! baseline. Builders always write [`SNAPSHOT_VERSION`].

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::{
    delta::InventoryDelta,
    record::{CocktailStorageRecord, IngredientStorageRecord},
    types::TimestampMs,
};

/// Snapshot assembly from live state.
pub mod builder;
/// Preference fields and their sanitization.
pub mod preferences;
/// State reconstruction and version migrations.
pub mod restore;

pub use builder::build_snapshot;
pub use preferences::{Preferences, SnapshotPreferences};
pub use restore::{apply_delta_to_collection, restore_state, v1_to_v2, v2_to_v3};

/// Version written by [`build_snapshot`].
pub const SNAPSHOT_VERSION: u32 = 3;

/// Legacy payload: every live record, baseline or not.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullSnapshot {
    /// Every live cocktail.
    #[serde(default)]
    pub cocktails: Vec<CocktailStorageRecord>,
    /// Every live ingredient.
    #[serde(default)]
    pub ingredients: Vec<IngredientStorageRecord>,
    /// State came from a user import.
    #[serde(default)]
    pub imported: bool,
    /// Time of the last local mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimestampMs>,
    /// Preference fields, inlined at the top level.
    #[serde(flatten)]
    pub preferences: SnapshotPreferences,
}

/// Delta payload shared by versions 2 and 3.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaSnapshot {
    /// Changes relative to the baseline.
    #[serde(default)]
    pub delta: InventoryDelta,
    /// State came from a user import.
    #[serde(default)]
    pub imported: bool,
    /// Time of the last local mutation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<TimestampMs>,
    /// Preference fields, inlined at the top level.
    #[serde(flatten)]
    pub preferences: SnapshotPreferences,
}

/// Self-describing persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    /// Full arrays.
    V1(FullSnapshot),
    /// Delta without the version 3 preference fields.
    V2(DeltaSnapshot),
    /// Current format.
    V3(DeltaSnapshot),
}

impl Snapshot {
    /// Integer version tag.
    pub fn version(&self) -> u32 {
        match self {
            Self::V1(_) => 1,
            Self::V2(_) => 2,
            Self::V3(_) => 3,
        }
    }

    /// Time of the last local mutation, if recorded.
    pub fn updated_at(&self) -> Option<TimestampMs> {
        match self {
            Self::V1(body) => body.updated_at,
            Self::V2(body) | Self::V3(body) => body.updated_at,
        }
    }

    /// Overwrites the mutation timestamp.
    pub fn set_updated_at(&mut self, updated_at: Option<TimestampMs>) {
        match self {
            Self::V1(body) => body.updated_at = updated_at,
            Self::V2(body) | Self::V3(body) => body.updated_at = updated_at,
        }
    }

    /// Imported flag.
    pub fn imported(&self) -> bool {
        match self {
            Self::V1(body) => body.imported,
            Self::V2(body) | Self::V3(body) => body.imported,
        }
    }

    /// Persisted preference fields.
    pub fn preferences(&self) -> &SnapshotPreferences {
        match self {
            Self::V1(body) => &body.preferences,
            Self::V2(body) | Self::V3(body) => &body.preferences,
        }
    }

    /// Parses a document.
    pub fn from_slice(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Serializes to compact JSON.
    pub fn to_vec(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    version: u32,
    #[serde(flatten)]
    body: &'a T,
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let version = self.version();
        match self {
            Self::V1(body) => Tagged { version, body }.serialize(serializer),
            Self::V2(body) | Self::V3(body) => Tagged { version, body }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Snapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let version = value
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| de::Error::missing_field("version"))?;

        match version {
            1 => serde_json::from_value(value)
                .map(Self::V1)
                .map_err(de::Error::custom),
            2 => serde_json::from_value(value)
                .map(Self::V2)
                .map_err(de::Error::custom),
            3 => serde_json::from_value(value)
                .map(Self::V3)
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format_args!(
                "unsupported snapshot version {other}"
            ))),
        }
    }
}
