use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    record::{normalize_tags, Tag},
    types::{AppLocale, AppTheme, RecordId, StartScreen, valid_id},
};

/// Lowest stored rating.
pub const MIN_RATING: u8 = 1;
/// Highest stored rating.
pub const MAX_RATING: u8 = 5;

/// Live user preferences with concrete defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Preferences {
    /// Ingredients the user has at hand.
    pub available_ingredient_ids: HashSet<RecordId>,
    /// Ingredients on the shopping list.
    pub shopping_ingredient_ids: HashSet<RecordId>,
    /// Raw cocktail ratings as entered; sanitized when snapshotted.
    pub cocktail_ratings: HashMap<RecordId, f64>,
    /// Ratings of cocktails that have no id, keyed by trimmed lowercase name.
    pub named_cocktail_ratings: HashMap<String, f64>,
    /// Garnish lines do not count towards availability.
    pub ignore_garnish: bool,
    /// Any substitute counts towards availability.
    pub allow_all_substitutes: bool,
    /// Show imperial units.
    pub use_imperial_units: bool,
    /// Keep the display on.
    pub keep_screen_awake: bool,
    /// Shaker hides ingredients that cannot complete a cocktail.
    pub shaker_smart_filtering_enabled: bool,
    /// Minimum rating shown in the favourites list.
    pub rating_filter_threshold: i64,
    /// Initial screen.
    pub start_screen: StartScreen,
    /// Colour scheme.
    pub app_theme: AppTheme,
    /// UI locale; also selects the baseline catalog.
    pub app_locale: AppLocale,
    /// User-defined cocktail tags.
    pub custom_cocktail_tags: Vec<Tag>,
    /// User-defined ingredient tags.
    pub custom_ingredient_tags: Vec<Tag>,
    /// Current onboarding step.
    pub onboarding_step: i64,
    /// Onboarding finished.
    pub onboarding_completed: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            available_ingredient_ids: HashSet::new(),
            shopping_ingredient_ids: HashSet::new(),
            cocktail_ratings: HashMap::new(),
            named_cocktail_ratings: HashMap::new(),
            ignore_garnish: true,
            allow_all_substitutes: false,
            use_imperial_units: false,
            keep_screen_awake: false,
            shaker_smart_filtering_enabled: false,
            rating_filter_threshold: 1,
            start_screen: StartScreen::default(),
            app_theme: AppTheme::default(),
            app_locale: AppLocale::default(),
            custom_cocktail_tags: Vec::new(),
            custom_ingredient_tags: Vec::new(),
            onboarding_step: 0,
            onboarding_completed: false,
        }
    }
}

/// Preference fields as persisted. `None` means "use the default".
///
/// Decoding never fails on a field value: a value of the wrong shape reads as absent,
/// and list and map entries are sanitized one by one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPreferences {
    /// Sorted, deduplicated, non-negative ids.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_ids"
    )]
    pub available_ingredient_ids: Option<Vec<RecordId>>,
    /// Sorted, deduplicated, non-negative ids.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_ids"
    )]
    pub shopping_ingredient_ids: Option<Vec<RecordId>>,
    /// Cocktail id (decimal string), or lowercase name for cocktails without one, to
    /// rating in 1..=5.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_ratings"
    )]
    pub cocktail_ratings: Option<BTreeMap<String, u8>>,
    /// Garnish lines do not count towards availability.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub ignore_garnish: Option<bool>,
    /// Any substitute counts towards availability.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub allow_all_substitutes: Option<bool>,
    /// Show imperial units.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub use_imperial_units: Option<bool>,
    /// Keep the display on.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub keep_screen_awake: Option<bool>,
    /// Added in version 3.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub shaker_smart_filtering_enabled: Option<bool>,
    /// Minimum rating shown in favourites.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_int"
    )]
    pub rating_filter_threshold: Option<i64>,
    /// Initial screen.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub start_screen: Option<StartScreen>,
    /// Colour scheme.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub app_theme: Option<AppTheme>,
    /// Added in version 3.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub app_locale: Option<AppLocale>,
    /// User-defined cocktail tags, one per id.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_items"
    )]
    pub custom_cocktail_tags: Option<Vec<Tag>>,
    /// User-defined ingredient tags, one per id.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_items"
    )]
    pub custom_ingredient_tags: Option<Vec<Tag>>,
    /// Current onboarding step.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_int"
    )]
    pub onboarding_step: Option<i64>,
    /// Onboarding finished.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient"
    )]
    pub onboarding_completed: Option<bool>,
}

impl SnapshotPreferences {
    /// Sanitized persisted form of `prefs`.
    pub fn from_preferences(prefs: &Preferences) -> Self {
        Self {
            available_ingredient_ids: non_empty(sorted_ids(prefs.available_ingredient_ids.iter().copied())),
            shopping_ingredient_ids: non_empty(sorted_ids(prefs.shopping_ingredient_ids.iter().copied())),
            cocktail_ratings: {
                let mut ratings = sanitize_ratings(&prefs.cocktail_ratings);
                ratings.extend(sanitize_named_ratings(&prefs.named_cocktail_ratings));
                (!ratings.is_empty()).then_some(ratings)
            },
            ignore_garnish: Some(prefs.ignore_garnish),
            allow_all_substitutes: Some(prefs.allow_all_substitutes),
            use_imperial_units: Some(prefs.use_imperial_units),
            keep_screen_awake: Some(prefs.keep_screen_awake),
            shaker_smart_filtering_enabled: Some(prefs.shaker_smart_filtering_enabled),
            rating_filter_threshold: Some(prefs.rating_filter_threshold),
            start_screen: Some(prefs.start_screen),
            app_theme: Some(prefs.app_theme),
            app_locale: Some(prefs.app_locale),
            custom_cocktail_tags: non_empty(sanitize_custom_tags(&prefs.custom_cocktail_tags)),
            custom_ingredient_tags: non_empty(sanitize_custom_tags(&prefs.custom_ingredient_tags)),
            onboarding_step: Some(prefs.onboarding_step),
            onboarding_completed: Some(prefs.onboarding_completed),
        }
    }

    /// Live preferences, with defaults for absent fields.
    ///
    /// Loaded values are sanitized again since the document may have been edited or
    /// written by an older build.
    pub fn to_preferences(&self) -> Preferences {
        let defaults = Preferences::default();
        let mut cocktail_ratings = HashMap::new();
        let mut named_cocktail_ratings = HashMap::new();
        for (key, &value) in self.cocktail_ratings.iter().flatten() {
            let Some(rating) = sanitize_rating(f64::from(value)) else {
                continue;
            };
            match key.trim().parse::<RecordId>() {
                Ok(id) => {
                    if let Some(id) = valid_id(id) {
                        cocktail_ratings.insert(id, f64::from(rating));
                    }
                }
                Err(_) => {
                    if let Some(name) = rating_name_key(key) {
                        named_cocktail_ratings.insert(name, f64::from(rating));
                    }
                }
            }
        }
        Preferences {
            available_ingredient_ids: sorted_ids(self.available_ingredient_ids.iter().flatten().copied())
                .into_iter()
                .collect(),
            shopping_ingredient_ids: sorted_ids(self.shopping_ingredient_ids.iter().flatten().copied())
                .into_iter()
                .collect(),
            cocktail_ratings,
            named_cocktail_ratings,
            ignore_garnish: self.ignore_garnish.unwrap_or(defaults.ignore_garnish),
            allow_all_substitutes: self
                .allow_all_substitutes
                .unwrap_or(defaults.allow_all_substitutes),
            use_imperial_units: self.use_imperial_units.unwrap_or(defaults.use_imperial_units),
            keep_screen_awake: self.keep_screen_awake.unwrap_or(defaults.keep_screen_awake),
            shaker_smart_filtering_enabled: self
                .shaker_smart_filtering_enabled
                .unwrap_or(defaults.shaker_smart_filtering_enabled),
            rating_filter_threshold: self
                .rating_filter_threshold
                .unwrap_or(defaults.rating_filter_threshold),
            start_screen: self.start_screen.unwrap_or(defaults.start_screen),
            app_theme: self.app_theme.unwrap_or(defaults.app_theme),
            app_locale: self.app_locale.unwrap_or(defaults.app_locale),
            custom_cocktail_tags: self
                .custom_cocktail_tags
                .as_deref()
                .map(sanitize_custom_tags)
                .unwrap_or_default(),
            custom_ingredient_tags: self
                .custom_ingredient_tags
                .as_deref()
                .map(sanitize_custom_tags)
                .unwrap_or_default(),
            onboarding_step: self.onboarding_step.unwrap_or(defaults.onboarding_step),
            onboarding_completed: self
                .onboarding_completed
                .unwrap_or(defaults.onboarding_completed),
        }
    }
}

/// Deduplicates, drops negative ids, and sorts ascending.
pub fn sorted_ids(ids: impl IntoIterator<Item = RecordId>) -> Vec<RecordId> {
    let mut out: Vec<RecordId> = ids.into_iter().filter_map(valid_id).collect();
    out.sort_unstable();
    out.dedup();
    out
}

/// Rounds to the nearest integer and clamps to 1..=5; zero, negative and non-finite
/// values are dropped rather than stored.
pub fn sanitize_rating(value: f64) -> Option<u8> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let rounded = value.round().clamp(f64::from(MIN_RATING), f64::from(MAX_RATING));
    Some(rounded as u8)
}

/// Sanitizes every rating and drops entries with a malformed cocktail id.
pub fn sanitize_ratings(ratings: &HashMap<RecordId, f64>) -> BTreeMap<String, u8> {
    let mut by_id: BTreeMap<RecordId, u8> = BTreeMap::new();
    for (&id, &value) in ratings {
        let (Some(id), Some(rating)) = (valid_id(id), sanitize_rating(value)) else {
            continue;
        };
        by_id.insert(id, rating);
    }
    by_id
        .into_iter()
        .map(|(id, rating)| (id.to_string(), rating))
        .collect()
}

/// Sanitizes name-keyed ratings. Keys are trimmed and lowercased; keys that are blank or
/// read as an id are dropped.
pub fn sanitize_named_ratings(ratings: &HashMap<String, f64>) -> BTreeMap<String, u8> {
    ratings
        .iter()
        .filter_map(|(name, &value)| Some((rating_name_key(name)?, sanitize_rating(value)?)))
        .collect()
}

/// Key a cocktail without an id is rated under.
pub fn rating_name_key(name: &str) -> Option<String> {
    let key = name.trim().to_lowercase();
    (!key.is_empty() && key.parse::<RecordId>().is_err()).then_some(key)
}

/// Normalizes custom tags and keeps a single tag per id.
pub fn sanitize_custom_tags(tags: &[Tag]) -> Vec<Tag> {
    let mut by_id: BTreeMap<RecordId, Tag> = BTreeMap::new();
    for tag in normalize_tags(tags) {
        by_id.insert(tag.id, tag);
    }
    by_id.into_values().collect()
}

fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    (!values.is_empty()).then_some(values)
}

// Numbers and numeric strings, as a loosely typed client would have written them.
fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(loose_number(&value).map(|n| n.trunc() as i64))
}

fn lenient_items<'de, D, T>(deserializer: D) -> Result<Option<Vec<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
    ))
}

fn lenient_ids<'de, D>(deserializer: D) -> Result<Option<Vec<RecordId>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Array(items) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    let ids = items
        .iter()
        .filter_map(loose_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n.trunc() as RecordId);
    Ok(Some(sorted_ids(ids)))
}

fn lenient_ratings<'de, D>(deserializer: D) -> Result<Option<BTreeMap<String, u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        return Ok(None);
    };
    Ok(Some(
        entries
            .iter()
            .filter(|(key, _)| !key.trim().is_empty())
            .filter_map(|(key, value)| Some((key.clone(), sanitize_rating(loose_number(value)?)?)))
            .collect(),
    ))
}
