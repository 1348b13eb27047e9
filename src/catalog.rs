//! Bundled baseline catalog loading.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::{
    record::{CocktailStorageRecord, IngredientStorageRecord},
    types::AppLocale,
};

/// Raw bundled dataset for one locale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogData {
    /// Bundled cocktails in catalog order.
    #[serde(default)]
    pub cocktails: Vec<CocktailStorageRecord>,
    /// Bundled ingredients in catalog order.
    #[serde(default)]
    pub ingredients: Vec<IngredientStorageRecord>,
}

/// Source of the immutable baseline dataset.
pub trait CatalogLoader: Send + Sync {
    /// Returns the bundled dataset for `locale`.
    fn load_baseline(&self, locale: AppLocale) -> CatalogData;
}

/// On-disk shape of a multi-locale bundle.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogBundle {
    #[serde(flatten)]
    fallback: CatalogData,
    #[serde(default)]
    locales: std::collections::BTreeMap<String, CatalogData>,
}

/// Catalog parsed up front, so later loads cannot fail.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    fallback: CatalogData,
    by_locale: HashMap<AppLocale, CatalogData>,
}

impl StaticCatalog {
    /// Single dataset served for every locale.
    pub fn new(data: CatalogData) -> Self {
        Self {
            fallback: data,
            by_locale: HashMap::new(),
        }
    }

    /// Adds a locale-specific dataset.
    pub fn with_locale(mut self, locale: AppLocale, data: CatalogData) -> Self {
        self.by_locale.insert(locale, data);
        self
    }

    /// Parses a bundle of the form `{cocktails, ingredients, locales: {"uk-UA": {...}}}`.
    ///
    /// Locale keys that are not known [`AppLocale`] values are ignored.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let bundle: CatalogBundle = serde_json::from_slice(bytes)?;
        let mut catalog = Self::new(bundle.fallback);
        for (key, data) in bundle.locales {
            match AppLocale::from_key(&key) {
                Some(locale) => catalog = catalog.with_locale(locale, data),
                None => tracing::debug!(locale = %key, "skipping catalog for unknown locale"),
            }
        }
        Ok(catalog)
    }
}

impl CatalogLoader for StaticCatalog {
    fn load_baseline(&self, locale: AppLocale) -> CatalogData {
        self.by_locale
            .get(&locale)
            .unwrap_or(&self.fallback)
            .clone()
    }
}
