use std::sync::Arc;

use hashbrown::HashMap;

use crate::{
    catalog::{CatalogData, CatalogLoader},
    core::state::InventoryState,
    record::{CocktailStorageRecord, IngredientStorageRecord, InventoryRecord, StorageRecord},
    types::{AppLocale, RecordId, valid_id},
};

/// Normalized baseline records of one kind, in catalog order and indexed by id.
#[derive(Debug, Clone)]
pub struct BaselineCollection<S> {
    records: Vec<S>,
    by_id: HashMap<RecordId, usize>,
}

impl<S: StorageRecord> BaselineCollection<S> {
    /// Normalizes `raw`, skipping malformed ids and keeping the first record of a duplicate id.
    pub fn build(raw: Vec<S>) -> Self {
        let mut records = Vec::with_capacity(raw.len());
        let mut by_id = HashMap::with_capacity(raw.len());

        for record in raw {
            let Some(id) = valid_id(record.id()) else {
                continue;
            };
            if by_id.contains_key(&id) {
                tracing::debug!(id, "duplicate baseline id ignored");
                continue;
            }
            by_id.insert(id, records.len());
            records.push(record.normalized());
        }

        Self { records, by_id }
    }

    /// Baseline record for `id`.
    pub fn get(&self, id: RecordId) -> Option<&S> {
        self.by_id.get(&id).map(|&idx| &self.records[idx])
    }

    /// True when `id` is part of the baseline.
    pub fn contains(&self, id: RecordId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Baseline ids in catalog order.
    pub fn ids(&self) -> impl Iterator<Item = RecordId> + '_ {
        self.records.iter().map(StorageRecord::id)
    }

    /// Records in catalog order.
    pub fn records(&self) -> &[S] {
        &self.records
    }

    /// Number of baseline records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when the baseline has no records of this kind.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Immutable baseline for one locale.
#[derive(Debug, Clone)]
pub struct Baseline {
    locale: AppLocale,
    /// Bundled cocktails.
    pub cocktails: BaselineCollection<CocktailStorageRecord>,
    /// Bundled ingredients.
    pub ingredients: BaselineCollection<IngredientStorageRecord>,
}

impl Baseline {
    /// Builds the id maps from raw catalog data.
    pub fn from_catalog(locale: AppLocale, data: CatalogData) -> Self {
        Self {
            locale,
            cocktails: BaselineCollection::build(data.cocktails),
            ingredients: BaselineCollection::build(data.ingredients),
        }
    }

    /// Locale the baseline was built for.
    pub fn locale(&self) -> AppLocale {
        self.locale
    }

    /// Fresh-install state: every baseline record, `imported = false`.
    pub fn to_state(&self) -> InventoryState {
        InventoryState::new(
            self.cocktails
                .records()
                .iter()
                .cloned()
                .map(InventoryRecord::from_storage_record)
                .collect(),
            self.ingredients
                .records()
                .iter()
                .cloned()
                .map(InventoryRecord::from_storage_record)
                .collect(),
            false,
        )
    }
}

/// Memoized baseline with an explicit rebuild hook.
///
/// Every diff pass holds an `Arc<Baseline>` for its whole duration, so a
/// [`BaselineCache::refresh`] never changes the maps under a running computation.
pub struct BaselineCache {
    loader: Arc<dyn CatalogLoader>,
    locale: AppLocale,
    current: Option<Arc<Baseline>>,
}

impl BaselineCache {
    /// Creates an empty cache; the baseline is built on first access.
    pub fn new(loader: Arc<dyn CatalogLoader>, locale: AppLocale) -> Self {
        Self {
            loader,
            locale,
            current: None,
        }
    }

    /// Locale the next build uses.
    pub fn locale(&self) -> AppLocale {
        self.locale
    }

    /// Returns the baseline, building it if needed.
    pub fn get(&mut self) -> Arc<Baseline> {
        let loader = &self.loader;
        let locale = self.locale;
        let baseline = self.current.get_or_insert_with(|| {
            tracing::debug!(%locale, "building baseline maps");
            Arc::new(Baseline::from_catalog(locale, loader.load_baseline(locale)))
        });
        Arc::clone(baseline)
    }

    /// Forces a rebuild from the loader on next access.
    pub fn refresh(&mut self) {
        self.current = None;
    }

    /// Switches locale and forces a rebuild.
    pub fn set_locale(&mut self, locale: AppLocale) {
        if self.locale != locale {
            self.locale = locale;
            self.refresh();
        }
    }

    /// True once the baseline has been built and not refreshed since.
    pub fn is_built(&self) -> bool {
        self.current.is_some()
    }
}
