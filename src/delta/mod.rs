//! Classification of live records against the baseline.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashSet;
use serde::{Deserialize, Serialize};

use crate::{
    core::{
        baseline::{Baseline, BaselineCollection},
        collection::Collection,
        state::{InventoryState, Tracked},
    },
    record::{
        Cocktail, CocktailStorageRecord, Ingredient, IngredientStorageRecord, InventoryRecord,
        StorageRecord,
    },
    types::{RecordId, valid_id},
};

/// Incremental calculator with per-record and per-collection memoization.
pub mod calculator;

/// Created / updated / deleted records of one kind relative to the baseline.
///
/// Never constructed empty: a kind with no differences is represented by `None` in
/// [`InventoryDelta`]. Each bucket is sorted by id and omitted when empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaResult<S> {
    /// Records whose id is not in the baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<Vec<S>>,
    /// Records that differ from their baseline counterpart.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<Vec<S>>,
    /// Baseline ids missing from the live state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_ids: Option<Vec<RecordId>>,
}

impl<S> DeltaResult<S> {
    /// Created records, or an empty slice.
    pub fn created(&self) -> &[S] {
        self.created.as_deref().unwrap_or_default()
    }

    /// Updated records, or an empty slice.
    pub fn updated(&self) -> &[S] {
        self.updated.as_deref().unwrap_or_default()
    }

    /// Deleted ids, or an empty slice.
    pub fn deleted_ids(&self) -> &[RecordId] {
        self.deleted_ids.as_deref().unwrap_or_default()
    }
}

/// Delta of both record kinds.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryDelta {
    /// Cocktail changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cocktails: Option<DeltaResult<CocktailStorageRecord>>,
    /// Ingredient changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<DeltaResult<IngredientStorageRecord>>,
}

impl InventoryDelta {
    /// True when the live state equals the baseline.
    pub fn is_empty(&self) -> bool {
        self.cocktails.is_none() && self.ingredients.is_none()
    }
}

/// Mutable classification used while a delta is being built or patched.
#[derive(Debug, Clone)]
pub(crate) struct Classification<S> {
    created: BTreeMap<RecordId, S>,
    updated: BTreeMap<RecordId, S>,
    deleted: BTreeSet<RecordId>,
}

impl<S> Default for Classification<S> {
    fn default() -> Self {
        Self {
            created: BTreeMap::new(),
            updated: BTreeMap::new(),
            deleted: BTreeSet::new(),
        }
    }
}

impl<S: StorageRecord> Classification<S> {
    /// Removes every trace of `id`.
    pub(crate) fn forget(&mut self, id: RecordId) {
        self.created.remove(&id);
        self.updated.remove(&id);
        self.deleted.remove(&id);
    }

    /// Classifies a live projection; unchanged records leave no entry.
    pub(crate) fn classify(&mut self, id: RecordId, projection: S, baseline: &BaselineCollection<S>) {
        match baseline.get(id) {
            None => {
                self.created.insert(id, projection);
            }
            Some(base) if *base != projection => {
                self.updated.insert(id, projection);
            }
            Some(_) => {}
        }
    }

    /// Records a missing id; only baseline ids become deletions.
    pub(crate) fn classify_missing(&mut self, id: RecordId, baseline: &BaselineCollection<S>) {
        if baseline.contains(id) {
            self.deleted.insert(id);
        }
    }

    /// Marks every baseline id not in `seen` as deleted.
    pub(crate) fn collect_deleted(&mut self, seen: &HashSet<RecordId>, baseline: &BaselineCollection<S>) {
        self.deleted = baseline.ids().filter(|id| !seen.contains(id)).collect();
    }

    pub(crate) fn to_result(&self) -> Option<DeltaResult<S>> {
        if self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty() {
            return None;
        }

        fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
            (!values.is_empty()).then_some(values)
        }

        Some(DeltaResult {
            created: non_empty(self.created.values().cloned().collect()),
            updated: non_empty(self.updated.values().cloned().collect()),
            deleted_ids: non_empty(self.deleted.iter().copied().collect()),
        })
    }
}

/// Full-scan delta of one collection, without any memoization.
pub fn full_scan<T: Tracked>(
    items: &Collection<T>,
    baseline: &BaselineCollection<T::Storage>,
) -> Option<DeltaResult<T::Storage>> {
    let mut out = Classification::default();
    let mut seen = HashSet::with_capacity(items.len());
    for item in items.iter() {
        let Some(id) = valid_id(item.id()) else {
            continue;
        };
        seen.insert(id);
        out.classify(id, item.to_storage_record(), baseline);
    }
    out.collect_deleted(&seen, baseline);
    out.to_result()
}

/// Full-scan delta of the whole state. This is the path persistence uses.
pub fn compute_full_delta(state: &InventoryState, baseline: &Baseline) -> InventoryDelta {
    InventoryDelta {
        cocktails: scan_kind::<Cocktail>(state, baseline),
        ingredients: scan_kind::<Ingredient>(state, baseline),
    }
}

fn scan_kind<T: Tracked>(state: &InventoryState, baseline: &Baseline) -> Option<DeltaResult<T::Storage>> {
    full_scan(T::collection(state), T::baseline(baseline))
}
