use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use crate::{
    core::{
        baseline::{Baseline, BaselineCollection},
        collection::{Collection, SharedItems},
        state::{DirtyIds, InventoryState, Tracked},
    },
    record::{Cocktail, Ingredient, InventoryRecord},
    types::{RecordId, valid_id},
};

use super::{Classification, DeltaResult, InventoryDelta};

/// Delta calculator for the interactive path.
///
/// The first call (and any call without dirty hints) is a full scan. Later calls with
/// dirty hints only reclassify those ids against the previous result. A collection whose
/// shared list is pointer-identical to the previous call is not looked at at all.
/// Projections are memoized per record allocation, so untouched records are never
/// re-normalized.
#[derive(Default)]
pub struct DeltaCalculator {
    baseline: Option<Arc<Baseline>>,
    cocktails: KindTracker<Cocktail>,
    ingredients: KindTracker<Ingredient>,
}

impl DeltaCalculator {
    /// Creates a calculator with empty caches.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the delta of `current` against `baseline`.
    ///
    /// `dirty` lists ids touched since the previous call. A different baseline than the
    /// previous call drops every cache and forces a full scan.
    pub fn compute_delta(
        &mut self,
        current: &InventoryState,
        baseline: &Arc<Baseline>,
        dirty: Option<&DirtyIds>,
    ) -> InventoryDelta {
        let same_baseline = self
            .baseline
            .as_ref()
            .is_some_and(|prev| Arc::ptr_eq(prev, baseline));
        if !same_baseline {
            self.reset();
            self.baseline = Some(Arc::clone(baseline));
        }

        InventoryDelta {
            cocktails: self.cocktails.compute(
                current.cocktails(),
                &baseline.cocktails,
                dirty.map(|d| &d.cocktails),
            ),
            ingredients: self.ingredients.compute(
                current.ingredients(),
                &baseline.ingredients,
                dirty.map(|d| &d.ingredients),
            ),
        }
    }

    /// Drops every cache; the next call is a full scan.
    pub fn reset(&mut self) {
        self.baseline = None;
        self.cocktails = KindTracker::default();
        self.ingredients = KindTracker::default();
    }

    /// Number of memoized projections, both kinds combined.
    pub fn cached_projections(&self) -> usize {
        self.cocktails.projections.len() + self.ingredients.projections.len()
    }
}

struct KindTracker<T: InventoryRecord> {
    last_items: Option<SharedItems<T>>,
    last: Option<Classification<T::Storage>>,
    last_result: Option<DeltaResult<T::Storage>>,
    // Keyed by allocation address; the stored Arc keeps the address from being reused.
    projections: HashMap<usize, (Arc<T>, T::Storage)>,
}

impl<T: InventoryRecord> Default for KindTracker<T> {
    fn default() -> Self {
        Self {
            last_items: None,
            last: None,
            last_result: None,
            projections: HashMap::new(),
        }
    }
}

impl<T: Tracked> KindTracker<T> {
    fn compute(
        &mut self,
        items: &Collection<T>,
        baseline: &BaselineCollection<T::Storage>,
        dirty: Option<&HashSet<RecordId>>,
    ) -> Option<DeltaResult<T::Storage>> {
        let unchanged = self
            .last_items
            .as_ref()
            .is_some_and(|prev| Arc::ptr_eq(prev, items.shared()));
        if unchanged && self.last.is_some() {
            return self.last_result.clone();
        }

        let next = match (dirty, self.last.take()) {
            (Some(ids), Some(prev)) => self.reclassify(prev, ids, items, baseline),
            _ => self.scan(items, baseline),
        };

        if self.projections.len() > items.len() * 2 {
            tracing::debug!(
                kind = ?T::KIND,
                cached = self.projections.len(),
                live = items.len(),
                "clearing projection cache"
            );
            self.projections.clear();
        }

        self.last_result = next.to_result();
        self.last = Some(next);
        self.last_items = Some(Arc::clone(items.shared()));
        self.last_result.clone()
    }

    fn scan(
        &mut self,
        items: &Collection<T>,
        baseline: &BaselineCollection<T::Storage>,
    ) -> Classification<T::Storage> {
        let mut out = Classification::default();
        let mut seen = HashSet::with_capacity(items.len());
        for item in items.iter() {
            let Some(id) = valid_id(item.id()) else {
                continue;
            };
            seen.insert(id);
            let projection = self.project(item);
            out.classify(id, projection, baseline);
        }
        out.collect_deleted(&seen, baseline);
        out
    }

    fn reclassify(
        &mut self,
        mut prev: Classification<T::Storage>,
        ids: &HashSet<RecordId>,
        items: &Collection<T>,
        baseline: &BaselineCollection<T::Storage>,
    ) -> Classification<T::Storage> {
        for &id in ids {
            if valid_id(id).is_none() {
                continue;
            }
            prev.forget(id);
            match items.get(id) {
                Some(item) => {
                    let projection = self.project(item);
                    prev.classify(id, projection, baseline);
                }
                None => prev.classify_missing(id, baseline),
            }
        }
        prev
    }

    fn project(&mut self, item: &Arc<T>) -> T::Storage {
        let key = Arc::as_ptr(item) as usize;
        if let Some((_, projection)) = self.projections.get(&key) {
            return projection.clone();
        }
        let projection = item.to_storage_record();
        self.projections
            .insert(key, (Arc::clone(item), projection.clone()));
        projection
    }
}
