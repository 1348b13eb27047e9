use std::collections::BTreeMap;

use hashbrown::HashSet;

use crate::{
    core::{baseline::{Baseline, BaselineCollection}, collection::Collection},
    record::{Cocktail, Ingredient, InventoryRecord},
    types::{RecordId, RecordKind},
};

/// Rejected inventory mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    /// Id is negative.
    #[error("invalid record id {0}")]
    InvalidId(RecordId),
    /// Create with an id that is already taken.
    #[error("{kind:?} {id} already exists")]
    AlreadyExists {
        /// Collection.
        kind: RecordKind,
        /// Conflicting id.
        id: RecordId,
    },
    /// Update or delete of an id that does not exist.
    #[error("{kind:?} {id} not found")]
    Missing {
        /// Collection.
        kind: RecordKind,
        /// Missing id.
        id: RecordId,
    },
}

/// Ids changed since the last incremental delta pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyIds {
    /// Dirty cocktail ids.
    pub cocktails: HashSet<RecordId>,
    /// Dirty ingredient ids.
    pub ingredients: HashSet<RecordId>,
}

impl DirtyIds {
    /// Flags `id` of `kind`.
    pub fn insert(&mut self, kind: RecordKind, id: RecordId) {
        match kind {
            RecordKind::Cocktail => self.cocktails.insert(id),
            RecordKind::Ingredient => self.ingredients.insert(id),
        };
    }

    /// Ids flagged for `kind`.
    pub fn of(&self, kind: RecordKind) -> &HashSet<RecordId> {
        match kind {
            RecordKind::Cocktail => &self.cocktails,
            RecordKind::Ingredient => &self.ingredients,
        }
    }

    /// True when nothing is flagged.
    pub fn is_empty(&self) -> bool {
        self.cocktails.is_empty() && self.ingredients.is_empty()
    }
}

/// Binds a record type to its collection in [`InventoryState`] and in [`Baseline`].
pub trait Tracked: InventoryRecord {
    /// Live collection of this kind.
    fn collection(state: &InventoryState) -> &Collection<Self>;
    /// Mutable live collection of this kind.
    fn collection_mut(state: &mut InventoryState) -> &mut Collection<Self>;
    /// Baseline records of this kind.
    fn baseline(baseline: &Baseline) -> &BaselineCollection<Self::Storage>;
    /// Recomputes derived fields before the record is stored.
    fn prepare(&mut self);
}

impl Tracked for Cocktail {
    fn collection(state: &InventoryState) -> &Collection<Self> {
        &state.cocktails
    }

    fn collection_mut(state: &mut InventoryState) -> &mut Collection<Self> {
        &mut state.cocktails
    }

    fn baseline(baseline: &Baseline) -> &BaselineCollection<Self::Storage> {
        &baseline.cocktails
    }

    fn prepare(&mut self) {
        self.refresh_search_fields();
    }
}

impl Tracked for Ingredient {
    fn collection(state: &InventoryState) -> &Collection<Self> {
        &state.ingredients
    }

    fn collection_mut(state: &mut InventoryState) -> &mut Collection<Self> {
        &mut state.ingredients
    }

    fn baseline(baseline: &Baseline) -> &BaselineCollection<Self::Storage> {
        &baseline.ingredients
    }

    fn prepare(&mut self) {
        self.refresh_search_fields();
    }
}

/// Full live working set for one session.
#[derive(Debug, Clone, Default)]
pub struct InventoryState {
    cocktails: Collection<Cocktail>,
    ingredients: Collection<Ingredient>,
    imported: bool,
    dirty: DirtyIds,
}

impl InventoryState {
    /// Builds a state from live records; duplicate ids keep the first record.
    pub fn new(cocktails: Vec<Cocktail>, ingredients: Vec<Ingredient>, imported: bool) -> Self {
        Self {
            cocktails: Collection::from_records(cocktails),
            ingredients: Collection::from_records(ingredients),
            imported,
            dirty: DirtyIds::default(),
        }
    }

    /// Live cocktails.
    pub fn cocktails(&self) -> &Collection<Cocktail> {
        &self.cocktails
    }

    /// Live ingredients.
    pub fn ingredients(&self) -> &Collection<Ingredient> {
        &self.ingredients
    }

    /// True when the state came from a user import rather than the bundled data.
    pub fn imported(&self) -> bool {
        self.imported
    }

    /// Sets the imported flag.
    pub fn set_imported(&mut self, imported: bool) {
        self.imported = imported;
    }

    /// Adds a new cocktail with the id it carries.
    pub fn create_cocktail(&mut self, cocktail: Cocktail) -> Result<RecordId, StateError> {
        self.create(cocktail)
    }

    /// Replaces the cocktail with the same id.
    pub fn update_cocktail(&mut self, cocktail: Cocktail) -> Result<(), StateError> {
        self.update(cocktail)
    }

    /// Removes a cocktail.
    pub fn delete_cocktail(&mut self, id: RecordId) -> Result<(), StateError> {
        self.delete::<Cocktail>(id)
    }

    /// Adds a new ingredient with the id it carries.
    pub fn create_ingredient(&mut self, ingredient: Ingredient) -> Result<RecordId, StateError> {
        self.create(ingredient)
    }

    /// Replaces the ingredient with the same id.
    pub fn update_ingredient(&mut self, ingredient: Ingredient) -> Result<(), StateError> {
        self.update(ingredient)
    }

    /// Removes an ingredient.
    pub fn delete_ingredient(&mut self, id: RecordId) -> Result<(), StateError> {
        self.delete::<Ingredient>(id)
    }

    /// Smallest id above every live cocktail id and `floor`.
    pub fn next_cocktail_id(&self, floor: RecordId) -> RecordId {
        self.cocktails.max_id().map_or(floor, |max| max.max(floor)) + 1
    }

    /// Smallest id above every live ingredient id and `floor`.
    pub fn next_ingredient_id(&self, floor: RecordId) -> RecordId {
        self.ingredients.max_id().map_or(floor, |max| max.max(floor)) + 1
    }

    /// Flags an id changed outside the mutation methods.
    pub fn mark_dirty(&mut self, kind: RecordKind, id: RecordId) {
        self.dirty.insert(kind, id);
    }

    /// Ids changed since the last [`InventoryState::take_dirty`].
    pub fn dirty(&self) -> &DirtyIds {
        &self.dirty
    }

    /// Returns and clears the dirty ids.
    pub fn take_dirty(&mut self) -> DirtyIds {
        std::mem::take(&mut self.dirty)
    }

    /// Order-independent structural equality of the persisted projection.
    pub fn same_records(&self, other: &InventoryState) -> bool {
        fn by_id<T: InventoryRecord>(c: &Collection<T>) -> BTreeMap<RecordId, T::Storage> {
            c.iter().map(|item| (item.id(), item.to_storage_record())).collect()
        }

        self.imported == other.imported
            && by_id(&self.cocktails) == by_id(&other.cocktails)
            && by_id(&self.ingredients) == by_id(&other.ingredients)
    }

    fn create<T: Tracked>(&mut self, mut record: T) -> Result<RecordId, StateError> {
        let id = record.id();
        if id < 0 {
            return Err(StateError::InvalidId(id));
        }
        if T::collection(self).contains(id) {
            return Err(StateError::AlreadyExists { kind: T::KIND, id });
        }
        record.prepare();
        T::collection_mut(self).push(record);
        self.dirty.insert(T::KIND, id);
        Ok(id)
    }

    fn update<T: Tracked>(&mut self, mut record: T) -> Result<(), StateError> {
        let id = record.id();
        record.prepare();
        T::collection_mut(self)
            .replace(record)
            .ok_or(StateError::Missing { kind: T::KIND, id })?;
        self.dirty.insert(T::KIND, id);
        Ok(())
    }

    fn delete<T: Tracked>(&mut self, id: RecordId) -> Result<(), StateError> {
        T::collection_mut(self)
            .remove(id)
            .ok_or(StateError::Missing { kind: T::KIND, id })?;
        self.dirty.insert(T::KIND, id);
        Ok(())
    }
}
