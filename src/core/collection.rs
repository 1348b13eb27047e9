use std::sync::Arc;

use hashbrown::HashMap;

use crate::{record::InventoryRecord, types::RecordId};

/// Shared item list; its pointer identity changes on every mutation.
pub type SharedItems<T> = Arc<Vec<Arc<T>>>;

/// Copy-on-write list of records with an id → position index.
///
/// Holding a clone of [`Collection::shared`] pins the current list; the next mutation then
/// copies it, so a pinned list never changes and pointer equality means "unchanged".
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: SharedItems<T>,
    pos: HashMap<RecordId, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            pos: HashMap::new(),
        }
    }
}

impl<T: InventoryRecord> Collection<T> {
    /// Builds a collection, keeping the first record of each duplicate id.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut items = Vec::new();
        let mut pos = HashMap::new();
        for record in records {
            let id = record.id();
            if pos.contains_key(&id) {
                tracing::debug!(kind = ?T::KIND, id, "duplicate record id dropped");
                continue;
            }
            pos.insert(id, items.len());
            items.push(Arc::new(record));
        }
        Self {
            items: Arc::new(items),
            pos,
        }
    }

    /// Record with `id`.
    pub fn get(&self, id: RecordId) -> Option<&Arc<T>> {
        self.pos.get(&id).map(|&idx| &self.items[idx])
    }

    /// True when a record with `id` exists.
    pub fn contains(&self, id: RecordId) -> bool {
        self.pos.contains_key(&id)
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.items.iter()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when there are no records.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current shared list, for identity comparisons.
    pub fn shared(&self) -> &SharedItems<T> {
        &self.items
    }

    /// Largest id present, if any.
    pub fn max_id(&self) -> Option<RecordId> {
        self.pos.keys().copied().max()
    }

    /// Storage projections of every record, in insertion order.
    pub fn storage_records(&self) -> Vec<T::Storage> {
        self.items.iter().map(|item| item.to_storage_record()).collect()
    }

    pub(crate) fn push(&mut self, record: T) {
        let id = record.id();
        let items = Arc::make_mut(&mut self.items);
        self.pos.insert(id, items.len());
        items.push(Arc::new(record));
    }

    pub(crate) fn replace(&mut self, record: T) -> Option<Arc<T>> {
        let idx = *self.pos.get(&record.id())?;
        let items = Arc::make_mut(&mut self.items);
        Some(std::mem::replace(&mut items[idx], Arc::new(record)))
    }

    pub(crate) fn remove(&mut self, id: RecordId) -> Option<Arc<T>> {
        let idx = self.pos.remove(&id)?;
        let items = Arc::make_mut(&mut self.items);
        let removed = items.remove(idx);
        for (offset, item) in items[idx..].iter().enumerate() {
            self.pos.insert(item.id(), idx + offset);
        }
        Some(removed)
    }
}
