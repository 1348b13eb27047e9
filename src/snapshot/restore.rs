use hashbrown::{HashMap, HashSet};

use crate::{
    core::{
        baseline::{Baseline, BaselineCollection},
        state::InventoryState,
    },
    delta::{compute_full_delta, DeltaResult},
    record::{InventoryRecord, StorageRecord},
    types::{RecordId, valid_id},
};

use super::{DeltaSnapshot, FullSnapshot, Snapshot};

/// Replays one kind's delta onto its baseline records.
///
/// Baseline order is kept: deleted ids are dropped and created/updated entries replace
/// their baseline counterpart in place. Entries for ids the baseline never had are
/// appended afterwards, updated before created. Malformed ids are ignored.
pub fn apply_delta_to_collection<S: StorageRecord>(
    baseline: &BaselineCollection<S>,
    delta: Option<&DeltaResult<S>>,
) -> Vec<S> {
    let Some(delta) = delta else {
        return baseline.records().to_vec();
    };

    let deleted: HashSet<RecordId> = delta
        .deleted_ids()
        .iter()
        .copied()
        .filter_map(valid_id)
        .collect();
    let updated = index_by_id(delta.updated());
    let created = index_by_id(delta.created());

    let mut next = Vec::with_capacity(baseline.len() + created.len());
    let mut seen = HashSet::with_capacity(baseline.len());

    for record in baseline.records() {
        let id = record.id();
        if deleted.contains(&id) {
            continue;
        }
        let replacement = updated.get(&id).or_else(|| created.get(&id)).copied();
        next.push(replacement.unwrap_or(record).clone());
        seen.insert(id);
    }

    for source in [delta.updated(), delta.created()] {
        for record in source {
            let id = record.id();
            if valid_id(id).is_none() || deleted.contains(&id) || !seen.insert(id) {
                continue;
            }
            next.push(record.clone());
        }
    }

    next
}

// Last entry of a repeated id wins, matching a map insert.
fn index_by_id<S: StorageRecord>(records: &[S]) -> HashMap<RecordId, &S> {
    records
        .iter()
        .filter(|record| valid_id(record.id()).is_some())
        .map(|record| (record.id(), record))
        .collect()
}

/// Rebuilds live state from any snapshot version.
pub fn restore_state(snapshot: &Snapshot, baseline: &Baseline) -> InventoryState {
    match snapshot {
        Snapshot::V1(full) => restore_full(full),
        Snapshot::V2(body) | Snapshot::V3(body) => restore_delta(body, baseline),
    }
}

fn restore_full(full: &FullSnapshot) -> InventoryState {
    InventoryState::new(
        live(full.cocktails.iter().cloned().map(StorageRecord::normalized)),
        live(full.ingredients.iter().cloned().map(StorageRecord::normalized)),
        full.imported,
    )
}

fn restore_delta(body: &DeltaSnapshot, baseline: &Baseline) -> InventoryState {
    let cocktails =
        apply_delta_to_collection(&baseline.cocktails, body.delta.cocktails.as_ref());
    let ingredients =
        apply_delta_to_collection(&baseline.ingredients, body.delta.ingredients.as_ref());
    InventoryState::new(
        live(cocktails.into_iter().map(StorageRecord::normalized)),
        live(ingredients.into_iter().map(StorageRecord::normalized)),
        body.imported,
    )
}

fn live<T: InventoryRecord>(records: impl Iterator<Item = T::Storage>) -> Vec<T> {
    records
        .filter(|record| valid_id(record.id()).is_some())
        .map(T::from_storage_record)
        .collect()
}

/// Converts a full-array snapshot to a delta against `baseline`.
pub fn v1_to_v2(full: FullSnapshot, baseline: &Baseline) -> DeltaSnapshot {
    let state = restore_full(&full);
    DeltaSnapshot {
        delta: compute_full_delta(&state, baseline),
        imported: full.imported,
        updated_at: full.updated_at,
        preferences: full.preferences,
    }
}

/// Version bump only; the fields added in version 3 stay absent and load as defaults.
pub fn v2_to_v3(body: DeltaSnapshot) -> DeltaSnapshot {
    body
}

impl Snapshot {
    /// Migrates to the current version, one step at a time.
    pub fn into_latest(self, baseline: &Baseline) -> Snapshot {
        match self {
            Snapshot::V1(full) => Snapshot::V2(v1_to_v2(full, baseline)).into_latest(baseline),
            Snapshot::V2(body) => Snapshot::V3(v2_to_v3(body)),
            Snapshot::V3(body) => Snapshot::V3(body),
        }
    }
}
