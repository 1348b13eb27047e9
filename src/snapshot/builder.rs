use crate::{
    core::{baseline::Baseline, state::InventoryState},
    delta::compute_full_delta,
    types::TimestampMs,
};

use super::{DeltaSnapshot, Preferences, Snapshot, SnapshotPreferences};

/// Assembles a current-version snapshot.
///
/// The delta is always a full scan against `baseline`; the incremental calculator is
/// never consulted here, so what gets persisted cannot depend on its caches.
pub fn build_snapshot(
    state: &InventoryState,
    baseline: &Baseline,
    preferences: &Preferences,
    updated_at: Option<TimestampMs>,
) -> Snapshot {
    Snapshot::V3(DeltaSnapshot {
        delta: compute_full_delta(state, baseline),
        imported: state.imported(),
        updated_at,
        preferences: SnapshotPreferences::from_preferences(preferences),
    })
}
