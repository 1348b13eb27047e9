mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use barsync::{
    catalog::StaticCatalog,
    delta::compute_full_delta,
    persist::{
        store::{LoadSource, SnapshotStore},
        MemoryStorage, PersistError, PersistResult, StorageDriver,
    },
    runtime::{
        events::InventoryEvent,
        handle::{spawn_inventory, InventoryHandle, RuntimeConfig, RuntimeError},
    },
    snapshot::{build_snapshot, Preferences, Snapshot},
    sync::{AuthSession, RemotePayload, RemoteStore, SyncAdapter, SyncError, SyncResult},
    types::{AppLocale, AppTheme, RecordKind, TimestampMs},
};
use tokio::sync::broadcast;

use common::{baseline, catalog, catalog_data, cocktail, cocktail_record, ingredient};

const KEY: &str = "inventory-state.json";
const NOW: TimestampMs = 1_000;

fn fixed_clock() -> TimestampMs {
    NOW
}

fn config(debounce_ms: u64) -> RuntimeConfig {
    RuntimeConfig {
        locale: AppLocale::EnGb,
        persist_debounce_ms: debounce_ms,
        sync_interval_ms: 0,
        clock: fixed_clock,
    }
}

fn spawn(
    storage: &Arc<MemoryStorage>,
    sync: Option<SyncAdapter>,
    debounce_ms: u64,
) -> InventoryHandle {
    spawn_inventory(
        catalog(),
        SnapshotStore::new(storage.clone(), KEY),
        sync,
        config(debounce_ms),
    )
}

async fn next_event(rx: &mut broadcast::Receiver<InventoryEvent>) -> InventoryEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event")
        .expect("recv")
}

async fn wait_for(
    rx: &mut broadcast::Receiver<InventoryEvent>,
    wanted: impl Fn(&InventoryEvent) -> bool,
) -> InventoryEvent {
    loop {
        let evt = next_event(rx).await;
        if wanted(&evt) {
            return evt;
        }
    }
}

fn stored(storage: &MemoryStorage) -> Option<Snapshot> {
    storage
        .read(KEY)
        .expect("read")
        .map(|bytes| Snapshot::from_slice(&bytes).expect("snapshot"))
}

#[tokio::test]
async fn runtime_mutates_emits_events_and_persists_after_debounce() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 20);
    let mut sub = handle.subscribe();

    assert_eq!(handle.load_on_start().await.expect("load"), LoadSource::Fresh);
    handle
        .create_cocktail(cocktail(10_000, "House Sour"))
        .await
        .expect("create");
    handle.delete_ingredient(103).await.expect("delete");

    assert_eq!(next_event(&mut sub).await, InventoryEvent::Loaded { source: LoadSource::Fresh });
    assert_eq!(
        next_event(&mut sub).await,
        InventoryEvent::Changed {
            kind: RecordKind::Cocktail,
            id: 10_000
        }
    );
    assert_eq!(
        next_event(&mut sub).await,
        InventoryEvent::Changed {
            kind: RecordKind::Ingredient,
            id: 103
        }
    );
    assert_eq!(
        next_event(&mut sub).await,
        InventoryEvent::Persisted {
            updated_at: Some(NOW)
        }
    );

    let snapshot = stored(&storage).expect("persisted");
    assert_eq!(snapshot.version(), 3);
    assert_eq!(snapshot.updated_at(), Some(NOW));

    let state = handle.state().await.expect("state");
    handle.shutdown().await.expect("shutdown");

    let reopened = spawn(&storage, None, 20);
    assert_eq!(
        reopened.load_on_start().await.expect("load"),
        LoadSource::Snapshot(3)
    );
    assert!(reopened.state().await.expect("state").same_records(&state));
    reopened.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn burst_of_mutations_is_written_once() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 150);
    let mut sub = handle.subscribe();

    for id in 0..20 {
        handle
            .create_ingredient(ingredient(1_000 + id, &format!("Bitters {id}")))
            .await
            .expect("create");
    }
    let _ = wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::Persisted { .. })).await;

    let extra = tokio::time::timeout(
        Duration::from_millis(400),
        wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::Persisted { .. })),
    )
    .await;
    assert!(extra.is_err(), "no second write without new mutations");

    let snapshot = stored(&storage).expect("persisted");
    let Snapshot::V3(body) = snapshot else {
        panic!("current version expected");
    };
    assert_eq!(body.delta.ingredients.expect("ingredients").created().len(), 20);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn rejected_mutation_leaves_state_untouched() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 5_000);

    let err = handle
        .create_cocktail(cocktail(42, "Duplicate"))
        .await
        .expect_err("duplicate id");
    assert!(matches!(err, RuntimeError::State(_)), "{err}");
    let err = handle.delete_cocktail(777).await.expect_err("missing id");
    assert!(matches!(err, RuntimeError::State(_)), "{err}");

    assert!(handle.current_delta().await.expect("delta").is_empty());
    let snapshot = handle.persist_now().await.expect("persist");
    assert_eq!(snapshot.updated_at(), None, "no mutation happened yet");
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn current_delta_tracks_the_full_scan() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 5_000);
    let base = baseline();

    let mut renamed = cocktail(42, "Aviation");
    renamed.name = "Aviation Royale".to_string();
    handle.update_cocktail(renamed).await.expect("update");
    handle.create_ingredient(ingredient(900, "Yuzu")).await.expect("create");
    handle.delete_ingredient(900).await.expect("delete");
    handle.delete_cocktail(1).await.expect("delete");

    let delta = handle.current_delta().await.expect("delta");
    let state = handle.state().await.expect("state");
    assert_eq!(delta, compute_full_delta(&state, &base));
    assert!(delta.ingredients.is_none());

    handle.mark_dirty(RecordKind::Cocktail, 42).await.expect("mark");
    assert_eq!(handle.current_delta().await.expect("delta"), delta);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn saving_without_changes_keeps_the_mutation_timestamp() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 5_000);

    handle.delete_cocktail(2).await.expect("delete");
    let first = handle.persist_now().await.expect("persist");
    let second = handle.persist_now().await.expect("persist");
    assert_eq!(first.updated_at(), Some(NOW));
    assert_eq!(first, second);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn shutdown_flushes_a_pending_write() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 60_000);

    handle.delete_cocktail(5).await.expect("delete");
    assert!(stored(&storage).is_none());
    handle.shutdown().await.expect("shutdown");

    let Some(Snapshot::V3(body)) = stored(&storage) else {
        panic!("flushed on shutdown");
    };
    assert_eq!(body.delta.cocktails.expect("cocktails").deleted_ids(), &[5]);
}

#[tokio::test]
async fn reset_restores_bundled_data() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 5_000);
    let mut sub = handle.subscribe();

    handle.delete_cocktail(1).await.expect("delete");
    handle
        .create_cocktail(cocktail(50_000, "Mine"))
        .await
        .expect("create");
    handle.reset_to_baseline().await.expect("reset");

    let _ = wait_for(&mut sub, |evt| *evt == InventoryEvent::Reset).await;
    assert!(handle.state().await.expect("state").same_records(&baseline().to_state()));
    let snapshot = stored(&storage).expect("persisted");
    let Snapshot::V3(body) = &snapshot else {
        panic!("current version expected");
    };
    assert!(body.delta.is_empty());
    assert_eq!(snapshot.updated_at(), Some(NOW));
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn locale_switch_replays_edits_onto_the_new_baseline() {
    let mut uk = catalog_data();
    uk.cocktails[0] = cocktail_record(1, "Негроні");
    let catalog = Arc::new(StaticCatalog::new(catalog_data()).with_locale(AppLocale::UkUa, uk));
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn_inventory(
        catalog.clone(),
        SnapshotStore::new(storage.clone(), KEY),
        None,
        config(5_000),
    );

    handle
        .create_cocktail(cocktail(10_000, "House Sour"))
        .await
        .expect("create");
    handle
        .update_preferences(Preferences {
            app_locale: AppLocale::UkUa,
            app_theme: AppTheme::Dark,
            ..Preferences::default()
        })
        .await
        .expect("preferences");

    let state = handle.state().await.expect("state");
    assert_eq!(state.cocktails().get(1).expect("cocktail 1").name, "Негроні");
    assert!(state.cocktails().contains(10_000));
    assert!(handle.current_delta().await.expect("delta").ingredients.is_none());

    handle.persist_now().await.expect("persist");
    handle.shutdown().await.expect("shutdown");

    // A runtime configured for en-GB reloads into the stored locale.
    let reopened = spawn_inventory(catalog, SnapshotStore::new(storage, KEY), None, config(5_000));
    let prefs = reopened.preferences().await.expect("preferences");
    assert_eq!(prefs.app_locale, AppLocale::UkUa);
    assert_eq!(prefs.app_theme, AppTheme::Dark);
    let state = reopened.state().await.expect("state");
    assert_eq!(state.cocktails().get(1).expect("cocktail 1").name, "Негроні");
    let delta = reopened.current_delta().await.expect("delta");
    assert!(delta.cocktails.expect("cocktails").updated.is_none());
    reopened.shutdown().await.expect("shutdown");
}

struct FailingStorage;

impl StorageDriver for FailingStorage {
    fn read(&self, _key: &str) -> PersistResult<Option<Vec<u8>>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _bytes: &[u8]) -> PersistResult<()> {
        Err(PersistError::StorageUnavailable)
    }

    fn delete(&self, _key: &str) -> PersistResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn failed_write_is_reported_and_state_survives() {
    let handle = spawn_inventory(
        catalog(),
        SnapshotStore::new(Arc::new(FailingStorage), KEY),
        None,
        config(5_000),
    );
    let mut sub = handle.subscribe();

    handle.delete_cocktail(4).await.expect("delete");
    let err = handle.persist_now().await.expect_err("write fails");
    assert!(matches!(err, RuntimeError::Persist(PersistError::StorageUnavailable)), "{err}");
    let _ = wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::PersistFailed { .. })).await;

    assert!(!handle.state().await.expect("state").cocktails().contains(4));
    handle.shutdown().await.expect("shutdown");
}

struct AlwaysSignedIn;

#[async_trait]
impl AuthSession for AlwaysSignedIn {
    async fn valid_access_token(&self) -> Option<String> {
        Some("tok".to_string())
    }

    async fn sign_in(&self) -> SyncResult<bool> {
        Ok(true)
    }

    async fn sign_out(&self) -> SyncResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SingleBlob {
    payload: Mutex<Option<RemotePayload>>,
    uploads: Mutex<usize>,
}

#[async_trait]
impl RemoteStore for SingleBlob {
    async fn find_file_id(&self, _token: &str) -> SyncResult<Option<String>> {
        let present = self.payload.lock().expect("lock").is_some();
        Ok(present.then(|| "blob".to_string()))
    }

    async fn download(&self, _token: &str, _file_id: &str) -> SyncResult<RemotePayload> {
        self.payload
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| SyncError::ReadFailed("gone".to_string()))
    }

    async fn upload(
        &self,
        _token: &str,
        _file_id: Option<&str>,
        payload: &RemotePayload,
    ) -> SyncResult<Option<String>> {
        *self.uploads.lock().expect("lock") += 1;
        *self.payload.lock().expect("lock") = Some(payload.clone());
        Ok(Some("blob".to_string()))
    }
}

fn remote_snapshot(updated_at: TimestampMs) -> RemotePayload {
    let base = baseline();
    let mut state = base.to_state();
    state
        .create_cocktail(cocktail(88_000, "From Another Device"))
        .expect("create");
    let prefs = Preferences {
        onboarding_completed: true,
        ..Preferences::default()
    };
    RemotePayload::wrap(build_snapshot(&state, &base, &prefs, Some(updated_at)), 0)
}

#[tokio::test]
async fn newer_remote_is_adopted_and_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let remote = Arc::new(SingleBlob::default());
    *remote.payload.lock().expect("lock") = Some(remote_snapshot(NOW + 10));
    let sync = SyncAdapter::new(Arc::new(AlwaysSignedIn), remote.clone());
    let handle = spawn(&storage, Some(sync), 5_000);
    let mut sub = handle.subscribe();

    handle.delete_cocktail(3).await.expect("local edit at NOW");
    let outcome = handle.sync_now().await.expect("sync");
    assert!(outcome.changed);
    assert_eq!(
        wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::RemoteAdopted { .. })).await,
        InventoryEvent::RemoteAdopted {
            updated_at: NOW + 10
        }
    );

    let state = handle.state().await.expect("state");
    assert!(state.cocktails().contains(88_000));
    assert!(state.cocktails().contains(3));
    assert!(handle.preferences().await.expect("prefs").onboarding_completed);
    assert_eq!(stored(&storage).expect("persisted").updated_at(), Some(NOW + 10));
    assert_eq!(*remote.uploads.lock().expect("lock"), 0);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn newer_local_is_uploaded() {
    let storage = Arc::new(MemoryStorage::new());
    let remote = Arc::new(SingleBlob::default());
    *remote.payload.lock().expect("lock") = Some(remote_snapshot(NOW - 10));
    let sync = SyncAdapter::new(Arc::new(AlwaysSignedIn), remote.clone());
    let handle = spawn(&storage, Some(sync), 5_000);
    let mut sub = handle.subscribe();

    handle.delete_cocktail(3).await.expect("local edit at NOW");
    let outcome = handle.sync_now().await.expect("sync");
    assert!(outcome.uploaded && !outcome.changed);
    assert_eq!(
        wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::Synced { .. })).await,
        InventoryEvent::Synced { uploaded: true }
    );

    assert_eq!(*remote.uploads.lock().expect("lock"), 1);
    let uploaded = remote.payload.lock().expect("lock").clone().expect("payload");
    assert_eq!(uploaded.updated_at, NOW);
    assert!(!handle.state().await.expect("state").cocktails().contains(88_000));
    assert!(stored(&storage).is_some(), "pending edit flushed before syncing");
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn sync_without_adapter_is_a_no_op() {
    let storage = Arc::new(MemoryStorage::new());
    let handle = spawn(&storage, None, 5_000);

    let outcome = handle.sync_now().await.expect("sync");
    assert!(!outcome.changed && !outcome.uploaded);
    assert!(!handle.sign_in().await.expect("sign in"));
    handle.sign_out().await.expect("sign out");
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn periodic_sync_uploads_local_changes() {
    let storage = Arc::new(MemoryStorage::new());
    let remote = Arc::new(SingleBlob::default());
    let sync = SyncAdapter::new(Arc::new(AlwaysSignedIn), remote.clone());
    let handle = spawn_inventory(
        catalog(),
        SnapshotStore::new(storage, KEY),
        Some(sync),
        RuntimeConfig {
            sync_interval_ms: 50,
            ..config(5_000)
        },
    );
    let mut sub = handle.subscribe();

    handle.delete_cocktail(4).await.expect("delete");
    assert_eq!(
        wait_for(&mut sub, |evt| matches!(evt, InventoryEvent::Synced { .. })).await,
        InventoryEvent::Synced { uploaded: true }
    );
    assert!(*remote.uploads.lock().expect("lock") >= 1);
    handle.shutdown().await.expect("shutdown");
}
