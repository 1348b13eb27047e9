use std::sync::Arc;

use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{self, Duration, Instant, MissedTickBehavior},
};

use crate::{
    catalog::CatalogLoader,
    config::EngineConfig,
    core::{
        baseline::BaselineCache,
        state::{InventoryState, StateError},
    },
    delta::{calculator::DeltaCalculator, InventoryDelta},
    persist::{
        open_storage,
        store::{LoadSource, LoadedInventory, SnapshotStore},
        PersistError,
    },
    record::{Cocktail, Ingredient},
    snapshot::{build_snapshot, restore_state, Preferences, Snapshot},
    sync::{
        session::Clock, DriveClient, SignInFlow, StoredSession, SyncAdapter, SyncError,
        SyncOutcome,
    },
    types::{now_ms, AppLocale, RecordId, RecordKind, TimestampMs},
};

use super::events::InventoryEvent;

/// Failure reported through an [`InventoryHandle`] call.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Mutation rejected.
    #[error(transparent)]
    State(#[from] StateError),
    /// Storage failed; memory state is still valid.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// Remote sync failed.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// The runtime task is gone.
    #[error("runtime channel closed")]
    ChannelClosed,
}

/// Runtime tuning.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Locale used until preferences are loaded.
    pub locale: AppLocale,
    /// Quiet period after the last mutation before persisting.
    pub persist_debounce_ms: u64,
    /// Periodic sync interval; 0 disables it.
    pub sync_interval_ms: u64,
    /// Source of mutation timestamps.
    pub clock: Clock,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for RuntimeConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            locale: config.locale,
            persist_debounce_ms: config.persist_debounce_ms,
            sync_interval_ms: config.sync_interval_ms,
            clock: now_ms,
        }
    }
}

/// One create/update/delete request.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Add a cocktail under the id it carries.
    CreateCocktail(Cocktail),
    /// Replace the cocktail with the same id.
    UpdateCocktail(Cocktail),
    /// Remove a cocktail.
    DeleteCocktail(RecordId),
    /// Add an ingredient under the id it carries.
    CreateIngredient(Ingredient),
    /// Replace the ingredient with the same id.
    UpdateIngredient(Ingredient),
    /// Remove an ingredient.
    DeleteIngredient(RecordId),
}

impl Mutation {
    fn target(&self) -> (RecordKind, RecordId) {
        match self {
            Self::CreateCocktail(c) | Self::UpdateCocktail(c) => (RecordKind::Cocktail, c.id),
            Self::DeleteCocktail(id) => (RecordKind::Cocktail, *id),
            Self::CreateIngredient(i) | Self::UpdateIngredient(i) => (RecordKind::Ingredient, i.id),
            Self::DeleteIngredient(id) => (RecordKind::Ingredient, *id),
        }
    }

    fn apply(self, state: &mut InventoryState) -> Result<RecordId, StateError> {
        match self {
            Self::CreateCocktail(c) => state.create_cocktail(c),
            Self::UpdateCocktail(c) => {
                let id = c.id;
                state.update_cocktail(c).map(|()| id)
            }
            Self::DeleteCocktail(id) => state.delete_cocktail(id).map(|()| id),
            Self::CreateIngredient(i) => state.create_ingredient(i),
            Self::UpdateIngredient(i) => {
                let id = i.id;
                state.update_ingredient(i).map(|()| id)
            }
            Self::DeleteIngredient(id) => state.delete_ingredient(id).map(|()| id),
        }
    }
}

/// Cloneable handle to the single-writer inventory task.
#[derive(Clone)]
pub struct InventoryHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<InventoryEvent>,
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    Load { resp: Reply<LoadSource> },
    Mutate { mutation: Mutation, resp: Reply<RecordId> },
    SetPreferences { preferences: Box<Preferences>, resp: Reply<()> },
    MarkDirty { kind: RecordKind, id: RecordId, resp: Reply<()> },
    CurrentDelta { resp: Reply<InventoryDelta> },
    PersistNow { resp: Reply<Snapshot> },
    SyncNow { resp: Reply<SyncOutcome> },
    SignIn { resp: Reply<bool> },
    SignOut { resp: Reply<()> },
    Reset { resp: Reply<()> },
    State { resp: Reply<InventoryState> },
    Preferences { resp: Reply<Preferences> },
    Shutdown { resp: Reply<()> },
}

/// Spawns the inventory task.
///
/// Must be called inside a tokio runtime. Nothing is read from storage until the first
/// command; [`InventoryHandle::load_on_start`] does it explicitly.
pub fn spawn_inventory(
    catalog: Arc<dyn CatalogLoader>,
    store: SnapshotStore,
    sync: Option<SyncAdapter>,
    config: RuntimeConfig,
) -> InventoryHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(256);
    let (events_tx, _) = broadcast::channel::<InventoryEvent>(1024);

    let mut engine = Engine {
        baseline: BaselineCache::new(catalog, config.locale),
        calculator: DeltaCalculator::new(),
        state: InventoryState::default(),
        preferences: Preferences {
            app_locale: config.locale,
            ..Preferences::default()
        },
        updated_at: None,
        loaded: false,
        persist_deadline: None,
        store,
        sync,
        events: events_tx.clone(),
        config,
    };

    tokio::spawn(async move {
        let sync_every = Duration::from_millis(engine.config.sync_interval_ms.max(1));
        let periodic_sync = engine.config.sync_interval_ms > 0 && engine.sync.is_some();
        let mut sync_tick = time::interval_at(Instant::now() + sync_every, sync_every);
        sync_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = engine.persist_deadline;
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    let Some(cmd) = cmd else {
                        engine.flush_pending().await;
                        break;
                    };
                    if engine.handle(cmd).await {
                        break;
                    }
                }
                _ = sleep_until_opt(deadline), if deadline.is_some() => {
                    engine.persist_deadline = None;
                    let _ = engine.persist().await;
                }
                _ = sync_tick.tick(), if periodic_sync => {
                    if let Err(err) = engine.sync().await {
                        tracing::warn!(%err, "periodic sync failed");
                    }
                }
            }
        }
        tracing::debug!("inventory runtime stopped");
    });

    InventoryHandle { cmd_tx, events_tx }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        time::sleep_until(deadline).await;
    }
}

impl InventoryHandle {
    /// Resolves storage from `config`, wires the Drive sync, and spawns the task.
    ///
    /// Storage falls back to memory-only when nothing is writable; only an HTTP client
    /// that cannot be built is an error.
    pub fn open(
        config: &EngineConfig,
        catalog: Arc<dyn CatalogLoader>,
        flow: Option<Arc<dyn SignInFlow>>,
    ) -> Result<Self, RuntimeError> {
        let storage = open_storage(config);
        let store = SnapshotStore::new(Arc::clone(&storage), config.snapshot_key.clone());

        let mut session = StoredSession::new(storage, config.sync_state_key.clone(), config.drive.scope.clone());
        if let Some(flow) = flow {
            session = session.with_flow(flow);
        }
        let remote = DriveClient::new(config.drive.clone())?;
        let sync = SyncAdapter::new(Arc::new(session), Arc::new(remote));

        Ok(spawn_inventory(catalog, store, Some(sync), RuntimeConfig::from(config)))
    }

    /// Subscribes to runtime events.
    pub fn subscribe(&self) -> broadcast::Receiver<InventoryEvent> {
        self.events_tx.subscribe()
    }

    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Reconstructs state from storage. Later calls reload.
    pub async fn load_on_start(&self) -> Result<LoadSource, RuntimeError> {
        self.call(|resp| Command::Load { resp }).await
    }

    /// Applies one mutation and schedules a persist.
    pub async fn mutate(&self, mutation: Mutation) -> Result<RecordId, RuntimeError> {
        self.call(|resp| Command::Mutate { mutation, resp }).await
    }

    /// Adds a cocktail.
    pub async fn create_cocktail(&self, cocktail: Cocktail) -> Result<RecordId, RuntimeError> {
        self.mutate(Mutation::CreateCocktail(cocktail)).await
    }

    /// Replaces a cocktail.
    pub async fn update_cocktail(&self, cocktail: Cocktail) -> Result<(), RuntimeError> {
        self.mutate(Mutation::UpdateCocktail(cocktail)).await.map(drop)
    }

    /// Removes a cocktail.
    pub async fn delete_cocktail(&self, id: RecordId) -> Result<(), RuntimeError> {
        self.mutate(Mutation::DeleteCocktail(id)).await.map(drop)
    }

    /// Adds an ingredient.
    pub async fn create_ingredient(&self, ingredient: Ingredient) -> Result<RecordId, RuntimeError> {
        self.mutate(Mutation::CreateIngredient(ingredient)).await
    }

    /// Replaces an ingredient.
    pub async fn update_ingredient(&self, ingredient: Ingredient) -> Result<(), RuntimeError> {
        self.mutate(Mutation::UpdateIngredient(ingredient)).await.map(drop)
    }

    /// Removes an ingredient.
    pub async fn delete_ingredient(&self, id: RecordId) -> Result<(), RuntimeError> {
        self.mutate(Mutation::DeleteIngredient(id)).await.map(drop)
    }

    /// Replaces preferences. A locale change rebuilds the baseline and replays the
    /// current delta onto it.
    pub async fn update_preferences(&self, preferences: Preferences) -> Result<(), RuntimeError> {
        self.call(|resp| Command::SetPreferences {
            preferences: Box::new(preferences),
            resp,
        })
        .await
    }

    /// Flags a record changed outside the mutation calls.
    pub async fn mark_dirty(&self, kind: RecordKind, id: RecordId) -> Result<(), RuntimeError> {
        self.call(|resp| Command::MarkDirty { kind, id, resp }).await
    }

    /// Live delta from the incremental calculator.
    pub async fn current_delta(&self) -> Result<InventoryDelta, RuntimeError> {
        self.call(|resp| Command::CurrentDelta { resp }).await
    }

    /// Writes a snapshot now, cancelling any pending debounced write.
    pub async fn persist_now(&self) -> Result<Snapshot, RuntimeError> {
        self.call(|resp| Command::PersistNow { resp }).await
    }

    /// Runs one reconciliation with the remote blob.
    pub async fn sync_now(&self) -> Result<SyncOutcome, RuntimeError> {
        self.call(|resp| Command::SyncNow { resp }).await
    }

    /// Runs the interactive sign-in of the configured session.
    pub async fn sign_in(&self) -> Result<bool, RuntimeError> {
        self.call(|resp| Command::SignIn { resp }).await
    }

    /// Clears the remote session and cached file id.
    pub async fn sign_out(&self) -> Result<(), RuntimeError> {
        self.call(|resp| Command::SignOut { resp }).await
    }

    /// Discards local edits and rebuilds state from the bundled baseline.
    pub async fn reset_to_baseline(&self) -> Result<(), RuntimeError> {
        self.call(|resp| Command::Reset { resp }).await
    }

    /// Copy of the live state. Cheap: collections are shared until the next mutation.
    pub async fn state(&self) -> Result<InventoryState, RuntimeError> {
        self.call(|resp| Command::State { resp }).await
    }

    /// Current preferences.
    pub async fn preferences(&self) -> Result<Preferences, RuntimeError> {
        self.call(|resp| Command::Preferences { resp }).await
    }

    /// Flushes a pending persist and stops the task.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.call(|resp| Command::Shutdown { resp }).await
    }
}

struct Engine {
    baseline: BaselineCache,
    calculator: DeltaCalculator,
    state: InventoryState,
    preferences: Preferences,
    updated_at: Option<TimestampMs>,
    loaded: bool,
    persist_deadline: Option<Instant>,
    store: SnapshotStore,
    sync: Option<SyncAdapter>,
    events: broadcast::Sender<InventoryEvent>,
    config: RuntimeConfig,
}

impl Engine {
    async fn handle(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Load { resp } => {
                let out = self.load().await;
                let _ = resp.send(out);
            }
            Command::Mutate { mutation, resp } => {
                let out = self.mutate(mutation).await;
                let _ = resp.send(out);
            }
            Command::SetPreferences { preferences, resp } => {
                let out = self.set_preferences(*preferences).await;
                let _ = resp.send(out);
            }
            Command::MarkDirty { kind, id, resp } => {
                let out = self.ensure_loaded().await.map(|()| {
                    self.state.mark_dirty(kind, id);
                    self.touch();
                    let _ = self.events.send(InventoryEvent::Changed { kind, id });
                });
                let _ = resp.send(out);
            }
            Command::CurrentDelta { resp } => {
                let out = self.ensure_loaded().await.map(|()| self.current_delta());
                let _ = resp.send(out);
            }
            Command::PersistNow { resp } => {
                let out = match self.ensure_loaded().await {
                    Ok(()) => {
                        self.persist_deadline = None;
                        self.persist().await
                    }
                    Err(err) => Err(err),
                };
                let _ = resp.send(out);
            }
            Command::SyncNow { resp } => {
                let out = self.sync().await;
                let _ = resp.send(out);
            }
            Command::SignIn { resp } => {
                let out = match &self.sync {
                    Some(sync) => sync.session().sign_in().await.map_err(RuntimeError::from),
                    None => Ok(false),
                };
                let _ = resp.send(out);
            }
            Command::SignOut { resp } => {
                let out = match &self.sync {
                    Some(sync) => sync.session().sign_out().await.map_err(RuntimeError::from),
                    None => Ok(()),
                };
                let _ = resp.send(out);
            }
            Command::Reset { resp } => {
                let out = self.reset().await;
                let _ = resp.send(out);
            }
            Command::State { resp } => {
                let out = self.ensure_loaded().await.map(|()| self.state.clone());
                let _ = resp.send(out);
            }
            Command::Preferences { resp } => {
                let out = self.ensure_loaded().await.map(|()| self.preferences.clone());
                let _ = resp.send(out);
            }
            Command::Shutdown { resp } => {
                let out = match self.persist_deadline.take() {
                    Some(_) => self.persist().await.map(drop),
                    None => Ok(()),
                };
                let _ = resp.send(out);
                return true;
            }
        }
        false
    }

    async fn ensure_loaded(&mut self) -> Result<(), RuntimeError> {
        if !self.loaded {
            self.load().await?;
        }
        Ok(())
    }

    async fn read_stored(&mut self) -> Result<LoadedInventory, RuntimeError> {
        let store = self.store.clone();
        let baseline = self.baseline.get();
        tokio::task::spawn_blocking(move || store.load(&baseline))
            .await
            .map_err(join_error)
    }

    async fn load(&mut self) -> Result<LoadSource, RuntimeError> {
        let mut loaded = self.read_stored().await?;
        // The delta was taken against the baseline of the stored locale.
        let locale = loaded.preferences.app_locale;
        if locale != self.baseline.locale() {
            self.baseline.set_locale(locale);
            loaded = self.read_stored().await?;
        }

        let source = loaded.source;
        self.state = loaded.state;
        self.updated_at = loaded.updated_at;
        self.preferences = loaded.preferences;
        self.calculator.reset();
        self.persist_deadline = None;
        self.loaded = true;

        tracing::info!(
            ?source,
            cocktails = self.state.cocktails().len(),
            ingredients = self.state.ingredients().len(),
            "inventory loaded"
        );
        let _ = self.events.send(InventoryEvent::Loaded { source });
        Ok(source)
    }

    async fn mutate(&mut self, mutation: Mutation) -> Result<RecordId, RuntimeError> {
        self.ensure_loaded().await?;
        let (kind, target) = mutation.target();
        let id = mutation.apply(&mut self.state)?;
        tracing::debug!(?kind, id = target, "mutation applied");
        self.touch();
        let _ = self.events.send(InventoryEvent::Changed { kind, id });
        Ok(id)
    }

    async fn set_preferences(&mut self, preferences: Preferences) -> Result<(), RuntimeError> {
        self.ensure_loaded().await?;
        let locale = preferences.app_locale;
        self.preferences = preferences;
        self.switch_locale(locale);
        self.touch();
        let _ = self.events.send(InventoryEvent::PreferencesChanged);
        Ok(())
    }

    fn current_delta(&mut self) -> InventoryDelta {
        let baseline = self.baseline.get();
        let dirty = self.state.take_dirty();
        let hints = (!dirty.is_empty()).then_some(&dirty);
        self.calculator.compute_delta(&self.state, &baseline, hints)
    }

    // Records a local mutation: new timestamp and a (re)armed debounce.
    fn touch(&mut self) {
        self.updated_at = Some((self.config.clock)());
        self.persist_deadline =
            Some(Instant::now() + Duration::from_millis(self.config.persist_debounce_ms));
    }

    // Replays the current delta onto the baseline of `locale`.
    fn switch_locale(&mut self, locale: AppLocale) {
        if self.baseline.locale() == locale {
            return;
        }
        let previous = self.baseline.get();
        let snapshot = build_snapshot(&self.state, &previous, &self.preferences, self.updated_at);
        self.baseline.set_locale(locale);
        let next = self.baseline.get();
        self.state = restore_state(&snapshot, &next);
        self.calculator.reset();
        tracing::info!(%locale, "baseline switched");
    }

    fn snapshot(&mut self) -> Snapshot {
        let baseline = self.baseline.get();
        build_snapshot(&self.state, &baseline, &self.preferences, self.updated_at)
    }

    async fn persist(&mut self) -> Result<Snapshot, RuntimeError> {
        let snapshot = self.snapshot();
        let store = self.store.clone();
        let to_write = snapshot.clone();
        let written = tokio::task::spawn_blocking(move || store.write_snapshot(&to_write))
            .await
            .map_err(join_error)
            .and_then(|res| res.map_err(RuntimeError::from));

        match written {
            Ok(()) => {
                let _ = self.events.send(InventoryEvent::Persisted {
                    updated_at: snapshot.updated_at(),
                });
                Ok(snapshot)
            }
            Err(err) => {
                tracing::warn!(%err, "snapshot persist failed");
                let _ = self.events.send(InventoryEvent::PersistFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn flush_pending(&mut self) {
        if self.persist_deadline.take().is_some() {
            let _ = self.persist().await;
        }
    }

    async fn sync(&mut self) -> Result<SyncOutcome, RuntimeError> {
        self.ensure_loaded().await?;
        self.flush_pending().await;

        let local = self.snapshot();
        let Some(sync) = self.sync.clone() else {
            return Ok(SyncOutcome {
                merged: local,
                changed: false,
                uploaded: false,
            });
        };

        let outcome = sync.reconcile(local).await?;
        if outcome.changed {
            self.adopt(&outcome.merged).await?;
        } else {
            let _ = self.events.send(InventoryEvent::Synced {
                uploaded: outcome.uploaded,
            });
        }
        Ok(outcome)
    }

    async fn adopt(&mut self, remote: &Snapshot) -> Result<(), RuntimeError> {
        let preferences = remote.preferences().to_preferences();
        let locale = preferences.app_locale;
        if self.baseline.locale() != locale {
            self.baseline.set_locale(locale);
        }
        let baseline = self.baseline.get();

        self.state = restore_state(remote, &baseline);
        self.preferences = preferences;
        self.updated_at = remote.updated_at();
        self.calculator.reset();
        self.persist_deadline = None;

        let updated_at = self.updated_at.unwrap_or_default();
        tracing::info!(updated_at, "remote snapshot adopted");
        let _ = self.events.send(InventoryEvent::RemoteAdopted { updated_at });

        self.persist().await.map(drop)
    }

    async fn reset(&mut self) -> Result<(), RuntimeError> {
        self.ensure_loaded().await?;
        self.baseline.refresh();
        let baseline = self.baseline.get();
        self.state = baseline.to_state();
        self.calculator.reset();
        self.updated_at = Some((self.config.clock)());
        self.persist_deadline = None;

        tracing::info!("inventory reset to bundled data");
        let _ = self.events.send(InventoryEvent::Reset);
        self.persist().await.map(drop)
    }
}

fn join_error(err: tokio::task::JoinError) -> RuntimeError {
    RuntimeError::Persist(PersistError::Io(std::io::Error::other(err.to_string())))
}
