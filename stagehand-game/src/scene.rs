use crate::game::{Game, SceneChangeRequest};
use crate::storage::{StorageBackend, StorageEvent, StorageLoader, StorageValue};
use crossbeam_channel::Sender;
use stagehand_base::{
    AssetId, AssetLoadError, DynamicAssetDescriptor, StorageError, Trigger,
};
use stagehand_loader::{AssetHolder, AssetManager, AssetRequest, HolderEvent, HolderNotifier};

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct SceneId(u64);

impl SceneId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        SceneId(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Stack position of a scene. Transitions are driven exclusively by the
/// game's stack manipulation, never by the scene itself.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SceneState {
    Standby,
    Active,
    Deactive,
    BeforeDestroyed,
    Destroyed,
}

// Loading progress, independent of the stack position. Strictly monotonic.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub(crate) enum LoadingState {
    NotLoaded,
    Requested,
    AssetsReady,
    ReadyFired,
    LoadedFired,
}

/// Everything a scene declares up front: its statically-declared asset ids,
/// ad hoc dynamic assets, and the storage keys it wants read before it is
/// considered loaded.
#[derive(Clone, Default)]
pub struct SceneParameters {
    pub name: String,
    pub asset_ids: Vec<AssetId>,
    pub dynamic_assets: Vec<DynamicAssetDescriptor>,
    pub storage_keys: Vec<crate::storage::StorageKey>,
}

impl SceneParameters {
    pub fn named(name: impl Into<String>) -> Self {
        SceneParameters {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Scene-bound wrapper of [`AssetHolder`] whose notifier forwards every
/// holder event onto the game's request queue, tagged with the owning scene.
/// The scene therefore observes its asset progress only during the flush
/// pass, never re-entrantly from inside the asset manager.
pub(crate) struct SceneAssetHolder {
    holder: AssetHolder,
}

impl SceneAssetHolder {
    pub fn new(
        scene_id: SceneId,
        requests: Vec<AssetRequest>,
        requests_tx: Sender<SceneChangeRequest>,
    ) -> Self {
        let notifier: HolderNotifier = Box::new(move |event| {
            let _ = requests_tx.send(SceneChangeRequest::CallAssetHolderHandler {
                scene_id,
                event,
            });
        });
        SceneAssetHolder {
            holder: AssetHolder::new(requests, Some(notifier)),
        }
    }

    pub fn request(
        &self,
        asset_manager: &mut AssetManager,
    ) -> bool {
        self.holder.request(asset_manager)
    }

    pub fn destroy(
        &self,
        asset_manager: &mut AssetManager,
    ) {
        self.holder.destroy(asset_manager)
    }

    pub fn finished(&self) -> bool {
        self.holder.finished()
    }

    pub fn succeed(&self) -> bool {
        self.holder.succeed()
    }

    pub fn waiting_count(&self) -> usize {
        self.holder.waiting_count()
    }
}

/// One screenful of game: a declared asset group, an optional storage read,
/// and the milestones that fire when both have completed.
///
/// `ready` and `loaded` each fire at most once per scene lifetime, only after
/// the scene was pushed and its load was formally triggered, and only when
/// the asset group and the storage read (if any) are both done, in whichever
/// order those two finish.
pub struct Scene {
    id: SceneId,
    name: String,
    state: SceneState,
    loading_state: LoadingState,
    holder: SceneAssetHolder,
    storage: Option<StorageLoader>,
    requests_tx: Sender<SceneChangeRequest>,
    destroyed: bool,

    pub ready: Trigger<()>,
    pub loaded: Trigger<()>,
    pub state_changed: Trigger<SceneState>,
    pub asset_loaded: Trigger<AssetId>,
    pub asset_load_failed: Trigger<(AssetId, AssetLoadError)>,
    pub asset_load_completed: Trigger<AssetId>,
}

impl Scene {
    pub fn new(
        game: &Game,
        parameters: SceneParameters,
    ) -> Self {
        let id = game.allocate_scene_id();
        let requests_tx = game.requests_sender();

        let mut requests: Vec<AssetRequest> = parameters
            .asset_ids
            .into_iter()
            .map(AssetRequest::Id)
            .collect();
        requests.extend(
            parameters
                .dynamic_assets
                .into_iter()
                .map(AssetRequest::Dynamic),
        );

        let storage = if parameters.storage_keys.is_empty() {
            None
        } else {
            Some(StorageLoader::new(parameters.storage_keys))
        };

        Scene {
            id,
            name: parameters.name,
            state: SceneState::Standby,
            loading_state: LoadingState::NotLoaded,
            holder: SceneAssetHolder::new(id, requests, requests_tx.clone()),
            storage,
            requests_tx,
            destroyed: false,
            ready: Trigger::default(),
            loaded: Trigger::default(),
            state_changed: Trigger::default(),
            asset_loaded: Trigger::default(),
            asset_load_failed: Trigger::default(),
            asset_load_completed: Trigger::default(),
        }
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SceneState {
        self.state
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed
    }

    /// Assets of the declared group that are still outstanding.
    pub fn waiting_asset_count(&self) -> usize {
        self.holder.waiting_count()
    }

    pub fn loaded_fired(&self) -> bool {
        self.loading_state == LoadingState::LoadedFired
    }

    pub fn storage_values(&self) -> &[StorageValue] {
        self.storage
            .as_ref()
            .map(|loader| loader.values())
            .unwrap_or(&[])
    }

    /// Opportunistically starts the asset requests before the scene is
    /// pushed, so they resolve while a loading scene is still showing. A
    /// later [`Scene::load`] will not re-request; calling this after `load`
    /// is a no-op.
    pub fn prefetch(
        &mut self,
        asset_manager: &mut AssetManager,
    ) {
        if self.destroyed || self.loading_state != LoadingState::NotLoaded {
            return;
        }
        log::debug!("scene {} ({:?}) prefetch", self.name, self.id);
        self.holder.request(asset_manager);
    }

    /// Formally starts loading: issues the asset request (unless prefetch
    /// already did) and the storage read. Idempotent; invoked by the game
    /// while processing the scene's push.
    pub(crate) fn load(
        &mut self,
        asset_manager: &mut AssetManager,
        storage_backend: &mut dyn StorageBackend,
        storage_tx: &Sender<StorageEvent>,
    ) {
        if self.destroyed || self.loading_state != LoadingState::NotLoaded {
            return;
        }
        log::debug!("scene {} ({:?}) load", self.name, self.id);
        self.loading_state = LoadingState::Requested;
        self.holder.request(asset_manager);
        if let Some(loader) = &mut self.storage {
            loader.request(self.id, storage_backend, storage_tx);
        }
        self.maybe_fire_ready();
    }

    pub(crate) fn loading_state(&self) -> LoadingState {
        self.loading_state
    }

    /// Applies one asset-holder event during the flush pass. Returns whether
    /// the event is fatal for the game (a statically declared asset was
    /// abandoned).
    pub(crate) fn on_holder_event(
        &mut self,
        event: HolderEvent,
    ) -> bool {
        if self.destroyed {
            return false;
        }
        match event {
            HolderEvent::Loaded(mut id) => {
                self.asset_loaded.fire(&mut id);
                self.asset_load_completed.fire(&mut id);
                false
            }
            HolderEvent::Failed(id, error) => {
                let terminal = !error.retriable;
                let mut failure = (id, error);
                self.asset_load_failed.fire(&mut failure);
                if terminal {
                    self.asset_load_completed.fire(&mut failure.0);
                }
                false
            }
            HolderEvent::Finished { succeed } => {
                if succeed {
                    self.maybe_fire_ready();
                    false
                } else {
                    true
                }
            }
        }
    }

    pub(crate) fn on_storage_result(
        &mut self,
        result: Result<Vec<StorageValue>, StorageError>,
    ) {
        if self.destroyed {
            return;
        }
        match &mut self.storage {
            Some(loader) => loader.on_result(result),
            None => return,
        }
        self.maybe_fire_ready();
    }

    // Converges the two completion paths: whichever of "asset group done" and
    // "storage done" arrives second gets past all the checks and enqueues the
    // single FireReady.
    fn maybe_fire_ready(&mut self) {
        if self.loading_state != LoadingState::Requested {
            return;
        }
        if !(self.holder.finished() && self.holder.succeed()) {
            return;
        }
        if let Some(loader) = &self.storage {
            if !loader.settled() {
                return;
            }
        }
        self.loading_state = LoadingState::AssetsReady;
        let _ = self
            .requests_tx
            .send(SceneChangeRequest::FireReady { scene_id: self.id });
    }

    pub(crate) fn fire_ready(&mut self) {
        if self.destroyed || self.loading_state != LoadingState::AssetsReady {
            return;
        }
        self.loading_state = LoadingState::ReadyFired;
        log::debug!("scene {} ({:?}) ready", self.name, self.id);
        self.ready.fire(&mut ());
    }

    pub(crate) fn fire_loaded(&mut self) {
        if self.destroyed || self.loading_state != LoadingState::ReadyFired {
            return;
        }
        self.loading_state = LoadingState::LoadedFired;
        log::debug!("scene {} ({:?}) loaded", self.name, self.id);
        self.loaded.fire(&mut ());
    }

    pub(crate) fn set_state(
        &mut self,
        mut state: SceneState,
    ) {
        if self.destroyed || self.state == state {
            return;
        }
        self.state = state;
        self.state_changed.fire(&mut state);
    }

    /// Releases every asset reference the scene took and silences its
    /// triggers. Terminal and idempotent; completions arriving afterwards
    /// are dropped by the destroyed-guards.
    pub fn destroy(
        &mut self,
        asset_manager: &mut AssetManager,
    ) {
        if self.destroyed {
            return;
        }
        self.set_state(SceneState::Destroyed);
        self.destroyed = true;
        self.holder.destroy(asset_manager);
        self.ready.destroy();
        self.loaded.destroy();
        self.state_changed.destroy();
        self.asset_loaded.destroy();
        self.asset_load_failed.destroy();
        self.asset_load_completed.destroy();
        log::debug!("scene {} ({:?}) destroyed", self.name, self.id);
    }
}
