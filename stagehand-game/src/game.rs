use crate::scene::{LoadingState, Scene, SceneId, SceneParameters, SceneState};
use crate::storage::{StorageBackend, StorageEvent};
use crossbeam_channel::{Receiver, Sender};
use stagehand_base::hashing::HashMap;
use stagehand_base::{AssetConfiguration, Trigger};
use stagehand_loader::{AssetHolder, AssetManager, HolderEvent, HolderNotifier, ResourceFactory};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One deferred scene-stack mutation. `push_scene`/`replace_scene`/`pop_scene`
/// only enqueue these; the stack mutates solely inside
/// [`Game::flush_scene_change_requests`].
pub enum SceneChangeRequest {
    Push {
        scene: Scene,
    },
    Replace {
        scene: Scene,
        preserve_current: bool,
    },
    Pop,
    FireReady {
        scene_id: SceneId,
    },
    FireLoaded {
        scene_id: SceneId,
    },
    CallAssetHolderHandler {
        scene_id: SceneId,
        event: HolderEvent,
    },
    GlobalAssets {
        event: HolderEvent,
    },
}

impl fmt::Debug for SceneChangeRequest {
    fn fmt(
        &self,
        f: &mut fmt::Formatter,
    ) -> fmt::Result {
        match self {
            SceneChangeRequest::Push { scene } => write!(f, "Push({})", scene.name()),
            SceneChangeRequest::Replace {
                scene,
                preserve_current,
            } => write!(f, "Replace({}, preserve: {})", scene.name(), preserve_current),
            SceneChangeRequest::Pop => write!(f, "Pop"),
            SceneChangeRequest::FireReady { scene_id } => write!(f, "FireReady({:?})", scene_id),
            SceneChangeRequest::FireLoaded { scene_id } => write!(f, "FireLoaded({:?})", scene_id),
            SceneChangeRequest::CallAssetHolderHandler { scene_id, event } => {
                write!(f, "CallAssetHolderHandler({:?}, {:?})", scene_id, event)
            }
            SceneChangeRequest::GlobalAssets { event } => write!(f, "GlobalAssets({:?})", event),
        }
    }
}

// A scene whose loading is still in flight, parked off-stack behind the
// loading scene that is showing in its place.
struct PendingScene {
    scene: Scene,
    loading_scene_id: SceneId,
}

/// Owns the scene stack, the asset manager and the storage backend, and ties
/// them together with the deferred scene-change queue.
///
/// Scheduling is single-threaded and tick-driven: [`Game::tick`] pumps asset
/// completions, applies storage results, then flushes the request queue. The
/// flush keeps draining entries appended during the drain itself, so a push
/// that spawns a loading scene (and later the ready/loaded pair) settles
/// without handing control back to the caller mid-transition.
pub struct Game {
    asset_manager: AssetManager,
    storage_backend: Box<dyn StorageBackend>,
    storage_tx: Sender<StorageEvent>,
    storage_rx: Receiver<StorageEvent>,
    requests_tx: Sender<SceneChangeRequest>,
    requests_rx: Receiver<SceneChangeRequest>,

    scenes: Vec<Scene>,
    pending: HashMap<SceneId, PendingScene>,
    // Holder events that settled while their scene was still unknown to the
    // game (prefetch before push); replayed when the push arrives.
    prefetch_events: HashMap<SceneId, Vec<HolderEvent>>,
    preserved: Vec<Scene>,
    parked_initial: Option<Scene>,
    global_holder: Option<AssetHolder>,

    next_scene_id: AtomicU64,
    loading_scene_parameters: SceneParameters,
    started: bool,
    terminated: bool,

    /// Fires once per change of the top-of-stack scene; the host rewires
    /// input/message routing from here.
    pub scene_changed: Trigger<()>,
}

impl Game {
    pub fn new(
        configuration: AssetConfiguration,
        factory: Box<dyn ResourceFactory>,
        storage_backend: Box<dyn StorageBackend>,
    ) -> Self {
        let (requests_tx, requests_rx) = crossbeam_channel::unbounded();
        let (storage_tx, storage_rx) = crossbeam_channel::unbounded();

        Game {
            asset_manager: AssetManager::new(configuration, factory),
            storage_backend,
            storage_tx,
            storage_rx,
            requests_tx,
            requests_rx,
            scenes: Vec::new(),
            pending: Default::default(),
            prefetch_events: Default::default(),
            preserved: Vec::new(),
            parked_initial: None,
            global_holder: None,
            next_scene_id: AtomicU64::new(1),
            loading_scene_parameters: SceneParameters::named("loading"),
            started: false,
            terminated: false,
            scene_changed: Trigger::new(),
        }
    }

    /// Kicks the game off: requests every `global: true` asset from the
    /// manifest and pushes `initial_scene` once they are all in (immediately
    /// if there are none). Globals stay referenced until termination.
    pub fn start(
        &mut self,
        initial_scene: Scene,
    ) {
        assert!(!self.started, "game already started");
        self.started = true;

        let global_ids = self.asset_manager.configuration().global_asset_ids();
        if global_ids.is_empty() {
            let _ = self.requests_tx.send(SceneChangeRequest::Push {
                scene: initial_scene,
            });
            return;
        }

        log::debug!("requesting {} global assets", global_ids.len());
        let requests_tx = self.requests_tx.clone();
        let notifier: HolderNotifier = Box::new(move |event| {
            let _ = requests_tx.send(SceneChangeRequest::GlobalAssets { event });
        });
        let holder = AssetHolder::with_ids(&global_ids, Some(notifier));
        holder.request(&mut self.asset_manager);
        self.parked_initial = Some(initial_scene);
        self.global_holder = Some(holder);
    }

    pub fn push_scene(
        &mut self,
        scene: Scene,
    ) {
        let _ = self
            .requests_tx
            .send(SceneChangeRequest::Push { scene });
    }

    pub fn replace_scene(
        &mut self,
        scene: Scene,
        preserve_current: bool,
    ) {
        let _ = self.requests_tx.send(SceneChangeRequest::Replace {
            scene,
            preserve_current,
        });
    }

    pub fn pop_scene(&mut self) {
        let _ = self.requests_tx.send(SceneChangeRequest::Pop);
    }

    /// One simulation step: pump asset completions, apply storage results,
    /// flush the scene-change queue.
    #[profiling::function]
    pub fn tick(&mut self) {
        if self.terminated {
            return;
        }
        self.asset_manager.update();
        self.drain_storage_events();
        self.flush_scene_change_requests();
    }

    /// Drains the queue, re-draining entries the drain itself appended, until
    /// it stays empty.
    #[profiling::function]
    pub fn flush_scene_change_requests(&mut self) {
        while let Ok(request) = self.requests_rx.try_recv() {
            if self.terminated {
                return;
            }
            log::debug!("process scene change request {:?}", request);
            self.process_request(request);
        }
    }

    /// Stops the simulation: destroys every scene (stacked, pending, parked
    /// and preserved), releases the global assets, tears down the asset
    /// manager and discards queued requests. Idempotent; the game accepts no
    /// further operations afterwards.
    pub fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        log::info!("game terminating");

        while let Some(mut scene) = self.scenes.pop() {
            scene.destroy(&mut self.asset_manager);
        }
        let pending: Vec<_> = self.pending.drain().map(|(_, p)| p.scene).collect();
        for mut scene in pending {
            scene.destroy(&mut self.asset_manager);
        }
        while let Some(mut scene) = self.preserved.pop() {
            scene.destroy(&mut self.asset_manager);
        }
        if let Some(mut scene) = self.parked_initial.take() {
            scene.destroy(&mut self.asset_manager);
        }
        if let Some(holder) = self.global_holder.take() {
            holder.destroy(&mut self.asset_manager);
        }
        self.prefetch_events.clear();
        self.asset_manager.destroy();
        self.scene_changed.destroy();
        while self.requests_rx.try_recv().is_ok() {}
        while self.storage_rx.try_recv().is_ok() {}
    }

    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// The scene currently driving the game (top of the stack).
    pub fn scene(&self) -> Option<&Scene> {
        self.scenes.last()
    }

    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.scenes.last_mut()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn asset_manager(&self) -> &AssetManager {
        &self.asset_manager
    }

    pub fn asset_manager_mut(&mut self) -> &mut AssetManager {
        &mut self.asset_manager
    }

    /// Replaces the stock asset-less loading scene shown while a pushed
    /// scene is still loading.
    pub fn set_loading_scene_parameters(
        &mut self,
        parameters: SceneParameters,
    ) {
        self.loading_scene_parameters = parameters;
    }

    /// Retrieves a scene stashed by `replace_scene(.., preserve_current:
    /// true)` so it can be pushed again later.
    pub fn take_preserved_scene(
        &mut self,
        scene_id: SceneId,
    ) -> Option<Scene> {
        let index = self.preserved.iter().position(|s| s.id() == scene_id)?;
        Some(self.preserved.remove(index))
    }

    pub(crate) fn allocate_scene_id(&self) -> SceneId {
        SceneId::from_raw(self.next_scene_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn requests_sender(&self) -> Sender<SceneChangeRequest> {
        self.requests_tx.clone()
    }

    fn process_request(
        &mut self,
        request: SceneChangeRequest,
    ) {
        match request {
            SceneChangeRequest::Push { scene } => self.handle_push(scene),
            SceneChangeRequest::Replace {
                scene,
                preserve_current,
            } => self.handle_replace(scene, preserve_current),
            SceneChangeRequest::Pop => self.handle_pop(),
            SceneChangeRequest::FireReady { scene_id } => self.handle_fire_ready(scene_id),
            SceneChangeRequest::FireLoaded { scene_id } => {
                if let Some(scene) = self.stack_scene_mut(scene_id) {
                    scene.fire_loaded();
                }
            }
            SceneChangeRequest::CallAssetHolderHandler { scene_id, event } => {
                let fatal = match self.scene_anywhere_mut(scene_id) {
                    Some(scene) => scene.on_holder_event(event),
                    None => {
                        // Settled before the scene was pushed; stash for
                        // replay when the push arrives.
                        self.prefetch_events.entry(scene_id).or_default().push(event);
                        false
                    }
                };
                if fatal {
                    log::error!(
                        "scene {:?} abandoned a statically declared asset, terminating",
                        scene_id
                    );
                    self.terminate();
                }
            }
            SceneChangeRequest::GlobalAssets { event } => self.handle_global_assets(event),
        }
    }

    fn handle_push(
        &mut self,
        mut scene: Scene,
    ) {
        // Replay holder events that settled during prefetch. A static asset
        // abandoned before the push is just as fatal as one abandoned after.
        if let Some(events) = self.prefetch_events.remove(&scene.id()) {
            for event in events {
                if scene.on_holder_event(event) {
                    log::error!(
                        "scene {:?} abandoned a statically declared asset, terminating",
                        scene.id()
                    );
                    self.destroy_scene(&mut scene);
                    self.terminate();
                    return;
                }
            }
        }
        scene.load(
            &mut self.asset_manager,
            self.storage_backend.as_mut(),
            &self.storage_tx,
        );
        if scene.loading_state() >= LoadingState::AssetsReady {
            self.attach_top(scene);
        } else {
            // Not ready yet: show the loading scene on the stack and park the
            // target until its FireReady swaps them.
            let parameters = self.loading_scene_parameters.clone();
            let mut loading = Scene::new(self, parameters);
            loading.load(
                &mut self.asset_manager,
                self.storage_backend.as_mut(),
                &self.storage_tx,
            );
            let loading_scene_id = loading.id();
            self.pending.insert(
                scene.id(),
                PendingScene {
                    scene,
                    loading_scene_id,
                },
            );
            self.attach_top(loading);
        }
    }

    fn handle_replace(
        &mut self,
        scene: Scene,
        preserve_current: bool,
    ) {
        if let Some(mut old) = self.scenes.pop() {
            if preserve_current {
                old.set_state(SceneState::Standby);
                self.preserved.push(old);
            } else {
                old.set_state(SceneState::BeforeDestroyed);
                self.destroy_scene(&mut old);
            }
        }
        // The push below fires the only scene_changed of the whole swap.
        self.handle_push(scene);
    }

    fn handle_pop(&mut self) {
        assert!(self.scenes.len() > 1, "cannot pop the initial scene");
        let mut scene = self.scenes.pop().unwrap();
        scene.set_state(SceneState::BeforeDestroyed);
        self.destroy_scene(&mut scene);
        // Popping a loading scene cancels the push it stands in for; the
        // parked target must not come back on a later FireReady.
        let cancelled: Vec<SceneId> = self
            .pending
            .iter()
            .filter(|(_, pending)| pending.loading_scene_id == scene.id())
            .map(|(id, _)| *id)
            .collect();
        for id in cancelled {
            if let Some(pending) = self.pending.remove(&id) {
                let mut target = pending.scene;
                self.destroy_scene(&mut target);
            }
        }
        if let Some(top) = self.scenes.last_mut() {
            top.set_state(SceneState::Active);
        }
        self.scene_changed.fire(&mut ());
    }

    fn handle_fire_ready(
        &mut self,
        scene_id: SceneId,
    ) {
        if let Some(pending) = self.pending.remove(&scene_id) {
            // Swap the placeholder for the now-loaded target. Exactly one
            // scene_changed fires, from the attach.
            if let Some(index) = self
                .scenes
                .iter()
                .position(|s| s.id() == pending.loading_scene_id)
            {
                let mut loading = self.scenes.remove(index);
                loading.set_state(SceneState::BeforeDestroyed);
                self.destroy_scene(&mut loading);
            }
            self.attach_top(pending.scene);
            let scene = self.scenes.last_mut().unwrap();
            scene.fire_ready();
            let _ = self
                .requests_tx
                .send(SceneChangeRequest::FireLoaded { scene_id });
        } else if let Some(scene) = self.stack_scene_mut(scene_id) {
            scene.fire_ready();
            let _ = self
                .requests_tx
                .send(SceneChangeRequest::FireLoaded { scene_id });
        }
        // A FireReady for a scene that is gone (terminated mid-load) is
        // dropped.
    }

    fn handle_global_assets(
        &mut self,
        event: HolderEvent,
    ) {
        match event {
            HolderEvent::Loaded(id) => log::debug!("global asset {} loaded", id),
            HolderEvent::Failed(id, error) => {
                log::warn!("global asset {} failed: {}", id, error)
            }
            HolderEvent::Finished { succeed: true } => {
                log::debug!("global assets finished loading");
                if let Some(scene) = self.parked_initial.take() {
                    self.handle_push(scene);
                }
            }
            HolderEvent::Finished { succeed: false } => {
                log::error!("global asset loading failed, terminating");
                self.terminate();
            }
        }
    }

    // Destroys a scene the game owns and discards any holder events stashed
    // under its id.
    fn destroy_scene(
        &mut self,
        scene: &mut Scene,
    ) {
        scene.destroy(&mut self.asset_manager);
        self.prefetch_events.remove(&scene.id());
    }

    fn attach_top(
        &mut self,
        mut scene: Scene,
    ) {
        if let Some(top) = self.scenes.last_mut() {
            top.set_state(SceneState::Deactive);
        }
        scene.set_state(SceneState::Active);
        log::debug!("scene {} is now on top of the stack", scene.name());
        self.scenes.push(scene);
        self.scene_changed.fire(&mut ());
    }

    fn drain_storage_events(&mut self) {
        while let Ok(event) = self.storage_rx.try_recv() {
            let StorageEvent::ReadResult { scene_id, result } = event;
            match self.scene_anywhere_mut(scene_id) {
                Some(scene) => scene.on_storage_result(result),
                None => log::trace!("storage result for unknown scene {:?}", scene_id),
            }
        }
    }

    fn stack_scene_mut(
        &mut self,
        scene_id: SceneId,
    ) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.id() == scene_id)
    }

    fn scene_anywhere_mut(
        &mut self,
        scene_id: SceneId,
    ) -> Option<&mut Scene> {
        if let Some(index) = self.scenes.iter().position(|s| s.id() == scene_id) {
            return Some(&mut self.scenes[index]);
        }
        self.pending.get_mut(&scene_id).map(|p| &mut p.scene)
    }
}
