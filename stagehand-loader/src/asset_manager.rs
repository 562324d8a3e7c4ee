use crate::resource::{LoadCompletion, LoadResult, LoaderEvent, Resource, ResourceCell, ResourceFactory};
use crossbeam_channel::{Receiver, Sender};
use stagehand_base::hashing::HashMap;
use stagehand_base::{
    AssetConfiguration, AssetDescriptor, AssetId, AssetLoadError, AssetType, DynamicAssetDescriptor,
};
use std::sync::{Arc, Mutex};

/// A waiter registered for the outcome of one asset load. Holders implement
/// this; the manager fans every completion/failure out to all registered
/// waiters.
///
/// The manager may invoke these callbacks synchronously from
/// [`AssetManager::request_asset`] (cache hit) as well as from
/// [`AssetManager::update`]; callers must not hold the handler's lock across
/// calls into the manager.
pub trait AssetLoadHandler: Send {
    fn on_asset_load(
        &mut self,
        resource: &ResourceCell,
    );

    /// Reports a failed attempt. The returned disposition tells the manager
    /// whether to re-issue the load; this replaces calling
    /// [`AssetManager::retry_load`] from inside the fan-out, which the waiter
    /// cannot do (the manager is mid-iteration).
    fn on_asset_error(
        &mut self,
        resource: &ResourceCell,
        error: &AssetLoadError,
    ) -> ErrorDisposition;
}

pub type SharedLoadHandler = Arc<Mutex<dyn AssetLoadHandler>>;

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ErrorDisposition {
    Retry,
    Abandon,
}

/// What a consumer asks the manager for: either a statically declared asset
/// by id, or an ad hoc (dynamic) declaration carrying its own descriptor.
#[derive(Clone, Debug)]
pub enum AssetRequest {
    Id(AssetId),
    Dynamic(DynamicAssetDescriptor),
}

impl AssetRequest {
    pub fn id(&self) -> &AssetId {
        match self {
            AssetRequest::Id(id) => id,
            AssetRequest::Dynamic(descriptor) => &descriptor.id,
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, AssetRequest::Dynamic(_))
    }
}

// One in-flight load: the resource being produced, everyone waiting on it,
// and the accumulated failure count for this request. `loading` is true only
// between issuing a load and receiving its result.
struct AssetLoadingInfo {
    resource: ResourceCell,
    waiters: Vec<SharedLoadHandler>,
    error_count: u32,
    loading: bool,
}

/// The de-duplicating, reference-counted cache of concrete asset resources.
///
/// All tables are exclusively owned here and mutated synchronously by the
/// single-threaded pump; other components interact only through the public
/// request/unref/retry API.
pub struct AssetManager {
    configuration: AssetConfiguration,
    factory: Box<dyn ResourceFactory>,

    // Fully loaded assets, by id
    cached: HashMap<AssetId, ResourceCell>,
    // In-flight loads, by id
    loadings: HashMap<AssetId, AssetLoadingInfo>,
    // One count per outstanding request_asset call; entry removed exactly at zero
    ref_counts: HashMap<AssetId, u32>,
    // Descriptor for every live (loading or cached) asset, dynamic ones included
    descriptors: HashMap<AssetId, AssetDescriptor>,
    // Reverse lookups for loaded assets: virtual path -> id, absolute path -> virtual path
    live_virtual_paths: HashMap<String, AssetId>,
    live_absolute_paths: HashMap<String, String>,

    events_tx: Sender<LoaderEvent>,
    events_rx: Receiver<LoaderEvent>,

    destroyed: bool,
}

impl AssetManager {
    /// Bound on per-load retry attempts. A retriable failure observed while
    /// the accumulated error count already exceeds this is escalated to a
    /// non-retriable "retry limit exceeded" error.
    pub const MAX_ERROR_COUNT: u32 = 3;

    pub fn new(
        configuration: AssetConfiguration,
        factory: Box<dyn ResourceFactory>,
    ) -> Self {
        let (events_tx, events_rx) = crossbeam_channel::unbounded();

        AssetManager {
            configuration,
            factory,
            cached: Default::default(),
            loadings: Default::default(),
            ref_counts: Default::default(),
            descriptors: Default::default(),
            live_virtual_paths: Default::default(),
            live_absolute_paths: Default::default(),
            events_tx,
            events_rx,
            destroyed: false,
        }
    }

    pub fn configuration(&self) -> &AssetConfiguration {
        &self.configuration
    }

    /// Whether `id` was statically declared in the game manifest. Abandoning
    /// a statically declared asset is fatal for the game; dynamic assets are
    /// exempt.
    pub fn is_static(
        &self,
        id: &AssetId,
    ) -> bool {
        self.configuration.contains(id)
    }

    /// Requests one asset on behalf of `handler` and takes one reference on
    /// it. Returns whether the caller must wait: a cache hit notifies the
    /// handler synchronously and returns `false`; otherwise the handler is
    /// registered as a waiter on the (possibly brand-new) in-flight load.
    pub fn request_asset(
        &mut self,
        request: AssetRequest,
        handler: &SharedLoadHandler,
    ) -> bool {
        assert!(!self.destroyed, "request_asset on a destroyed AssetManager");

        let id = request.id().clone();

        if let Some(resource) = self.cached.get(&id) {
            let resource = resource.clone();
            *self.ref_counts.get_mut(&id).unwrap() += 1;
            log::trace!(
                "request_asset {} hit cache (ref count {})",
                id,
                self.ref_counts[&id]
            );
            handler.lock().unwrap().on_asset_load(&resource);
            return false;
        }

        if let Some(info) = self.loadings.get_mut(&id) {
            info.waiters.push(handler.clone());
            *self.ref_counts.get_mut(&id).unwrap() += 1;
            log::trace!(
                "request_asset {} joins in-flight load ({} waiters)",
                id,
                info.waiters.len()
            );
            return true;
        }

        // Brand new: resolve the descriptor, create the resource, open a
        // loading record and issue the load.
        let descriptor = match &request {
            AssetRequest::Id(id) => self
                .configuration
                .get(id)
                .unwrap_or_else(|| panic!("requested undeclared asset id {}", id))
                .clone(),
            AssetRequest::Dynamic(dynamic) => dynamic.descriptor.clone(),
        };

        let resource = Self::create_resource(&mut self.factory, &id, &descriptor);
        let resource: ResourceCell = Arc::new(Mutex::new(resource));

        self.descriptors.insert(id.clone(), descriptor);
        self.ref_counts.insert(id.clone(), 1);

        let mut info = AssetLoadingInfo {
            resource,
            waiters: vec![handler.clone()],
            error_count: 0,
            loading: false,
        };
        Self::issue_load(&self.events_tx, &id, &mut info);
        self.loadings.insert(id, info);
        true
    }

    /// Requests a batch; returns how many of them are still pending (cache
    /// hits resolve synchronously and do not count).
    pub fn request_assets(
        &mut self,
        requests: &[AssetRequest],
        handler: &SharedLoadHandler,
    ) -> usize {
        let mut waiting = 0;
        for request in requests {
            if self.request_asset(request.clone(), handler) {
                waiting += 1;
            }
        }
        waiting
    }

    /// Releases one reference on `id`. At zero the entry is deleted from
    /// every tracking table and the underlying resource is released
    /// (destroyed if idle, handed to its owning subsystem if in use).
    pub fn unref_asset(
        &mut self,
        id: &AssetId,
    ) {
        let count = self
            .ref_counts
            .get_mut(id)
            .unwrap_or_else(|| panic!("unref_asset for unreferenced asset {}", id));
        assert!(*count > 0, "ref count underflow for asset {}", id);
        *count -= 1;
        log::trace!("unref_asset {} (ref count {})", id, *count);
        if *count == 0 {
            self.ref_counts.remove(id);
            self.release_asset(id);
        }
    }

    pub fn unref_assets(
        &mut self,
        ids: &[AssetId],
    ) {
        for id in ids {
            self.unref_asset(id);
        }
    }

    /// Re-issues the load of an asset whose previous attempt failed. Valid
    /// only for an asset currently tracked as loading and not mid-flight;
    /// anything else (never requested, already resolved, or abandoned after
    /// escalation) is a programming error.
    pub fn retry_load(
        &mut self,
        id: &AssetId,
    ) {
        assert!(!self.destroyed, "retry_load on a destroyed AssetManager");
        let info = self
            .loadings
            .get_mut(id)
            .unwrap_or_else(|| panic!("retry_load for asset {} that is not currently loading", id));
        assert!(
            !info.loading,
            "retry_load for asset {} with an attempt already in flight",
            id
        );
        log::debug!(
            "retry_load {} (error count {})",
            id,
            info.error_count
        );
        Self::issue_load(&self.events_tx, id, info);
    }

    /// Drains completed/failed load results and advances the cache
    /// accordingly. Must be pumped once per simulation tick.
    #[profiling::function]
    pub fn update(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            log::debug!("handle loader event {:?}", event);
            match event {
                LoaderEvent::LoadResult { id, result } => match result {
                    LoadResult::Complete => self.handle_load_complete(id),
                    LoadResult::Error(error) => self.handle_load_error(id, error),
                    LoadResult::Dropped => {
                        // A cancelled load (unref'd mid-flight) legitimately
                        // drops its completion; a tracked one must not.
                        if self.loadings.contains_key(&id) {
                            panic!(
                                "load completion for {} dropped without calling complete/error",
                                id
                            );
                        }
                    }
                },
            }
        }
    }

    pub fn ref_count(
        &self,
        id: &AssetId,
    ) -> u32 {
        self.ref_counts.get(id).copied().unwrap_or(0)
    }

    pub fn is_loading(
        &self,
        id: &AssetId,
    ) -> bool {
        self.loadings.contains_key(id)
    }

    pub fn peek_cached(
        &self,
        id: &AssetId,
    ) -> Option<&ResourceCell> {
        self.cached.get(id)
    }

    pub fn live_virtual_path(
        &self,
        virtual_path: &str,
    ) -> Option<&AssetId> {
        self.live_virtual_paths.get(virtual_path)
    }

    pub fn live_absolute_path(
        &self,
        path: &str,
    ) -> Option<&str> {
        self.live_absolute_paths.get(path).map(|s| s.as_str())
    }

    /// Releases every currently-referenced asset as if each had been fully
    /// unref'd, then clears all state. Idempotent.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let live_ids: Vec<AssetId> = self
            .cached
            .keys()
            .chain(self.loadings.keys())
            .cloned()
            .collect();
        for id in &live_ids {
            self.release_asset(id);
        }
        self.cached.clear();
        self.loadings.clear();
        self.ref_counts.clear();
        self.descriptors.clear();
        self.live_virtual_paths.clear();
        self.live_absolute_paths.clear();
        self.destroyed = true;
        log::debug!("AssetManager destroyed ({} assets released)", live_ids.len());
    }

    pub fn destroyed(&self) -> bool {
        self.destroyed
    }

    fn handle_load_complete(
        &mut self,
        id: AssetId,
    ) {
        let Some(mut info) = self.loadings.remove(&id) else {
            // The asset was unref'd to zero while its load was in flight.
            log::trace!("stale load completion for {}, ignoring", id);
            return;
        };
        info.loading = false;

        // Promote into the permanent cache and the reverse-lookup tables.
        let descriptor = self.descriptors.get(&id).unwrap();
        if !descriptor.virtual_path.is_empty() {
            self.live_virtual_paths
                .insert(descriptor.virtual_path.clone(), id.clone());
            self.live_absolute_paths
                .insert(descriptor.path.clone(), descriptor.virtual_path.clone());
        }
        self.cached.insert(id.clone(), info.resource.clone());

        log::debug!("asset {} loaded, notifying {} waiters", id, info.waiters.len());
        for waiter in &info.waiters {
            waiter.lock().unwrap().on_asset_load(&info.resource);
        }
    }

    fn handle_load_error(
        &mut self,
        id: AssetId,
        error: AssetLoadError,
    ) {
        let Some(info) = self.loadings.get_mut(&id) else {
            log::trace!("stale load failure for {}, ignoring", id);
            return;
        };
        info.loading = false;
        info.error_count += 1;

        // Cap retries here so callers never have to count attempts: once a
        // retriable failure arrives past the budget, surface a synthesized
        // non-retriable error instead.
        let error = if error.retriable && info.error_count > Self::MAX_ERROR_COUNT {
            AssetLoadError::retry_limit_exceeded(&id)
        } else {
            error
        };

        let resource = info.resource.clone();
        let waiters = info.waiters.clone();
        let mut wants_retry = false;
        for waiter in &waiters {
            let disposition = waiter.lock().unwrap().on_asset_error(&resource, &error);
            if disposition == ErrorDisposition::Retry {
                wants_retry = true;
            }
        }

        if !error.retriable {
            // Terminal: release the never-loaded resource and stop tracking
            // the load. Reference counts stay until the waiters unref.
            log::warn!("asset {} load abandoned: {}", id, error);
            self.loadings.remove(&id);
            Self::release_resource(&id, &resource);
        } else if wants_retry {
            self.retry_load(&id);
        } else {
            log::debug!(
                "asset {} failed (error count {}), no waiter asked for a retry",
                id,
                self.loadings[&id].error_count
            );
        }
    }

    fn release_asset(
        &mut self,
        id: &AssetId,
    ) {
        if let Some(descriptor) = self.descriptors.remove(id) {
            self.live_virtual_paths.remove(&descriptor.virtual_path);
            self.live_absolute_paths.remove(&descriptor.path);
        }
        let resource = self
            .cached
            .remove(id)
            .or_else(|| self.loadings.remove(id).map(|info| info.resource));
        match resource {
            Some(resource) => Self::release_resource(id, &resource),
            // Already released (e.g. the load was abandoned after escalation).
            None => log::trace!("release_asset {}: nothing live to release", id),
        }
    }

    fn release_resource(
        id: &AssetId,
        resource: &ResourceCell,
    ) {
        let mut resource = resource.lock().unwrap();
        if resource.destroyed() {
            return;
        }
        if resource.in_use() {
            // Destruction is delegated to whichever subsystem is keeping the
            // resource busy; it must still happen once the resource goes idle.
            log::debug!("asset {} is in use, deferring destruction", id);
            resource.request_destroy();
        } else {
            resource.destroy();
        }
    }

    fn issue_load(
        events_tx: &Sender<LoaderEvent>,
        id: &AssetId,
        info: &mut AssetLoadingInfo,
    ) {
        info.loading = true;
        let op = LoadCompletion::new(events_tx.clone(), id.clone());
        log::debug!("issue load of {}", id);
        info.resource.lock().unwrap().load(op);
    }

    fn create_resource(
        factory: &mut Box<dyn ResourceFactory>,
        id: &AssetId,
        descriptor: &AssetDescriptor,
    ) -> Box<dyn Resource> {
        let asset_type = descriptor
            .asset_type
            .unwrap_or_else(|| panic!("asset {} has no type", id));
        match asset_type {
            AssetType::Image => factory.create_image_resource(
                id,
                &descriptor.path,
                descriptor.width.unwrap_or(0),
                descriptor.height.unwrap_or(0),
            ),
            AssetType::Audio => factory.create_audio_resource(
                id,
                &descriptor.path,
                descriptor.duration.unwrap_or(0.0),
                descriptor.loop_audio.unwrap_or(false),
                descriptor.hint.as_deref(),
                descriptor.system_id.as_deref(),
            ),
            AssetType::Text => factory.create_text_resource(id, &descriptor.path),
            AssetType::Script => {
                factory.create_script_resource(id, &descriptor.path, &descriptor.virtual_path)
            }
            AssetType::Video => factory.create_video_resource(
                id,
                &descriptor.path,
                descriptor.width.unwrap_or(0),
                descriptor.height.unwrap_or(0),
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{manager_with_manifest, FakeFactoryState, RecordingHandler};
    use stagehand_base::AssetLoadErrorKind;

    fn asset_id(id: &str) -> AssetId {
        AssetId::new(id)
    }

    #[test]
    fn cache_hit_notifies_synchronously_and_bumps_ref_count() {
        let (mut manager, _state) = manager_with_manifest();
        let first = RecordingHandler::shared();
        let second = RecordingHandler::shared();

        let waiting = manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&first),
        );
        assert!(waiting);
        manager.update();
        assert_eq!(first.lock().unwrap().loads.len(), 1);
        assert_eq!(manager.ref_count(&asset_id("foo")), 1);

        // Second request resolves from cache, no update() needed.
        let waiting = manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&second),
        );
        assert!(!waiting);
        assert_eq!(second.lock().unwrap().loads.len(), 1);
        assert_eq!(manager.ref_count(&asset_id("foo")), 2);
    }

    #[test]
    fn in_flight_requests_are_deduplicated() {
        let (mut manager, state) = manager_with_manifest();
        state.lock().unwrap().manual_ids.insert(asset_id("foo"));

        let handlers: Vec<_> = (0..3).map(|_| RecordingHandler::shared()).collect();
        for handler in &handlers {
            let waiting = manager.request_asset(
                AssetRequest::Id(asset_id("foo")),
                &RecordingHandler::as_handler(handler),
            );
            assert!(waiting);
        }

        // One factory call, despite three requests.
        assert_eq!(state.lock().unwrap().create_calls, vec![asset_id("foo")]);
        assert_eq!(manager.ref_count(&asset_id("foo")), 3);

        FakeFactoryState::complete_parked(&state, &asset_id("foo"));
        manager.update();

        // Every waiter saw the same resource instance.
        let cells: Vec<_> = handlers
            .iter()
            .map(|h| h.lock().unwrap().loads[0].clone())
            .collect();
        assert!(Arc::ptr_eq(&cells[0], &cells[1]));
        assert!(Arc::ptr_eq(&cells[1], &cells[2]));
    }

    #[test]
    fn last_unref_purges_every_table() {
        let (mut manager, state) = manager_with_manifest();
        let handler = RecordingHandler::shared();

        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();

        assert!(manager.peek_cached(&asset_id("foo")).is_some());
        assert_eq!(
            manager.live_virtual_path("image/foo.png"),
            Some(&asset_id("foo"))
        );
        assert_eq!(
            manager.live_absolute_path("assets/image/foo.png"),
            Some("image/foo.png")
        );

        manager.unref_asset(&asset_id("foo"));

        assert_eq!(manager.ref_count(&asset_id("foo")), 0);
        assert!(manager.peek_cached(&asset_id("foo")).is_none());
        assert!(manager.live_virtual_path("image/foo.png").is_none());
        assert!(manager.live_absolute_path("assets/image/foo.png").is_none());
        assert_eq!(state.lock().unwrap().destroyed_ids, vec![asset_id("foo")]);
    }

    #[test]
    fn ref_count_survives_until_last_unref() {
        let (mut manager, state) = manager_with_manifest();
        let handler = RecordingHandler::shared();
        let shared = RecordingHandler::as_handler(&handler);

        manager.request_asset(AssetRequest::Id(asset_id("foo")), &shared);
        manager.update();
        manager.request_asset(AssetRequest::Id(asset_id("foo")), &shared);
        assert_eq!(manager.ref_count(&asset_id("foo")), 2);

        manager.unref_asset(&asset_id("foo"));
        assert!(manager.peek_cached(&asset_id("foo")).is_some());
        assert!(state.lock().unwrap().destroyed_ids.is_empty());

        manager.unref_asset(&asset_id("foo"));
        assert!(manager.peek_cached(&asset_id("foo")).is_none());
    }

    #[test]
    #[should_panic(expected = "unreferenced asset")]
    fn unref_of_unknown_asset_panics() {
        let (mut manager, _state) = manager_with_manifest();
        manager.unref_asset(&asset_id("foo"));
    }

    #[test]
    fn unref_while_loading_cancels_the_load() {
        let (mut manager, state) = manager_with_manifest();
        let handler = RecordingHandler::shared();

        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        state.lock().unwrap().manual_ids.insert(asset_id("zoo"));
        manager.request_asset(
            AssetRequest::Id(asset_id("zoo")),
            &RecordingHandler::as_handler(&handler),
        );

        manager.unref_asset(&asset_id("zoo"));
        assert!(!manager.is_loading(&asset_id("zoo")));

        // The stale completion drains without effect.
        FakeFactoryState::complete_parked(&state, &asset_id("zoo"));
        manager.update();
        assert_eq!(handler.lock().unwrap().loads.len(), 1);
        assert!(manager.peek_cached(&asset_id("zoo")).is_none());
    }

    #[test]
    fn retriable_failures_escalate_at_the_retry_budget() {
        let (mut manager, state) = manager_with_manifest();
        state
            .lock()
            .unwrap()
            .failures
            .insert(asset_id("foo"), u32::MAX);

        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();

        let handler = handler.lock().unwrap();
        let errors = &handler.errors;
        // MAX_ERROR_COUNT retriable failures, then the synthesized terminal one.
        assert_eq!(errors.len() as u32, AssetManager::MAX_ERROR_COUNT + 1);
        for (_, kind, retriable) in &errors[..errors.len() - 1] {
            assert_eq!(*kind, AssetLoadErrorKind::Unspecified);
            assert!(*retriable);
        }
        let (_, last_kind, last_retriable) = &errors[errors.len() - 1];
        assert_eq!(*last_kind, AssetLoadErrorKind::RetryLimitExceeded);
        assert!(!*last_retriable);

        assert!(!manager.is_loading(&asset_id("foo")));
        assert!(manager.peek_cached(&asset_id("foo")).is_none());
        // The abandoned request still holds its reference until unref.
        assert_eq!(manager.ref_count(&asset_id("foo")), 1);
    }

    #[test]
    fn bounded_failures_recover_and_load() {
        let (mut manager, state) = manager_with_manifest();
        state.lock().unwrap().failures.insert(asset_id("foo"), 2);

        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();

        let handler = handler.lock().unwrap();
        assert_eq!(handler.errors.len(), 2);
        assert_eq!(handler.loads.len(), 1);
    }

    #[test]
    #[should_panic(expected = "not currently loading")]
    fn retry_load_after_escalation_panics() {
        let (mut manager, state) = manager_with_manifest();
        state
            .lock()
            .unwrap()
            .failures
            .insert(asset_id("foo"), u32::MAX);

        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();

        manager.retry_load(&asset_id("foo"));
    }

    #[test]
    #[should_panic(expected = "not currently loading")]
    fn retry_load_of_unknown_asset_panics() {
        let (mut manager, _state) = manager_with_manifest();
        manager.retry_load(&asset_id("foo"));
    }

    #[test]
    fn permanent_failure_is_not_retried() {
        let (mut manager, state) = manager_with_manifest();
        state
            .lock()
            .unwrap()
            .permanent_failures
            .insert(asset_id("foo"));

        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("foo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();

        let handler = handler.lock().unwrap();
        assert_eq!(handler.errors.len(), 1);
        assert!(!handler.errors[0].2);
        assert!(!manager.is_loading(&asset_id("foo")));
    }

    #[test]
    #[should_panic(expected = "undeclared asset id")]
    fn requesting_an_undeclared_static_id_panics() {
        let (mut manager, _state) = manager_with_manifest();
        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("nope")),
            &RecordingHandler::as_handler(&handler),
        );
    }

    #[test]
    fn dynamic_assets_load_outside_the_manifest() {
        let (mut manager, state) = manager_with_manifest();
        let handler = RecordingHandler::shared();

        let request = crate::test_support::dynamic_text_request("extra", "text/extra.txt");
        assert!(!manager.is_static(request.id()));
        manager.request_asset(request, &RecordingHandler::as_handler(&handler));
        manager.update();

        assert_eq!(handler.lock().unwrap().loads.len(), 1);
        assert_eq!(state.lock().unwrap().create_calls, vec![asset_id("extra")]);
    }

    #[test]
    fn in_use_resources_defer_destruction_on_last_unref() {
        let (mut manager, state) = manager_with_manifest();
        state.lock().unwrap().in_use_ids.insert(asset_id("zoo"));

        let handler = RecordingHandler::shared();
        manager.request_asset(
            AssetRequest::Id(asset_id("zoo")),
            &RecordingHandler::as_handler(&handler),
        );
        manager.update();
        manager.unref_asset(&asset_id("zoo"));

        // Not destroyed synchronously; destruction was delegated. The
        // manager's own tables are purged regardless.
        let state = state.lock().unwrap();
        assert!(state.destroyed_ids.is_empty());
        assert_eq!(state.deferred_destroy_ids, vec![asset_id("zoo")]);
        drop(state);
        assert!(manager.peek_cached(&asset_id("zoo")).is_none());
        assert_eq!(manager.ref_count(&asset_id("zoo")), 0);
    }

    #[test]
    fn destroy_releases_everything() {
        let (mut manager, state) = manager_with_manifest();
        let handler = RecordingHandler::shared();
        let shared = RecordingHandler::as_handler(&handler);

        manager.request_asset(AssetRequest::Id(asset_id("foo")), &shared);
        manager.request_asset(AssetRequest::Id(asset_id("zoo")), &shared);
        manager.update();

        manager.destroy();
        assert!(manager.destroyed());

        let mut destroyed = state.lock().unwrap().destroyed_ids.clone();
        destroyed.sort();
        assert_eq!(destroyed, vec![asset_id("foo"), asset_id("zoo")]);

        // Idempotent.
        manager.destroy();
    }
}
