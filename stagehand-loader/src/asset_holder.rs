use crate::asset_manager::{
    AssetLoadHandler, AssetManager, AssetRequest, ErrorDisposition, SharedLoadHandler,
};
use crate::resource::ResourceCell;
use stagehand_base::hashing::HashSet;
use stagehand_base::{AssetId, AssetLoadError};
use std::sync::{Arc, Mutex};

/// Progress notifications a holder emits while its asset group resolves.
/// `Finished` fires exactly once per holder lifetime.
#[derive(Clone, Debug)]
pub enum HolderEvent {
    Loaded(AssetId),
    Failed(AssetId, AssetLoadError),
    Finished { succeed: bool },
}

pub type HolderNotifier = Box<dyn FnMut(HolderEvent) + Send>;

struct AssetHolderInner {
    requests: Vec<AssetRequest>,
    dynamic_ids: HashSet<AssetId>,
    waiting_count: usize,
    requested: bool,
    finished: bool,
    succeed: bool,
    resolved: Vec<ResourceCell>,
    notifier: Option<HolderNotifier>,
    destroyed: bool,
}

impl AssetHolderInner {
    // Exactly-once group completion.
    fn finish(
        &mut self,
        succeed: bool,
    ) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.succeed = succeed;
        if let Some(notifier) = &mut self.notifier {
            notifier(HolderEvent::Finished { succeed });
        }
    }

    fn notify(
        &mut self,
        event: HolderEvent,
    ) {
        if let Some(notifier) = &mut self.notifier {
            notifier(event);
        }
    }
}

/// Groups one batch of asset requests and tracks them to a single
/// success-or-failure outcome. A holder is single-shot: it is given its
/// request list up front, `request` starts all the loads, and `Finished`
/// fires once the last one settles.
///
/// The holder registers itself with the [`AssetManager`] as the waiter; the
/// manager's callbacks land on the inner state behind its own lock, which is
/// never held across a call back into the manager.
pub struct AssetHolder {
    inner: Arc<Mutex<AssetHolderInner>>,
}

impl AssetHolder {
    pub fn new(
        requests: Vec<AssetRequest>,
        notifier: Option<HolderNotifier>,
    ) -> Self {
        let dynamic_ids = requests
            .iter()
            .filter(|r| r.is_dynamic())
            .map(|r| r.id().clone())
            .collect();
        AssetHolder {
            inner: Arc::new(Mutex::new(AssetHolderInner {
                requests,
                dynamic_ids,
                waiting_count: 0,
                requested: false,
                finished: false,
                succeed: false,
                resolved: Vec::new(),
                notifier,
                destroyed: false,
            })),
        }
    }

    pub fn with_ids(
        ids: &[AssetId],
        notifier: Option<HolderNotifier>,
    ) -> Self {
        Self::new(
            ids.iter().cloned().map(AssetRequest::Id).collect(),
            notifier,
        )
    }

    /// Starts loading the group. Returns `true` only on the call that
    /// actually has work outstanding afterwards; re-requesting, requesting a
    /// finished holder, or requesting a destroyed holder is a no-op. An empty
    /// group finishes successfully on the spot.
    pub fn request(
        &self,
        asset_manager: &mut AssetManager,
    ) -> bool {
        let requests = {
            let mut inner = self.inner.lock().unwrap();
            if inner.destroyed || inner.finished {
                return false;
            }
            if inner.requested {
                return true;
            }
            inner.requested = true;
            if inner.requests.is_empty() {
                inner.finish(true);
                return false;
            }
            inner.waiting_count = inner.requests.len();
            inner.requests.clone()
        };

        // The manager may complete cache hits synchronously inside this call,
        // so the inner lock must be free here.
        let handler = self.as_load_handler();
        asset_manager.request_assets(&requests, &handler);
        !self.inner.lock().unwrap().finished
    }

    /// Releases every reference the holder took. Safe to call at any point,
    /// including mid-load (outstanding loads are cancelled by the unref) and
    /// repeatedly.
    pub fn destroy(
        &self,
        asset_manager: &mut AssetManager,
    ) {
        let ids = {
            let mut inner = self.inner.lock().unwrap();
            if inner.destroyed {
                return;
            }
            inner.destroyed = true;
            inner.notifier = None;
            if !inner.requested {
                return;
            }
            inner
                .requests
                .iter()
                .map(|r| r.id().clone())
                .collect::<Vec<_>>()
        };
        asset_manager.unref_assets(&ids);
    }

    pub fn finished(&self) -> bool {
        self.inner.lock().unwrap().finished
    }

    pub fn succeed(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.finished && inner.succeed
    }

    /// Assets in the group still waiting to resolve.
    pub fn waiting_count(&self) -> usize {
        self.inner.lock().unwrap().waiting_count
    }

    pub fn requested(&self) -> bool {
        self.inner.lock().unwrap().requested
    }

    pub fn destroyed(&self) -> bool {
        self.inner.lock().unwrap().destroyed
    }

    pub fn resolved_resources(&self) -> Vec<ResourceCell> {
        self.inner.lock().unwrap().resolved.clone()
    }

    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.inner
            .lock()
            .unwrap()
            .requests
            .iter()
            .map(|r| r.id().clone())
            .collect()
    }

    pub fn as_load_handler(&self) -> SharedLoadHandler {
        self.inner.clone() as SharedLoadHandler
    }
}

impl AssetLoadHandler for AssetHolderInner {
    fn on_asset_load(
        &mut self,
        resource: &ResourceCell,
    ) {
        if self.destroyed {
            return;
        }
        let id = resource.lock().unwrap().id().clone();
        assert!(
            self.waiting_count > 0,
            "asset load for {} with no outstanding request",
            id
        );
        self.waiting_count -= 1;
        self.resolved.push(resource.clone());
        self.notify(HolderEvent::Loaded(id));
        if self.waiting_count == 0 {
            self.finish(true);
        }
    }

    fn on_asset_error(
        &mut self,
        resource: &ResourceCell,
        error: &AssetLoadError,
    ) -> ErrorDisposition {
        if self.destroyed {
            return ErrorDisposition::Abandon;
        }
        let id = resource.lock().unwrap().id().clone();
        self.notify(HolderEvent::Failed(id.clone(), error.clone()));

        if error.retriable {
            return ErrorDisposition::Retry;
        }

        if self.dynamic_ids.contains(&id) {
            // A dynamic asset that cannot load is dropped from the group so
            // the rest can still finish successfully.
            log::warn!("dynamic asset {} abandoned: {}", id, error);
            assert!(self.waiting_count > 0);
            self.waiting_count -= 1;
            if self.waiting_count == 0 {
                self.finish(true);
            }
        } else {
            self.finish(false);
        }
        ErrorDisposition::Abandon
    }
}
