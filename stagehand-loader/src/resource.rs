use crossbeam_channel::Sender;
use stagehand_base::{AssetId, AssetLoadError, AssetType};
use std::sync::{Arc, Mutex};

/// A concrete loaded-or-loading resource, shared between the manager's cache
/// and every consumer that requested it.
pub type ResourceCell = Arc<Mutex<Box<dyn Resource>>>;

/// The concrete asset collaborator boundary. Implementations wrap the actual
/// decoded payload (pixels, samples, text, ...); this subsystem only drives
/// their load/destroy lifecycle.
pub trait Resource: Send {
    fn id(&self) -> &AssetId;

    fn path(&self) -> &str;

    fn resource_type(&self) -> AssetType;

    /// Starts (or restarts, for a retry) the asynchronous load. The result
    /// arrives later through the channel behind `op`; implementations must
    /// call exactly one of [`LoadCompletion::complete`] or
    /// [`LoadCompletion::error`].
    fn load(
        &mut self,
        op: LoadCompletion,
    );

    fn destroy(&mut self);

    fn destroyed(&self) -> bool;

    /// Whether the resource is currently held busy by its owning subsystem
    /// (an audio resource that is still playing, for example). A busy
    /// resource is not destroyed synchronously on last unref; destruction is
    /// delegated via [`Resource::request_destroy`].
    fn in_use(&self) -> bool {
        false
    }

    /// Hands destruction off to the owning subsystem. The default is to
    /// destroy immediately; resources that can be `in_use` override this to
    /// defer until they go idle.
    fn request_destroy(&mut self) {
        self.destroy();
    }
}

/// Events that drive the manager's load state changes, produced by
/// [`LoadCompletion`] and drained by `AssetManager::update`.
#[derive(Debug)]
pub enum LoaderEvent {
    LoadResult { id: AssetId, result: LoadResult },
}

#[derive(Debug)]
pub enum LoadResult {
    Complete,
    Error(AssetLoadError),
    /// The completion was dropped without reporting either way. For an asset
    /// still being tracked this is a bug in the resource implementation.
    Dropped,
}

/// Type that allows a concrete resource to signal that its load attempt has
/// finished. Dropping it without calling either method is detected and
/// reported as [`LoadResult::Dropped`].
pub struct LoadCompletion {
    sender: Option<Sender<LoaderEvent>>,
    id: AssetId,
}

impl LoadCompletion {
    pub(crate) fn new(
        sender: Sender<LoaderEvent>,
        id: AssetId,
    ) -> Self {
        Self {
            sender: Some(sender),
            id,
        }
    }

    pub fn asset_id(&self) -> &AssetId {
        &self.id
    }

    /// Signals that this load attempt succeeded.
    pub fn complete(mut self) {
        log::debug!("load of {} complete", self.id);
        let _ = self
            .sender
            .take()
            .unwrap()
            .send(LoaderEvent::LoadResult {
                id: self.id.clone(),
                result: LoadResult::Complete,
            });
    }

    /// Signals that this load attempt failed.
    pub fn error(
        mut self,
        error: AssetLoadError,
    ) {
        log::debug!("load of {} failed: {}", self.id, error);
        let _ = self
            .sender
            .take()
            .unwrap()
            .send(LoaderEvent::LoadResult {
                id: self.id.clone(),
                result: LoadResult::Error(error),
            });
    }
}

impl Drop for LoadCompletion {
    fn drop(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(LoaderEvent::LoadResult {
                id: self.id.clone(),
                result: LoadResult::Dropped,
            });
        }
    }
}

/// Creates the concrete resource objects. The manager calls exactly one
/// `create_*_resource` per brand-new asset, passing the descriptor fields
/// relevant to that asset type.
pub trait ResourceFactory: Send {
    fn create_image_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        width: u32,
        height: u32,
    ) -> Box<dyn Resource>;

    fn create_audio_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        duration: f64,
        loop_audio: bool,
        hint: Option<&str>,
        system_id: Option<&str>,
    ) -> Box<dyn Resource>;

    fn create_text_resource(
        &mut self,
        id: &AssetId,
        path: &str,
    ) -> Box<dyn Resource>;

    fn create_script_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        virtual_path: &str,
    ) -> Box<dyn Resource>;

    fn create_video_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        width: u32,
        height: u32,
    ) -> Box<dyn Resource>;
}
