use crate::asset_holder::{HolderEvent, HolderNotifier};
use crate::asset_manager::{
    AssetLoadHandler, AssetManager, AssetRequest, ErrorDisposition, SharedLoadHandler,
};
use crate::resource::{LoadCompletion, Resource, ResourceCell, ResourceFactory};
use stagehand_base::hashing::{HashMap, HashSet};
use stagehand_base::{
    AssetConfiguration, AssetDescriptor, AssetId, AssetLoadError, AssetLoadErrorKind, AssetType,
    DynamicAssetDescriptor, GameManifest,
};
use std::sync::{Arc, Mutex};

pub const MANIFEST_JSON: &str = r#"
{
    "assets": {
        "foo": {
            "path": "assets/image/foo.png",
            "virtualPath": "image/foo.png",
            "type": "image",
            "width": 1,
            "height": 1
        },
        "zoo": {
            "path": "assets/audio/zoo.ogg",
            "virtualPath": "audio/zoo.ogg",
            "type": "audio",
            "duration": 1984,
            "systemId": "music"
        },
        "boot": {
            "path": "assets/script/boot.js",
            "virtualPath": "script/boot.js",
            "type": "script",
            "global": true
        }
    },
    "audioSystems": {
        "music": {
            "loop": true,
            "hint": "stream"
        }
    }
}
"#;

/// Shared scripting/observation state for the fake factory and every resource
/// it creates.
#[derive(Default)]
pub struct FakeFactoryState {
    pub create_calls: Vec<AssetId>,
    /// Remaining retriable failures to report per id before succeeding.
    pub failures: HashMap<AssetId, u32>,
    /// Ids whose every load attempt fails permanently.
    pub permanent_failures: HashSet<AssetId>,
    /// Ids whose loads park instead of resolving synchronously; released via
    /// [`FakeFactoryState::complete_parked`].
    pub manual_ids: HashSet<AssetId>,
    pub parked: Vec<(AssetId, LoadCompletion)>,
    pub destroyed_ids: Vec<AssetId>,
    pub in_use_ids: HashSet<AssetId>,
    pub deferred_destroy_ids: Vec<AssetId>,
}

impl FakeFactoryState {
    pub fn complete_parked(
        state: &Arc<Mutex<FakeFactoryState>>,
        id: &AssetId,
    ) {
        let parked = {
            let mut state = state.lock().unwrap();
            let index = state
                .parked
                .iter()
                .position(|(parked_id, _)| parked_id == id)
                .unwrap_or_else(|| panic!("no parked load for {}", id));
            state.parked.remove(index).1
        };
        parked.complete();
    }
}

struct FakeResource {
    id: AssetId,
    path: String,
    resource_type: AssetType,
    destroyed: bool,
    state: Arc<Mutex<FakeFactoryState>>,
}

impl Resource for FakeResource {
    fn id(&self) -> &AssetId {
        &self.id
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn resource_type(&self) -> AssetType {
        self.resource_type
    }

    fn load(
        &mut self,
        op: LoadCompletion,
    ) {
        let mut state = self.state.lock().unwrap();
        if state.manual_ids.contains(&self.id) {
            state.parked.push((self.id.clone(), op));
            return;
        }
        if state.permanent_failures.contains(&self.id) {
            drop(state);
            op.error(AssetLoadError::permanent(format!(
                "scripted permanent failure for {}",
                self.id
            )));
            return;
        }
        if let Some(remaining) = state.failures.get_mut(&self.id) {
            if *remaining > 0 {
                *remaining = remaining.saturating_sub(1);
                drop(state);
                op.error(AssetLoadError::retriable(format!(
                    "scripted failure for {}",
                    self.id
                )));
                return;
            }
        }
        drop(state);
        op.complete();
    }

    fn destroy(&mut self) {
        self.destroyed = true;
        self.state.lock().unwrap().destroyed_ids.push(self.id.clone());
    }

    fn destroyed(&self) -> bool {
        self.destroyed
    }

    fn in_use(&self) -> bool {
        self.state.lock().unwrap().in_use_ids.contains(&self.id)
    }

    fn request_destroy(&mut self) {
        self.state
            .lock()
            .unwrap()
            .deferred_destroy_ids
            .push(self.id.clone());
    }
}

pub struct FakeResourceFactory {
    state: Arc<Mutex<FakeFactoryState>>,
}

impl FakeResourceFactory {
    pub fn new(state: Arc<Mutex<FakeFactoryState>>) -> Self {
        FakeResourceFactory { state }
    }

    fn create(
        &mut self,
        id: &AssetId,
        path: &str,
        resource_type: AssetType,
    ) -> Box<dyn Resource> {
        self.state.lock().unwrap().create_calls.push(id.clone());
        Box::new(FakeResource {
            id: id.clone(),
            path: path.to_string(),
            resource_type,
            destroyed: false,
            state: self.state.clone(),
        })
    }
}

impl ResourceFactory for FakeResourceFactory {
    fn create_image_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _width: u32,
        _height: u32,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Image)
    }

    fn create_audio_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _duration: f64,
        _loop_audio: bool,
        _hint: Option<&str>,
        _system_id: Option<&str>,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Audio)
    }

    fn create_text_resource(
        &mut self,
        id: &AssetId,
        path: &str,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Text)
    }

    fn create_script_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _virtual_path: &str,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Script)
    }

    fn create_video_resource(
        &mut self,
        id: &AssetId,
        path: &str,
        _width: u32,
        _height: u32,
    ) -> Box<dyn Resource> {
        self.create(id, path, AssetType::Video)
    }
}

pub fn manager_with_manifest() -> (AssetManager, Arc<Mutex<FakeFactoryState>>) {
    let manifest = GameManifest::from_json(MANIFEST_JSON).unwrap();
    let configuration = AssetConfiguration::normalize(&manifest).unwrap();
    let state = Arc::new(Mutex::new(FakeFactoryState::default()));
    let factory = Box::new(FakeResourceFactory::new(state.clone()));
    (AssetManager::new(configuration, factory), state)
}

pub fn dynamic_text_request(
    id: &str,
    path: &str,
) -> AssetRequest {
    AssetRequest::Dynamic(DynamicAssetDescriptor {
        id: AssetId::new(id),
        descriptor: AssetDescriptor {
            path: path.to_string(),
            asset_type: Some(AssetType::Text),
            ..Default::default()
        },
    })
}

/// Records every callback the manager delivers; votes Retry for retriable
/// failures and Abandon otherwise.
#[derive(Default)]
pub struct RecordingHandler {
    pub loads: Vec<ResourceCell>,
    pub errors: Vec<(AssetId, AssetLoadErrorKind, bool)>,
}

impl RecordingHandler {
    pub fn shared() -> Arc<Mutex<RecordingHandler>> {
        Arc::new(Mutex::new(RecordingHandler::default()))
    }

    pub fn as_handler(handler: &Arc<Mutex<RecordingHandler>>) -> SharedLoadHandler {
        handler.clone() as SharedLoadHandler
    }
}

impl AssetLoadHandler for RecordingHandler {
    fn on_asset_load(
        &mut self,
        resource: &ResourceCell,
    ) {
        self.loads.push(resource.clone());
    }

    fn on_asset_error(
        &mut self,
        resource: &ResourceCell,
        error: &AssetLoadError,
    ) -> ErrorDisposition {
        let id = resource.lock().unwrap().id().clone();
        self.errors.push((id, error.kind, error.retriable));
        if error.retriable {
            ErrorDisposition::Retry
        } else {
            ErrorDisposition::Abandon
        }
    }
}

pub fn recording_notifier() -> (HolderNotifier, Arc<Mutex<Vec<HolderEvent>>>) {
    let events: Arc<Mutex<Vec<HolderEvent>>> = Default::default();
    let sink = events.clone();
    let notifier: HolderNotifier = Box::new(move |event| {
        sink.lock().unwrap().push(event);
    });
    (notifier, events)
}
